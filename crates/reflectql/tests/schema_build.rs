//! Schema construction: discovery, type mapping and build errors.

mod common;

use std::sync::Arc;

use common::{Tag, Ticket, TicketArgs, build_test_schema};
use reflectql::schema::{ObjectGraphDiscoverer, TypeMapper};
use reflectql::{
    Args, BuildError, BuilderConfig, Describe, Parent, RegistrationError, RequestContext,
    ScalarDef, ScalarTable, SchemaBuilder,
};
use serde::{Deserialize, Serialize};

reflectql::schema_struct! {
    #[derive(Debug, Clone, Default, Serialize, Deserialize)]
    struct Department {
        name: String,
        staff: Vec<Employee>,
    }
}

reflectql::schema_struct! {
    #[derive(Debug, Clone, Default, Serialize, Deserialize)]
    struct Employee {
        name: String,
        department: Option<Box<Department>>,
        manager: Option<Box<Employee>>,
    }
}

reflectql::schema_struct! {
    #[derive(Debug, Clone, Default, Serialize, Deserialize)]
    struct Money {
        cents: i64,
    }
}

reflectql::schema_struct! {
    #[derive(Debug, Clone, Default, Serialize, Deserialize)]
    struct Invoice {
        total: Money,
        paid: Option<Money>,
    }
}

reflectql::schema_struct! {
    #[derive(Debug, Clone, Default, Serialize, Deserialize)]
    struct Gauge {
        reading: u128,
    }
}

// =============================================================================
// Discovery and mapping
// =============================================================================

#[test]
fn discovery_terminates_on_cycles() {
    common::init_tracing();
    let mut builder = SchemaBuilder::default();
    builder
        .query()
        .field_resolver("departments", |_ctx: RequestContext| async {
            Ok::<_, anyhow::Error>(Vec::<Department>::new())
        })
        .unwrap();

    let discovery = builder.discover();
    let outputs: Vec<_> = discovery.outputs.values().map(|s| s.name()).collect();
    assert_eq!(outputs, vec!["Department", "Employee"]);
    assert!(discovery.inputs.is_empty());
}

#[test]
fn discoverer_sees_argument_field_types_as_inputs() {
    let scalars = ScalarTable::new();
    let mut discoverer = ObjectGraphDiscoverer::new(&scalars);
    let signature = {
        let mut builder = SchemaBuilder::default();
        builder
            .query()
            .field_resolver("ticket", |_ctx: RequestContext, Args(_a): Args<TicketArgs>| async {
                Ok::<_, anyhow::Error>(Vec::<Option<Ticket>>::new())
            })
            .unwrap();
        builder.query().method("ticket").unwrap().signature().clone()
    };
    discoverer.add_signature(&signature);
    let discovery = discoverer.finish();

    let inputs: Vec<_> = discovery.inputs.values().map(|s| s.name()).collect();
    assert_eq!(
        inputs,
        vec!["TicketFilterInput", "TicketOrderInput", "StringFilter", "NumberFilter"]
    );
    assert!(discovery.has_output(Ticket::describe().key().unwrap()));
    assert!(discovery.has_output(Tag::describe().key().unwrap()));
    assert!(!discovery.has_input(TicketArgs::describe().key().unwrap()));
}

#[test]
fn mapper_returns_the_same_object_for_the_same_type() {
    let mut mapper = TypeMapper::new(Arc::new(ScalarTable::new()));
    let department = *Department::describe().as_struct().unwrap();

    let first = mapper.object(&department).unwrap();
    let second = mapper.object(&department).unwrap();
    assert_eq!(first, second);
    assert_eq!(mapper.objects().len(), 2);

    let employee = mapper
        .object_id(Employee::describe().key().unwrap())
        .unwrap();
    let fields = &mapper.object_def(employee).fields;
    assert_eq!(fields["department"].ty.to_string(), "Department");
    assert_eq!(fields["manager"].ty.to_string(), "Employee");
}

// =============================================================================
// Built schema
// =============================================================================

#[test]
fn nullability_follows_host_types() {
    let built = build_test_schema(BuilderConfig::default());

    assert_eq!(built.field_type("Query", "ticket"), Some("[Ticket]!"));
    assert_eq!(built.field_type("Query", "failing"), Some("String"));
    assert_eq!(built.field_type("Ticket", "id"), Some("ID!"));
    assert_eq!(built.field_type("Ticket", "number"), Some("Int!"));
    assert_eq!(built.field_type("Ticket", "time"), Some("DateTime!"));
    assert_eq!(built.field_type("Ticket", "categories"), Some("[Category]!"));
    assert_eq!(built.field_type("Ticket", "tags"), Some("[Tag]!"));
    assert_eq!(built.field_type("Mutation", "ticket_insert"), Some("Ticket"));
    assert_eq!(built.field_type("Subscription", "test_sub"), Some("Ticket!"));

    let ticket = built.object("Query").unwrap().get("ticket").unwrap();
    assert_eq!(
        ticket.args,
        vec![
            ("filter".to_string(), "TicketFilterInput".to_string()),
            ("order".to_string(), "TicketOrderInput".to_string()),
            ("limit".to_string(), "Int".to_string()),
            ("offset".to_string(), "Int".to_string()),
        ]
    );

    let order = built.input("TicketOrderInput").unwrap();
    assert_eq!(order["title"], "String");
    assert_eq!(order["number"], "String!");
    assert!(built.input("StringFilterInput").is_some());

    let sdl = built.sdl();
    assert!(sdl.contains("type Ticket"));
    assert!(sdl.contains("input TicketFilterInput"));
    assert!(sdl.contains("scalar DateTime"));
}

#[test]
fn custom_scalar_replaces_struct() {
    let mut builder = SchemaBuilder::default();
    builder
        .register_scalar("Money", ScalarDef::decimal())
        .unwrap();
    builder
        .query()
        .field_resolver("invoice", |_ctx: RequestContext| async {
            Ok::<_, anyhow::Error>(Invoice::default())
        })
        .unwrap();

    let built = builder.build().unwrap();
    assert_eq!(built.field_type("Invoice", "total"), Some("Decimal!"));
    assert_eq!(built.field_type("Invoice", "paid"), Some("Decimal"));
    assert!(built.object("Money").is_none());
}

// =============================================================================
// Errors
// =============================================================================

#[test]
fn duplicate_registrations_are_rejected() {
    let mut builder = SchemaBuilder::default();
    builder.object::<Ticket>("Ticket").unwrap();
    assert_eq!(
        builder.object::<Tag>("Ticket").unwrap_err(),
        RegistrationError::DuplicateObject("Ticket".into())
    );

    builder
        .query()
        .field_resolver("ping", |_ctx: RequestContext| async { Ok::<_, anyhow::Error>(true) })
        .unwrap();
    let err = builder
        .query()
        .field_resolver("ping", |_ctx: RequestContext| async { Ok::<_, anyhow::Error>(1_i32) })
        .unwrap_err();
    assert_eq!(err.error_code(), "DUPLICATE_FIELD");

    builder
        .register_scalar("Money", ScalarDef::decimal())
        .unwrap();
    let err = builder
        .register_scalar("Money", ScalarDef::int64())
        .unwrap_err();
    assert_eq!(err, RegistrationError::DuplicateScalar("Money".into()));
}

#[test]
fn unknown_scalar_fails_the_build() {
    let mut builder = SchemaBuilder::default();
    builder
        .query()
        .field_resolver("gauge", |_ctx: RequestContext| async {
            Ok::<_, anyhow::Error>(Gauge::default())
        })
        .unwrap();
    assert_eq!(
        builder.build().unwrap_err(),
        BuildError::UnknownScalar("u128".into())
    );
}

#[test]
fn receiver_on_root_fails_the_build() {
    let mut builder = SchemaBuilder::default();
    builder
        .query()
        .field_resolver("title", |_ctx: RequestContext, Parent(t): Parent<Ticket>| async move {
            Ok::<_, anyhow::Error>(t.title)
        })
        .unwrap();
    assert_eq!(
        builder.build().unwrap_err(),
        BuildError::ReceiverOnRoot {
            object: "Query".into(),
            field: "title".into(),
        }
    );
}

#[test]
fn receiver_must_match_the_object_prototype() {
    let mut builder = SchemaBuilder::default();
    builder
        .query()
        .field_resolver("ping", |_ctx: RequestContext| async { Ok::<_, anyhow::Error>(true) })
        .unwrap();
    builder
        .object::<Ticket>("Ticket")
        .unwrap()
        .field_resolver("label", |_ctx: RequestContext, Parent(t): Parent<Tag>| async move {
            Ok::<_, anyhow::Error>(t.title)
        })
        .unwrap();
    assert_eq!(builder.build().unwrap_err().error_code(), "RECEIVER_MISMATCH");
}

#[test]
fn empty_query_root_fails_the_build() {
    let mut builder = SchemaBuilder::default();
    builder
        .mutation()
        .field_resolver("ping", |_ctx: RequestContext| async { Ok::<_, anyhow::Error>(true) })
        .unwrap();
    assert_eq!(builder.build().unwrap_err(), BuildError::MissingQueryRoot);
}

#[test]
fn config_from_toml() {
    let config = BuilderConfig::from_toml_str("max_depth = 4\nintrospection = false\n").unwrap();
    assert_eq!(config.max_depth, 4);
    assert!(!config.introspection);
    assert_eq!(config.max_complexity, 500);

    let built = build_test_schema(config);
    assert!(built.object("Ticket").is_some());
}

//! Schema builder.
//!
//! [`SchemaBuilder`] accumulates scalar, object and field registrations and
//! turns them into an executable schema in one pass. The builder uses
//! async-graphql's dynamic schema API to construct the schema at runtime.
//!
//! Build order:
//!
//! 1. discover every struct reachable from bound methods and prototypes
//! 2. declare object and input shells, then populate their fields
//! 3. compute field types and argument prototypes for bound methods
//! 4. bind handlers against the finished argument prototypes
//! 5. register everything with the engine and apply limits
//!
//! # Example
//!
//! ```ignore
//! let mut builder = SchemaBuilder::new(BuilderConfig::default());
//! builder
//!     .query()
//!     .field_resolver("ticket", |_ctx: RequestContext, Args(args): Args<TicketArgs>| async move {
//!         store.ticket(args.id).await
//!     })?;
//! builder
//!     .object::<Ticket>("Ticket")?
//!     .field_resolver("tags", |_ctx: RequestContext, Parent(ticket): Parent<Ticket>| async move {
//!         store.tags(ticket.id).await
//!     })?;
//!
//! let built = builder.build()?;
//! let response = built.schema().execute("{ ticket(id: 1) { title tags } }").await;
//! ```

use std::collections::HashMap;
use std::fmt;
use std::sync::Arc;

use async_graphql::dynamic::{InputValue, Schema, Subscription, TypeRef};
use indexmap::IndexMap;
use indexmap::map::Entry;
use tracing::{debug, info};

use crate::config::BuilderConfig;
use crate::error::{BuildError, RegistrationError};
use crate::reflect::ArgumentReflector;
use crate::resolvers::binder::FieldBinder;
use crate::resolvers::handler::Signature;
use crate::schema::args_map::{ArgsMap, FieldPrototype};
use crate::schema::discovery::{Discovery, ObjectGraphDiscoverer};
use crate::schema::mapper::{
    FieldSource, ObjectId, OutputFieldDef, TypeMapper, object_with_fields,
};
use crate::schema::registration::{
    MUTATION, MethodBinding, ObjectKind, ObjectRegistration, QUERY, SUBSCRIPTION,
    SubscriptionRegistration,
};
use crate::subscriptions::dispatcher::{SubscriptionDispatcher, subscription_field};
use crate::subscriptions::SubscriberRegistry;
use crate::types::{Describe, ScalarDef, ScalarTable, TypeDescriptor, TypeKey};

/// Accumulates registrations and builds the schema.
#[derive(Debug)]
pub struct SchemaBuilder {
    config: BuilderConfig,
    scalars: ScalarTable,
    query: ObjectRegistration,
    mutation: ObjectRegistration,
    subscription: SubscriptionRegistration,
    objects: IndexMap<String, ObjectRegistration>,
    prototypes: HashMap<TypeKey, String>,
}

impl Default for SchemaBuilder {
    fn default() -> Self {
        Self::new(BuilderConfig::default())
    }
}

impl SchemaBuilder {
    /// Creates a builder with the default scalar table.
    #[must_use]
    pub fn new(config: BuilderConfig) -> Self {
        Self {
            config,
            scalars: ScalarTable::new(),
            query: ObjectRegistration::new(QUERY, ObjectKind::Query),
            mutation: ObjectRegistration::new(MUTATION, ObjectKind::Mutation),
            subscription: SubscriptionRegistration::default(),
            objects: IndexMap::new(),
            prototypes: HashMap::new(),
        }
    }

    /// Builder configuration.
    #[must_use]
    pub fn config(&self) -> &BuilderConfig {
        &self.config
    }

    /// Maps a host type name to a scalar, replacing any default for it.
    ///
    /// Structs whose name is registered here are emitted as the scalar.
    ///
    /// # Errors
    ///
    /// Returns [`RegistrationError::DuplicateScalar`] if `host` was already
    /// registered.
    pub fn register_scalar(
        &mut self,
        host: impl Into<String>,
        def: ScalarDef,
    ) -> Result<&mut Self, RegistrationError> {
        self.scalars.register(host, def)?;
        Ok(self)
    }

    /// The query root.
    pub fn query(&mut self) -> &mut ObjectRegistration {
        &mut self.query
    }

    /// The mutation root.
    pub fn mutation(&mut self) -> &mut ObjectRegistration {
        &mut self.mutation
    }

    /// The subscription root.
    pub fn subscription(&mut self) -> &mut SubscriptionRegistration {
        &mut self.subscription
    }

    /// Registers a custom object backed by the struct `T`.
    ///
    /// The object exposes every field of `T` and any field bound on the
    /// returned registration. A bound field replaces a struct field of the
    /// same name.
    ///
    /// # Errors
    ///
    /// Returns an error if the name is taken, `T` is not a struct, or `T`
    /// already backs another object.
    pub fn object<T: Describe>(
        &mut self,
        name: impl Into<String>,
    ) -> Result<&mut ObjectRegistration, RegistrationError> {
        let name = name.into();
        if [QUERY, MUTATION, SUBSCRIPTION].contains(&name.as_str()) {
            return Err(RegistrationError::DuplicateObject(name));
        }
        let descriptor = T::describe();
        let Some(prototype) = descriptor.as_struct().copied() else {
            return Err(RegistrationError::NotAStruct {
                object: name,
                found: descriptor.to_string(),
            });
        };
        if let Some(existing) = self.prototypes.get(&prototype.key()) {
            return Err(RegistrationError::DuplicatePrototype {
                prototype: prototype.path().to_string(),
                object: existing.clone(),
            });
        }

        match self.objects.entry(name) {
            Entry::Occupied(entry) => Err(RegistrationError::DuplicateObject(entry.key().clone())),
            Entry::Vacant(entry) => {
                self.prototypes.insert(prototype.key(), entry.key().clone());
                debug!(object = %entry.key(), prototype = prototype.path(), "Registered object");
                let registration =
                    ObjectRegistration::new(entry.key().clone(), ObjectKind::Custom(prototype));
                Ok(entry.insert(registration))
            }
        }
    }

    fn registrations(&self) -> impl Iterator<Item = &ObjectRegistration> {
        [&self.query, &self.mutation]
            .into_iter()
            .chain(self.objects.values())
    }

    /// Collects the struct types the schema will contain.
    #[must_use]
    pub fn discover(&self) -> Discovery {
        let mut discoverer = ObjectGraphDiscoverer::new(&self.scalars);
        for registration in self.registrations() {
            if let Some(prototype) = registration.prototype() {
                discoverer.add_prototype(prototype);
            }
            for method in registration.methods() {
                discoverer.add_signature(method.signature());
            }
        }
        for method in self.subscription.methods() {
            discoverer.add_signature(method.signature());
        }
        discoverer.finish()
    }

    /// Builds the schema.
    ///
    /// # Errors
    ///
    /// Returns a [`BuildError`] if the configuration is invalid, the query
    /// root is empty, a handler signature is misused, a type cannot be
    /// mapped or the engine rejects the result.
    pub fn build(self) -> Result<BuiltSchema, BuildError> {
        debug!("Starting schema build");
        self.config.validate()?;
        if self.query.is_empty() {
            return Err(BuildError::MissingQueryRoot);
        }

        for registration in self.registrations() {
            for method in registration.methods() {
                FieldBinder::validate(registration, method.name(), method.signature())?;
            }
        }
        for method in self.subscription.methods() {
            FieldBinder::validate_args(SUBSCRIPTION, method.name(), method.signature())?;
        }

        let discovery = self.discover();
        let SchemaBuilder {
            config,
            scalars,
            query,
            mutation,
            subscription,
            objects,
            prototypes,
        } = self;
        let scalars = Arc::new(scalars);

        let mut mapper = TypeMapper::new(Arc::clone(&scalars));
        for root in [QUERY, MUTATION, SUBSCRIPTION] {
            mapper.claim(root, "root object")?;
        }
        for (key, name) in prototypes {
            mapper.set_object_name(key, name);
        }

        let output_ids = discovery
            .outputs
            .values()
            .map(|s| mapper.declare_output(s))
            .collect::<Result<Vec<_>, _>>()?;
        let input_ids = discovery
            .inputs
            .values()
            .map(|s| mapper.declare_input(s))
            .collect::<Result<Vec<_>, _>>()?;
        for id in output_ids {
            mapper.populate_output(id)?;
        }
        for id in input_ids {
            mapper.populate_input(id)?;
        }

        // Property fields first, so nested selections under them still
        // find the object they return.
        let mut args_map = ArgsMap::new();
        for def in mapper.objects() {
            for field in def.fields.values() {
                args_map.insert(
                    def.name.as_str(),
                    field.name.as_str(),
                    FieldPrototype {
                        args: None,
                        output_object: field.output_object.clone(),
                    },
                );
            }
        }

        let mut planned = Vec::new();
        for registration in [&query, &mutation].into_iter().chain(objects.values()) {
            let target = match registration.kind() {
                ObjectKind::Query => Target::Query,
                ObjectKind::Mutation => Target::Mutation,
                ObjectKind::Custom(prototype) => {
                    let id = mapper.object_id(prototype.key()).ok_or_else(|| {
                        BuildError::UnsupportedType {
                            ty: prototype.path().to_string(),
                            position: "an object prototype",
                        }
                    })?;
                    Target::Object(id)
                }
            };
            for method in registration.methods() {
                let shape = FieldShape::plan(&mut mapper, method.signature())?;
                args_map.insert(registration.name(), method.name(), shape.prototype(method.signature()));
                planned.push(PlannedField {
                    object: registration.name().to_string(),
                    target,
                    shape,
                    binding: method.clone(),
                });
            }
        }

        let mut subscription_plans = Vec::new();
        for method in subscription.methods() {
            let shape = FieldShape::plan(&mut mapper, method.signature())?;
            args_map.insert(SUBSCRIPTION, method.name(), shape.prototype(method.signature()));
            subscription_plans.push((method.clone(), shape));
        }

        let args_map = Arc::new(args_map);
        let binder = FieldBinder::new(ArgumentReflector::new(Arc::clone(&scalars)), Arc::clone(&args_map));

        let mut query_fields = Vec::new();
        let mut mutation_fields = Vec::new();
        for plan in planned {
            let binding = &plan.binding;
            let method = binder.bind(&plan.object, binding.name(), binding.signature(), binding.handler());
            let field = OutputFieldDef {
                name: binding.name().to_string(),
                ty: plan.shape.ty,
                args: plan.shape.args,
                output_object: plan.shape.output_object,
                source: FieldSource::Method(method),
            };
            match plan.target {
                Target::Query => query_fields.push(field),
                Target::Mutation => mutation_fields.push(field),
                Target::Object(id) => {
                    mapper
                        .object_def_mut(id)
                        .fields
                        .insert(field.name.clone(), field);
                }
            }
        }

        let mut schema_builder = Schema::build(
            QUERY,
            (!mutation_fields.is_empty()).then_some(MUTATION),
            (!subscription_plans.is_empty()).then_some(SUBSCRIPTION),
        );

        for scalar in scalars.dynamic_scalars() {
            schema_builder = schema_builder.register(scalar);
        }
        for def in mapper.objects() {
            schema_builder = schema_builder.register(def.to_dynamic());
        }
        for def in mapper.inputs() {
            schema_builder = schema_builder.register(def.to_dynamic());
        }

        schema_builder = schema_builder.register(object_with_fields(QUERY, query_fields.iter()));
        if !mutation_fields.is_empty() {
            schema_builder =
                schema_builder.register(object_with_fields(MUTATION, mutation_fields.iter()));
        }

        let mut subscription_summary = IndexMap::new();
        if !subscription_plans.is_empty() {
            let mut root = Subscription::new(SUBSCRIPTION);
            for (binding, shape) in subscription_plans {
                subscription_summary.insert(binding.name().to_string(), shape.summary(true));
                let dispatcher = SubscriptionDispatcher::new(
                    binding.name(),
                    binding.signature().clone(),
                    binding.start(),
                    binder.reflector().clone(),
                    Arc::clone(binder.args_map()),
                    config.subscription_buffer,
                );
                let mut field = subscription_field(binding.name(), shape.ty, Arc::new(dispatcher));
                for (name, ty) in shape.args {
                    field = field.argument(InputValue::new(name, ty));
                }
                root = root.field(field);
            }
            schema_builder = schema_builder.register(root);
        }

        schema_builder = schema_builder
            .limit_depth(config.max_depth)
            .limit_complexity(config.max_complexity);
        if !config.introspection {
            schema_builder = schema_builder.disable_introspection();
        }

        let schema = schema_builder
            .finish()
            .map_err(|e| BuildError::Schema(e.to_string()))?;

        let mut summary = IndexMap::new();
        summary.insert(QUERY.to_string(), summarize(query_fields.iter()));
        if !mutation_fields.is_empty() {
            summary.insert(MUTATION.to_string(), summarize(mutation_fields.iter()));
        }
        if !subscription_summary.is_empty() {
            summary.insert(SUBSCRIPTION.to_string(), subscription_summary);
        }
        for def in mapper.objects() {
            summary.insert(def.name.clone(), summarize(def.fields.values()));
        }
        let inputs = mapper
            .inputs()
            .iter()
            .map(|def| {
                let fields = def
                    .fields
                    .iter()
                    .map(|(name, ty)| (name.clone(), ty.to_string()))
                    .collect();
                (def.name.clone(), fields)
            })
            .collect::<IndexMap<_, _>>();

        info!(
            objects = mapper.objects().len(),
            inputs = inputs.len(),
            fields = args_map.len(),
            "Schema build complete"
        );

        Ok(BuiltSchema {
            schema,
            objects: summary,
            inputs,
            args_map,
        })
    }
}

#[derive(Debug, Clone, Copy)]
enum Target {
    Query,
    Mutation,
    Object(ObjectId),
}

/// Schema-facing shape of a bound method.
struct FieldShape {
    ty: TypeRef,
    args: Vec<(String, TypeRef)>,
    output_object: Option<String>,
}

impl FieldShape {
    fn plan(mapper: &mut TypeMapper, signature: &Signature) -> Result<Self, BuildError> {
        let ty = mapper.output_type(&signature.output, true)?;
        let output_object = mapper.output_object_name(&signature.output);
        let mut args = Vec::new();
        if let Some(target) = signature.args.as_ref().and_then(TypeDescriptor::as_struct) {
            for field in target.fields() {
                args.push((field.schema_name(), mapper.input_type(field.ty(), true)?));
            }
        }
        Ok(Self {
            ty,
            args,
            output_object,
        })
    }

    fn prototype(&self, signature: &Signature) -> FieldPrototype {
        FieldPrototype {
            args: signature.args.clone(),
            output_object: self.output_object.clone(),
        }
    }

    fn summary(&self, bound: bool) -> FieldSummary {
        FieldSummary {
            ty: self.ty.to_string(),
            args: self
                .args
                .iter()
                .map(|(name, ty)| (name.clone(), ty.to_string()))
                .collect(),
            bound,
        }
    }
}

struct PlannedField {
    object: String,
    target: Target,
    shape: FieldShape,
    binding: MethodBinding,
}

fn summarize<'a>(fields: impl Iterator<Item = &'a OutputFieldDef>) -> IndexMap<String, FieldSummary> {
    fields
        .map(|field| {
            let summary = FieldSummary {
                ty: field.ty.to_string(),
                args: field
                    .args
                    .iter()
                    .map(|(name, ty)| (name.clone(), ty.to_string()))
                    .collect(),
                bound: field.is_bound(),
            };
            (field.name.clone(), summary)
        })
        .collect()
}

/// Summary of one field of a built schema.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FieldSummary {
    /// Field type in SDL notation, e.g. `[Ticket!]!`.
    pub ty: String,
    /// Arguments in declaration order, with their SDL types.
    pub args: Vec<(String, String)>,
    /// Whether the field is computed by a handler.
    pub bound: bool,
}

/// A finished schema and a summary of its definitions.
#[derive(Clone)]
pub struct BuiltSchema {
    schema: Schema,
    objects: IndexMap<String, IndexMap<String, FieldSummary>>,
    inputs: IndexMap<String, IndexMap<String, String>>,
    args_map: Arc<ArgsMap>,
}

impl BuiltSchema {
    /// The executable schema.
    #[must_use]
    pub fn schema(&self) -> &Schema {
        &self.schema
    }

    /// Consumes the summary and returns the executable schema.
    #[must_use]
    pub fn into_schema(self) -> Schema {
        self.schema
    }

    /// Schema definition language rendering.
    #[must_use]
    pub fn sdl(&self) -> String {
        self.schema.sdl()
    }

    /// Fields of an object type, including the roots.
    #[must_use]
    pub fn object(&self, name: &str) -> Option<&IndexMap<String, FieldSummary>> {
        self.objects.get(name)
    }

    /// Fields of an input type, with their SDL types.
    #[must_use]
    pub fn input(&self, name: &str) -> Option<&IndexMap<String, String>> {
        self.inputs.get(name)
    }

    /// SDL type of `object.field`.
    #[must_use]
    pub fn field_type(&self, object: &str, field: &str) -> Option<&str> {
        self.object(object)
            .and_then(|fields| fields.get(field))
            .map(|summary| summary.ty.as_str())
    }

    /// Argument prototypes of bound fields.
    #[must_use]
    pub fn args_map(&self) -> &ArgsMap {
        &self.args_map
    }

    /// Creates a subscriber registry over this schema.
    #[must_use]
    pub fn subscriber_registry(&self) -> SubscriberRegistry {
        SubscriberRegistry::new(self.schema.clone())
    }
}

impl fmt::Debug for BuiltSchema {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("BuiltSchema")
            .field("objects", &self.objects.keys().collect::<Vec<_>>())
            .field("inputs", &self.inputs.keys().collect::<Vec<_>>())
            .finish_non_exhaustive()
    }
}

#[cfg(test)]
mod tests {
    use serde::{Deserialize, Serialize};

    use super::*;
    use crate::context::RequestContext;
    use crate::resolvers::handler::{Args, Parent};

    crate::schema_struct! {
        #[derive(Debug, Clone, Default, Serialize, Deserialize)]
        struct Note {
            id: i32,
            body: String,
        }
    }

    crate::schema_struct! {
        #[derive(Debug, Clone, Default, Serialize, Deserialize)]
        struct NoteArgs {
            id: i32,
        }
    }

    fn builder() -> SchemaBuilder {
        let mut builder = SchemaBuilder::default();
        builder
            .query()
            .field_resolver("note", |_ctx: RequestContext, Args(args): Args<NoteArgs>| async move {
                Ok::<_, anyhow::Error>(Note {
                    id: args.id,
                    body: "hello".into(),
                })
            })
            .unwrap();
        builder
    }

    #[test]
    fn test_build_minimal_schema() {
        let built = builder().build().unwrap();
        assert_eq!(built.field_type("Query", "note"), Some("Note!"));
        assert_eq!(built.field_type("Note", "body"), Some("String!"));
        assert!(built.object("Mutation").is_none());

        let note = built.object("Query").unwrap().get("note").unwrap();
        assert_eq!(note.args, vec![("id".to_string(), "Int!".to_string())]);
        assert!(built.sdl().contains("type Note"));
    }

    #[test]
    fn test_object_registration_errors() {
        let mut builder = builder();
        builder.object::<Note>("Note").unwrap();

        assert_eq!(
            builder.object::<NoteArgs>("Note").unwrap_err(),
            RegistrationError::DuplicateObject("Note".into())
        );
        assert_eq!(
            builder.object::<NoteArgs>("Query").unwrap_err(),
            RegistrationError::DuplicateObject("Query".into())
        );
        assert_eq!(
            builder.object::<Note>("Memo").unwrap_err().error_code(),
            "DUPLICATE_PROTOTYPE"
        );
        assert_eq!(
            builder.object::<i32>("Number").unwrap_err().error_code(),
            "NOT_A_STRUCT"
        );
    }

    #[test]
    fn test_bound_field_replaces_struct_field() {
        let mut builder = builder();
        builder
            .object::<Note>("Note")
            .unwrap()
            .field_resolver("body", |_ctx: RequestContext, Parent(note): Parent<Note>| async move {
                Ok::<_, anyhow::Error>(Some(note.body.to_uppercase()))
            })
            .unwrap();

        let built = builder.build().unwrap();
        let fields = built.object("Note").unwrap();
        assert_eq!(fields.keys().collect::<Vec<_>>(), vec!["id", "body"]);
        assert_eq!(fields["body"].ty, "String");
        assert!(fields["body"].bound);
        assert!(!fields["id"].bound);
    }

    #[test]
    fn test_empty_query_is_rejected() {
        let err = SchemaBuilder::default().build().unwrap_err();
        assert_eq!(err, BuildError::MissingQueryRoot);
    }

    #[test]
    fn test_invalid_config_is_rejected() {
        let mut builder = SchemaBuilder::new(BuilderConfig {
            max_depth: 0,
            ..Default::default()
        });
        builder
            .query()
            .field_resolver("ping", |_ctx: RequestContext| async {
                Ok::<_, anyhow::Error>(true)
            })
            .unwrap();
        assert_eq!(builder.build().unwrap_err().error_code(), "INVALID_CONFIG");
    }
}

//! Integration tests for query and mutation execution.
//!
//! These tests verify the complete flow from a GraphQL document through
//! argument reflection and handler invocation and back.

mod common;

use async_graphql::{Request, Value};
use common::{SelectionRecorder, StringFilter, TagArgs, TicketArgs, build_test_schema};
use reflectql::{BuilderConfig, RequestContext};
use serde_json::json;

async fn execute(query: &str, context: Option<RequestContext>) -> async_graphql::Response {
    let built = build_test_schema(BuilderConfig::default());
    let mut request = Request::new(query);
    if let Some(context) = context {
        request = request.data(context);
    }
    built.schema().execute(request).await
}

#[tokio::test]
async fn test_simple_query() {
    common::init_tracing();
    let response = execute(
        r#"{ ticket(limit: 2, offset: 10, filter: { title: { eq: "ddd" } }) { id title number } }"#,
        None,
    )
    .await;

    assert!(response.errors.is_empty(), "errors: {:?}", response.errors);
    assert_eq!(
        response.data.into_json().unwrap(),
        json!({
            "ticket": [
                { "id": "1", "title": "Ticket1", "number": 1 },
                { "id": "2", "title": "Ticket2", "number": 2 },
            ]
        })
    );
}

#[tokio::test]
async fn test_scalar_fields_serialize() {
    let response = execute(r#"{ ticket(limit: 1) { time decimal categories { id } } }"#, None).await;

    assert!(response.errors.is_empty(), "errors: {:?}", response.errors);
    assert_eq!(
        response.data.into_json().unwrap(),
        json!({
            "ticket": [
                { "time": "1970-01-01T00:00:00Z", "decimal": "0", "categories": [] },
            ]
        })
    );
}

#[tokio::test]
async fn test_relation_with_receiver() {
    let response = execute(
        r#"{ ticket(limit: 1) { title tags(limit: 2, offset: 1) { id title } } }"#,
        None,
    )
    .await;

    assert!(response.errors.is_empty(), "errors: {:?}", response.errors);
    assert_eq!(
        response.data.into_json().unwrap(),
        json!({
            "ticket": [{
                "title": "Ticket1",
                "tags": [
                    { "id": "2", "title": "Tag2" },
                    { "id": "3", "title": "Tag3" },
                ]
            }]
        })
    );
}

#[tokio::test]
async fn test_nested_arguments_reach_root_handler() {
    let recorder = SelectionRecorder::default();
    let context = RequestContext::builder().with_data(recorder.clone()).build();

    let response = execute(
        r#"{
            open: ticket(limit: 15, offset: 17, filter: { title: { eq: "ddd" } }) {
                title
                tags(limit: 5, offset: 6) { title }
            }
        }"#,
        Some(context),
    )
    .await;
    assert!(response.errors.is_empty(), "errors: {:?}", response.errors);

    let selection = recorder.last().expect("root handler saw a selection");
    assert_eq!(selection.name, "ticket");
    assert_eq!(selection.response_key(), "open");

    let args: TicketArgs = selection.args().unwrap().unwrap();
    assert_eq!(args.limit, Some(15));
    assert_eq!(args.offset, Some(17));
    assert_eq!(
        args.filter.unwrap().title,
        Some(StringFilter {
            eq: Some("ddd".into()),
            ..Default::default()
        })
    );

    let tags = selection.field("tags").unwrap();
    let tag_args: TagArgs = tags.args().unwrap().unwrap();
    assert_eq!(
        tag_args,
        TagArgs {
            limit: Some(5),
            offset: Some(6),
        }
    );
    assert_eq!(tags.selection_set.len(), 1);
    assert!(selection.field("title").unwrap().args.is_none());
}

#[tokio::test]
async fn test_handler_error_is_isolated_to_its_field() {
    let response = execute(r#"{ ticket(limit: 1) { title } failing }"#, None).await;

    assert_eq!(response.errors.len(), 1);
    let error = &response.errors[0];
    assert_eq!(error.message, "ticket store offline");
    let code = error
        .extensions
        .as_ref()
        .and_then(|ext| ext.get("code"))
        .cloned();
    assert_eq!(code, Some(Value::String("HANDLER_ERROR".into())));

    let data = response.data.into_json().unwrap();
    assert_eq!(data["ticket"], json!([{ "title": "Ticket1" }]));
    assert!(data.get("failing").is_none_or(serde_json::Value::is_null));
}

#[tokio::test]
async fn test_int64_string_argument_covers_u64() {
    for query in [
        r#"{ counter(big: "18446744073709551615") }"#,
        r#"{ counter(big: 18446744073709551615) }"#,
    ] {
        let response = execute(query, None).await;
        assert!(response.errors.is_empty(), "errors: {:?}", response.errors);
        assert_eq!(
            response.data.into_json().unwrap(),
            json!({ "counter": u64::MAX })
        );
    }

    let response = execute(r#"{ counter(big: "18446744073709551616") }"#, None).await;
    assert!(!response.errors.is_empty());
}

#[tokio::test]
async fn test_invalid_argument_is_rejected() {
    let response = execute(r#"{ ticket(filter: { title: "ddd" }) { title } }"#, None).await;

    assert!(!response.errors.is_empty());
}

#[tokio::test]
async fn test_request_context_reaches_handler() {
    let context = RequestContext::builder().with_request_id("req-42").build();
    let response = execute(r#"{ request_id }"#, Some(context)).await;
    assert_eq!(
        response.data.into_json().unwrap(),
        json!({ "request_id": "req-42" })
    );

    let response = execute(r#"{ request_id }"#, None).await;
    assert_eq!(
        response.data.into_json().unwrap(),
        json!({ "request_id": null })
    );
}

#[tokio::test]
async fn test_mutation() {
    let response = execute(
        r#"mutation { ticket_insert(input: { title: "new", number: 3 }) { id title number tags { title } } }"#,
        None,
    )
    .await;

    assert!(response.errors.is_empty(), "errors: {:?}", response.errors);
    assert_eq!(
        response.data.into_json().unwrap(),
        json!({
            "ticket_insert": {
                "id": "100",
                "title": "new",
                "number": 3,
                "tags": [{ "title": "Tag1" }, { "title": "Tag2" }, { "title": "Tag3" }],
            }
        })
    );
}

#[tokio::test]
async fn test_depth_limit_is_applied() {
    let built = build_test_schema(BuilderConfig {
        max_depth: 2,
        ..Default::default()
    });
    let response = built
        .schema()
        .execute(r#"{ ticket { tags { title } } }"#)
        .await;
    assert!(!response.errors.is_empty());
}

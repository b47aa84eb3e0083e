//! Shared models and schema for integration tests.

#![allow(dead_code)]

use std::sync::{Arc, Mutex};

use reflectql::{
    Args, BuilderConfig, BuiltSchema, DateTime, Decimal, Id, Parent, RequestContext, SchemaBuilder,
    Selection, SendError, SubscriptionSink,
};
use serde::{Deserialize, Serialize};
use tokio::sync::Notify;

// =============================================================================
// Models
// =============================================================================

reflectql::schema_struct! {
    #[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
    pub struct Tag {
        pub id: Id,
        pub title: String,
    }
}

reflectql::schema_struct! {
    #[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
    pub struct Category {
        pub id: Id,
        pub title: String,
    }
}

reflectql::schema_struct! {
    #[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
    pub struct Ticket {
        pub id: Id,
        pub title: String,
        pub number: i32,
        pub time: DateTime,
        pub decimal: Decimal,
        pub categories: Vec<Option<Category>>,
        pub tags: Vec<Option<Tag>>,
    }
}

reflectql::schema_struct! {
    #[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
    pub struct StringFilter {
        pub neq: Option<String>,
        pub eq: Option<String>,
        pub like: Option<String>,
    }
}

reflectql::schema_struct! {
    #[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
    pub struct NumberFilter {
        pub neq: Option<i32>,
        pub eq: Option<i32>,
        pub lt: Option<i32>,
        pub gt: Option<i32>,
    }
}

reflectql::schema_struct! {
    #[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
    pub struct TicketFilterInput {
        pub title: Option<StringFilter>,
        pub number: Option<NumberFilter>,
    }
}

reflectql::schema_struct! {
    #[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
    pub struct TicketOrderInput {
        pub title: Option<String>,
        pub number: String,
    }
}

reflectql::schema_struct! {
    #[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
    pub struct TicketInsertInput {
        pub title: String,
        pub number: Option<i32>,
    }
}

reflectql::schema_struct! {
    #[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
    pub struct TicketArgs {
        pub filter: Option<TicketFilterInput>,
        pub order: Option<TicketOrderInput>,
        pub limit: Option<i32>,
        pub offset: Option<i32>,
    }
}

reflectql::schema_struct! {
    #[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
    pub struct TagArgs {
        pub limit: Option<i32>,
        pub offset: Option<i32>,
    }
}

reflectql::schema_struct! {
    #[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
    pub struct InsertArgs {
        pub input: Option<TicketInsertInput>,
    }
}

reflectql::schema_struct! {
    #[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
    pub struct CounterArgs {
        pub big: Option<u64>,
    }
}

// =============================================================================
// Recorders
// =============================================================================

/// Collects the selection trees seen by root handlers.
#[derive(Clone, Default)]
pub struct SelectionRecorder(pub Arc<Mutex<Vec<Selection>>>);

impl SelectionRecorder {
    pub fn last(&self) -> Option<Selection> {
        self.0.lock().unwrap().last().cloned()
    }
}

/// Signalled when an endless producer returns, with the send error that
/// stopped it.
#[derive(Clone, Default)]
pub struct ProducerStopped {
    pub done: Arc<Notify>,
    pub reason: Arc<Mutex<Option<SendError>>>,
}

impl ProducerStopped {
    pub fn reason(&self) -> Option<SendError> {
        self.reason.lock().unwrap().clone()
    }
}

// =============================================================================
// Fixtures
// =============================================================================

pub fn init_tracing() {
    let _ = tracing_subscriber::fmt()
        .with_env_filter("reflectql=debug")
        .with_test_writer()
        .try_init();
}

pub fn sample_tags() -> Vec<Option<Tag>> {
    (1..=3)
        .map(|i| {
            Some(Tag {
                id: Id(i.to_string()),
                title: format!("Tag{i}"),
            })
        })
        .collect()
}

pub fn sample_ticket(i: i32) -> Ticket {
    Ticket {
        id: Id(i.to_string()),
        title: format!("Ticket{i}"),
        number: i,
        tags: sample_tags(),
        ..Default::default()
    }
}

/// Builds the schema used across the integration tests.
pub fn build_test_schema(config: BuilderConfig) -> BuiltSchema {
    let mut builder = SchemaBuilder::new(config);

    builder
        .object::<Ticket>("Ticket")
        .unwrap()
        .field_resolver(
            "tags",
            |_ctx: RequestContext, Parent(ticket): Parent<Ticket>, Args(args): Args<TagArgs>| async move {
                let offset = args.offset.unwrap_or(0).max(0) as usize;
                let limit = args.limit.map_or(usize::MAX, |l| l.max(0) as usize);
                Ok::<_, anyhow::Error>(
                    ticket
                        .tags
                        .into_iter()
                        .skip(offset)
                        .take(limit)
                        .collect::<Vec<_>>(),
                )
            },
        )
        .unwrap();

    builder
        .query()
        .field_resolver(
            "ticket",
            |ctx: RequestContext, Args(args): Args<TicketArgs>| async move {
                if let (Some(recorder), Some(selection)) = (ctx.data::<SelectionRecorder>(), ctx.selection()) {
                    recorder.0.lock().unwrap().push(selection.clone());
                }
                let count = args.limit.unwrap_or(3).clamp(0, 3);
                Ok::<_, anyhow::Error>((1..=count).map(|i| Some(sample_ticket(i))).collect::<Vec<_>>())
            },
        )
        .unwrap()
        .field_resolver("failing", |_ctx: RequestContext| async {
            Err::<Option<String>, _>(anyhow::anyhow!("ticket store offline"))
        })
        .unwrap()
        .field_resolver("request_id", |ctx: RequestContext| async move {
            Ok::<_, anyhow::Error>(ctx.request_id().map(str::to_string))
        })
        .unwrap()
        .field_resolver("counter", |_ctx: RequestContext, Args(args): Args<CounterArgs>| async move {
            Ok::<_, anyhow::Error>(args.big)
        })
        .unwrap();

    builder
        .mutation()
        .field_resolver(
            "ticket_insert",
            |_ctx: RequestContext, Args(args): Args<InsertArgs>| async move {
                let input = args.input.unwrap_or_default();
                Ok::<_, anyhow::Error>(Some(Ticket {
                    id: Id("100".into()),
                    title: input.title,
                    number: input.number.unwrap_or_default(),
                    tags: sample_tags(),
                    ..Default::default()
                }))
            },
        )
        .unwrap();

    builder
        .subscription()
        .field_subscription(
            "test_sub",
            |_ctx: RequestContext, sink: SubscriptionSink<Ticket>, Args(args): Args<TicketArgs>| async move {
                for i in 1..=args.limit.unwrap_or(10) {
                    if sink.send(sample_ticket(i)).await.is_err() {
                        return;
                    }
                }
            },
        )
        .unwrap()
        .field_subscription("endless", |ctx: RequestContext, sink: SubscriptionSink<i32>| async move {
            let mut i = 0;
            let reason = loop {
                match sink.send(i).await {
                    Ok(()) => i += 1,
                    Err(err) => break err,
                }
            };
            if let Some(stopped) = ctx.data::<ProducerStopped>() {
                *stopped.reason.lock().unwrap() = Some(reason);
                stopped.done.notify_one();
            }
        })
        .unwrap()
        .field_subscription("failing_feed", |_ctx: RequestContext, sink: SubscriptionSink<i32>| async move {
            if sink.send(1).await.is_ok() {
                sink.fail(anyhow::anyhow!("feed closed")).await;
            }
        })
        .unwrap();

    builder.build().unwrap()
}

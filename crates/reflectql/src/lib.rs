//! # reflectql
//!
//! Builds GraphQL schemas from plain Rust types and async handlers.
//!
//! Host types describe themselves through [`Describe`], usually by declaring
//! them with [`schema_struct!`]. Handlers are async closures bound to field
//! names on the query, mutation and subscription roots or on custom objects.
//! The builder discovers every reachable type, maps it to an object or input
//! type, flattens argument structs into field arguments and produces an
//! executable async-graphql dynamic schema.
//!
//! It supports:
//!
//! - Nullability derived from `Option`, lists from `Vec`
//! - Nested typed arguments rebuilt from untyped payloads
//! - Selection trees with typed arguments at every depth for root handlers
//! - Subscriptions driven by producer tasks with cancellation
//! - Custom scalars keyed by host type name
//!
//! ## Example
//!
//! ```ignore
//! schema_struct! {
//!     #[derive(Debug, Clone, Serialize, Deserialize)]
//!     pub struct Ticket {
//!         pub id: i64,
//!         pub title: String,
//!     }
//! }
//!
//! let mut builder = SchemaBuilder::new(BuilderConfig::default());
//! builder.query().field_resolver("tickets", |_ctx: RequestContext| async move {
//!     Ok::<_, anyhow::Error>(vec![Ticket { id: 1, title: "first".into() }])
//! })?;
//! let built = builder.build()?;
//! ```
//!
//! ## Configuration
//!
//! ```toml
//! max_depth = 15
//! max_complexity = 500
//! introspection = true
//! subscription_buffer = 16
//! ```
//!
//! ## Modules
//!
//! - [`config`] - Builder configuration
//! - [`types`] - Type descriptors and scalars
//! - [`schema`] - Discovery, type mapping and schema building
//! - [`resolvers`] - Handler traits and field binding
//! - [`subscriptions`] - Subscription sinks and subscriber registry
//! - [`reflect`] - Argument reflection
//! - [`context`] - Request context
//! - [`error`] - Error types

pub mod config;
pub mod context;
pub mod error;
pub mod reflect;
pub mod resolvers;
pub mod schema;
pub mod subscriptions;
pub mod types;

// Re-export main types
pub use config::BuilderConfig;
pub use context::{RequestContext, RequestContextBuilder};
pub use error::{BuildError, ReflectError, RegistrationError, ResolveError};
pub use reflect::ArgumentReflector;
pub use resolvers::{Args, HandlerShape, Parent, Resolver, Selection, Signature};
pub use schema::{BuiltSchema, SchemaBuilder};
pub use subscriptions::{OutboundMessage, SendError, SubscriberRegistry, SubscriptionSink};
pub use types::{
    DateTime, Decimal, Describe, FieldDescriptor, Id, ScalarDef, ScalarTable, StructDescriptor,
    TypeDescriptor, field_name,
};

/// Result type for schema building.
pub type Result<T> = std::result::Result<T, BuildError>;

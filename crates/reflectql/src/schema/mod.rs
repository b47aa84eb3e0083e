//! Schema construction.
//!
//! ## Components
//!
//! - [`SchemaBuilder`] - Accumulates registrations and builds the schema
//! - [`ObjectGraphDiscoverer`] - Collects every struct reachable from bound methods
//! - [`TypeMapper`] - Converts type descriptors into engine type references
//! - [`ArgsMap`] - Argument prototypes used to rebuild nested selections
//!
//! ## Architecture
//!
//! Building runs once, single-threaded:
//! 1. Registrations capture handler signatures
//! 2. Discovery walks signatures and prototypes to a fixed point
//! 3. The mapper declares every type as a shell, then fills in fields
//! 4. Bound methods are attached and the engine schema is finished

pub(crate) mod args_map;
mod builder;
mod discovery;
pub(crate) mod mapper;
pub(crate) mod registration;

pub use args_map::{ArgsMap, FieldPrototype};
pub use builder::{BuiltSchema, FieldSummary, SchemaBuilder};
pub use discovery::{Discovery, ObjectGraphDiscoverer};
pub use mapper::{
    InputId, ObjectId, OutputFieldDef, PLACEHOLDER_FIELD, SchemaInputDef, SchemaObjectDef,
    TypeMapper, input_type_name,
};
pub use registration::{
    MUTATION, MethodBinding, ObjectKind, ObjectRegistration, QUERY, SUBSCRIPTION,
    SubscriptionBinding, SubscriptionRegistration,
};

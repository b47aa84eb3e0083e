//! Field resolution.
//!
//! - `handler`: handler traits and the parameter layouts they accept
//! - `binder`: binds handlers to schema fields and invokes them per request
//! - `selection`: rebuilds the selection tree handed to root handlers

pub(crate) mod binder;
pub(crate) mod handler;
pub(crate) mod selection;

pub use handler::{
    Args, ArgsOnly, HandlerShape, Invocation, NoArgs, Parent, ReceiverAndArgs, ReceiverOnly,
    Resolver, Signature,
};
pub use selection::Selection;

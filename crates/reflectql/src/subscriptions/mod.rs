//! Subscriptions.
//!
//! Subscription handlers are producers that send values through a
//! [`SubscriptionSink`]. Each subscription runs its producer as its own task
//! connected to the engine stream by a bounded channel.
//!
//! ## Lifecycle
//!
//! 1. The engine opens the subscription field and the producer is spawned
//! 2. Every value sent on the sink becomes one event
//! 3. Dropping the sink ends the stream; dropping the stream cancels the producer
//!
//! [`SubscriberRegistry`] tracks subscribers per connection and forwards
//! their events as [`OutboundMessage`]s.

pub(crate) mod dispatcher;
mod registry;
pub(crate) mod sink;

pub use dispatcher::{SubscriptionHandler, SubscriptionStart};
pub use registry::{OutboundMessage, SubscriberInfo, SubscriberRegistry};
pub use sink::{SendError, SubscriptionSink};

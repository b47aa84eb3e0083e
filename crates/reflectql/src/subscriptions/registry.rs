//! Subscriber registry.
//!
//! Tracks active subscription operations per connection and drives their
//! delivery loops. Each subscriber gets a UUID and a cancellation token; the
//! loop forwards every engine response to the connection's outbound channel
//! until the stream ends, the token is cancelled or the connection goes away.

use std::sync::Arc;

use async_graphql::Request;
use async_graphql::dynamic::Schema;
use dashmap::DashMap;
use futures_util::StreamExt;
use serde::{Deserialize, Serialize};
use tokio::sync::mpsc;
use tokio_util::sync::CancellationToken;
use tracing::{debug, warn};
use uuid::Uuid;

use crate::context::RequestContext;

/// Message sent to a subscription client.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum OutboundMessage {
    /// One event of the operation.
    Data {
        /// Operation ID chosen by the client.
        id: String,
        /// Response data.
        payload: serde_json::Value,
    },
    /// Errors raised while producing an event.
    Error {
        /// Operation ID chosen by the client.
        id: String,
        /// Response errors.
        payload: serde_json::Value,
    },
    /// The operation's stream has ended.
    Complete {
        /// Operation ID chosen by the client.
        id: String,
    },
}

impl OutboundMessage {
    /// Operation ID the message belongs to.
    #[must_use]
    pub fn id(&self) -> &str {
        match self {
            Self::Data { id, .. } | Self::Error { id, .. } | Self::Complete { id } => id,
        }
    }
}

/// Public view of a registered subscriber.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SubscriberInfo {
    /// Connection the subscriber belongs to.
    pub connection_id: String,
    /// Operation ID chosen by the client.
    pub operation_id: String,
    /// Subscription document.
    pub query: String,
}

#[derive(Debug)]
struct SubscriberEntry {
    info: SubscriberInfo,
    token: CancellationToken,
}

/// Registry of active subscribers.
///
/// Cheap to clone; clones share the same subscriber table.
#[derive(Clone)]
pub struct SubscriberRegistry {
    schema: Schema,
    subscribers: Arc<DashMap<Uuid, SubscriberEntry>>,
}

impl SubscriberRegistry {
    /// Creates a registry executing subscriptions against `schema`.
    #[must_use]
    pub fn new(schema: Schema) -> Self {
        Self {
            schema,
            subscribers: Arc::new(DashMap::new()),
        }
    }

    /// Registers a subscriber and starts its delivery loop.
    pub fn subscribe(
        &self,
        connection_id: impl Into<String>,
        operation_id: impl Into<String>,
        request: Request,
        outbound: mpsc::Sender<OutboundMessage>,
    ) -> Uuid {
        self.subscribe_with_context(
            connection_id,
            operation_id,
            request,
            outbound,
            &RequestContext::background(),
        )
    }

    /// Registers a subscriber whose context derives from `context`.
    ///
    /// Cancelling `context` also ends the subscription.
    pub fn subscribe_with_context(
        &self,
        connection_id: impl Into<String>,
        operation_id: impl Into<String>,
        request: Request,
        outbound: mpsc::Sender<OutboundMessage>,
        context: &RequestContext,
    ) -> Uuid {
        let id = Uuid::new_v4();
        let context = context.child();
        let token = context.cancellation_token().clone();
        let info = SubscriberInfo {
            connection_id: connection_id.into(),
            operation_id: operation_id.into(),
            query: request.query.clone(),
        };
        let operation_id = info.operation_id.clone();

        self.subscribers.insert(
            id,
            SubscriberEntry {
                info,
                token: token.clone(),
            },
        );
        debug!(subscriber = %id, operation = %operation_id, active = self.subscribers.len(), "Subscriber registered");

        let schema = self.schema.clone();
        let subscribers = Arc::clone(&self.subscribers);
        tokio::spawn(async move {
            let mut stream = schema.execute_stream(request.data(context)).boxed();
            loop {
                let next = tokio::select! {
                    biased;
                    _ = token.cancelled() => break,
                    next = stream.next() => next,
                };

                let message = match next {
                    Some(response) if response.errors.is_empty() => OutboundMessage::Data {
                        id: operation_id.clone(),
                        payload: serde_json::to_value(&response.data).unwrap_or_else(|e| {
                            warn!(subscriber = %id, error = %e, "Failed to serialize response data");
                            serde_json::Value::Null
                        }),
                    },
                    Some(response) => OutboundMessage::Error {
                        id: operation_id.clone(),
                        payload: serde_json::to_value(&response.errors).unwrap_or_else(|e| {
                            warn!(subscriber = %id, error = %e, "Failed to serialize response errors");
                            serde_json::Value::Null
                        }),
                    },
                    None => {
                        let _ = outbound
                            .send(OutboundMessage::Complete {
                                id: operation_id.clone(),
                            })
                            .await;
                        break;
                    }
                };

                if outbound.send(message).await.is_err() {
                    warn!(subscriber = %id, "Outbound channel closed, dropping subscriber");
                    break;
                }
            }

            token.cancel();
            subscribers.remove(&id);
            debug!(subscriber = %id, active = subscribers.len(), "Subscriber removed");
        });

        id
    }

    /// Cancels a subscriber. Returns whether it was registered.
    pub fn unsubscribe(&self, id: Uuid) -> bool {
        match self.subscribers.remove(&id) {
            Some((_, entry)) => {
                entry.token.cancel();
                debug!(subscriber = %id, "Subscriber cancelled");
                true
            }
            None => false,
        }
    }

    /// Cancels every subscriber of a connection. Returns how many there were.
    pub fn unsubscribe_connection(&self, connection_id: &str) -> usize {
        let ids: Vec<Uuid> = self
            .subscribers
            .iter()
            .filter(|entry| entry.info.connection_id == connection_id)
            .map(|entry| *entry.key())
            .collect();
        ids.into_iter().filter(|id| self.unsubscribe(*id)).count()
    }

    /// Looks up a subscriber.
    #[must_use]
    pub fn subscriber(&self, id: Uuid) -> Option<SubscriberInfo> {
        self.subscribers.get(&id).map(|entry| entry.info.clone())
    }

    /// Number of active subscribers.
    #[must_use]
    pub fn len(&self) -> usize {
        self.subscribers.len()
    }

    /// Returns whether no subscriber is active.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.subscribers.is_empty()
    }
}

impl std::fmt::Debug for SubscriberRegistry {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SubscriberRegistry")
            .field("subscribers", &self.subscribers.len())
            .finish()
    }
}

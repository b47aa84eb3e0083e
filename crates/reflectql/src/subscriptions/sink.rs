//! Producer side of a subscription.

use std::fmt;
use std::marker::PhantomData;

use async_graphql::{ErrorExtensions, Value};
use serde::Serialize;
use thiserror::Error;
use tokio::sync::mpsc;
use tokio_util::sync::CancellationToken;

use crate::error::ResolveError;
use crate::types::{Describe, TypeDescriptor};

/// Item carried from a producer to the subscription stream.
pub(crate) type SinkItem = Result<Value, async_graphql::Error>;

/// Why a value could not be delivered.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum SendError {
    /// The subscription was cancelled.
    #[error("subscription cancelled")]
    Cancelled,

    /// The consumer side has gone away.
    #[error("subscription stream disconnected")]
    Disconnected,

    /// The value could not be serialized.
    #[error("value could not be serialized: {0}")]
    Serialize(String),
}

/// Sending half handed to a subscription handler.
///
/// Each value sent becomes one event on the subscription stream. Sending
/// waits while the stream's buffer is full and returns
/// [`SendError::Cancelled`] as soon as the subscription is cancelled, so a
/// producer blocked on a slow consumer is released on cancellation.
/// Dropping the sink ends the stream.
pub struct SubscriptionSink<T> {
    tx: mpsc::Sender<SinkItem>,
    token: CancellationToken,
    _item: PhantomData<fn(T)>,
}

impl<T: Serialize> SubscriptionSink<T> {
    pub(crate) fn new(tx: mpsc::Sender<SinkItem>, token: CancellationToken) -> Self {
        Self {
            tx,
            token,
            _item: PhantomData,
        }
    }

    /// Delivers one value.
    ///
    /// # Errors
    ///
    /// Returns an error when the subscription is cancelled, the stream is
    /// gone or the value fails to serialize.
    pub async fn send(&self, item: T) -> Result<(), SendError> {
        let value =
            async_graphql_value::to_value(&item).map_err(|e| SendError::Serialize(e.to_string()))?;
        tokio::select! {
            biased;
            _ = self.token.cancelled() => Err(SendError::Cancelled),
            sent = self.tx.send(Ok(value)) => sent.map_err(|_| SendError::Disconnected),
        }
    }

    /// Delivers an error event and ends the stream.
    pub async fn fail(self, err: impl Into<anyhow::Error>) {
        let err = ResolveError::Handler(err.into()).extend();
        tokio::select! {
            biased;
            _ = self.token.cancelled() => {}
            _ = self.tx.send(Err(err)) => {}
        }
    }

    /// Whether the subscription was cancelled or the stream is gone.
    #[must_use]
    pub fn is_closed(&self) -> bool {
        self.token.is_cancelled() || self.tx.is_closed()
    }

    /// Completes once the subscription is cancelled or the stream is gone.
    pub async fn closed(&self) {
        tokio::select! {
            _ = self.token.cancelled() => {}
            _ = self.tx.closed() => {}
        }
    }
}

impl<T> fmt::Debug for SubscriptionSink<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("SubscriptionSink")
            .field("cancelled", &self.token.is_cancelled())
            .field("closed", &self.tx.is_closed())
            .finish()
    }
}

impl<T: Describe> Describe for SubscriptionSink<T> {
    fn describe() -> TypeDescriptor {
        TypeDescriptor::channel(T::describe())
    }
}

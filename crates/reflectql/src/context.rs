//! Request-scoped context handed to every handler.
//!
//! The context carries the cancellation token that subscription producers
//! race against, typed request data supplied by the host application, and for
//! root fields the rebuilt selection tree.
//!
//! Hosts attach a context to a request as engine data; fields resolved
//! without one receive [`RequestContext::background`].
//!
//! # Example
//!
//! ```ignore
//! let context = RequestContext::builder()
//!     .with_request_id("req-123")
//!     .with_data(current_user)
//!     .build();
//!
//! let response = schema
//!     .execute(async_graphql::Request::new(query).data(context))
//!     .await;
//! ```

use std::any::{Any, TypeId};
use std::collections::HashMap;
use std::fmt;
use std::sync::Arc;

use tokio_util::sync::CancellationToken;

use crate::resolvers::selection::Selection;

type DataMap = HashMap<TypeId, Arc<dyn Any + Send + Sync>>;

/// Request-scoped handler context.
///
/// Cheap to clone; all state is shared behind an `Arc`.
#[derive(Clone)]
pub struct RequestContext {
    inner: Arc<ContextInner>,
}

#[derive(Clone)]
struct ContextInner {
    request_id: Option<String>,
    cancellation: CancellationToken,
    data: DataMap,
    selection: Option<Arc<Selection>>,
}

impl RequestContext {
    /// An empty context that is never cancelled from outside.
    #[must_use]
    pub fn background() -> Self {
        Self::builder().build()
    }

    /// Creates a new builder.
    #[must_use]
    pub fn builder() -> RequestContextBuilder {
        RequestContextBuilder::default()
    }

    /// Request ID for tracing and correlation.
    #[must_use]
    pub fn request_id(&self) -> Option<&str> {
        self.inner.request_id.as_deref()
    }

    /// Returns request data of type `T`, if attached.
    #[must_use]
    pub fn data<T: Any + Send + Sync>(&self) -> Option<&T> {
        self.inner
            .data
            .get(&TypeId::of::<T>())
            .and_then(|value| value.downcast_ref::<T>())
    }

    /// The token cancelled when the request is abandoned.
    #[must_use]
    pub fn cancellation_token(&self) -> &CancellationToken {
        &self.inner.cancellation
    }

    /// Cancels this context and every context derived from it.
    pub fn cancel(&self) {
        self.inner.cancellation.cancel();
    }

    /// Returns whether the context has been cancelled.
    #[must_use]
    pub fn is_cancelled(&self) -> bool {
        self.inner.cancellation.is_cancelled()
    }

    /// Completes once the context is cancelled.
    pub async fn cancelled(&self) {
        self.inner.cancellation.cancelled().await;
    }

    /// The selection tree of the current root field.
    ///
    /// Only set for handlers bound on root objects.
    #[must_use]
    pub fn selection(&self) -> Option<&Selection> {
        self.inner.selection.as_deref()
    }

    pub(crate) fn with_selection(&self, selection: Selection) -> Self {
        let mut inner = (*self.inner).clone();
        inner.selection = Some(Arc::new(selection));
        Self {
            inner: Arc::new(inner),
        }
    }

    /// Derives a context whose token is a child of this one.
    pub(crate) fn child(&self) -> Self {
        let mut inner = (*self.inner).clone();
        inner.cancellation = self.inner.cancellation.child_token();
        Self {
            inner: Arc::new(inner),
        }
    }
}

impl Default for RequestContext {
    fn default() -> Self {
        Self::background()
    }
}

impl fmt::Debug for RequestContext {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("RequestContext")
            .field("request_id", &self.inner.request_id)
            .field("cancelled", &self.is_cancelled())
            .field("data", &self.inner.data.len())
            .field("selection", &self.inner.selection)
            .finish()
    }
}

/// Builder for constructing a [`RequestContext`].
#[derive(Default)]
pub struct RequestContextBuilder {
    request_id: Option<String>,
    cancellation: Option<CancellationToken>,
    data: DataMap,
}

impl RequestContextBuilder {
    /// Creates a new builder.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Sets the request ID.
    #[must_use]
    pub fn with_request_id(mut self, id: impl Into<String>) -> Self {
        self.request_id = Some(id.into());
        self
    }

    /// Uses an externally owned cancellation token.
    #[must_use]
    pub fn with_cancellation(mut self, token: CancellationToken) -> Self {
        self.cancellation = Some(token);
        self
    }

    /// Attaches typed request data. A later value of the same type wins.
    #[must_use]
    pub fn with_data<T: Any + Send + Sync>(mut self, value: T) -> Self {
        self.data.insert(TypeId::of::<T>(), Arc::new(value));
        self
    }

    /// Builds the context.
    #[must_use]
    pub fn build(self) -> RequestContext {
        RequestContext {
            inner: Arc::new(ContextInner {
                request_id: self.request_id,
                cancellation: self.cancellation.unwrap_or_default(),
                data: self.data,
                selection: None,
            }),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[derive(Debug, PartialEq)]
    struct Tenant(&'static str);

    #[test]
    fn test_builder() {
        let ctx = RequestContext::builder()
            .with_request_id("req-123")
            .with_data(Tenant("acme"))
            .build();

        assert_eq!(ctx.request_id(), Some("req-123"));
        assert_eq!(ctx.data::<Tenant>(), Some(&Tenant("acme")));
        assert!(ctx.data::<String>().is_none());
        assert!(ctx.selection().is_none());
    }

    #[test]
    fn test_background_is_not_cancelled() {
        let ctx = RequestContext::background();
        assert!(!ctx.is_cancelled());
        assert!(ctx.request_id().is_none());
    }

    #[test]
    fn test_external_token_cancels_children() {
        let token = CancellationToken::new();
        let ctx = RequestContext::builder()
            .with_cancellation(token.clone())
            .build();
        let child = ctx.child();

        token.cancel();
        assert!(ctx.is_cancelled());
        assert!(child.is_cancelled());
    }

    #[test]
    fn test_child_cancel_does_not_reach_parent() {
        let ctx = RequestContext::background();
        let child = ctx.child();
        child.cancel();
        assert!(child.is_cancelled());
        assert!(!ctx.is_cancelled());
    }

    #[tokio::test]
    async fn test_cancelled_completes() {
        let ctx = RequestContext::background();
        let waiter = ctx.clone();
        let handle = tokio::spawn(async move { waiter.cancelled().await });
        ctx.cancel();
        handle.await.unwrap();
    }
}

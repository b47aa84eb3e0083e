//! Handler traits.
//!
//! Handlers are plain async closures or functions. Their parameter list is
//! classified once, when the handler is registered, through the marker type
//! `M` of [`Resolver<M>`]:
//!
//! | Parameters                                  | Shape             |
//! |---------------------------------------------|-------------------|
//! | `(RequestContext)`                          | `NoArgs`          |
//! | `(RequestContext, Args<A>)`                 | `ArgsOnly`        |
//! | `(RequestContext, Parent<P>, Args<A>)`      | `ReceiverAndArgs` |
//! | `(RequestContext, Parent<P>)`               | `ReceiverOnly`    |
//!
//! Every handler returns `Result<R, E>` where `R` describes and serializes
//! the field's output and `E` converts into [`anyhow::Error`].

use std::future::Future;
use std::sync::Arc;

use async_graphql::Value;
use futures_util::FutureExt;
use futures_util::future::{BoxFuture, ready};
use serde::Serialize;
use serde::de::DeserializeOwned;

use crate::context::RequestContext;
use crate::error::ResolveError;
use crate::reflect::materialize;
use crate::types::{Describe, TypeDescriptor};

/// Handler parameter carrying the field arguments.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Args<A>(pub A);

/// Handler parameter carrying the parent object.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Parent<P>(pub P);

/// Parameter layout of a handler.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum HandlerShape {
    /// `(ctx)`
    NoArgs,
    /// `(ctx, args)`
    ArgsOnly,
    /// `(ctx, parent, args)`
    ReceiverAndArgs,
    /// `(ctx, parent)`
    ReceiverOnly,
}

impl HandlerShape {
    /// Whether the handler takes a parent receiver.
    #[must_use]
    pub fn has_receiver(self) -> bool {
        matches!(self, Self::ReceiverAndArgs | Self::ReceiverOnly)
    }

    /// Whether the handler takes arguments.
    #[must_use]
    pub fn has_args(self) -> bool {
        matches!(self, Self::ArgsOnly | Self::ReceiverAndArgs)
    }
}

/// Handler signature, captured once at registration.
#[derive(Debug, Clone, PartialEq)]
pub struct Signature {
    /// Parameter layout.
    pub shape: HandlerShape,
    /// Receiver type, if any.
    pub receiver: Option<TypeDescriptor>,
    /// Argument struct type, if any.
    pub args: Option<TypeDescriptor>,
    /// Declared output type. For subscriptions this is a channel of the
    /// element type.
    pub output: TypeDescriptor,
}

/// Inputs of a single handler call.
#[derive(Debug, Clone)]
pub struct Invocation {
    /// Request context for slot 0.
    pub context: RequestContext,
    /// Parent object, for receiver handlers.
    pub parent: Option<Value>,
    /// Reflected arguments, for handlers with arguments.
    pub args: Option<Value>,
}

impl Invocation {
    fn parent<P: DeserializeOwned>(&mut self) -> Result<P, ResolveError> {
        let parent = self
            .parent
            .take()
            .ok_or_else(|| ResolveError::MissingReceiver(std::any::type_name::<P>().to_string()))?;
        async_graphql_value::from_value(parent).map_err(|e| ResolveError::Receiver(e.to_string()))
    }

    fn args<A: DeserializeOwned>(&mut self) -> Result<A, ResolveError> {
        let args = self.args.take().unwrap_or(Value::Null);
        Ok(materialize(args)?)
    }
}

pub(crate) type BoxedResolve = BoxFuture<'static, Result<Value, ResolveError>>;

/// Type-erased handler.
pub(crate) type ResolveFn = Arc<dyn Fn(Invocation) -> BoxedResolve + Send + Sync>;

/// A field handler.
///
/// Implemented for async closures and functions matching one of the
/// supported parameter layouts. `M` is a marker that keeps the impls apart.
pub trait Resolver<M>: Send + Sync + 'static {
    /// The handler's signature.
    fn signature(&self) -> Signature;

    /// Calls the handler.
    fn call(&self, invocation: Invocation) -> BoxedResolve;
}

/// Marker for `(ctx)` handlers.
pub struct NoArgs;
/// Marker for `(ctx, args)` handlers.
pub struct ArgsOnly;
/// Marker for `(ctx, parent, args)` handlers.
pub struct ReceiverAndArgs;
/// Marker for `(ctx, parent)` handlers.
pub struct ReceiverOnly;

fn complete<R, E>(result: Result<R, E>) -> Result<Value, ResolveError>
where
    R: Serialize,
    E: Into<anyhow::Error> + 'static,
{
    let value = result.map_err(|e| ResolveError::Handler(e.into()))?;
    async_graphql_value::to_value(&value).map_err(|e| ResolveError::Serialize(e.to_string()))
}

fn failed(err: ResolveError) -> BoxedResolve {
    ready(Err(err)).boxed()
}

impl<F, Fut, R, E> Resolver<(NoArgs,)> for F
where
    F: Fn(RequestContext) -> Fut + Send + Sync + 'static,
    Fut: Future<Output = Result<R, E>> + Send + 'static,
    R: Describe + Serialize + 'static,
    E: Into<anyhow::Error> + 'static,
{
    fn signature(&self) -> Signature {
        Signature {
            shape: HandlerShape::NoArgs,
            receiver: None,
            args: None,
            output: R::describe(),
        }
    }

    fn call(&self, invocation: Invocation) -> BoxedResolve {
        let fut = (self)(invocation.context);
        async move { complete(fut.await) }.boxed()
    }
}

impl<F, Fut, A, R, E> Resolver<(ArgsOnly, A)> for F
where
    F: Fn(RequestContext, Args<A>) -> Fut + Send + Sync + 'static,
    Fut: Future<Output = Result<R, E>> + Send + 'static,
    A: Describe + DeserializeOwned,
    R: Describe + Serialize + 'static,
    E: Into<anyhow::Error> + 'static,
{
    fn signature(&self) -> Signature {
        Signature {
            shape: HandlerShape::ArgsOnly,
            receiver: None,
            args: Some(A::describe()),
            output: R::describe(),
        }
    }

    fn call(&self, mut invocation: Invocation) -> BoxedResolve {
        let args = match invocation.args::<A>() {
            Ok(args) => args,
            Err(err) => return failed(err),
        };
        let fut = (self)(invocation.context, Args(args));
        async move { complete(fut.await) }.boxed()
    }
}

impl<F, Fut, P, A, R, E> Resolver<(ReceiverAndArgs, P, A)> for F
where
    F: Fn(RequestContext, Parent<P>, Args<A>) -> Fut + Send + Sync + 'static,
    Fut: Future<Output = Result<R, E>> + Send + 'static,
    P: Describe + DeserializeOwned,
    A: Describe + DeserializeOwned,
    R: Describe + Serialize + 'static,
    E: Into<anyhow::Error> + 'static,
{
    fn signature(&self) -> Signature {
        Signature {
            shape: HandlerShape::ReceiverAndArgs,
            receiver: Some(P::describe()),
            args: Some(A::describe()),
            output: R::describe(),
        }
    }

    fn call(&self, mut invocation: Invocation) -> BoxedResolve {
        let parent = match invocation.parent::<P>() {
            Ok(parent) => parent,
            Err(err) => return failed(err),
        };
        let args = match invocation.args::<A>() {
            Ok(args) => args,
            Err(err) => return failed(err),
        };
        let fut = (self)(invocation.context, Parent(parent), Args(args));
        async move { complete(fut.await) }.boxed()
    }
}

impl<F, Fut, P, R, E> Resolver<(ReceiverOnly, P)> for F
where
    F: Fn(RequestContext, Parent<P>) -> Fut + Send + Sync + 'static,
    Fut: Future<Output = Result<R, E>> + Send + 'static,
    P: Describe + DeserializeOwned,
    R: Describe + Serialize + 'static,
    E: Into<anyhow::Error> + 'static,
{
    fn signature(&self) -> Signature {
        Signature {
            shape: HandlerShape::ReceiverOnly,
            receiver: Some(P::describe()),
            args: None,
            output: R::describe(),
        }
    }

    fn call(&self, mut invocation: Invocation) -> BoxedResolve {
        let parent = match invocation.parent::<P>() {
            Ok(parent) => parent,
            Err(err) => return failed(err),
        };
        let fut = (self)(invocation.context, Parent(parent));
        async move { complete(fut.await) }.boxed()
    }
}

/// Erases a handler into a shared closure.
pub(crate) fn erase<M, H: Resolver<M>>(handler: H) -> ResolveFn {
    Arc::new(move |invocation| handler.call(invocation))
}

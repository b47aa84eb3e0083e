//! Subscription dispatch.
//!
//! A subscription handler is a producer: it receives a
//! [`SubscriptionSink`] and sends values until it is done or the
//! subscription is cancelled. The [`SubscriptionDispatcher`] spawns the
//! producer on a bounded channel and exposes the receiving end to the engine
//! as a stream. Dropping the stream cancels the subscription's token, which
//! releases a producer blocked on a full buffer.

use std::fmt;
use std::future::Future;
use std::sync::Arc;

use async_graphql::dynamic::{ResolverContext, SubscriptionField, SubscriptionFieldFuture, TypeRef};
use async_graphql::{ErrorExtensions, Value};
use async_stream::stream;
use futures_util::FutureExt;
use futures_util::Stream;
use futures_util::future::BoxFuture;
use serde::Serialize;
use serde::de::DeserializeOwned;
use tokio::sync::mpsc;
use tracing::debug;

use crate::context::RequestContext;
use crate::error::ResolveError;
use crate::reflect::{ArgumentReflector, materialize};
use crate::resolvers::binder::{reflect_arguments, request_context};
use crate::resolvers::handler::{Args, ArgsOnly, HandlerShape, NoArgs, Signature};
use crate::resolvers::selection::SelectionParser;
use crate::schema::args_map::ArgsMap;
use crate::schema::registration::SUBSCRIPTION;
use crate::subscriptions::sink::{SinkItem, SubscriptionSink};
use crate::types::Describe;

/// Everything a subscription producer starts from.
pub struct SubscriptionStart {
    context: RequestContext,
    tx: mpsc::Sender<SinkItem>,
    args: Option<Value>,
}

impl SubscriptionStart {
    fn sink<T: Serialize>(&self) -> SubscriptionSink<T> {
        SubscriptionSink::new(self.tx.clone(), self.context.cancellation_token().clone())
    }
}

/// Type-erased subscription handler.
pub(crate) type StartFn =
    Arc<dyn Fn(SubscriptionStart) -> Result<BoxFuture<'static, ()>, ResolveError> + Send + Sync>;

/// A subscription handler.
///
/// Implemented for async closures and functions taking
/// `(RequestContext, SubscriptionSink<T>)` or
/// `(RequestContext, SubscriptionSink<T>, Args<A>)`.
pub trait SubscriptionHandler<M>: Send + Sync + 'static {
    /// The handler's signature. The output is a channel of `T`.
    fn signature(&self) -> Signature;

    /// Creates the producer future.
    ///
    /// # Errors
    ///
    /// Returns an error if the arguments do not materialize.
    fn start(&self, start: SubscriptionStart) -> Result<BoxFuture<'static, ()>, ResolveError>;
}

impl<F, Fut, T> SubscriptionHandler<(NoArgs, T)> for F
where
    F: Fn(RequestContext, SubscriptionSink<T>) -> Fut + Send + Sync + 'static,
    Fut: Future<Output = ()> + Send + 'static,
    T: Describe + Serialize + 'static,
{
    fn signature(&self) -> Signature {
        Signature {
            shape: HandlerShape::NoArgs,
            receiver: None,
            args: None,
            output: SubscriptionSink::<T>::describe(),
        }
    }

    fn start(&self, start: SubscriptionStart) -> Result<BoxFuture<'static, ()>, ResolveError> {
        let sink = start.sink();
        Ok((self)(start.context, sink).boxed())
    }
}

impl<F, Fut, T, A> SubscriptionHandler<(ArgsOnly, T, A)> for F
where
    F: Fn(RequestContext, SubscriptionSink<T>, Args<A>) -> Fut + Send + Sync + 'static,
    Fut: Future<Output = ()> + Send + 'static,
    T: Describe + Serialize + 'static,
    A: Describe + DeserializeOwned,
{
    fn signature(&self) -> Signature {
        Signature {
            shape: HandlerShape::ArgsOnly,
            receiver: None,
            args: Some(A::describe()),
            output: SubscriptionSink::<T>::describe(),
        }
    }

    fn start(&self, mut start: SubscriptionStart) -> Result<BoxFuture<'static, ()>, ResolveError> {
        let args: A = materialize(start.args.take().unwrap_or(Value::Null))?;
        let sink = start.sink();
        Ok((self)(start.context, sink, Args(args)).boxed())
    }
}

/// Erases a subscription handler into a shared closure.
pub(crate) fn erase_subscription<M, H: SubscriptionHandler<M>>(handler: H) -> StartFn {
    Arc::new(move |start| handler.start(start))
}

/// A subscription handler bound to a schema field.
pub(crate) struct SubscriptionDispatcher {
    field: String,
    signature: Signature,
    start: StartFn,
    reflector: ArgumentReflector,
    args_map: Arc<ArgsMap>,
    buffer: usize,
}

impl SubscriptionDispatcher {
    pub(crate) fn new(
        field: impl Into<String>,
        signature: Signature,
        start: StartFn,
        reflector: ArgumentReflector,
        args_map: Arc<ArgsMap>,
        buffer: usize,
    ) -> Self {
        Self {
            field: field.into(),
            signature,
            start,
            reflector,
            args_map,
            buffer: buffer.max(1),
        }
    }

    /// Starts the producer and returns the event stream.
    fn open(
        &self,
        ctx: &ResolverContext<'_>,
    ) -> Result<impl Stream<Item = SinkItem> + Send + 'static + use<>, ResolveError> {
        let selection = SelectionParser::new(&self.args_map, &self.reflector)
            .parse(Some(SUBSCRIPTION), ctx.field())?;
        let context = request_context(ctx).child().with_selection(selection);
        let args = if self.signature.shape.has_args() {
            Some(reflect_arguments(
                &self.reflector,
                self.signature.args.as_ref(),
                ctx,
            )?)
        } else {
            None
        };

        let token = context.cancellation_token().clone();
        let (tx, mut rx) = mpsc::channel(self.buffer);
        let producer = (self.start)(SubscriptionStart { context, tx, args })?;
        tokio::spawn(producer);

        let field = self.field.clone();
        debug!(field = %field, buffer = self.buffer, "Subscription started");

        Ok(stream! {
            let _guard = token.clone().drop_guard();
            loop {
                let next = tokio::select! {
                    biased;
                    _ = token.cancelled() => None,
                    item = rx.recv() => item,
                };
                match next {
                    Some(item) => yield item,
                    None => break,
                }
            }
            debug!(field = %field, "Subscription stopped");
        })
    }
}

impl fmt::Debug for SubscriptionDispatcher {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("SubscriptionDispatcher")
            .field("field", &self.field)
            .field("signature", &self.signature)
            .field("buffer", &self.buffer)
            .finish_non_exhaustive()
    }
}

/// Creates an engine subscription field that streams through `dispatcher`.
pub(crate) fn subscription_field(
    name: &str,
    ty: TypeRef,
    dispatcher: Arc<SubscriptionDispatcher>,
) -> SubscriptionField {
    SubscriptionField::new(name, ty, move |ctx| {
        let dispatcher = Arc::clone(&dispatcher);
        SubscriptionFieldFuture::new(async move { dispatcher.open(&ctx).map_err(|e| e.extend()) })
    })
}

#[cfg(test)]
mod tests {
    use serde::Deserialize;

    use super::*;
    use crate::types::TypeDescriptor;

    crate::schema_struct! {
        #[derive(Debug, Clone, Default, Serialize, Deserialize)]
        struct Countdown {
            from: i32,
        }
    }

    fn signature_of<M, H: SubscriptionHandler<M>>(handler: H) -> Signature {
        handler.signature()
    }

    #[test]
    fn test_signatures() {
        let sig = signature_of(|_ctx: RequestContext, sink: SubscriptionSink<String>| async move {
            let _ = sink.send("tick".into()).await;
        });
        assert_eq!(sig.shape, HandlerShape::NoArgs);
        assert_eq!(
            sig.output,
            TypeDescriptor::channel(TypeDescriptor::Scalar("String"))
        );

        let sig = signature_of(
            |_ctx: RequestContext, sink: SubscriptionSink<i32>, Args(c): Args<Countdown>| async move {
                for n in (0..c.from).rev() {
                    if sink.send(n).await.is_err() {
                        break;
                    }
                }
            },
        );
        assert_eq!(sig.shape, HandlerShape::ArgsOnly);
        assert_eq!(sig.args, Some(Countdown::describe()));
    }

    #[tokio::test]
    async fn test_erased_producer_sends_values() {
        let start = erase_subscription(
            |_ctx: RequestContext, sink: SubscriptionSink<i32>, Args(c): Args<Countdown>| async move {
                for n in (0..c.from).rev() {
                    if sink.send(n).await.is_err() {
                        break;
                    }
                }
            },
        );

        let (tx, mut rx) = mpsc::channel(8);
        let producer = start(SubscriptionStart {
            context: RequestContext::background(),
            tx,
            args: Some(async_graphql::value!({"from": 3})),
        })
        .unwrap();
        producer.await;

        let mut values = Vec::new();
        while let Some(item) = rx.recv().await {
            values.push(item.unwrap());
        }
        assert_eq!(values, vec![Value::from(2), Value::from(1), Value::from(0)]);
    }

    #[test]
    fn test_bad_arguments_fail_to_start() {
        let start = erase_subscription(
            |_ctx: RequestContext, _sink: SubscriptionSink<i32>, Args(_c): Args<Countdown>| async {},
        );
        let (tx, _rx) = mpsc::channel(1);
        let result = start(SubscriptionStart {
            context: RequestContext::background(),
            tx,
            args: Some(async_graphql::value!({"from": "three"})),
        });
        assert_eq!(
            result.err().map(|e| e.error_code()),
            Some("ARGUMENT_MATERIALIZE_FAILED")
        );
    }
}

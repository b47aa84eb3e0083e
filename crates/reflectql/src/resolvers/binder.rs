//! Field binding.
//!
//! [`FieldBinder`] checks a handler's signature against the object it is
//! bound to and wraps it into a [`BoundMethod`]. At request time the bound
//! method gathers the context, the parent receiver and the reflected
//! arguments, and forwards the handler's result or error to the engine.

use std::fmt;
use std::sync::Arc;

use async_graphql::dynamic::{Field, FieldFuture, ResolverContext, TypeRef};
use async_graphql::{ErrorExtensions, Value};
use tracing::debug;

use crate::context::RequestContext;
use crate::error::{BuildError, ResolveError};
use crate::reflect::ArgumentReflector;
use crate::resolvers::handler::{Invocation, ResolveFn, Signature};
use crate::resolvers::selection::SelectionParser;
use crate::schema::args_map::ArgsMap;
use crate::schema::registration::ObjectRegistration;
use crate::types::TypeDescriptor;

/// Validates signatures and produces bound methods.
pub(crate) struct FieldBinder {
    reflector: ArgumentReflector,
    args_map: Arc<ArgsMap>,
}

impl FieldBinder {
    pub(crate) fn new(reflector: ArgumentReflector, args_map: Arc<ArgsMap>) -> Self {
        Self {
            reflector,
            args_map,
        }
    }

    /// Checks the receiver and argument slots of a method on `object`.
    pub(crate) fn validate(
        object: &ObjectRegistration,
        field: &str,
        signature: &Signature,
    ) -> Result<(), BuildError> {
        if let Some(receiver) = &signature.receiver {
            let Some(prototype) = object.prototype() else {
                return Err(BuildError::ReceiverOnRoot {
                    object: object.name().to_string(),
                    field: field.to_string(),
                });
            };
            if receiver.as_struct() != Some(prototype) {
                return Err(BuildError::ReceiverMismatch {
                    object: object.name().to_string(),
                    field: field.to_string(),
                    expected: prototype.path().to_string(),
                    found: receiver.to_string(),
                });
            }
        }
        Self::validate_args(object.name(), field, signature)
    }

    /// Checks that the argument slot, if any, is a struct.
    pub(crate) fn validate_args(
        object: &str,
        field: &str,
        signature: &Signature,
    ) -> Result<(), BuildError> {
        match &signature.args {
            Some(args) if args.as_struct().is_none() => Err(BuildError::ArgumentsNotStruct {
                object: object.to_string(),
                field: field.to_string(),
                found: args.to_string(),
            }),
            _ => Ok(()),
        }
    }

    /// Wraps a handler bound to `object.field`.
    pub(crate) fn bind(
        &self,
        object: &str,
        field: &str,
        signature: &Signature,
        handler: ResolveFn,
    ) -> Arc<BoundMethod> {
        let output_zero = match &signature.output {
            TypeDescriptor::Pointer(_) => None,
            output => self.reflector.zero(output).ok(),
        };
        debug!(object, field, shape = ?signature.shape, "Bound field resolver");
        Arc::new(BoundMethod {
            object: object.to_string(),
            field: field.to_string(),
            signature: signature.clone(),
            handler,
            reflector: self.reflector.clone(),
            args_map: Arc::clone(&self.args_map),
            output_zero,
        })
    }

    pub(crate) fn reflector(&self) -> &ArgumentReflector {
        &self.reflector
    }

    pub(crate) fn args_map(&self) -> &Arc<ArgsMap> {
        &self.args_map
    }
}

/// A handler bound to a schema field.
pub(crate) struct BoundMethod {
    object: String,
    field: String,
    signature: Signature,
    handler: ResolveFn,
    reflector: ArgumentReflector,
    args_map: Arc<ArgsMap>,
    output_zero: Option<Value>,
}

impl BoundMethod {
    /// Gathers the handler inputs from the engine context.
    fn prepare(&self, ctx: &ResolverContext<'_>) -> Result<Invocation, ResolveError> {
        let mut context = request_context(ctx);
        let parent = parent_object(ctx);

        if parent.is_none() {
            let selection = SelectionParser::new(&self.args_map, &self.reflector)
                .parse(Some(&self.object), ctx.field())?;
            context = context.with_selection(selection);
        }

        let args = if self.signature.shape.has_args() {
            Some(reflect_arguments(
                &self.reflector,
                self.signature.args.as_ref(),
                ctx,
            )?)
        } else {
            None
        };

        Ok(Invocation {
            context,
            parent: parent.filter(|_| self.signature.shape.has_receiver()),
            args,
        })
    }

    /// Calls the handler. A null result of a non-nullable output is
    /// replaced by the output's zero value.
    async fn call(&self, invocation: Invocation) -> Result<Option<Value>, ResolveError> {
        match (self.handler)(invocation).await? {
            Value::Null => Ok(self.output_zero.clone()),
            value => Ok(Some(value)),
        }
    }
}

impl fmt::Debug for BoundMethod {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("BoundMethod")
            .field("object", &self.object)
            .field("field", &self.field)
            .field("signature", &self.signature)
            .finish_non_exhaustive()
    }
}

/// Creates an engine field that resolves through `method`.
pub(crate) fn method_field(name: &str, ty: TypeRef, method: Arc<BoundMethod>) -> Field {
    Field::new(name, ty, move |ctx| {
        let method = Arc::clone(&method);
        FieldFuture::new(async move {
            let invocation = method.prepare(&ctx).map_err(|e| e.extend())?;
            let value = method.call(invocation).await.map_err(|e| e.extend())?;
            Ok(value)
        })
    })
}

/// The request context attached to the engine request, or a background one.
pub(crate) fn request_context(ctx: &ResolverContext<'_>) -> RequestContext {
    ctx.data_opt::<RequestContext>()
        .cloned()
        .unwrap_or_else(RequestContext::background)
}

fn parent_object(ctx: &ResolverContext<'_>) -> Option<Value> {
    ctx.parent_value
        .as_value()
        .filter(|value| matches!(value, Value::Object(_)))
        .cloned()
}

/// Reflects the field's arguments into the argument struct shape.
///
/// No arguments at all yields the zero value of the struct.
pub(crate) fn reflect_arguments(
    reflector: &ArgumentReflector,
    target: Option<&TypeDescriptor>,
    ctx: &ResolverContext<'_>,
) -> Result<Value, ResolveError> {
    let Some(target) = target else {
        return Ok(Value::Null);
    };
    let map = ctx.args.as_index_map();
    if map.is_empty() {
        return Ok(reflector.zero(target)?);
    }
    Ok(reflector.reflect(target, &Value::Object(map.clone()))?)
}

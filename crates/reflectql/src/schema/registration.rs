//! Object and subscription registrations.
//!
//! Registrations accumulate on the [`SchemaBuilder`](crate::SchemaBuilder)
//! before the schema is built. Each binding captures its handler's signature
//! once, at registration, and is immutable afterwards.

use std::fmt;

use indexmap::IndexMap;
use indexmap::map::Entry;
use tracing::trace;

use crate::error::RegistrationError;
use crate::resolvers::handler::{ResolveFn, Resolver, Signature, erase};
use crate::subscriptions::dispatcher::{StartFn, SubscriptionHandler, erase_subscription};
use crate::types::StructDescriptor;

/// Name of the query root.
pub const QUERY: &str = "Query";
/// Name of the mutation root.
pub const MUTATION: &str = "Mutation";
/// Name of the subscription root.
pub const SUBSCRIPTION: &str = "Subscription";

/// What an object registration stands for.
#[derive(Debug, Clone, PartialEq)]
pub enum ObjectKind {
    /// The query root.
    Query,
    /// The mutation root.
    Mutation,
    /// A named object backed by a struct prototype.
    Custom(StructDescriptor),
}

/// A handler bound to a field name.
#[derive(Clone)]
pub struct MethodBinding {
    name: String,
    signature: Signature,
    handler: ResolveFn,
}

impl MethodBinding {
    /// Field name.
    #[must_use]
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Handler signature.
    #[must_use]
    pub fn signature(&self) -> &Signature {
        &self.signature
    }

    pub(crate) fn handler(&self) -> ResolveFn {
        self.handler.clone()
    }
}

impl fmt::Debug for MethodBinding {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("MethodBinding")
            .field("name", &self.name)
            .field("signature", &self.signature)
            .finish_non_exhaustive()
    }
}

/// A root or custom object and its bound fields.
#[derive(Debug, Clone)]
pub struct ObjectRegistration {
    name: String,
    kind: ObjectKind,
    methods: IndexMap<String, MethodBinding>,
}

impl ObjectRegistration {
    pub(crate) fn new(name: impl Into<String>, kind: ObjectKind) -> Self {
        Self {
            name: name.into(),
            kind,
            methods: IndexMap::new(),
        }
    }

    /// Object name.
    #[must_use]
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Object kind.
    #[must_use]
    pub fn kind(&self) -> &ObjectKind {
        &self.kind
    }

    /// Whether this is the query or mutation root.
    #[must_use]
    pub fn is_root(&self) -> bool {
        !matches!(self.kind, ObjectKind::Custom(_))
    }

    /// Struct prototype of a custom object.
    #[must_use]
    pub fn prototype(&self) -> Option<&StructDescriptor> {
        match &self.kind {
            ObjectKind::Custom(prototype) => Some(prototype),
            _ => None,
        }
    }

    /// Binds a handler to a field.
    ///
    /// # Errors
    ///
    /// Returns [`RegistrationError::DuplicateField`] if the field is already
    /// bound. The existing binding is kept.
    pub fn field_resolver<M, H>(
        &mut self,
        name: impl Into<String>,
        handler: H,
    ) -> Result<&mut Self, RegistrationError>
    where
        H: Resolver<M>,
    {
        let name = name.into();
        match self.methods.entry(name) {
            Entry::Occupied(entry) => Err(RegistrationError::DuplicateField {
                object: self.name.clone(),
                field: entry.key().clone(),
            }),
            Entry::Vacant(entry) => {
                let signature = handler.signature();
                trace!(object = %self.name, field = %entry.key(), shape = ?signature.shape, "Registered field resolver");
                let binding = MethodBinding {
                    name: entry.key().clone(),
                    signature,
                    handler: erase(handler),
                };
                entry.insert(binding);
                Ok(self)
            }
        }
    }

    /// Bound fields in registration order.
    pub fn methods(&self) -> impl Iterator<Item = &MethodBinding> {
        self.methods.values()
    }

    /// Looks up a bound field.
    #[must_use]
    pub fn method(&self, name: &str) -> Option<&MethodBinding> {
        self.methods.get(name)
    }

    /// Number of bound fields.
    #[must_use]
    pub fn len(&self) -> usize {
        self.methods.len()
    }

    /// Returns whether no field is bound.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.methods.is_empty()
    }
}

/// A subscription handler bound to a field name.
#[derive(Clone)]
pub struct SubscriptionBinding {
    name: String,
    signature: Signature,
    start: StartFn,
}

impl SubscriptionBinding {
    /// Field name.
    #[must_use]
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Handler signature. The output is a channel of the payload type.
    #[must_use]
    pub fn signature(&self) -> &Signature {
        &self.signature
    }

    pub(crate) fn start(&self) -> StartFn {
        self.start.clone()
    }
}

impl fmt::Debug for SubscriptionBinding {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("SubscriptionBinding")
            .field("name", &self.name)
            .field("signature", &self.signature)
            .finish_non_exhaustive()
    }
}

/// The subscription root.
#[derive(Debug, Clone, Default)]
pub struct SubscriptionRegistration {
    methods: IndexMap<String, SubscriptionBinding>,
}

impl SubscriptionRegistration {
    /// Binds a subscription handler to a field.
    ///
    /// # Errors
    ///
    /// Returns [`RegistrationError::DuplicateField`] if the field is already
    /// bound. The existing binding is kept.
    pub fn field_subscription<M, H>(
        &mut self,
        name: impl Into<String>,
        handler: H,
    ) -> Result<&mut Self, RegistrationError>
    where
        H: SubscriptionHandler<M>,
    {
        let name = name.into();
        match self.methods.entry(name) {
            Entry::Occupied(entry) => Err(RegistrationError::DuplicateField {
                object: SUBSCRIPTION.to_string(),
                field: entry.key().clone(),
            }),
            Entry::Vacant(entry) => {
                let signature = handler.signature();
                trace!(field = %entry.key(), shape = ?signature.shape, "Registered subscription");
                let binding = SubscriptionBinding {
                    name: entry.key().clone(),
                    signature,
                    start: erase_subscription(handler),
                };
                entry.insert(binding);
                Ok(self)
            }
        }
    }

    /// Bound fields in registration order.
    pub fn methods(&self) -> impl Iterator<Item = &SubscriptionBinding> {
        self.methods.values()
    }

    /// Number of bound fields.
    #[must_use]
    pub fn len(&self) -> usize {
        self.methods.len()
    }

    /// Returns whether no field is bound.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.methods.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::context::RequestContext;
    use crate::resolvers::handler::HandlerShape;

    #[test]
    fn test_duplicate_field_keeps_first() {
        let mut query = ObjectRegistration::new(QUERY, ObjectKind::Query);
        query
            .field_resolver("count", |_ctx: RequestContext| async {
                Ok::<_, anyhow::Error>(1_i32)
            })
            .unwrap();

        let err = query
            .field_resolver("count", |_ctx: RequestContext| async {
                Ok::<_, anyhow::Error>(String::from("two"))
            })
            .unwrap_err();

        assert_eq!(
            err,
            RegistrationError::DuplicateField {
                object: "Query".into(),
                field: "count".into()
            }
        );
        assert_eq!(query.len(), 1);
        let kept = query.method("count").unwrap();
        assert_eq!(kept.signature().shape, HandlerShape::NoArgs);
        assert_eq!(kept.signature().output.to_string(), "i32");
    }

    #[test]
    fn test_roots_are_roots() {
        assert!(ObjectRegistration::new(QUERY, ObjectKind::Query).is_root());
        assert!(ObjectRegistration::new(MUTATION, ObjectKind::Mutation).is_root());
    }
}

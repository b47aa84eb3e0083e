//! Per-field argument prototypes.
//!
//! Once a handler is bound its argument struct is flattened into schema
//! arguments and the host type is no longer visible to the engine. The
//! [`ArgsMap`] keeps, for every (object, field) pair, the argument struct
//! descriptor and the name of the object the field returns, so that the
//! selection parser can rebuild nested typed arguments at any depth.

use std::collections::HashMap;

use crate::types::TypeDescriptor;

/// What the selection parser needs to know about one field.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct FieldPrototype {
    /// Argument struct, for fields bound to handlers with arguments.
    pub args: Option<TypeDescriptor>,
    /// Schema object returned by the field, if it returns an object.
    pub output_object: Option<String>,
}

/// Field prototypes keyed by object name, then field name.
#[derive(Debug, Clone, Default)]
pub struct ArgsMap {
    objects: HashMap<String, HashMap<String, FieldPrototype>>,
}

impl ArgsMap {
    /// Creates an empty map.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    pub(crate) fn insert(
        &mut self,
        object: impl Into<String>,
        field: impl Into<String>,
        prototype: FieldPrototype,
    ) {
        self.objects
            .entry(object.into())
            .or_default()
            .insert(field.into(), prototype);
    }

    /// Looks up the prototype of `object.field`.
    #[must_use]
    pub fn get(&self, object: &str, field: &str) -> Option<&FieldPrototype> {
        self.objects.get(object).and_then(|fields| fields.get(field))
    }

    /// Total number of fields recorded.
    #[must_use]
    pub fn len(&self) -> usize {
        self.objects.values().map(HashMap::len).sum()
    }

    /// Returns whether no field is recorded.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

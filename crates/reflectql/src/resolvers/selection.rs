//! Selection tree parsing.
//!
//! Root handlers receive the selection of their field as a [`Selection`]
//! tree on the [`RequestContext`](crate::RequestContext). Arguments at every
//! depth are rebuilt into typed shapes through the [`ArgsMap`], so a handler
//! can plan nested work, such as joins or preloads, from one place.

use async_graphql::{Name, SelectionField, Value};
use async_graphql::indexmap::IndexMap;
use serde::de::DeserializeOwned;

use crate::error::{ReflectError, ResolveError};
use crate::reflect::{ArgumentReflector, materialize};
use crate::schema::args_map::ArgsMap;

/// One field of a selection tree.
#[derive(Debug, Clone, PartialEq)]
pub struct Selection {
    /// Field name.
    pub name: String,
    /// Response alias, if any.
    pub alias: Option<String>,
    /// Arguments. Reflected into the handler's argument shape when the
    /// field is bound, kept as given otherwise.
    pub args: Option<Value>,
    /// Selected sub-fields.
    pub selection_set: Vec<Selection>,
}

impl Selection {
    /// Materializes the arguments as `T`.
    ///
    /// # Errors
    ///
    /// Returns [`ReflectError::Materialize`] if the arguments do not
    /// deserialize into `T`.
    pub fn args<T: DeserializeOwned>(&self) -> Result<Option<T>, ReflectError> {
        self.args.clone().map(materialize).transpose()
    }

    /// First sub-field named `name`.
    #[must_use]
    pub fn field(&self, name: &str) -> Option<&Selection> {
        self.selection_set.iter().find(|s| s.name == name)
    }

    /// Key under which the field appears in the response.
    #[must_use]
    pub fn response_key(&self) -> &str {
        self.alias.as_deref().unwrap_or(&self.name)
    }
}

/// Rebuilds [`Selection`] trees from engine selection fields.
pub(crate) struct SelectionParser<'a> {
    args_map: &'a ArgsMap,
    reflector: &'a ArgumentReflector,
}

impl<'a> SelectionParser<'a> {
    pub(crate) fn new(args_map: &'a ArgsMap, reflector: &'a ArgumentReflector) -> Self {
        Self {
            args_map,
            reflector,
        }
    }

    /// Parses `field`, declared on `object`, and all of its sub-fields.
    ///
    /// Introspection fields are skipped.
    pub(crate) fn parse(
        &self,
        object: Option<&str>,
        field: SelectionField<'_>,
    ) -> Result<Selection, ResolveError> {
        let name = field.name();
        let prototype = object.and_then(|object| self.args_map.get(object, name));

        let raw = field
            .arguments()
            .map_err(|e| ResolveError::Selection(e.message))?;
        let args = match prototype.and_then(|p| p.args.as_ref()) {
            Some(target) => {
                let payload = Value::Object(raw.into_iter().collect::<IndexMap<Name, Value>>());
                Some(self.reflector.reflect(target, &payload)?)
            }
            None if raw.is_empty() => None,
            None => Some(Value::Object(raw.into_iter().collect())),
        };

        let child_object = prototype.and_then(|p| p.output_object.as_deref());
        let mut selection_set = Vec::new();
        for child in field.selection_set() {
            if child.name().starts_with("__") {
                continue;
            }
            selection_set.push(self.parse(child_object, child)?);
        }

        Ok(Selection {
            name: name.to_string(),
            alias: field.alias().map(str::to_string),
            args,
            selection_set,
        })
    }
}

//! Argument reflection.
//!
//! [`ArgumentReflector`] rebuilds a fully populated value from an untyped
//! nested argument payload, guided by the target's [`TypeDescriptor`]. The
//! output is keyed by host field identifiers and can be materialized into
//! the concrete host type through serde.
//!
//! Rules per target kind:
//!
//! - pointer: null when absent or null, otherwise the pointee
//! - struct: each field from the nested object, or the zero struct when absent
//! - slice: each element when present, or an empty list when absent; a single
//!   non-list value is treated as a one-element list
//! - scalar: the value normalized by the scalar's parser, or its zero value
//!
//! Payload keys are looked up with [`field_name`] applied to the host
//! identifier, the same rule used for schema field names.

use std::sync::Arc;

use async_graphql::indexmap::IndexMap;
use async_graphql::{Name, Value};
use serde::de::DeserializeOwned;

use crate::error::{ReflectError, value_kind};
use crate::types::{Describe, ScalarDef, ScalarTable, StructDescriptor, TypeDescriptor};

/// Rebuilds typed values from nested argument payloads.
#[derive(Debug, Clone)]
pub struct ArgumentReflector {
    scalars: Arc<ScalarTable>,
}

impl ArgumentReflector {
    /// Creates a reflector over a scalar table.
    #[must_use]
    pub fn new(scalars: Arc<ScalarTable>) -> Self {
        Self { scalars }
    }

    /// The scalar table used for leaf values.
    #[must_use]
    pub fn scalars(&self) -> &ScalarTable {
        &self.scalars
    }

    /// Reflects `payload` into the shape of `target`.
    ///
    /// A null payload is treated as absent.
    ///
    /// # Errors
    ///
    /// Returns a [`ReflectError`] naming the path of the first value that
    /// does not fit the target shape.
    pub fn reflect(&self, target: &TypeDescriptor, payload: &Value) -> Result<Value, ReflectError> {
        let mut path = ArgPath::default();
        self.value(target, Some(payload), &mut path)
    }

    /// Reflects `payload` and materializes it as `T`.
    ///
    /// # Errors
    ///
    /// Returns a [`ReflectError`] if the payload does not fit `T`.
    pub fn reflect_into<T>(&self, payload: &Value) -> Result<T, ReflectError>
    where
        T: Describe + DeserializeOwned,
    {
        let value = self.reflect(&T::describe(), payload)?;
        materialize(value)
    }

    /// The zero value of `target`.
    ///
    /// # Errors
    ///
    /// Returns a [`ReflectError`] if `target` contains an unknown scalar or
    /// a channel.
    pub fn zero(&self, target: &TypeDescriptor) -> Result<Value, ReflectError> {
        let mut path = ArgPath::default();
        self.zero_at(target, &mut path)
    }

    fn value(
        &self,
        ty: &TypeDescriptor,
        payload: Option<&Value>,
        path: &mut ArgPath,
    ) -> Result<Value, ReflectError> {
        let payload = payload.filter(|v| !matches!(v, Value::Null));
        match ty {
            TypeDescriptor::Pointer(inner) => match payload {
                Some(value) => self.value(inner, Some(value), path),
                None => Ok(Value::Null),
            },
            TypeDescriptor::Struct(s) => {
                if let Some(def) = self.scalars.get(s.name()) {
                    return scalar(def, s.name(), payload, path);
                }
                match payload {
                    Some(Value::Object(map)) => self.fields(s, map, path),
                    Some(other) => Err(path.mismatch("object", other)),
                    None => self.zero_at(ty, path),
                }
            }
            TypeDescriptor::Slice(elem) => match payload {
                Some(Value::List(items)) => {
                    let mut out = Vec::with_capacity(items.len());
                    for (index, item) in items.iter().enumerate() {
                        let mark = path.index(index);
                        let value = self.element(elem, item, path);
                        path.restore(mark);
                        out.push(value?);
                    }
                    Ok(Value::List(out))
                }
                Some(single) => Ok(Value::List(vec![self.element(elem, single, path)?])),
                None => Ok(Value::List(Vec::new())),
            },
            TypeDescriptor::Scalar(name) => {
                let def = self.scalar_def(name, path)?;
                scalar(def, name, payload, path)
            }
            TypeDescriptor::Channel(_) => Err(ReflectError::Unsupported {
                path: path.render(),
                kind: ty.kind(),
            }),
        }
    }

    fn element(
        &self,
        elem: &TypeDescriptor,
        item: &Value,
        path: &mut ArgPath,
    ) -> Result<Value, ReflectError> {
        if matches!(item, Value::Null) && !matches!(elem, TypeDescriptor::Pointer(_)) {
            return Err(path.mismatch(elem.kind(), item));
        }
        self.value(elem, Some(item), path)
    }

    fn fields(
        &self,
        s: &StructDescriptor,
        map: &IndexMap<Name, Value>,
        path: &mut ArgPath,
    ) -> Result<Value, ReflectError> {
        let mut out = IndexMap::new();
        for field in s.fields() {
            let key = field.schema_name();
            let mark = path.field(&key);
            let value = self.value(field.ty(), map.get(&Name::new(&key)), path);
            path.restore(mark);
            out.insert(Name::new(field.ident()), value?);
        }
        Ok(Value::Object(out))
    }

    fn zero_at(&self, ty: &TypeDescriptor, path: &mut ArgPath) -> Result<Value, ReflectError> {
        match ty {
            TypeDescriptor::Pointer(_) => Ok(Value::Null),
            TypeDescriptor::Slice(_) => Ok(Value::List(Vec::new())),
            TypeDescriptor::Scalar(name) => Ok(self.scalar_def(name, path)?.zero()),
            TypeDescriptor::Struct(s) => {
                if let Some(def) = self.scalars.get(s.name()) {
                    return Ok(def.zero());
                }
                let mut out = IndexMap::new();
                for field in s.fields() {
                    let mark = path.field(&field.schema_name());
                    let value = self.zero_at(field.ty(), path);
                    path.restore(mark);
                    out.insert(Name::new(field.ident()), value?);
                }
                Ok(Value::Object(out))
            }
            TypeDescriptor::Channel(_) => Err(ReflectError::Unsupported {
                path: path.render(),
                kind: ty.kind(),
            }),
        }
    }

    fn scalar_def(&self, name: &str, path: &ArgPath) -> Result<&ScalarDef, ReflectError> {
        self.scalars
            .get(name)
            .ok_or_else(|| ReflectError::UnknownScalar {
                path: path.render(),
                scalar: name.to_string(),
            })
    }
}

fn scalar(
    def: &ScalarDef,
    host: &str,
    payload: Option<&Value>,
    path: &ArgPath,
) -> Result<Value, ReflectError> {
    match payload {
        Some(value) => def.parse(value).map_err(|message| ReflectError::InvalidScalar {
            path: path.render(),
            scalar: host.to_string(),
            message,
        }),
        None => Ok(def.zero()),
    }
}

/// Deserializes a reflected value into a host type.
pub(crate) fn materialize<T: DeserializeOwned>(value: Value) -> Result<T, ReflectError> {
    async_graphql_value::from_value(value).map_err(|e| ReflectError::Materialize(e.to_string()))
}

/// Dotted path to the value being reflected, e.g. `filter.tags[1].title`.
#[derive(Debug, Default)]
struct ArgPath(String);

impl ArgPath {
    fn field(&mut self, name: &str) -> usize {
        let mark = self.0.len();
        if !self.0.is_empty() {
            self.0.push('.');
        }
        self.0.push_str(name);
        mark
    }

    fn index(&mut self, index: usize) -> usize {
        let mark = self.0.len();
        self.0.push_str(&format!("[{index}]"));
        mark
    }

    fn restore(&mut self, mark: usize) {
        self.0.truncate(mark);
    }

    fn render(&self) -> String {
        if self.0.is_empty() {
            "<root>".to_string()
        } else {
            self.0.clone()
        }
    }

    fn mismatch(&self, expected: &'static str, found: &Value) -> ReflectError {
        ReflectError::ShapeMismatch {
            path: self.render(),
            expected,
            found: value_kind(found),
        }
    }
}

#[cfg(test)]
mod tests {
    use async_graphql::value;
    use serde::{Deserialize, Serialize};

    use super::*;

    crate::schema_struct! {
        #[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
        struct Point {
            x: i32,
            y: i32,
            label: Option<String>,
        }
    }

    crate::schema_struct! {
        #[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
        struct Polygon {
            points: Vec<Point>,
            closed: bool,
            origin: Option<Point>,
        }
    }

    fn reflector() -> ArgumentReflector {
        ArgumentReflector::new(Arc::new(ScalarTable::new()))
    }

    #[test]
    fn test_scalar_only_struct_round_trips() {
        let point = Point {
            x: 3,
            y: -4,
            label: Some("p".into()),
        };
        let payload = async_graphql_value::to_value(&point).unwrap();
        let back: Point = reflector().reflect_into(&payload).unwrap();
        assert_eq!(back, point);
    }

    #[test]
    fn test_absent_fields_are_zero() {
        let polygon: Polygon = reflector().reflect_into(&value!({})).unwrap();
        assert_eq!(polygon, Polygon::default());

        let polygon: Polygon = reflector().reflect_into(&Value::Null).unwrap();
        assert_eq!(polygon, Polygon::default());
    }

    #[test]
    fn test_nested_lists_and_pointers() {
        let polygon: Polygon = reflector()
            .reflect_into(&value!({
                "points": [{"x": 1, "y": 2}, {"x": 3, "y": 4, "label": "b"}],
                "origin": {"x": 0},
            }))
            .unwrap();

        assert_eq!(polygon.points.len(), 2);
        assert_eq!(polygon.points[1].label.as_deref(), Some("b"));
        assert_eq!(polygon.origin, Some(Point::default()));
        assert!(!polygon.closed);
    }

    #[test]
    fn test_single_value_coerces_to_list() {
        let polygon: Polygon = reflector()
            .reflect_into(&value!({"points": {"x": 9, "y": 9}}))
            .unwrap();
        assert_eq!(polygon.points.len(), 1);
        assert_eq!(polygon.points[0].x, 9);
    }

    #[test]
    fn test_shape_mismatch_carries_path() {
        let err = reflector()
            .reflect(
                &Polygon::describe(),
                &value!({"points": [{"x": 1, "y": 1}, "oops"]}),
            )
            .unwrap_err();
        assert_eq!(
            err,
            ReflectError::ShapeMismatch {
                path: "points[1]".into(),
                expected: "object",
                found: "string",
            }
        );
    }

    #[test]
    fn test_null_element_needs_pointer() {
        let err = reflector()
            .reflect(&Polygon::describe(), &value!({"points": [null]}))
            .unwrap_err();
        assert_eq!(err.path(), Some("points[0]"));
    }

    #[test]
    fn test_invalid_scalar() {
        let err = reflector()
            .reflect(&Point::describe(), &value!({"x": "one"}))
            .unwrap_err();
        assert!(matches!(err, ReflectError::InvalidScalar { ref path, .. } if path == "x"));
    }

    #[test]
    fn test_unknown_scalar() {
        let err = ArgumentReflector::new(Arc::new(ScalarTable::empty()))
            .zero(&Point::describe())
            .unwrap_err();
        assert_eq!(
            err,
            ReflectError::UnknownScalar {
                path: "x".into(),
                scalar: "i32".into(),
            }
        );
    }

    #[test]
    fn test_channel_is_unsupported() {
        let desc = TypeDescriptor::channel(TypeDescriptor::Scalar("String"));
        let err = reflector().reflect(&desc, &value!("x")).unwrap_err();
        assert_eq!(err.error_code(), "UNSUPPORTED_ARGUMENT");
    }
}

//! Type mapping.
//!
//! [`TypeMapper`] converts type descriptors into engine type references and
//! owns the object and input definitions it constructs. Definitions live in
//! arenas and are memoized by [`TypeKey`]: a struct is registered as an empty
//! shell before its fields are populated, so self-referential and mutually
//! recursive types resolve to the shell instead of recursing.
//!
//! Nullability follows the host type: a bare field is non-null and one
//! `Option` level makes it nullable. A `Vec<T>` becomes `[T!]!`, and
//! `Vec<Option<T>>` becomes `[T]!`.

use std::collections::HashMap;
use std::fmt;
use std::sync::Arc;

use async_graphql::dynamic::{Field, FieldFuture, InputObject, InputValue, Object, TypeRef};
use async_graphql::{Name, Value};
use indexmap::IndexMap;
use tracing::trace;

use crate::error::BuildError;
use crate::resolvers::binder::{BoundMethod, method_field};
use crate::types::{ScalarTable, StructDescriptor, TypeDescriptor, TypeKey};

/// Name of the field added to types that would otherwise be empty.
pub const PLACEHOLDER_FIELD: &str = "_placeholder";

/// Arena index of an object definition.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct ObjectId(usize);

/// Arena index of an input definition.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct InputId(usize);

/// How an output field produces its value.
#[derive(Clone)]
pub(crate) enum FieldSource {
    /// Read from the parent object by host identifier.
    Property(&'static str),
    /// Computed by a bound handler.
    Method(Arc<BoundMethod>),
}

/// A constructed output field.
#[derive(Clone)]
pub struct OutputFieldDef {
    /// Schema field name.
    pub name: String,
    /// Field type.
    pub ty: TypeRef,
    /// Flattened arguments, in declaration order.
    pub args: Vec<(String, TypeRef)>,
    /// Object returned by the field, if any.
    pub output_object: Option<String>,
    pub(crate) source: FieldSource,
}

impl OutputFieldDef {
    /// Whether the field is computed by a handler.
    #[must_use]
    pub fn is_bound(&self) -> bool {
        matches!(self.source, FieldSource::Method(_))
    }

    pub(crate) fn to_dynamic(&self) -> Field {
        let mut field = match &self.source {
            FieldSource::Property(ident) => property_field(&self.name, self.ty.clone(), ident),
            FieldSource::Method(method) => {
                method_field(&self.name, self.ty.clone(), Arc::clone(method))
            }
        };
        for (name, ty) in &self.args {
            field = field.argument(InputValue::new(name.as_str(), ty.clone()));
        }
        field
    }
}

impl fmt::Debug for OutputFieldDef {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("OutputFieldDef")
            .field("name", &self.name)
            .field("ty", &self.ty.to_string())
            .field("args", &self.args.len())
            .field("bound", &self.is_bound())
            .finish()
    }
}

/// A constructed object type.
#[derive(Debug, Clone)]
pub struct SchemaObjectDef {
    /// Schema type name.
    pub name: String,
    /// Host struct.
    pub prototype: StructDescriptor,
    /// Fields in declaration order, followed by extra bound fields.
    pub fields: IndexMap<String, OutputFieldDef>,
    populated: bool,
}

impl SchemaObjectDef {
    pub(crate) fn to_dynamic(&self) -> Object {
        object_with_fields(&self.name, self.fields.values())
    }
}

/// A constructed input object type.
#[derive(Debug, Clone)]
pub struct SchemaInputDef {
    /// Schema type name.
    pub name: String,
    /// Host struct.
    pub prototype: StructDescriptor,
    /// Fields in declaration order.
    pub fields: IndexMap<String, TypeRef>,
    populated: bool,
}

impl SchemaInputDef {
    pub(crate) fn to_dynamic(&self) -> InputObject {
        let mut input = InputObject::new(self.name.as_str());
        if self.fields.is_empty() {
            input = input.field(InputValue::new(
                PLACEHOLDER_FIELD,
                TypeRef::named(TypeRef::STRING),
            ));
        }
        for (name, ty) in &self.fields {
            input = input.field(InputValue::new(name.as_str(), ty.clone()));
        }
        input
    }
}

/// Builds an object from output fields, adding a placeholder when empty.
pub(crate) fn object_with_fields<'a>(
    name: &str,
    fields: impl Iterator<Item = &'a OutputFieldDef>,
) -> Object {
    let mut object = Object::new(name);
    let mut empty = true;
    for field in fields {
        object = object.field(field.to_dynamic());
        empty = false;
    }
    if empty {
        object = object.field(Field::new(
            PLACEHOLDER_FIELD,
            TypeRef::named(TypeRef::STRING),
            |_| FieldFuture::new(async { Ok(None::<Value>) }),
        ));
    }
    object
}

/// Creates a field resolver that reads a value from the parent object.
fn property_field(name: &str, ty: TypeRef, ident: &'static str) -> Field {
    Field::new(name, ty, move |ctx| {
        FieldFuture::new(async move {
            if let Some(Value::Object(obj)) = ctx.parent_value.as_value()
                && let Some(value) = obj.get(&Name::new(ident))
                && !matches!(value, Value::Null)
            {
                return Ok(Some(value.clone()));
            }
            Ok(None)
        })
    })
}

/// Input type name of a struct: `Name` becomes `NameInput`.
#[must_use]
pub fn input_type_name(struct_name: &str) -> String {
    if struct_name.ends_with("Input") {
        struct_name.to_string()
    } else {
        format!("{struct_name}Input")
    }
}

fn wrap(ty: TypeRef, required: bool) -> TypeRef {
    if required {
        TypeRef::NonNull(Box::new(ty))
    } else {
        ty
    }
}

/// Converts descriptors into type references, memoizing definitions.
pub struct TypeMapper {
    scalars: Arc<ScalarTable>,
    object_names: HashMap<TypeKey, String>,
    objects: Vec<SchemaObjectDef>,
    inputs: Vec<SchemaInputDef>,
    object_ids: HashMap<TypeKey, ObjectId>,
    input_ids: HashMap<TypeKey, InputId>,
    claimed: HashMap<String, String>,
}

impl TypeMapper {
    /// Creates a mapper. Scalar schema names are reserved up front.
    #[must_use]
    pub fn new(scalars: Arc<ScalarTable>) -> Self {
        let claimed = scalars
            .iter()
            .map(|(_, def)| (def.name().to_string(), "scalar".to_string()))
            .collect();
        Self {
            scalars,
            object_names: HashMap::new(),
            objects: Vec::new(),
            inputs: Vec::new(),
            object_ids: HashMap::new(),
            input_ids: HashMap::new(),
            claimed,
        }
    }

    /// Uses `name` instead of the struct name for the object of `key`.
    pub fn set_object_name(&mut self, key: TypeKey, name: impl Into<String>) {
        self.object_names.insert(key, name.into());
    }

    /// Reserves a schema type name for `claimant`.
    ///
    /// # Errors
    ///
    /// Returns [`BuildError::DuplicateTypeName`] if another claimant holds
    /// the name.
    pub fn claim(&mut self, name: &str, claimant: &str) -> Result<(), BuildError> {
        match self.claimed.get(name) {
            Some(existing) if existing == claimant => Ok(()),
            Some(existing) => Err(BuildError::DuplicateTypeName {
                name: name.to_string(),
                first: existing.clone(),
                second: claimant.to_string(),
            }),
            None => {
                self.claimed.insert(name.to_string(), claimant.to_string());
                Ok(())
            }
        }
    }

    /// Maps a descriptor to an output type reference.
    ///
    /// # Errors
    ///
    /// Returns an error for unknown scalars or clashing type names.
    pub fn output_type(
        &mut self,
        ty: &TypeDescriptor,
        required: bool,
    ) -> Result<TypeRef, BuildError> {
        match ty {
            TypeDescriptor::Pointer(inner) => self.output_type(inner, false),
            TypeDescriptor::Slice(elem) => {
                let elem = self.output_type(elem, true)?;
                Ok(wrap(TypeRef::List(Box::new(elem)), required))
            }
            TypeDescriptor::Channel(elem) => self.output_type(elem, true),
            TypeDescriptor::Scalar(name) => self.scalar_type(name, required),
            TypeDescriptor::Struct(s) => {
                if self.scalars.contains(s.name()) {
                    return self.scalar_type(s.name(), required);
                }
                let id = self.object(s)?;
                Ok(wrap(TypeRef::named(self.objects[id.0].name.as_str()), required))
            }
        }
    }

    /// Maps a descriptor to an input type reference.
    ///
    /// # Errors
    ///
    /// Returns an error for unknown scalars, channels or clashing type names.
    pub fn input_type(
        &mut self,
        ty: &TypeDescriptor,
        required: bool,
    ) -> Result<TypeRef, BuildError> {
        match ty {
            TypeDescriptor::Pointer(inner) => self.input_type(inner, false),
            TypeDescriptor::Slice(elem) => {
                let elem = self.input_type(elem, true)?;
                Ok(wrap(TypeRef::List(Box::new(elem)), required))
            }
            TypeDescriptor::Channel(_) => Err(BuildError::UnsupportedType {
                ty: ty.to_string(),
                position: "an input",
            }),
            TypeDescriptor::Scalar(name) => self.scalar_type(name, required),
            TypeDescriptor::Struct(s) => {
                if self.scalars.contains(s.name()) {
                    return self.scalar_type(s.name(), required);
                }
                let id = self.input(s)?;
                Ok(wrap(TypeRef::named(self.inputs[id.0].name.as_str()), required))
            }
        }
    }

    fn scalar_type(&self, host: &str, required: bool) -> Result<TypeRef, BuildError> {
        let def = self
            .scalars
            .get(host)
            .ok_or_else(|| BuildError::UnknownScalar(host.to_string()))?;
        Ok(wrap(TypeRef::named(def.name()), required))
    }

    /// Returns the object for `s`, constructing it on first use.
    ///
    /// # Errors
    ///
    /// Returns an error if a field type cannot be mapped.
    pub fn object(&mut self, s: &StructDescriptor) -> Result<ObjectId, BuildError> {
        if let Some(id) = self.object_ids.get(&s.key()) {
            return Ok(*id);
        }
        let id = self.declare_output(s)?;
        self.populate_output(id)?;
        Ok(id)
    }

    /// Returns the input for `s`, constructing it on first use.
    ///
    /// # Errors
    ///
    /// Returns an error if a field type cannot be mapped.
    pub fn input(&mut self, s: &StructDescriptor) -> Result<InputId, BuildError> {
        if let Some(id) = self.input_ids.get(&s.key()) {
            return Ok(*id);
        }
        let id = self.declare_input(s)?;
        self.populate_input(id)?;
        Ok(id)
    }

    /// Registers an empty object shell for `s`.
    ///
    /// # Errors
    ///
    /// Returns [`BuildError::DuplicateTypeName`] if the name is taken.
    pub fn declare_output(&mut self, s: &StructDescriptor) -> Result<ObjectId, BuildError> {
        if let Some(id) = self.object_ids.get(&s.key()) {
            return Ok(*id);
        }
        let name = self
            .object_names
            .get(&s.key())
            .cloned()
            .unwrap_or_else(|| s.name().to_string());
        self.claim(&name, &format!("{} (output)", s.path()))?;

        let id = ObjectId(self.objects.len());
        self.objects.push(SchemaObjectDef {
            name,
            prototype: *s,
            fields: IndexMap::new(),
            populated: false,
        });
        self.object_ids.insert(s.key(), id);
        trace!(type_name = s.path(), "Declared object shell");
        Ok(id)
    }

    /// Registers an empty input shell for `s`.
    ///
    /// # Errors
    ///
    /// Returns [`BuildError::DuplicateTypeName`] if the name is taken.
    pub fn declare_input(&mut self, s: &StructDescriptor) -> Result<InputId, BuildError> {
        if let Some(id) = self.input_ids.get(&s.key()) {
            return Ok(*id);
        }
        let name = input_type_name(s.name());
        self.claim(&name, &format!("{} (input)", s.path()))?;

        let id = InputId(self.inputs.len());
        self.inputs.push(SchemaInputDef {
            name,
            prototype: *s,
            fields: IndexMap::new(),
            populated: false,
        });
        self.input_ids.insert(s.key(), id);
        trace!(type_name = s.path(), "Declared input shell");
        Ok(id)
    }

    /// Fills the fields of a declared object. Repeated calls are no-ops.
    ///
    /// # Errors
    ///
    /// Returns an error if a field type cannot be mapped.
    pub fn populate_output(&mut self, id: ObjectId) -> Result<(), BuildError> {
        let def = &mut self.objects[id.0];
        if def.populated {
            return Ok(());
        }
        def.populated = true;
        let prototype = def.prototype;

        for field in prototype.fields() {
            let ty = self.output_type(field.ty(), true)?;
            let output_object = self.output_object_name(field.ty());
            let name = field.schema_name();
            trace!(object = %self.objects[id.0].name, field = %name, ty = %ty, "Mapped output field");
            self.objects[id.0].fields.insert(
                name.clone(),
                OutputFieldDef {
                    name,
                    ty,
                    args: Vec::new(),
                    output_object,
                    source: FieldSource::Property(field.ident()),
                },
            );
        }
        Ok(())
    }

    /// Fills the fields of a declared input. Repeated calls are no-ops.
    ///
    /// # Errors
    ///
    /// Returns an error if a field type cannot be mapped.
    pub fn populate_input(&mut self, id: InputId) -> Result<(), BuildError> {
        let def = &mut self.inputs[id.0];
        if def.populated {
            return Ok(());
        }
        def.populated = true;
        let prototype = def.prototype;

        for field in prototype.fields() {
            let ty = self.input_type(field.ty(), true)?;
            let name = field.schema_name();
            trace!(input = %self.inputs[id.0].name, field = %name, ty = %ty, "Mapped input field");
            self.inputs[id.0].fields.insert(name, ty);
        }
        Ok(())
    }

    /// Object name of the struct underneath `ty`, if it maps to an object.
    #[must_use]
    pub fn output_object_name(&self, ty: &TypeDescriptor) -> Option<String> {
        let s = ty.actual().as_struct()?;
        if self.scalars.contains(s.name()) {
            return None;
        }
        self.object_ids
            .get(&s.key())
            .map(|id| self.objects[id.0].name.clone())
    }

    /// Looks up a constructed object by key.
    #[must_use]
    pub fn object_id(&self, key: TypeKey) -> Option<ObjectId> {
        self.object_ids.get(&key).copied()
    }

    /// Looks up a constructed input by key.
    #[must_use]
    pub fn input_id(&self, key: TypeKey) -> Option<InputId> {
        self.input_ids.get(&key).copied()
    }

    /// Object definition by id.
    #[must_use]
    pub fn object_def(&self, id: ObjectId) -> &SchemaObjectDef {
        &self.objects[id.0]
    }

    pub(crate) fn object_def_mut(&mut self, id: ObjectId) -> &mut SchemaObjectDef {
        &mut self.objects[id.0]
    }

    /// Input definition by id.
    #[must_use]
    pub fn input_def(&self, id: InputId) -> &SchemaInputDef {
        &self.inputs[id.0]
    }

    /// All object definitions in construction order.
    #[must_use]
    pub fn objects(&self) -> &[SchemaObjectDef] {
        &self.objects
    }

    /// All input definitions in construction order.
    #[must_use]
    pub fn inputs(&self) -> &[SchemaInputDef] {
        &self.inputs
    }

    /// The scalar table in use.
    #[must_use]
    pub fn scalars(&self) -> &ScalarTable {
        &self.scalars
    }
}

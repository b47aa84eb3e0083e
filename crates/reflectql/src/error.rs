//! Error types for schema registration, schema building and field resolution.
//!
//! Registration and build errors are fatal and surface once, from the
//! builder. Reflection and resolve errors are scoped to a single field: they
//! are converted into GraphQL errors carrying an `extensions.code` so that
//! sibling fields keep resolving.

use async_graphql::{ErrorExtensions, Value};
use thiserror::Error;

/// Errors returned while accumulating registrations on the builder.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum RegistrationError {
    /// An object with this name is already registered.
    #[error("object `{0}` is already registered")]
    DuplicateObject(String),

    /// A field with this name is already registered on the object.
    #[error("field `{field}` is already registered on `{object}`")]
    DuplicateField {
        /// Object name.
        object: String,
        /// Field name.
        field: String,
    },

    /// A scalar was registered twice for the same host type.
    #[error("scalar for host type `{0}` is already registered")]
    DuplicateScalar(String),

    /// The prototype is already bound to another object.
    #[error("prototype `{prototype}` is already bound to object `{object}`")]
    DuplicatePrototype {
        /// Prototype type name.
        prototype: String,
        /// Object that owns it.
        object: String,
    },

    /// Object prototypes must be structs.
    #[error("prototype of object `{object}` must be a struct, found `{found}`")]
    NotAStruct {
        /// Object name.
        object: String,
        /// Offending type.
        found: String,
    },
}

impl RegistrationError {
    /// Returns the stable error code.
    #[must_use]
    pub fn error_code(&self) -> &'static str {
        match self {
            Self::DuplicateObject(_) => "DUPLICATE_OBJECT",
            Self::DuplicateField { .. } => "DUPLICATE_FIELD",
            Self::DuplicateScalar(_) => "DUPLICATE_SCALAR",
            Self::DuplicatePrototype { .. } => "DUPLICATE_PROTOTYPE",
            Self::NotAStruct { .. } => "NOT_A_STRUCT",
        }
    }
}

/// Fatal errors raised by [`SchemaBuilder::build`](crate::SchemaBuilder::build).
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum BuildError {
    /// A scalar type has no entry in the scalar table.
    #[error("unknown scalar `{0}`, register it with SchemaBuilder::register_scalar")]
    UnknownScalar(String),

    /// A type cannot appear in the given position.
    #[error("type `{ty}` cannot be used as {position}")]
    UnsupportedType {
        /// Offending type.
        ty: String,
        /// Where it was used.
        position: &'static str,
    },

    /// Two distinct host types map to the same schema type name.
    #[error("schema type name `{name}` is claimed by both `{first}` and `{second}`")]
    DuplicateTypeName {
        /// Schema type name.
        name: String,
        /// First claimant.
        first: String,
        /// Second claimant.
        second: String,
    },

    /// The Query root has no fields.
    #[error("the Query root has no fields")]
    MissingQueryRoot,

    /// A root object field declared a receiver parameter.
    #[error("root field `{object}.{field}` cannot take a parent receiver")]
    ReceiverOnRoot {
        /// Root object name.
        object: String,
        /// Field name.
        field: String,
    },

    /// The receiver parameter differs from the object's prototype.
    #[error("field `{object}.{field}` receives `{found}` but the object prototype is `{expected}`")]
    ReceiverMismatch {
        /// Object name.
        object: String,
        /// Field name.
        field: String,
        /// Prototype type.
        expected: String,
        /// Receiver type.
        found: String,
    },

    /// Handler arguments must be a struct.
    #[error("arguments of `{object}.{field}` must be a struct, found `{found}`")]
    ArgumentsNotStruct {
        /// Object name.
        object: String,
        /// Field name.
        field: String,
        /// Argument type.
        found: String,
    },

    /// The builder configuration is invalid.
    #[error("invalid builder config: {0}")]
    InvalidConfig(String),

    /// The engine rejected the assembled schema.
    #[error("schema assembly failed: {0}")]
    Schema(String),
}

impl BuildError {
    /// Returns the stable error code.
    #[must_use]
    pub fn error_code(&self) -> &'static str {
        match self {
            Self::UnknownScalar(_) => "UNKNOWN_SCALAR",
            Self::UnsupportedType { .. } => "UNSUPPORTED_TYPE",
            Self::DuplicateTypeName { .. } => "DUPLICATE_TYPE_NAME",
            Self::MissingQueryRoot => "MISSING_QUERY_ROOT",
            Self::ReceiverOnRoot { .. } => "RECEIVER_ON_ROOT",
            Self::ReceiverMismatch { .. } => "RECEIVER_MISMATCH",
            Self::ArgumentsNotStruct { .. } => "ARGUMENTS_NOT_STRUCT",
            Self::InvalidConfig(_) => "INVALID_CONFIG",
            Self::Schema(_) => "SCHEMA_BUILD_FAILED",
        }
    }
}

/// Argument payloads that do not fit the target shape.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ReflectError {
    /// The payload has the wrong shape at `path`.
    #[error("argument `{path}`: expected {expected}, found {found}")]
    ShapeMismatch {
        /// Dotted path to the offending value.
        path: String,
        /// Expected shape.
        expected: &'static str,
        /// Actual shape.
        found: &'static str,
    },

    /// A scalar value was rejected by its parser.
    #[error("argument `{path}`: {message}")]
    InvalidScalar {
        /// Dotted path to the offending value.
        path: String,
        /// Scalar host name.
        scalar: String,
        /// Parser message.
        message: String,
    },

    /// The scalar has no entry in the scalar table.
    #[error("argument `{path}`: unknown scalar `{scalar}`")]
    UnknownScalar {
        /// Dotted path to the offending value.
        path: String,
        /// Scalar host name.
        scalar: String,
    },

    /// The target contains a type that cannot be built from a payload.
    #[error("argument `{path}`: {kind} types cannot be used as input")]
    Unsupported {
        /// Dotted path to the offending value.
        path: String,
        /// Descriptor kind.
        kind: &'static str,
    },

    /// The reflected value did not deserialize into the host type.
    #[error("arguments could not be materialized: {0}")]
    Materialize(String),
}

impl ReflectError {
    /// Dotted path of the offending argument, when known.
    #[must_use]
    pub fn path(&self) -> Option<&str> {
        match self {
            Self::ShapeMismatch { path, .. }
            | Self::InvalidScalar { path, .. }
            | Self::UnknownScalar { path, .. }
            | Self::Unsupported { path, .. } => Some(path),
            Self::Materialize(_) => None,
        }
    }

    /// Returns the stable error code.
    #[must_use]
    pub fn error_code(&self) -> &'static str {
        match self {
            Self::ShapeMismatch { .. } => "ARGUMENT_SHAPE_MISMATCH",
            Self::InvalidScalar { .. } => "INVALID_SCALAR",
            Self::UnknownScalar { .. } => "UNKNOWN_SCALAR",
            Self::Unsupported { .. } => "UNSUPPORTED_ARGUMENT",
            Self::Materialize(_) => "ARGUMENT_MATERIALIZE_FAILED",
        }
    }
}

/// Per-field resolution errors.
#[derive(Debug, Error)]
pub enum ResolveError {
    /// The arguments could not be reflected.
    #[error(transparent)]
    Arguments(#[from] ReflectError),

    /// A receiver handler was invoked without a parent object.
    #[error("field `{0}` requires a parent object")]
    MissingReceiver(String),

    /// The parent object did not decode into the receiver type.
    #[error("parent object could not be decoded: {0}")]
    Receiver(String),

    /// The selection tree could not be rebuilt.
    #[error("selection could not be parsed: {0}")]
    Selection(String),

    /// The handler result could not be serialized.
    #[error("result could not be serialized: {0}")]
    Serialize(String),

    /// The handler returned an error.
    #[error(transparent)]
    Handler(#[from] anyhow::Error),
}

impl ResolveError {
    /// Returns the stable error code.
    #[must_use]
    pub fn error_code(&self) -> &'static str {
        match self {
            Self::Arguments(err) => err.error_code(),
            Self::MissingReceiver(_) => "MISSING_RECEIVER",
            Self::Receiver(_) => "RECEIVER_DECODE_FAILED",
            Self::Selection(_) => "SELECTION_FAILED",
            Self::Serialize(_) => "RESULT_SERIALIZE_FAILED",
            Self::Handler(_) => "HANDLER_ERROR",
        }
    }
}

impl ErrorExtensions for ResolveError {
    fn extend(&self) -> async_graphql::Error {
        let code = self.error_code();
        let path = match self {
            Self::Arguments(err) => err.path().map(str::to_owned),
            _ => None,
        };
        async_graphql::Error::new(self.to_string()).extend_with(|_, e| {
            e.set("code", code);
            if let Some(path) = path {
                e.set("path", path);
            }
        })
    }
}

/// Short name of a value's shape, used in error messages.
pub(crate) fn value_kind(value: &Value) -> &'static str {
    match value {
        Value::Null => "null",
        Value::Number(_) => "number",
        Value::String(_) => "string",
        Value::Boolean(_) => "boolean",
        Value::Binary(_) => "binary",
        Value::Enum(_) => "enum",
        Value::List(_) => "list",
        Value::Object(_) => "object",
    }
}

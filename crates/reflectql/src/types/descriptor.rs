//! Host type descriptors.
//!
//! A [`TypeDescriptor`] is the immutable shape of a Rust type as seen by the
//! schema builder and the argument reflector. Descriptors are produced by the
//! [`Describe`] trait, which is implemented here for primitives and the
//! standard wrappers, and for user structs by the [`schema_struct!`] macro.
//!
//! | Rust type            | Descriptor                 |
//! |----------------------|----------------------------|
//! | `String`, `i32`, ... | `Scalar("String")`, ...    |
//! | `Option<T>`          | `Pointer(T)`               |
//! | `Vec<T>`             | `Slice(T)`                 |
//! | `Box<T>`, `Arc<T>`   | same as `T`                |
//! | `SubscriptionSink<T>`| `Channel(T)`               |
//! | `schema_struct!`     | `Struct(..)`               |
//!
//! [`schema_struct!`]: crate::schema_struct

use std::fmt;
use std::sync::Arc;

use heck::ToSnakeCase;

/// Stable identity of a host type.
///
/// Structs are keyed by their full module path, scalars by their host name.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct TypeKey(&'static str);

impl TypeKey {
    /// Returns the key as a string.
    #[must_use]
    pub fn as_str(&self) -> &'static str {
        self.0
    }
}

impl fmt::Display for TypeKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.0)
    }
}

/// Shape of a host type.
#[derive(Debug, Clone, PartialEq)]
pub enum TypeDescriptor {
    /// A leaf type, named by its host name (`"i64"`, `"DateTime"`).
    Scalar(&'static str),
    /// A struct with named fields.
    Struct(StructDescriptor),
    /// An optional value.
    Pointer(Box<TypeDescriptor>),
    /// A homogeneous sequence.
    Slice(Box<TypeDescriptor>),
    /// A subscription payload channel.
    Channel(Box<TypeDescriptor>),
}

impl TypeDescriptor {
    /// Wraps a descriptor as optional.
    #[must_use]
    pub fn pointer(inner: TypeDescriptor) -> Self {
        Self::Pointer(Box::new(inner))
    }

    /// Wraps a descriptor as a sequence.
    #[must_use]
    pub fn slice(inner: TypeDescriptor) -> Self {
        Self::Slice(Box::new(inner))
    }

    /// Wraps a descriptor as a subscription channel.
    #[must_use]
    pub fn channel(inner: TypeDescriptor) -> Self {
        Self::Channel(Box::new(inner))
    }

    /// Strips pointer, slice and channel layers down to the underlying
    /// scalar or struct.
    #[must_use]
    pub fn actual(&self) -> &TypeDescriptor {
        match self {
            Self::Pointer(inner) | Self::Slice(inner) | Self::Channel(inner) => inner.actual(),
            other => other,
        }
    }

    /// Returns the struct descriptor if this is a struct.
    #[must_use]
    pub fn as_struct(&self) -> Option<&StructDescriptor> {
        match self {
            Self::Struct(s) => Some(s),
            _ => None,
        }
    }

    /// Returns the stable key for scalars and structs.
    #[must_use]
    pub fn key(&self) -> Option<TypeKey> {
        match self {
            Self::Scalar(name) => Some(TypeKey(name)),
            Self::Struct(s) => Some(s.key()),
            _ => None,
        }
    }

    /// Short human-readable kind, used in error messages.
    #[must_use]
    pub fn kind(&self) -> &'static str {
        match self {
            Self::Scalar(_) => "scalar",
            Self::Struct(_) => "struct",
            Self::Pointer(_) => "pointer",
            Self::Slice(_) => "slice",
            Self::Channel(_) => "channel",
        }
    }
}

impl fmt::Display for TypeDescriptor {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Scalar(name) => f.write_str(name),
            Self::Struct(s) => f.write_str(s.name),
            Self::Pointer(inner) => write!(f, "Option<{inner}>"),
            Self::Slice(inner) => write!(f, "Vec<{inner}>"),
            Self::Channel(inner) => write!(f, "Channel<{inner}>"),
        }
    }
}

/// Descriptor of a struct type.
///
/// Fields are produced lazily so that self-referential structs can be
/// described without recursing forever.
#[derive(Clone, Copy)]
pub struct StructDescriptor {
    name: &'static str,
    path: &'static str,
    fields: fn() -> Vec<FieldDescriptor>,
}

impl StructDescriptor {
    /// Creates a struct descriptor.
    #[must_use]
    pub const fn new(
        name: &'static str,
        path: &'static str,
        fields: fn() -> Vec<FieldDescriptor>,
    ) -> Self {
        Self { name, path, fields }
    }

    /// Bare struct name.
    #[must_use]
    pub fn name(&self) -> &'static str {
        self.name
    }

    /// Full module path including the name.
    #[must_use]
    pub fn path(&self) -> &'static str {
        self.path
    }

    /// Stable key of this struct.
    #[must_use]
    pub fn key(&self) -> TypeKey {
        TypeKey(self.path)
    }

    /// Fields in declaration order.
    #[must_use]
    pub fn fields(&self) -> Vec<FieldDescriptor> {
        (self.fields)()
    }
}

impl PartialEq for StructDescriptor {
    fn eq(&self, other: &Self) -> bool {
        self.path == other.path
    }
}

impl Eq for StructDescriptor {}

impl fmt::Debug for StructDescriptor {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("StructDescriptor")
            .field("path", &self.path)
            .finish_non_exhaustive()
    }
}

/// A named struct field.
#[derive(Debug, Clone, PartialEq)]
pub struct FieldDescriptor {
    ident: &'static str,
    ty: TypeDescriptor,
}

impl FieldDescriptor {
    /// Creates a field descriptor. A raw identifier prefix is dropped.
    #[must_use]
    pub fn new(ident: &'static str, ty: TypeDescriptor) -> Self {
        let ident = ident.strip_prefix("r#").unwrap_or(ident);
        Self { ident, ty }
    }

    /// The Rust identifier, also the serde key.
    #[must_use]
    pub fn ident(&self) -> &'static str {
        self.ident
    }

    /// Field type.
    #[must_use]
    pub fn ty(&self) -> &TypeDescriptor {
        &self.ty
    }

    /// Name used in the schema and in argument payloads.
    #[must_use]
    pub fn schema_name(&self) -> String {
        field_name(self.ident)
    }
}

/// Maps a host identifier to its schema and payload name.
#[must_use]
pub fn field_name(ident: &str) -> String {
    ident.to_snake_case()
}

/// Types that can describe their own shape.
pub trait Describe: 'static {
    fn describe() -> TypeDescriptor;
}

macro_rules! describe_scalar {
    ($($ty:ty => $name:literal),* $(,)?) => {
        $(
            impl Describe for $ty {
                fn describe() -> TypeDescriptor {
                    TypeDescriptor::Scalar($name)
                }
            }
        )*
    };
}

describe_scalar! {
    String => "String",
    bool => "bool",
    i8 => "i8",
    i16 => "i16",
    i32 => "i32",
    i64 => "i64",
    i128 => "i128",
    isize => "isize",
    u8 => "u8",
    u16 => "u16",
    u32 => "u32",
    u64 => "u64",
    u128 => "u128",
    usize => "usize",
    f32 => "f32",
    f64 => "f64",
}

impl<T: Describe> Describe for Option<T> {
    fn describe() -> TypeDescriptor {
        TypeDescriptor::pointer(T::describe())
    }
}

impl<T: Describe> Describe for Vec<T> {
    fn describe() -> TypeDescriptor {
        TypeDescriptor::slice(T::describe())
    }
}

impl<T: Describe> Describe for Box<T> {
    fn describe() -> TypeDescriptor {
        T::describe()
    }
}

impl<T: Describe> Describe for Arc<T> {
    fn describe() -> TypeDescriptor {
        T::describe()
    }
}

/// Declares a struct and derives its [`Describe`] implementation.
///
/// Attributes, visibility and field types pass through unchanged. Schema
/// fields and payload keys both follow the Rust identifier, so serde renames
/// on the struct or its fields are rejected at compile time.
///
/// ```
/// use serde::{Deserialize, Serialize};
///
/// reflectql::schema_struct! {
///     #[derive(Debug, Clone, Default, Serialize, Deserialize)]
///     pub struct Tag {
///         pub title: String,
///         #[serde(default)]
///         pub weight: Option<i32>,
///     }
/// }
/// ```
///
/// ```compile_fail
/// use serde::{Deserialize, Serialize};
///
/// reflectql::schema_struct! {
///     #[derive(Debug, Clone, Default, Serialize, Deserialize)]
///     pub struct Tag {
///         #[serde(rename = "label")]
///         pub title: String,
///     }
/// }
/// ```
///
/// ```compile_fail
/// use serde::{Deserialize, Serialize};
///
/// reflectql::schema_struct! {
///     #[derive(Debug, Clone, Default, Serialize, Deserialize)]
///     #[serde(rename_all = "camelCase")]
///     pub struct Tag {
///         pub tag_title: String,
///     }
/// }
/// ```
#[macro_export]
macro_rules! schema_struct {
    (@attr serde($($inner:tt)*)) => {
        $crate::schema_struct!(@serde $($inner)*);
    };
    (@attr $($other:tt)*) => {};
    (@serde rename $($rest:tt)*) => {
        compile_error!("schema_struct! fields are keyed by their identifiers; serde rename is not supported");
    };
    (@serde rename_all $($rest:tt)*) => {
        compile_error!("schema_struct! fields are keyed by their identifiers; serde rename_all is not supported");
    };
    (@serde $first:tt $($rest:tt)*) => {
        $crate::schema_struct!(@serde $($rest)*);
    };
    (@serde) => {};
    (
        $(#[$($meta:tt)*])*
        $vis:vis struct $name:ident {
            $(
                $(#[$($fmeta:tt)*])*
                $fvis:vis $field:ident : $ty:ty
            ),* $(,)?
        }
    ) => {
        $( $crate::schema_struct!(@attr $($meta)*); )*
        $( $( $crate::schema_struct!(@attr $($fmeta)*); )* )*

        $(#[$($meta)*])*
        $vis struct $name {
            $(
                $(#[$($fmeta)*])*
                $fvis $field : $ty,
            )*
        }

        impl $crate::Describe for $name {
            fn describe() -> $crate::TypeDescriptor {
                $crate::TypeDescriptor::Struct($crate::StructDescriptor::new(
                    stringify!($name),
                    concat!(module_path!(), "::", stringify!($name)),
                    || {
                        vec![
                            $(
                                $crate::FieldDescriptor::new(
                                    stringify!($field),
                                    <$ty as $crate::Describe>::describe(),
                                ),
                            )*
                        ]
                    },
                ))
            }
        }
    };
}

//! Host type descriptors and scalar types.
//!
//! - [`descriptor`]: the [`Describe`] trait and the descriptor model
//! - [`scalars`]: the [`ScalarTable`] and the `DateTime`, `Decimal` and `Id`
//!   host types

pub mod descriptor;
pub mod scalars;

pub use descriptor::{Describe, FieldDescriptor, StructDescriptor, TypeDescriptor, TypeKey, field_name};
pub use scalars::{DateTime, Decimal, Id, ScalarDef, ScalarParser, ScalarTable};

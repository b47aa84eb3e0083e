//! Scalar table and the custom scalar host types.
//!
//! Every scalar descriptor is resolved through a [`ScalarTable`] keyed by host
//! type name. Each entry carries the schema scalar name, a parser used both
//! as the engine validator and by argument reflection, and the zero value
//! substituted for absent input or null output.
//!
//! Defaults:
//!
//! | Host types                          | Schema scalar |
//! |-------------------------------------|---------------|
//! | `String`                            | `String`      |
//! | `bool`                              | `Boolean`     |
//! | `i8`, `i16`, `i32`, `u8`, `u16`     | `Int`         |
//! | `i64`, `isize`, `u32`, `u64`, `usize` | `Int64`     |
//! | `f32`, `f64`                        | `Float`       |
//! | [`Id`]                              | `ID`          |
//! | [`DateTime`]                        | `DateTime`    |
//! | [`Decimal`]                         | `Decimal`     |

use std::collections::{BTreeMap, BTreeSet};
use std::fmt;
use std::sync::{Arc, LazyLock};

use async_graphql::dynamic::Scalar;
use async_graphql::{Number, Value};
use serde::{Deserialize, Deserializer, Serialize, Serializer};
use time::OffsetDateTime;
use time::format_description::well_known::Rfc3339;

use crate::error::{RegistrationError, value_kind};
use crate::types::descriptor::{Describe, TypeDescriptor};

/// Decimal literal: optional sign, digits, optional fraction and exponent.
static DECIMAL_REGEX: LazyLock<regex::Regex> = LazyLock::new(|| {
    regex::Regex::new(r"^-?(0|[1-9][0-9]*)(\.[0-9]+)?([eE][+-]?[0-9]+)?$")
        .expect("Invalid decimal regex")
});

/// Parses and normalizes an input value for a scalar.
pub type ScalarParser = Arc<dyn Fn(&Value) -> Result<Value, String> + Send + Sync>;

/// A leaf schema type.
#[derive(Clone)]
pub struct ScalarDef {
    name: String,
    description: Option<String>,
    builtin: bool,
    parse: ScalarParser,
    zero: Value,
}

impl ScalarDef {
    /// Creates a custom scalar.
    pub fn custom<F>(name: impl Into<String>, zero: Value, parse: F) -> Self
    where
        F: Fn(&Value) -> Result<Value, String> + Send + Sync + 'static,
    {
        Self {
            name: name.into(),
            description: None,
            builtin: false,
            parse: Arc::new(parse),
            zero,
        }
    }

    fn builtin(name: &str, zero: Value, parse: fn(&Value) -> Result<Value, String>) -> Self {
        Self {
            name: name.to_string(),
            description: None,
            builtin: true,
            parse: Arc::new(parse),
            zero,
        }
    }

    /// Sets the description shown in the schema.
    #[must_use]
    pub fn description(mut self, description: impl Into<String>) -> Self {
        self.description = Some(description.into());
        self
    }

    /// The built-in `String` scalar.
    #[must_use]
    pub fn string() -> Self {
        Self::builtin("String", Value::String(String::new()), parse_string)
    }

    /// The built-in `Int` scalar (32-bit).
    #[must_use]
    pub fn int() -> Self {
        Self::builtin("Int", Value::Number(Number::from(0_i64)), parse_int)
    }

    /// The built-in `Float` scalar.
    #[must_use]
    pub fn float() -> Self {
        Self::builtin("Float", Value::Number(Number::from(0_i64)), parse_float)
    }

    /// The built-in `Boolean` scalar.
    #[must_use]
    pub fn boolean() -> Self {
        Self::builtin("Boolean", Value::Boolean(false), parse_boolean)
    }

    /// The built-in `ID` scalar.
    #[must_use]
    pub fn id() -> Self {
        Self::builtin("ID", Value::String(String::new()), parse_id)
    }

    /// 64-bit integer, accepted as a number or a numeric string.
    #[must_use]
    pub fn int64() -> Self {
        Self::custom("Int64", Value::Number(Number::from(0_i64)), parse_int64)
            .description("A 64-bit integer, accepted as a number or a numeric string")
    }

    /// RFC 3339 timestamp.
    #[must_use]
    pub fn date_time() -> Self {
        Self::custom(
            "DateTime",
            Value::String("1970-01-01T00:00:00Z".to_string()),
            parse_date_time,
        )
        .description("An RFC 3339 timestamp")
    }

    /// Arbitrary precision decimal carried as a string.
    #[must_use]
    pub fn decimal() -> Self {
        Self::custom("Decimal", Value::String("0".to_string()), parse_decimal)
            .description("An arbitrary precision decimal, accepted as a number or a string")
    }

    /// Schema scalar name.
    #[must_use]
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Whether the engine already provides this scalar.
    #[must_use]
    pub fn is_builtin(&self) -> bool {
        self.builtin
    }

    /// Parses and normalizes an input value.
    ///
    /// # Errors
    ///
    /// Returns a message describing why the value was rejected.
    pub fn parse(&self, value: &Value) -> Result<Value, String> {
        (self.parse)(value)
    }

    /// Value used when the input is absent or an output is null.
    #[must_use]
    pub fn zero(&self) -> Value {
        self.zero.clone()
    }

    /// Engine definition for custom scalars. Built-ins return `None`.
    pub(crate) fn to_dynamic(&self) -> Option<Scalar> {
        if self.builtin {
            return None;
        }
        let parse = Arc::clone(&self.parse);
        let mut scalar = Scalar::new(self.name.as_str()).validator(move |value| parse(value).is_ok());
        if let Some(description) = &self.description {
            scalar = scalar.description(description.as_str());
        }
        Some(scalar)
    }
}

impl fmt::Debug for ScalarDef {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ScalarDef")
            .field("name", &self.name)
            .field("builtin", &self.builtin)
            .field("zero", &self.zero)
            .finish_non_exhaustive()
    }
}

fn parse_string(value: &Value) -> Result<Value, String> {
    match value {
        Value::String(_) => Ok(value.clone()),
        other => Err(format!("expected String, found {}", value_kind(other))),
    }
}

fn parse_int(value: &Value) -> Result<Value, String> {
    match value {
        Value::Number(n) => match n.as_i64() {
            Some(i) if i32::try_from(i).is_ok() => Ok(value.clone()),
            _ => Err(format!("Int value {n} is not a 32-bit integer")),
        },
        other => Err(format!("expected Int, found {}", value_kind(other))),
    }
}

fn parse_int64(value: &Value) -> Result<Value, String> {
    match value {
        Value::Number(n) if n.is_i64() || n.is_u64() => Ok(value.clone()),
        Value::String(s) => {
            let s = s.trim();
            s.parse::<i64>()
                .map(Number::from)
                .or_else(|_| s.parse::<u64>().map(Number::from))
                .map(Value::Number)
                .map_err(|_| format!("invalid Int64 value: '{s}'"))
        }
        other => Err(format!("expected Int64, found {}", value_kind(other))),
    }
}

fn parse_float(value: &Value) -> Result<Value, String> {
    match value {
        Value::Number(_) => Ok(value.clone()),
        other => Err(format!("expected Float, found {}", value_kind(other))),
    }
}

fn parse_boolean(value: &Value) -> Result<Value, String> {
    match value {
        Value::Boolean(_) => Ok(value.clone()),
        other => Err(format!("expected Boolean, found {}", value_kind(other))),
    }
}

fn parse_id(value: &Value) -> Result<Value, String> {
    match value {
        Value::String(_) => Ok(value.clone()),
        Value::Number(n) => Ok(Value::String(n.to_string())),
        other => Err(format!("expected ID, found {}", value_kind(other))),
    }
}

fn parse_date_time(value: &Value) -> Result<Value, String> {
    match value {
        Value::String(s) => OffsetDateTime::parse(s, &Rfc3339)
            .map(|_| value.clone())
            .map_err(|e| format!("invalid DateTime '{s}': {e}")),
        other => Err(format!("expected DateTime string, found {}", value_kind(other))),
    }
}

fn parse_decimal(value: &Value) -> Result<Value, String> {
    match value {
        Value::String(s) if DECIMAL_REGEX.is_match(s) => Ok(value.clone()),
        Value::String(s) => Err(format!("invalid Decimal value: '{s}'")),
        Value::Number(n) => Ok(Value::String(n.to_string())),
        other => Err(format!("expected Decimal, found {}", value_kind(other))),
    }
}

/// Scalars keyed by host type name.
#[derive(Debug, Clone)]
pub struct ScalarTable {
    scalars: BTreeMap<String, ScalarDef>,
    registered: BTreeSet<String>,
}

impl Default for ScalarTable {
    fn default() -> Self {
        let mut table = Self::empty();
        table.install("String", ScalarDef::string());
        table.install("bool", ScalarDef::boolean());
        for host in ["i8", "i16", "i32", "u8", "u16"] {
            table.install(host, ScalarDef::int());
        }
        for host in ["i64", "isize", "u32", "u64", "usize"] {
            table.install(host, ScalarDef::int64());
        }
        for host in ["f32", "f64"] {
            table.install(host, ScalarDef::float());
        }
        table.install("Id", ScalarDef::id());
        table.install("DateTime", ScalarDef::date_time());
        table.install("Decimal", ScalarDef::decimal());
        table
    }
}

impl ScalarTable {
    /// Creates a table holding the default scalars.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Creates a table with no scalars at all.
    #[must_use]
    pub fn empty() -> Self {
        Self {
            scalars: BTreeMap::new(),
            registered: BTreeSet::new(),
        }
    }

    fn install(&mut self, host: &str, def: ScalarDef) {
        self.scalars.insert(host.to_string(), def);
    }

    /// Registers a scalar for a host type, replacing any default.
    ///
    /// # Errors
    ///
    /// Returns [`RegistrationError::DuplicateScalar`] if the host type was
    /// already registered through this method.
    pub fn register(
        &mut self,
        host: impl Into<String>,
        def: ScalarDef,
    ) -> Result<(), RegistrationError> {
        let host = host.into();
        if !self.registered.insert(host.clone()) {
            return Err(RegistrationError::DuplicateScalar(host));
        }
        self.scalars.insert(host, def);
        Ok(())
    }

    /// Looks up a scalar by host type name.
    #[must_use]
    pub fn get(&self, host: &str) -> Option<&ScalarDef> {
        self.scalars.get(host)
    }

    /// Returns whether the host type is a scalar.
    #[must_use]
    pub fn contains(&self, host: &str) -> bool {
        self.scalars.contains_key(host)
    }

    /// Number of host types mapped.
    #[must_use]
    pub fn len(&self) -> usize {
        self.scalars.len()
    }

    /// Returns whether the table is empty.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.scalars.is_empty()
    }

    /// Entries as (host type name, scalar), ordered by host name.
    pub fn iter(&self) -> impl Iterator<Item = (&str, &ScalarDef)> {
        self.scalars.iter().map(|(host, def)| (host.as_str(), def))
    }

    pub(crate) fn dynamic_scalars(&self) -> Vec<Scalar> {
        let mut seen = BTreeSet::new();
        self.scalars
            .values()
            .filter(|def| seen.insert(def.name().to_string()))
            .filter_map(ScalarDef::to_dynamic)
            .collect()
    }
}

/// RFC 3339 timestamp host type, mapped to the `DateTime` scalar.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct DateTime(pub OffsetDateTime);

impl Default for DateTime {
    fn default() -> Self {
        Self(OffsetDateTime::UNIX_EPOCH)
    }
}

impl Serialize for DateTime {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        let text = self.0.format(&Rfc3339).map_err(serde::ser::Error::custom)?;
        serializer.serialize_str(&text)
    }
}

impl<'de> Deserialize<'de> for DateTime {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let text = String::deserialize(deserializer)?;
        OffsetDateTime::parse(&text, &Rfc3339)
            .map(Self)
            .map_err(serde::de::Error::custom)
    }
}

impl Describe for DateTime {
    fn describe() -> TypeDescriptor {
        TypeDescriptor::Scalar("DateTime")
    }
}

/// Decimal host type carried as its literal text, mapped to `Decimal`.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Decimal(pub String);

impl Default for Decimal {
    fn default() -> Self {
        Self("0".to_string())
    }
}

impl Describe for Decimal {
    fn describe() -> TypeDescriptor {
        TypeDescriptor::Scalar("Decimal")
    }
}

/// Opaque identifier, mapped to the built-in `ID` scalar.
#[derive(Debug, Clone, Default, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Id(pub String);

impl Describe for Id {
    fn describe() -> TypeDescriptor {
        TypeDescriptor::Scalar("Id")
    }
}

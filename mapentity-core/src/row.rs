//! Rows: named scalar fields plus an optional geometry.

use std::collections::BTreeMap;
use std::fmt;

use serde::{Deserialize, Serialize};

use crate::{SpatialGeometry, Timestamp};

/// Primary key of a row.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct EntityId(pub u64);

impl fmt::Display for EntityId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// A scalar value stored in a named field.
///
/// The export layer never interprets values beyond their textual and JSON
/// representations.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(untagged)]
pub enum FieldValue {
    /// Absent value.
    Null,
    /// Boolean flag.
    Bool(bool),
    /// Signed integer.
    Integer(i64),
    /// Floating point number.
    Float(f64),
    /// Free text.
    Text(String),
    /// Point in time.
    Timestamp(Timestamp),
    /// Many-valued field, e.g. a many-to-many relation.
    List(Vec<FieldValue>),
}

impl FieldValue {
    /// Whether the value is [`FieldValue::Null`].
    #[must_use]
    pub const fn is_null(&self) -> bool {
        matches!(self, Self::Null)
    }

    /// Convert a JSON value into a field value.
    ///
    /// Objects have no scalar counterpart and are kept as their JSON text.
    #[must_use]
    pub fn from_json(value: &serde_json::Value) -> Self {
        match value {
            serde_json::Value::Null => Self::Null,
            serde_json::Value::Bool(flag) => Self::Bool(*flag),
            serde_json::Value::Number(number) => number.as_i64().map_or_else(
                || number.as_f64().map_or(Self::Null, Self::Float),
                Self::Integer,
            ),
            serde_json::Value::String(text) => Self::Text(text.clone()),
            serde_json::Value::Array(items) => Self::List(items.iter().map(Self::from_json).collect()),
            serde_json::Value::Object(_) => Self::Text(value.to_string()),
        }
    }
}

/// Model-agnostic stringification used by the tabular exporters.
///
/// `Null` renders as the empty string, lists are joined with `", "` and
/// timestamps use RFC 3339.
impl fmt::Display for FieldValue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Null => Ok(()),
            Self::Bool(flag) => write!(f, "{flag}"),
            Self::Integer(number) => write!(f, "{number}"),
            Self::Float(number) => write!(f, "{number}"),
            Self::Text(text) => f.write_str(text),
            Self::Timestamp(at) => f.write_str(&at.to_rfc3339()),
            Self::List(items) => {
                for (index, item) in items.iter().enumerate() {
                    if index > 0 {
                        f.write_str(", ")?;
                    }
                    write!(f, "{item}")?;
                }
                Ok(())
            }
        }
    }
}

impl From<&str> for FieldValue {
    fn from(value: &str) -> Self {
        Self::Text(value.to_owned())
    }
}

impl From<String> for FieldValue {
    fn from(value: String) -> Self {
        Self::Text(value)
    }
}

impl From<i64> for FieldValue {
    fn from(value: i64) -> Self {
        Self::Integer(value)
    }
}

impl From<f64> for FieldValue {
    fn from(value: f64) -> Self {
        Self::Float(value)
    }
}

impl From<bool> for FieldValue {
    fn from(value: bool) -> Self {
        Self::Bool(value)
    }
}

impl From<Timestamp> for FieldValue {
    fn from(value: Timestamp) -> Self {
        Self::Timestamp(value)
    }
}

impl<T: Into<Self>> From<Option<T>> for FieldValue {
    fn from(value: Option<T>) -> Self {
        value.map_or(Self::Null, Into::into)
    }
}

/// One record of a model's queryset.
///
/// # Examples
/// ```
/// use geo::{Geometry, Point};
/// use mapentity_core::{EntityId, FieldValue, Row, SpatialGeometry, Srid};
///
/// let row = Row::new(EntityId(7))
///     .with_field("name", "Col de la Croix")
///     .with_geometry(SpatialGeometry::new(Geometry::Point(Point::new(6.0, 45.0)), Srid::WGS84));
///
/// assert_eq!(row.field("name"), Some(&FieldValue::from("Col de la Croix")));
/// assert_eq!(row.field("missing"), None);
/// assert!(row.geometry_field().is_some());
/// ```
#[derive(Debug, Clone, PartialEq)]
pub struct Row {
    /// Primary key.
    pub pk: EntityId,
    fields: BTreeMap<String, FieldValue>,
    geometry: Option<SpatialGeometry>,
}

impl Row {
    /// A row without fields or geometry.
    #[must_use]
    pub const fn new(pk: EntityId) -> Self {
        Self {
            pk,
            fields: BTreeMap::new(),
            geometry: None,
        }
    }

    /// Set a named field, replacing any previous value.
    #[must_use]
    pub fn with_field(mut self, name: impl Into<String>, value: impl Into<FieldValue>) -> Self {
        self.set_field(name, value);
        self
    }

    /// Attach the row's geometry.
    #[must_use]
    pub fn with_geometry(mut self, geometry: SpatialGeometry) -> Self {
        self.geometry = Some(geometry);
        self
    }

    /// Set a named field in place.
    pub fn set_field(&mut self, name: impl Into<String>, value: impl Into<FieldValue>) {
        self.fields.insert(name.into(), value.into());
    }

    /// Value of a named field.
    #[must_use]
    pub fn field(&self, name: &str) -> Option<&FieldValue> {
        self.fields.get(name)
    }

    /// Value of `name`, honouring a `{name}{suffix}` display override.
    ///
    /// Models expose presentation variants such as `name_csv_display`
    /// alongside raw fields; exporters prefer them when present. The
    /// primary key is available under `id` or `pk` when no field shadows it.
    #[must_use]
    pub fn display_value(&self, name: &str, suffix: &str) -> FieldValue {
        if let Some(value) = self.fields.get(&format!("{name}{suffix}")) {
            return value.clone();
        }
        match self.fields.get(name) {
            Some(value) => value.clone(),
            None if name == "id" || name == "pk" => FieldValue::Integer(
                i64::try_from(self.pk.0).unwrap_or(i64::MAX),
            ),
            None => FieldValue::Null,
        }
    }

    /// Iterate over fields in name order.
    pub fn fields(&self) -> impl Iterator<Item = (&str, &FieldValue)> {
        self.fields.iter().map(|(name, value)| (name.as_str(), value))
    }

    /// The geometry field, when the row has one.
    #[must_use]
    pub const fn geometry_field(&self) -> Option<&SpatialGeometry> {
        self.geometry.as_ref()
    }
}

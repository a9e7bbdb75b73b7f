//! In-memory feature collection: ordered geometry + attribute records
//! sharing one CRS and one attribute schema.

use std::fmt;

use chrono::{DateTime, FixedOffset, NaiveDate};
use geo::Geometry;
use serde_json::Value;

use crate::error::{EdwError, Result};
use crate::geo_core::{BoundingBox, Crs};

/// One attribute cell.
#[derive(Debug, Clone, PartialEq)]
pub enum AttributeValue {
    Null,
    Bool(bool),
    Integer(i64),
    Real(f64),
    Text(String),
    Date(NaiveDate),
    DateTime(DateTime<FixedOffset>),
}

impl AttributeValue {
    pub fn is_null(&self) -> bool {
        matches!(self, AttributeValue::Null)
    }

    pub fn as_f64(&self) -> Option<f64> {
        match self {
            AttributeValue::Integer(v) => Some(*v as f64),
            AttributeValue::Real(v) => Some(*v),
            _ => None,
        }
    }

    pub fn as_str(&self) -> Option<&str> {
        match self {
            AttributeValue::Text(s) => Some(s),
            _ => None,
        }
    }

    pub fn to_json(&self) -> Value {
        match self {
            AttributeValue::Null => Value::Null,
            AttributeValue::Bool(b) => Value::Bool(*b),
            AttributeValue::Integer(i) => Value::from(*i),
            // NaN/inf have no JSON form
            AttributeValue::Real(f) => serde_json::Number::from_f64(*f)
                .map(Value::Number)
                .unwrap_or(Value::Null),
            AttributeValue::Text(s) => Value::String(s.clone()),
            AttributeValue::Date(d) => Value::String(d.format("%Y-%m-%d").to_string()),
            AttributeValue::DateTime(dt) => Value::String(dt.to_rfc3339()),
        }
    }

    pub fn from_json(value: &Value) -> Self {
        match value {
            Value::Null => AttributeValue::Null,
            Value::Bool(b) => AttributeValue::Bool(*b),
            Value::Number(n) => n
                .as_i64()
                .map(AttributeValue::Integer)
                .or_else(|| n.as_f64().map(AttributeValue::Real))
                .unwrap_or(AttributeValue::Null),
            Value::String(s) => AttributeValue::Text(s.clone()),
            other => AttributeValue::Text(other.to_string()),
        }
    }

    /// Equality used by attribute filters: integers and reals compare numerically.
    pub fn loosely_equals(&self, other: &AttributeValue) -> bool {
        match (self.as_f64(), other.as_f64()) {
            (Some(a), Some(b)) => a == b,
            _ => self == other,
        }
    }
}

impl fmt::Display for AttributeValue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            AttributeValue::Null => f.write_str(""),
            AttributeValue::Bool(b) => write!(f, "{b}"),
            AttributeValue::Integer(i) => write!(f, "{i}"),
            AttributeValue::Real(r) => write!(f, "{r}"),
            AttributeValue::Text(s) => f.write_str(s),
            AttributeValue::Date(d) => write!(f, "{}", d.format("%Y-%m-%d")),
            AttributeValue::DateTime(dt) => write!(f, "{}", dt.to_rfc3339()),
        }
    }
}

impl From<&str> for AttributeValue {
    fn from(value: &str) -> Self {
        AttributeValue::Text(value.to_string())
    }
}

impl From<String> for AttributeValue {
    fn from(value: String) -> Self {
        AttributeValue::Text(value)
    }
}

impl From<i64> for AttributeValue {
    fn from(value: i64) -> Self {
        AttributeValue::Integer(value)
    }
}

impl From<i32> for AttributeValue {
    fn from(value: i32) -> Self {
        AttributeValue::Integer(value.into())
    }
}

impl From<f64> for AttributeValue {
    fn from(value: f64) -> Self {
        AttributeValue::Real(value)
    }
}

impl From<bool> for AttributeValue {
    fn from(value: bool) -> Self {
        AttributeValue::Bool(value)
    }
}

impl<T: Into<AttributeValue>> From<Option<T>> for AttributeValue {
    fn from(value: Option<T>) -> Self {
        value.map(Into::into).unwrap_or(AttributeValue::Null)
    }
}

/// A geometry (possibly missing) plus attributes aligned with the collection schema.
#[derive(Debug, Clone, PartialEq)]
pub struct Record {
    pub geometry: Option<Geometry<f64>>,
    pub attributes: Vec<AttributeValue>,
}

impl Record {
    pub fn new(geometry: Option<Geometry<f64>>, attributes: Vec<AttributeValue>) -> Self {
        Record {
            geometry,
            attributes,
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct FeatureCollection {
    /// Layer name (shapefile stem, geodatabase layer, or file name).
    pub name: String,
    pub crs: Option<Crs>,
    schema: Vec<String>,
    records: Vec<Record>,
}

impl FeatureCollection {
    pub fn new(name: impl Into<String>, crs: Option<Crs>, schema: Vec<String>) -> Self {
        FeatureCollection {
            name: name.into(),
            crs,
            schema,
            records: Vec::new(),
        }
    }

    /// Empty collection with the same name, CRS and schema.
    pub fn empty_like(&self) -> Self {
        FeatureCollection::new(self.name.clone(), self.crs.clone(), self.schema.clone())
    }

    pub fn schema(&self) -> &[String] {
        &self.schema
    }

    pub fn records(&self) -> &[Record] {
        &self.records
    }

    pub fn into_records(self) -> Vec<Record> {
        self.records
    }

    pub fn len(&self) -> usize {
        self.records.len()
    }

    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }

    pub fn iter(&self) -> std::slice::Iter<'_, Record> {
        self.records.iter()
    }

    /// Append a record; its attribute count must match the schema.
    pub fn push(&mut self, record: Record) -> Result<()> {
        if record.attributes.len() != self.schema.len() {
            return Err(EdwError::InvalidInput(format!(
                "record has {} attributes, schema of '{}' has {}",
                record.attributes.len(),
                self.name,
                self.schema.len()
            )));
        }
        self.records.push(record);
        Ok(())
    }

    pub fn has_field(&self, field: &str) -> bool {
        self.schema.iter().any(|f| f == field)
    }

    pub fn field_index(&self, field: &str) -> Result<usize> {
        self.schema
            .iter()
            .position(|f| f == field)
            .ok_or_else(|| EdwError::MissingField(field.to_string()))
    }

    pub fn value(&self, record: usize, field: &str) -> Result<&AttributeValue> {
        let idx = self.field_index(field)?;
        self.records
            .get(record)
            .map(|r| &r.attributes[idx])
            .ok_or_else(|| EdwError::InvalidInput(format!("record index {record} out of range")))
    }

    pub fn column(&self, field: &str) -> Result<impl Iterator<Item = &AttributeValue> + '_> {
        let idx = self.field_index(field)?;
        Ok(self.records.iter().map(move |r| &r.attributes[idx]))
    }

    /// Add `field`, or overwrite it when it already exists.
    pub fn set_column(&mut self, field: &str, values: Vec<AttributeValue>) -> Result<()> {
        if values.len() != self.records.len() {
            return Err(EdwError::InvalidInput(format!(
                "column '{field}' has {} values for {} records",
                values.len(),
                self.records.len()
            )));
        }

        match self.schema.iter().position(|f| f == field) {
            Some(idx) => {
                for (record, value) in self.records.iter_mut().zip(values) {
                    record.attributes[idx] = value;
                }
            }
            None => {
                self.schema.push(field.to_string());
                for (record, value) in self.records.iter_mut().zip(values) {
                    record.attributes.push(value);
                }
            }
        }
        Ok(())
    }

    /// Replace every geometry, keeping attributes. Used after reprojection.
    pub fn with_geometries(&self, geometries: Vec<Option<Geometry<f64>>>, crs: Option<Crs>) -> Result<Self> {
        if geometries.len() != self.records.len() {
            return Err(EdwError::InvalidInput(format!(
                "{} geometries for {} records",
                geometries.len(),
                self.records.len()
            )));
        }
        let records = self
            .records
            .iter()
            .zip(geometries)
            .map(|(r, geometry)| Record::new(geometry, r.attributes.clone()))
            .collect();
        Ok(FeatureCollection {
            name: self.name.clone(),
            crs,
            schema: self.schema.clone(),
            records,
        })
    }

    /// Keep the records for which `keep` returns true.
    pub fn filter<F>(&self, mut keep: F) -> Self
    where
        F: FnMut(&Record) -> bool,
    {
        let mut out = self.empty_like();
        out.records = self.records.iter().filter(|r| keep(*r)).cloned().collect();
        out
    }

    /// First `n` records.
    pub fn head(&self, n: usize) -> Self {
        let mut out = self.empty_like();
        out.records = self.records.iter().take(n).cloned().collect();
        out
    }

    /// Union of the bounds of all non-null geometries.
    pub fn total_bounds(&self) -> Option<BoundingBox> {
        self.records
            .iter()
            .filter_map(|r| r.geometry.as_ref().and_then(BoundingBox::of_geometry))
            .reduce(|acc, b| acc.union(&b))
    }
}

impl<'a> IntoIterator for &'a FeatureCollection {
    type Item = &'a Record;
    type IntoIter = std::slice::Iter<'a, Record>;

    fn into_iter(self) -> Self::IntoIter {
        self.records.iter()
    }
}

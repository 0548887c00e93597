// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

//! Typed feature attributes.
//!
//! Attribute values are classified once when a feature is ingested, so the
//! projectors never have to guess whether `"35"` is a number or a label.

use std::collections::BTreeMap;
use std::fmt;

use serde::{Deserialize, Serialize};

/// A typed attribute value.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum AttributeValue {
    Null,
    Integer(i64),
    Number(f64),
    Text(String),
}

impl AttributeValue {
    /// Classifies raw text coming from a data provider.
    ///
    /// Blank text is `Null`, integral text is `Integer`, other finite numeric
    /// text is `Number`, anything else is kept as trimmed `Text`.
    pub fn from_raw(raw: &str) -> Self {
        let trimmed = raw.trim();
        if trimmed.is_empty() {
            return AttributeValue::Null;
        }
        if let Ok(i) = trimmed.parse::<i64>() {
            return AttributeValue::Integer(i);
        }
        match fast_float::parse::<f64, _>(trimmed) {
            Ok(v) if v.is_finite() => AttributeValue::Number(v),
            _ => AttributeValue::Text(trimmed.to_string()),
        }
    }

    /// Numeric view of the value (numeric text is parsed leniently)
    pub fn as_f64(&self) -> Option<f64> {
        match self {
            AttributeValue::Integer(i) => Some(*i as f64),
            AttributeValue::Number(v) if v.is_finite() => Some(*v),
            AttributeValue::Text(s) => match fast_float::parse::<f64, _>(s.trim()) {
                Ok(v) if v.is_finite() => Some(v),
                _ => None,
            },
            _ => None,
        }
    }

    /// Text view of the value, `None` for `Null`
    pub fn as_text(&self) -> Option<String> {
        match self {
            AttributeValue::Null => None,
            other => Some(other.to_string()),
        }
    }

    #[inline]
    pub fn is_null(&self) -> bool {
        matches!(self, AttributeValue::Null)
    }
}

impl fmt::Display for AttributeValue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            AttributeValue::Null => write!(f, "NULL"),
            AttributeValue::Integer(i) => write!(f, "{}", i),
            AttributeValue::Number(v) => write!(f, "{}", v),
            AttributeValue::Text(s) => write!(f, "{}", s),
        }
    }
}

impl From<f64> for AttributeValue {
    fn from(v: f64) -> Self {
        AttributeValue::Number(v)
    }
}

impl From<i64> for AttributeValue {
    fn from(v: i64) -> Self {
        AttributeValue::Integer(v)
    }
}

impl From<&str> for AttributeValue {
    fn from(v: &str) -> Self {
        AttributeValue::Text(v.to_string())
    }
}

impl From<String> for AttributeValue {
    fn from(v: String) -> Self {
        AttributeValue::Text(v)
    }
}

/// Field name → value map of a single feature.
///
/// Ordered so that serialized output and cache keys are deterministic.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Attributes {
    fields: BTreeMap<String, AttributeValue>,
}

impl Attributes {
    pub fn new() -> Self {
        Self::default()
    }

    /// Builds attributes from raw provider text, classifying every value
    pub fn from_raw<'a, I>(pairs: I) -> Self
    where
        I: IntoIterator<Item = (&'a str, &'a str)>,
    {
        pairs
            .into_iter()
            .map(|(k, v)| (k.to_string(), AttributeValue::from_raw(v)))
            .collect()
    }

    pub fn insert(&mut self, field: impl Into<String>, value: impl Into<AttributeValue>) {
        self.fields.insert(field.into(), value.into());
    }

    /// Builder-style insert
    pub fn with(mut self, field: impl Into<String>, value: impl Into<AttributeValue>) -> Self {
        self.insert(field, value);
        self
    }

    /// Looks up a field, falling back to a case-insensitive match
    pub fn get(&self, field: &str) -> Option<&AttributeValue> {
        self.fields.get(field).or_else(|| {
            self.fields
                .iter()
                .find(|(k, _)| k.eq_ignore_ascii_case(field))
                .map(|(_, v)| v)
        })
    }

    /// Numeric value of a field, `None` when absent, null or non-numeric
    pub fn number(&self, field: &str) -> Option<f64> {
        self.get(field).and_then(AttributeValue::as_f64)
    }

    /// Text value of a field, `None` when absent or null
    pub fn text(&self, field: &str) -> Option<String> {
        self.get(field).and_then(AttributeValue::as_text)
    }

    pub fn contains(&self, field: &str) -> bool {
        self.get(field).is_some()
    }

    pub fn len(&self) -> usize {
        self.fields.len()
    }

    pub fn is_empty(&self) -> bool {
        self.fields.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, &AttributeValue)> {
        self.fields.iter().map(|(k, v)| (k.as_str(), v))
    }
}

impl FromIterator<(String, AttributeValue)> for Attributes {
    fn from_iter<T: IntoIterator<Item = (String, AttributeValue)>>(iter: T) -> Self {
        Self {
            fields: iter.into_iter().collect(),
        }
    }
}

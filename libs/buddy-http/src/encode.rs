//! Request option encoding helpers.
//!
//! Option records are plain `serde` structs. JSON bodies go through
//! `serde_json`, query strings through `serde_urlencoded`. Fields that should
//! be left out when unset carry `skip_serializing_if` with one of the
//! predicates below, and fields that must distinguish "unset" from an
//! explicit `null` use [`Nullable`].

use crate::error::HttpError;
use serde::{Deserialize, Deserializer, Serialize, Serializer};

/// Default page size for auto-paginated listings
pub const DEFAULT_PER_PAGE: u32 = 30;

/// Tri-state JSON field: omitted, explicit `null`, or a value.
///
/// Pair with `#[serde(default, skip_serializing_if = "Nullable::is_absent")]`.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub enum Nullable<T> {
    #[default]
    Absent,
    Null,
    Value(T),
}

impl<T> Nullable<T> {
    #[must_use]
    pub fn is_absent(&self) -> bool {
        matches!(self, Self::Absent)
    }

    /// `None` maps to an explicit `null`
    #[must_use]
    pub fn from_option(value: Option<T>) -> Self {
        value.map_or(Self::Null, Self::Value)
    }

    /// The value, if one is set
    #[must_use]
    pub fn value(self) -> Option<T> {
        match self {
            Self::Value(value) => Some(value),
            Self::Absent | Self::Null => None,
        }
    }
}

impl<T> From<T> for Nullable<T> {
    fn from(value: T) -> Self {
        Self::Value(value)
    }
}

impl<T: Serialize> Serialize for Nullable<T> {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        match self {
            Self::Value(value) => value.serialize(serializer),
            Self::Absent | Self::Null => serializer.serialize_none(),
        }
    }
}

impl<'de, T: Deserialize<'de>> Deserialize<'de> for Nullable<T> {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        Ok(Self::from_option(Option::<T>::deserialize(deserializer)?))
    }
}

/// `skip_serializing_if` predicate for numeric and boolean fields
#[must_use]
pub fn is_zero<T: Default + PartialEq>(value: &T) -> bool {
    *value == T::default()
}

/// `skip_serializing_if` predicate for string fields
#[must_use]
pub fn is_empty_str(value: &str) -> bool {
    value.is_empty()
}

/// Listing options with the page cursor appended.
#[derive(Debug, Clone, Serialize)]
pub struct Paged<'a, O: Serialize> {
    #[serde(flatten)]
    pub options: &'a O,
    pub page: u32,
    pub per_page: u32,
}

impl<'a, O: Serialize> Paged<'a, O> {
    #[must_use]
    pub fn new(options: &'a O, page: u32) -> Self {
        Self {
            options,
            page,
            per_page: DEFAULT_PER_PAGE,
        }
    }
}

/// Encode an options record as a query string (without the leading `?`).
///
/// # Errors
///
/// [`HttpError::QueryEncode`] when the record is not a flat map of scalars.
pub fn encode_query<O: Serialize + ?Sized>(options: &O) -> Result<String, HttpError> {
    Ok(serde_urlencoded::to_string(options)?)
}

/// Encode a JSON request body.
///
/// # Errors
///
/// [`HttpError::Encode`] when serialization fails.
pub fn encode_json<B: Serialize + ?Sized>(body: &B) -> Result<Vec<u8>, HttpError> {
    serde_json::to_vec(body).map_err(HttpError::Encode)
}

#[cfg(test)]
#[cfg_attr(coverage_nightly, coverage(off))]
mod tests {
    use super::*;
    use serde_json::json;

    #[derive(Serialize, Default)]
    struct ProjectPatch {
        #[serde(skip_serializing_if = "is_empty_str")]
        display_name: String,
        #[serde(default, skip_serializing_if = "Nullable::is_absent")]
        integration: Nullable<String>,
        #[serde(skip_serializing_if = "is_zero")]
        timeout: u32,
    }

    #[derive(Serialize, Default)]
    struct ListOptions {
        #[serde(skip_serializing_if = "Option::is_none")]
        status: Option<String>,
    }

    #[test]
    fn test_nullable_tri_state() {
        let absent = serde_json::to_value(ProjectPatch::default()).unwrap();
        assert_eq!(absent, json!({}));

        let null = serde_json::to_value(ProjectPatch {
            integration: Nullable::Null,
            ..Default::default()
        })
        .unwrap();
        assert_eq!(null, json!({ "integration": null }));

        let set = serde_json::to_value(ProjectPatch {
            display_name: "Web".to_owned(),
            integration: "gh".to_owned().into(),
            timeout: 60,
        })
        .unwrap();
        assert_eq!(
            set,
            json!({ "display_name": "Web", "integration": "gh", "timeout": 60 })
        );
    }

    #[test]
    fn test_nullable_deserialize() {
        #[derive(Deserialize)]
        struct Doc {
            #[serde(default)]
            value: Nullable<u32>,
        }

        let doc: Doc = serde_json::from_str("{}").unwrap();
        assert_eq!(doc.value, Nullable::Absent);
        let doc: Doc = serde_json::from_str(r#"{"value":null}"#).unwrap();
        assert_eq!(doc.value, Nullable::Null);
        let doc: Doc = serde_json::from_str(r#"{"value":3}"#).unwrap();
        assert_eq!(doc.value.value(), Some(3));
    }

    #[test]
    fn test_paged_query() {
        let options = ListOptions {
            status: Some("ACTIVE".to_owned()),
        };
        let query = encode_query(&Paged::new(&options, 2)).unwrap();
        assert_eq!(query, "status=ACTIVE&page=2&per_page=30");

        let query = encode_query(&Paged::new(&ListOptions::default(), 1)).unwrap();
        assert_eq!(query, "page=1&per_page=30");
    }
}

//! Typed context parameters
//!
//! The context is a tagged-value store: every value carries its
//! [`ParamType`], and stages declare the `(key, type)` pairs they need.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::BTreeSet;
use std::fmt;

use super::temp_file::TempFile;
use crate::fingerprint::Fingerprint;

/// Well-known context keys
pub mod keys {
    /// Client-supplied upload identifier
    pub const UPLOAD_ID: &str = "uploadId";
    pub const FINGERPRINT: &str = "fingerprint";
    /// Number of slices the client announced
    pub const SLICE_COUNT: &str = "sliceCount";
    /// Job scratch directory holding received slices
    pub const SLICE_DIR: &str = "sliceDir";
    /// Name of the assembled file
    pub const FILE_NAME: &str = "fileName";
    /// Time of the last client interaction
    pub const LAST_ACTIVE_AT: &str = "lastActiveAt";
    /// Output files of the last stage, consumed by the next one
    pub const FILES: &str = "files";
    /// Hex SHA-256 of the merged file
    pub const CHECKSUM: &str = "checksum";
    pub const BUCKET: &str = "bucket";
    pub const OBJECT_PREFIX: &str = "objectPrefix";
    /// Object keys written by the transport stage
    pub const STORED_KEYS: &str = "storedKeys";
    /// Slice indices received so far
    pub const RECEIVED_SLICES: &str = "receivedSlices";
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum ParamType {
    Text,
    TextList,
    Integer,
    Flag,
    Fingerprint,
    Files,
    Timestamp,
    Indices,
}

impl fmt::Display for ParamType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            ParamType::Text => "text",
            ParamType::TextList => "text list",
            ParamType::Integer => "integer",
            ParamType::Flag => "flag",
            ParamType::Fingerprint => "fingerprint",
            ParamType::Files => "files",
            ParamType::Timestamp => "timestamp",
            ParamType::Indices => "index set",
        };
        f.write_str(name)
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ParamValue {
    Text(String),
    TextList(Vec<String>),
    Integer(i64),
    Flag(bool),
    Fingerprint(Fingerprint),
    Files(Vec<TempFile>),
    Timestamp(DateTime<Utc>),
    Indices(BTreeSet<u64>),
}

impl ParamValue {
    pub fn param_type(&self) -> ParamType {
        match self {
            ParamValue::Text(_) => ParamType::Text,
            ParamValue::TextList(_) => ParamType::TextList,
            ParamValue::Integer(_) => ParamType::Integer,
            ParamValue::Flag(_) => ParamType::Flag,
            ParamValue::Fingerprint(_) => ParamType::Fingerprint,
            ParamValue::Files(_) => ParamType::Files,
            ParamValue::Timestamp(_) => ParamType::Timestamp,
            ParamValue::Indices(_) => ParamType::Indices,
        }
    }

    pub fn as_text(&self) -> Option<&str> {
        match self {
            ParamValue::Text(s) => Some(s),
            _ => None,
        }
    }

    pub fn as_text_list(&self) -> Option<&[String]> {
        match self {
            ParamValue::TextList(items) => Some(items),
            _ => None,
        }
    }

    pub fn as_integer(&self) -> Option<i64> {
        match self {
            ParamValue::Integer(n) => Some(*n),
            _ => None,
        }
    }

    pub fn as_fingerprint(&self) -> Option<&Fingerprint> {
        match self {
            ParamValue::Fingerprint(fp) => Some(fp),
            _ => None,
        }
    }

    pub fn as_timestamp(&self) -> Option<DateTime<Utc>> {
        match self {
            ParamValue::Timestamp(ts) => Some(*ts),
            _ => None,
        }
    }

    pub fn as_indices(&self) -> Option<&BTreeSet<u64>> {
        match self {
            ParamValue::Indices(set) => Some(set),
            _ => None,
        }
    }
}

impl From<&str> for ParamValue {
    fn from(value: &str) -> Self {
        ParamValue::Text(value.to_string())
    }
}

impl From<String> for ParamValue {
    fn from(value: String) -> Self {
        ParamValue::Text(value)
    }
}

impl From<i64> for ParamValue {
    fn from(value: i64) -> Self {
        ParamValue::Integer(value)
    }
}

impl From<bool> for ParamValue {
    fn from(value: bool) -> Self {
        ParamValue::Flag(value)
    }
}

impl From<Fingerprint> for ParamValue {
    fn from(value: Fingerprint) -> Self {
        ParamValue::Fingerprint(value)
    }
}

impl From<Vec<TempFile>> for ParamValue {
    fn from(value: Vec<TempFile>) -> Self {
        ParamValue::Files(value)
    }
}

impl From<DateTime<Utc>> for ParamValue {
    fn from(value: DateTime<Utc>) -> Self {
        ParamValue::Timestamp(value)
    }
}

impl From<BTreeSet<u64>> for ParamValue {
    fn from(value: BTreeSet<u64>) -> Self {
        ParamValue::Indices(value)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::fingerprint::Mapper;

    #[test]
    fn values_report_their_type() {
        assert_eq!(ParamValue::from("abc").param_type(), ParamType::Text);
        assert_eq!(ParamValue::from(3_i64).param_type(), ParamType::Integer);
        assert_eq!(ParamValue::from(true).param_type(), ParamType::Flag);
        assert_eq!(
            ParamValue::from(Mapper::identity().compute("id")).param_type(),
            ParamType::Fingerprint
        );
        assert_eq!(ParamValue::from(Vec::<TempFile>::new()).param_type(), ParamType::Files);
        assert_eq!(ParamValue::from(Utc::now()).param_type(), ParamType::Timestamp);
        assert_eq!(ParamValue::from(BTreeSet::from([1_u64])).param_type(), ParamType::Indices);
    }

    #[test]
    fn accessors_reject_other_variants() {
        let value = ParamValue::Integer(7);
        assert_eq!(value.as_integer(), Some(7));
        assert_eq!(value.as_text(), None);
        assert!(value.as_fingerprint().is_none());
    }
}

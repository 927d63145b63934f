//! RigPath parsing and formatting.
//!
//! Grammar (simple, host-agnostic):
//!   namespace/.../target.field[.subfield]
//! - '/' separates namespace segments (side, region, ...)
//! - the last '/'-separated segment holds the `target` node name and
//!   optional '.'-separated fields (a channel family or pose slot)
//!   Examples:
//!   "l/hind/kneePush01.translate" -> namespaces=["l","hind"],
//!       target="kneePush01", fields=["translate"]
//!   "l/hind/kneeTwist01.pose02"   -> pose-slot weight probe on the driver
//!
//! RigPath is intentionally string-based; host adapters resolve it into
//! engine-specific bindings.

use serde::{de, Deserialize, Deserializer, Serialize, Serializer};
use std::fmt;
use std::str::FromStr;
use thiserror::Error;

#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum PathError {
    #[error("empty path")]
    Empty,
    #[error("invalid rig path: {0}")]
    Invalid(String),
}

#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct RigPath {
    /// Namespace segments preceding the target (may be empty)
    pub namespaces: Vec<String>,
    /// Target node name
    pub target: String,
    /// Ordered field selectors on the target (may be empty)
    pub fields: Vec<String>,
}

impl RigPath {
    pub fn new(namespaces: Vec<String>, target: impl Into<String>, fields: Vec<String>) -> Self {
        Self {
            namespaces,
            target: target.into(),
            fields,
        }
    }

    /// Parse a path string according to the grammar above.
    pub fn parse(s: &str) -> Result<Self, PathError> {
        if s.is_empty() {
            return Err(PathError::Empty);
        }
        let mut parts: Vec<&str> = s.split('/').collect();
        if parts.iter().any(|seg| seg.is_empty()) {
            return Err(PathError::Invalid("empty namespace segment".into()));
        }
        let last = parts.pop().unwrap();
        let mut last_parts: Vec<&str> = last.split('.').collect();
        let target = last_parts.remove(0);
        if target.is_empty() {
            return Err(PathError::Invalid("empty target name".into()));
        }
        let fields: Vec<String> = last_parts.iter().map(|s| s.to_string()).collect();
        if fields.iter().any(|seg| seg.is_empty()) {
            return Err(PathError::Invalid("empty field segment".into()));
        }
        let all_segments = parts
            .iter()
            .copied()
            .chain(std::iter::once(target))
            .chain(last_parts.iter().copied());
        for seg in all_segments {
            if seg.chars().any(char::is_whitespace) {
                return Err(PathError::Invalid(format!(
                    "segment contains whitespace: {seg:?}"
                )));
            }
        }
        Ok(RigPath {
            namespaces: parts.into_iter().map(|s| s.to_string()).collect(),
            target: target.to_string(),
            fields,
        })
    }

    /// The path with `field` appended to the selector list.
    pub fn with_field(&self, field: impl Into<String>) -> Self {
        let mut fields = self.fields.clone();
        fields.push(field.into());
        Self {
            namespaces: self.namespaces.clone(),
            target: self.target.clone(),
            fields,
        }
    }

    /// The bare node path with all field selectors stripped.
    pub fn node(&self) -> Self {
        Self {
            namespaces: self.namespaces.clone(),
            target: self.target.clone(),
            fields: Vec::new(),
        }
    }

    pub fn target_name(&self) -> &str {
        &self.target
    }

    pub fn fields(&self) -> impl Iterator<Item = &str> {
        self.fields.iter().map(|s| s.as_str())
    }
}

impl fmt::Display for RigPath {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let mut parts: Vec<String> = self.namespaces.clone();
        if self.fields.is_empty() {
            parts.push(self.target.clone());
        } else {
            let mut last = self.target.clone();
            last.push('.');
            last.push_str(&self.fields.join("."));
            parts.push(last);
        }
        f.write_str(&parts.join("/"))
    }
}

impl FromStr for RigPath {
    type Err = PathError;
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        RigPath::parse(s)
    }
}

// Serde support: serialize as string, deserialize from string.
impl Serialize for RigPath {
    fn serialize<S>(&self, serializer: S) -> Result<S::Ok, S::Error>
    where
        S: Serializer,
    {
        serializer.serialize_str(&self.to_string())
    }
}

impl<'de> Deserialize<'de> for RigPath {
    fn deserialize<D>(deserializer: D) -> Result<RigPath, D::Error>
    where
        D: Deserializer<'de>,
    {
        let s = String::deserialize(deserializer)?;
        RigPath::parse(&s).map_err(de::Error::custom)
    }
}

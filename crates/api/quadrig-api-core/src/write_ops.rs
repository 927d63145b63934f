//! Write operations produced by the corrective engine to describe channel
//! writes onto named target nodes.
//!
//! A WriteOp serializes to JSON as:
//!   { "path": "l/hind/kneePush01.translate", "value": { "type": "Vec3", "data": [..] } }
//!
//! WriteBatch is a simple Vec<WriteOp> with helpers; the host applies one
//! batch per evaluation pass.

use crate::{path::RigPath, value::Value};
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct WriteOp {
    pub path: RigPath,
    pub value: Value,
}

impl WriteOp {
    pub fn new(path: RigPath, value: Value) -> Self {
        Self { path, value }
    }
}

/// A batch of channel writes emitted by one evaluation pass.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct WriteBatch(pub Vec<WriteOp>);

impl WriteBatch {
    pub fn new() -> Self {
        WriteBatch(Vec::new())
    }

    pub fn push(&mut self, op: WriteOp) {
        self.0.push(op);
    }

    pub fn extend(&mut self, other: impl IntoIterator<Item = WriteOp>) {
        self.0.extend(other);
    }

    pub fn iter(&self) -> impl Iterator<Item = &WriteOp> {
        self.0.iter()
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    pub fn into_vec(self) -> Vec<WriteOp> {
        self.0
    }

    /// Last write for `path`, if any. Later writes supersede earlier ones.
    pub fn find(&self, path: &RigPath) -> Option<&Value> {
        self.0
            .iter()
            .rev()
            .find(|op| &op.path == path)
            .map(|op| &op.value)
    }
}

impl IntoIterator for WriteBatch {
    type Item = WriteOp;
    type IntoIter = std::vec::IntoIter<WriteOp>;
    fn into_iter(self) -> Self::IntoIter {
        self.0.into_iter()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn batch_json_round_trip() {
        let mut batch = WriteBatch::new();
        batch.push(WriteOp::new(
            RigPath::parse("l/hind/kneePush01.translate").unwrap(),
            Value::vec3(0.5, 0.0, 0.0),
        ));
        let json = serde_json::to_string(&batch).unwrap();
        let back: WriteBatch = serde_json::from_str(&json).unwrap();
        assert_eq!(batch, back);
    }

    #[test]
    fn find_prefers_last_write() {
        let path = RigPath::parse("l/hind/kneePush01.scale").unwrap();
        let mut batch = WriteBatch::new();
        batch.push(WriteOp::new(path.clone(), Value::vec3(1.0, 1.0, 1.0)));
        batch.push(WriteOp::new(path.clone(), Value::vec3(1.2, 1.0, 1.0)));
        assert_eq!(batch.find(&path), Some(&Value::vec3(1.2, 1.0, 1.0)));
    }
}

//! Mutable evaluation state for a corrective network.

use hashbrown::HashMap;
use quadrig_api_core::{RigPath, Transform, Value, WriteBatch};

use crate::error::CorrectiveError;
use crate::rbf::{RbfState, SolverConfig};
use crate::types::NodeId;

/// Holds staged driver inputs, per-node outputs, the write batch produced
/// by the sink nodes and cached solver state. Reused across evaluations so
/// expensive solves only rerun when their pose set or policy changes.
#[derive(Debug, Default)]
pub struct NetworkRuntime {
    inputs: HashMap<RigPath, Value>,
    outputs: HashMap<NodeId, HashMap<String, Value>>,
    pub writes: WriteBatch,
    solver_states: HashMap<NodeId, RbfState>,
}

impl NetworkRuntime {
    pub fn new() -> Self {
        Self::default()
    }

    /// Stage a driver value before evaluation. Paths are exact: scalar
    /// drivers stage per-channel fields, frame drivers stage the node path.
    pub fn set_input(&mut self, path: RigPath, value: Value) {
        self.inputs.insert(path, value);
    }

    pub fn input(&self, path: &RigPath) -> Option<&Value> {
        self.inputs.get(path)
    }

    pub fn clear_inputs(&mut self) {
        self.inputs.clear();
    }

    pub fn output(&self, node_id: &str, key: &str) -> Option<&Value> {
        self.outputs.get(node_id).and_then(|m| m.get(key))
    }

    pub(crate) fn set_output(&mut self, node_id: &NodeId, key: impl Into<String>, value: Value) {
        self.outputs
            .entry(node_id.clone())
            .or_default()
            .insert(key.into(), value);
    }

    pub(crate) fn begin_pass(&mut self, live_nodes: &[NodeId]) {
        self.outputs.clear();
        self.writes = WriteBatch::new();
        // Drop solver caches for nodes that no longer exist.
        self.solver_states
            .retain(|id, _| live_nodes.iter().any(|n| n == id));
    }

    /// Cached solver state for `node_id`, re-solved when `hash` differs
    /// from the cached solve.
    pub(crate) fn rbf_state(
        &mut self,
        node_id: &NodeId,
        hash: u64,
        poses: &[Transform],
        config: &SolverConfig,
    ) -> Result<&RbfState, CorrectiveError> {
        let stale = self
            .solver_states
            .get(node_id)
            .map(|s| s.hash != hash)
            .unwrap_or(true);
        if stale {
            let state = RbfState::solve(hash, poses, config)?;
            self.solver_states.insert(node_id.clone(), state);
        }
        Ok(&self.solver_states[node_id])
    }
}

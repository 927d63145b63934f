//! Topological ordering over a corrective network.
//!
//! Evaluation order follows data dependency, not authoring order. A cycle
//! is a structural defect (the builder already refuses to let a target
//! become a driver), so ordering failure is a hard error.

use crate::error::CorrectiveError;
use crate::types::{NodeId, NodeSpec};
use hashbrown::{HashMap, HashSet};
use std::collections::VecDeque;

pub fn topo_order(nodes: &[NodeSpec]) -> Result<Vec<NodeId>, CorrectiveError> {
    let known: HashSet<&str> = nodes.iter().map(|n| n.id.as_str()).collect();
    let mut indeg: HashMap<NodeId, usize> = HashMap::new();
    let mut adj: HashMap<NodeId, Vec<NodeId>> = HashMap::new();

    for n in nodes {
        indeg.entry(n.id.clone()).or_insert(0);
        for conn in n.inputs.values() {
            // Connections to nodes outside the spec read as defaults and
            // do not constrain ordering.
            if !known.contains(conn.node_id.as_str()) {
                continue;
            }
            adj.entry(conn.node_id.clone()).or_default().push(n.id.clone());
            *indeg.entry(n.id.clone()).or_default() += 1;
        }
    }

    let mut queue: VecDeque<NodeId> = nodes
        .iter()
        .filter(|n| indeg.get(n.id.as_str()).copied().unwrap_or(0) == 0)
        .map(|n| n.id.clone())
        .collect();

    let mut order = Vec::with_capacity(nodes.len());
    while let Some(id) = queue.pop_front() {
        if let Some(next) = adj.get(id.as_str()) {
            for v in next {
                if let Some(d) = indeg.get_mut(v.as_str()) {
                    *d -= 1;
                    if *d == 0 {
                        queue.push_back(v.clone());
                    }
                }
            }
        }
        order.push(id);
    }

    if order.len() != indeg.len() {
        return Err(CorrectiveError::CycleDetected);
    }
    Ok(order)
}

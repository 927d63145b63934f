//! Network evaluation.
//!
//! Stage driver values on a [`NetworkRuntime`], then call [`evaluate_all`]
//! with the network spec. Nodes run in topological order; sink nodes append
//! to the runtime's write batch, which the host applies to its scene.

mod eval_node;
mod network_runtime;

#[cfg(test)]
mod tests;

pub use network_runtime::NetworkRuntime;

use crate::error::CorrectiveError;
use crate::topo::topo_order;
use crate::types::{NetworkSpec, NodeId};

/// Evaluate every node once. Outputs and writes from the previous pass are
/// discarded; cached solver state survives while its node does.
pub fn evaluate_all(
    network: &NetworkSpec,
    runtime: &mut NetworkRuntime,
) -> Result<(), CorrectiveError> {
    let order: Vec<NodeId> = topo_order(&network.nodes)?;
    runtime.begin_pass(&order);

    for id in &order {
        let node = network
            .node(id)
            .ok_or_else(|| CorrectiveError::Solver(format!("unknown node id {id}")))?;
        eval_node::eval_node(node, runtime)?;
    }
    Ok(())
}

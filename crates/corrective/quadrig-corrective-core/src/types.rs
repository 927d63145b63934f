//! Corrective network specification types.
//!
//! A network is a flat list of nodes wired by name, mirroring how the
//! corrective artifacts live in a host scene: per-pose mapper and gain
//! nodes, shared combiner nodes, and sink nodes that publish channels on
//! the target. The builder owns all wiring; evaluation walks the spec in
//! topological order.

use hashbrown::HashMap;
use quadrig_api_core::{Channel, RigPath, Transform};
use serde::{Deserialize, Serialize};

use crate::calibration::PoseDelta;
use crate::rbf::SolverConfig;

pub type NodeId = String;

/// A (position, value) control point in a normalized piecewise-linear
/// mapping; positions run 0..1 across the ramp domain.
#[derive(Clone, Copy, Debug, Serialize, Deserialize, PartialEq)]
pub struct Breakpoint {
    pub position: f32,
    pub value: f32,
}

impl Breakpoint {
    pub fn new(position: f32, value: f32) -> Self {
        Self { position, value }
    }
}

fn default_sign() -> f32 {
    1.0
}

#[derive(Clone, Debug, Serialize, Deserialize, PartialEq)]
#[serde(tag = "kind", rename_all = "camelCase")]
pub enum NodeKind {
    /// Scalar driver projection: one channel of a named transform, read
    /// from the staged runtime inputs. `sign` is the mirror-table driver
    /// sign (-1 on a mirrored side).
    DriverChannel {
        path: RigPath,
        channel: Channel,
        #[serde(default = "default_sign")]
        sign: f32,
    },

    /// Driver transform expressed in its parent reference frame, read from
    /// the staged runtime inputs.
    DriverFrame { path: RigPath },

    /// Piecewise-linear breakpoint ramp over the scalar domain `[lo, hi]`.
    /// Clamped by default; `extrapolate` extends the end segments.
    RampWeight {
        lo: f32,
        hi: f32,
        breakpoints: Vec<Breakpoint>,
        #[serde(default)]
        extrapolate: bool,
    },

    /// Radial-basis pose matcher: one `w01..wNN` output per calibrated
    /// pose, from the driver's local-frame transform.
    PoseWeights {
        poses: Vec<Transform>,
        solver: SolverConfig,
    },

    /// Per-pose contribution scaled by the incoming weight. Emits the
    /// additive translate/rotate parts and the multiplicative scale link
    /// `1 + w·(s - 1)`.
    PoseGain { delta: PoseDelta },

    /// Variadic component-wise vec3 sum (translate/rotate combiner).
    ChannelSum,

    /// One link of the running scale product chain.
    ScaleLink,

    /// Publishes combined translate/rotate/scale onto the target path.
    ChannelsOutput { path: RigPath },

    /// Publishes one pose weight onto the driver's pose-slot attribute.
    WeightOutput { path: RigPath },
}

#[derive(Clone, Debug, Serialize, Deserialize, PartialEq)]
pub struct InputConnection {
    pub node_id: NodeId,
    #[serde(default = "default_output_key")]
    pub output_key: String,
}

impl InputConnection {
    pub fn new(node_id: impl Into<NodeId>, output_key: impl Into<String>) -> Self {
        Self {
            node_id: node_id.into(),
            output_key: output_key.into(),
        }
    }
}

fn default_output_key() -> String {
    "out".to_string()
}

#[derive(Clone, Debug, Serialize, Deserialize, PartialEq)]
pub struct NodeSpec {
    pub id: NodeId,
    pub kind: NodeKind,
    #[serde(default)]
    pub inputs: HashMap<String, InputConnection>,
}

impl NodeSpec {
    pub fn new(id: impl Into<NodeId>, kind: NodeKind) -> Self {
        Self {
            id: id.into(),
            kind,
            inputs: HashMap::new(),
        }
    }
}

#[derive(Clone, Debug, Default, Serialize, Deserialize, PartialEq)]
pub struct NetworkSpec {
    pub nodes: Vec<NodeSpec>,
}

impl NetworkSpec {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn contains(&self, id: &str) -> bool {
        self.nodes.iter().any(|n| n.id == id)
    }

    pub fn node(&self, id: &str) -> Option<&NodeSpec> {
        self.nodes.iter().find(|n| n.id == id)
    }

    pub fn node_mut(&mut self, id: &str) -> Option<&mut NodeSpec> {
        self.nodes.iter_mut().find(|n| n.id == id)
    }

    /// Insert `spec`, replacing any node with the same id. Re-running a
    /// wiring step therefore converges instead of duplicating nodes.
    pub fn upsert(&mut self, spec: NodeSpec) -> &mut NodeSpec {
        match self.nodes.iter().position(|n| n.id == spec.id) {
            Some(i) => {
                self.nodes[i] = spec;
                &mut self.nodes[i]
            }
            None => {
                self.nodes.push(spec);
                self.nodes.last_mut().unwrap()
            }
        }
    }

    /// Connect `input_key` of `node_id` to `source`. No-op when the node
    /// is unknown; wiring is always re-runnable.
    pub fn connect(&mut self, node_id: &str, input_key: &str, source: InputConnection) {
        if let Some(node) = self.node_mut(node_id) {
            node.inputs.insert(input_key.to_string(), source);
        }
    }

    /// Target node paths already claimed by a `ChannelsOutput` sink.
    pub fn output_targets(&self) -> impl Iterator<Item = &RigPath> {
        self.nodes.iter().filter_map(|n| match &n.kind {
            NodeKind::ChannelsOutput { path } => Some(path),
            _ => None,
        })
    }
}

pub mod builder;
pub mod calibration;
pub mod error;
pub mod eval;
pub mod rbf;
pub mod scene;
pub mod topo;
pub mod types;

pub use builder::{
    CorrectiveNetworkBuilder, MirrorTable, PushHandle, PushJointSpec, SideRig,
};
pub use calibration::{
    CalibrationPose, CalibrationStore, PairKey, PoseDelta, PoseReference, PutOutcome,
};
pub use error::CorrectiveError;
pub use eval::{evaluate_all, NetworkRuntime};
pub use rbf::{Kernel, RbfState, SolverConfig};
pub use scene::{SceneGraph, SceneNode};
pub use topo::topo_order;
pub use types::*;

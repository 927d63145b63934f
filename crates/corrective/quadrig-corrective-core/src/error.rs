//! Error surface of the corrective engine.
//!
//! Authoring errors are recovered locally: multi-side operations report a
//! diagnostic for the failing side and continue with the others, and no
//! failed step leaves the network half-wired.

use quadrig_api_core::{RigPath, Side};
use thiserror::Error;

#[derive(Debug, Clone, Error, PartialEq)]
pub enum CorrectiveError {
    #[error("missing node: {0}")]
    MissingNode(RigPath),

    #[error("mirror counterpart missing on {side} side: {missing}")]
    MirrorMismatch { side: Side, missing: RigPath },

    #[error("pose slot {slot} breaks domain ordering: lo {lo} precedes previous lo {prev_lo}")]
    NonMonotonicDomain { slot: u32, lo: f32, prev_lo: f32 },

    #[error("pose slot {slot} out of range, store holds {len} pose(s)")]
    SlotOutOfRange { slot: u32, len: usize },

    #[error("pose slot {slot} holds a {found} reference, expected {expected}")]
    ReferenceKindMismatch {
        slot: u32,
        expected: &'static str,
        found: &'static str,
    },

    #[error("{0} is already a corrective target and cannot become a driver")]
    AcyclicityViolation(RigPath),

    #[error("cycle detected in corrective network")]
    CycleDetected,

    #[error("solver error: {0}")]
    Solver(String),
}

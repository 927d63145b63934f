//! Pose calibration store.
//!
//! An explicit, append-only registry of calibration poses keyed by
//! (driver, target) pair. This replaces scene-wide name-pattern scanning:
//! the next free slot is always `count + 1`, occupied slots update in
//! place, and nothing is ever renumbered or deleted.

use quadrig_api_core::{Channel, RigPath, Transform};
use serde::{Deserialize, Serialize};

use crate::error::CorrectiveError;

fn unit_scale() -> [f32; 3] {
    [1.0, 1.0, 1.0]
}

/// Per-pose corrective contribution. Translate/rotate are additive deltas,
/// scale is a multiplicative factor (1 = identity).
#[derive(Clone, Copy, Debug, Serialize, Deserialize, PartialEq)]
pub struct PoseDelta {
    #[serde(default)]
    pub translate: [f32; 3],
    #[serde(default)]
    pub rotate: [f32; 3],
    #[serde(default = "unit_scale")]
    pub scale: [f32; 3],
}

impl PoseDelta {
    pub fn neutral() -> Self {
        Self {
            translate: [0.0; 3],
            rotate: [0.0; 3],
            scale: unit_scale(),
        }
    }

    pub fn translate(t: [f32; 3]) -> Self {
        Self {
            translate: t,
            ..Self::neutral()
        }
    }
}

impl Default for PoseDelta {
    fn default() -> Self {
        Self::neutral()
    }
}

/// The driver state a pose was authored against.
#[derive(Clone, Debug, Serialize, Deserialize, PartialEq)]
#[serde(tag = "mode", rename_all = "lowercase")]
pub enum PoseReference {
    /// Scalar mode: the weight ramps 0..1 across `[lo, hi]` of the driving
    /// channel. Ranges must be monotonically non-decreasing by `lo`.
    Range { lo: f32, hi: f32 },
    /// Matrix mode: the driver world transform and its parent reference
    /// world transform captured at authoring time, plus the reference node
    /// path and the channel recipe that produced them (kept so a mirrored
    /// side can be re-captured against the matching reference).
    Frame {
        pose: Transform,
        parent: Transform,
        parent_ref: RigPath,
        #[serde(default)]
        recipe: Vec<(Channel, f32)>,
    },
}

impl PoseReference {
    pub fn kind_name(&self) -> &'static str {
        match self {
            PoseReference::Range { .. } => "range",
            PoseReference::Frame { .. } => "frame",
        }
    }
}

/// One authored calibration pose. Slots are stable 1-based ordinals.
#[derive(Clone, Debug, Serialize, Deserialize, PartialEq)]
pub struct CalibrationPose {
    pub slot: u32,
    pub reference: PoseReference,
    pub delta: PoseDelta,
}

/// Identifies one driver/target pairing.
#[derive(Clone, Debug, Serialize, Deserialize, PartialEq, Eq, Hash)]
pub struct PairKey {
    pub driver: RigPath,
    pub target: RigPath,
}

impl PairKey {
    pub fn new(driver: RigPath, target: RigPath) -> Self {
        Self { driver, target }
    }
}

#[derive(Clone, Debug, Serialize, Deserialize, PartialEq)]
struct PairEntry {
    key: PairKey,
    poses: Vec<CalibrationPose>,
}

/// Result of a [`CalibrationStore::put`].
#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub enum PutOutcome {
    Appended,
    Updated,
}

/// Registry of calibration poses per (driver, target) pair.
///
/// Stored as a flat entry list so the whole store serializes cleanly to
/// JSON; pair counts are small enough that linear lookup is a non-issue.
#[derive(Clone, Debug, Default, Serialize, Deserialize, PartialEq)]
pub struct CalibrationStore {
    entries: Vec<PairEntry>,
}

impl CalibrationStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Poses registered for `key`, in slot order. Empty when unknown.
    pub fn poses(&self, key: &PairKey) -> &[CalibrationPose] {
        self.entries
            .iter()
            .find(|e| &e.key == key)
            .map(|e| e.poses.as_slice())
            .unwrap_or(&[])
    }

    pub fn count(&self, key: &PairKey) -> usize {
        self.poses(key).len()
    }

    /// Next free slot for `key`: existing count + 1.
    pub fn next_slot(&self, key: &PairKey) -> u32 {
        self.count(key) as u32 + 1
    }

    /// All pair keys with at least one pose.
    pub fn pairs(&self) -> impl Iterator<Item = &PairKey> {
        self.entries.iter().map(|e| &e.key)
    }

    /// Append a pose at the next free slot.
    pub fn append(
        &mut self,
        key: &PairKey,
        reference: PoseReference,
        delta: PoseDelta,
    ) -> Result<u32, CorrectiveError> {
        let slot = self.next_slot(key);
        self.put(key, slot, reference, delta)?;
        Ok(slot)
    }

    /// Insert or re-author the pose at `slot`.
    ///
    /// `slot == count + 1` appends; an occupied slot updates in place.
    /// Anything beyond that is rejected so slots stay gap-free, and
    /// scalar ranges are checked against their neighbours so `lo` stays
    /// monotonically non-decreasing along the chain.
    pub fn put(
        &mut self,
        key: &PairKey,
        slot: u32,
        reference: PoseReference,
        delta: PoseDelta,
    ) -> Result<PutOutcome, CorrectiveError> {
        let len = self.count(key);
        if slot == 0 || slot as usize > len + 1 {
            return Err(CorrectiveError::SlotOutOfRange { slot, len });
        }

        if let PoseReference::Range { lo, .. } = reference {
            let poses = self.poses(key);
            if let Some(prev) = slot
                .checked_sub(2)
                .and_then(|i| poses.get(i as usize))
                .and_then(|p| p.range_lo())
            {
                if lo < prev {
                    return Err(CorrectiveError::NonMonotonicDomain {
                        slot,
                        lo,
                        prev_lo: prev,
                    });
                }
            }
            if let Some(next) = poses.get(slot as usize).and_then(|p| p.range_lo()) {
                if lo > next {
                    return Err(CorrectiveError::NonMonotonicDomain {
                        slot: slot + 1,
                        lo: next,
                        prev_lo: lo,
                    });
                }
            }
        }

        let entry = match self.entries.iter_mut().find(|e| &e.key == key) {
            Some(entry) => entry,
            None => {
                self.entries.push(PairEntry {
                    key: key.clone(),
                    poses: Vec::new(),
                });
                self.entries.last_mut().unwrap()
            }
        };

        let pose = CalibrationPose {
            slot,
            reference,
            delta,
        };
        if slot as usize == entry.poses.len() + 1 {
            entry.poses.push(pose);
            Ok(PutOutcome::Appended)
        } else {
            entry.poses[slot as usize - 1] = pose;
            Ok(PutOutcome::Updated)
        }
    }
}

impl CalibrationPose {
    fn range_lo(&self) -> Option<f32> {
        match self.reference {
            PoseReference::Range { lo, .. } => Some(lo),
            PoseReference::Frame { .. } => None,
        }
    }
}

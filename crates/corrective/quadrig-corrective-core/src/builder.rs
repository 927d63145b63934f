//! Corrective network authoring.
//!
//! The builder owns the scene registry, the network spec and the pose
//! store, and keeps the three consistent: every pose edit re-derives the
//! affected node chain from the store, so authoring steps are idempotent
//! and re-running one never duplicates nodes. Multi-side operations skip a
//! failing side with a diagnostic instead of aborting the whole setup.

use quadrig_api_core::{Axis, Channel, ChannelValues, RigPath, Side, Transform};
use serde::{Deserialize, Serialize};

use crate::calibration::{
    CalibrationStore, PairKey, PoseDelta, PoseReference, PutOutcome,
};
use crate::error::CorrectiveError;
use crate::rbf::SolverConfig;
use crate::scene::SceneGraph;
use crate::types::{Breakpoint, InputConnection, NetworkSpec, NodeKind, NodeSpec};

/// Naming for one push joint setup: `<side>/<region>/<name><index>` is the
/// corrective target, with `Zero` and `Offset` parents above it.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct PushJointSpec {
    pub name: String,
    pub region: String,
    pub index: u32,
    pub offset_axis: Axis,
    pub offset: f32,
}

impl PushJointSpec {
    pub fn target_path(&self, side: Side) -> RigPath {
        RigPath::new(
            vec![side.token().to_string(), self.region.clone()],
            format!("{}{:02}", self.name, self.index),
            Vec::new(),
        )
    }
}

/// The rig joints one side of a setup hangs off: the driving joint and the
/// two flanking joints whose orientations define the rest reference.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct SideRig {
    pub side: Side,
    pub driver: RigPath,
    pub flank_a: RigPath,
    pub flank_b: RigPath,
}

/// Handle onto one built push setup, used for all later pose authoring.
#[derive(Clone, Debug, Serialize, Deserialize, PartialEq)]
pub struct PushHandle {
    pub side: Side,
    pub driver: RigPath,
    pub target: RigPath,
    pub channel: Channel,
    pub driver_sign: f32,
}

impl PushHandle {
    fn pair_key(&self) -> PairKey {
        PairKey::new(self.driver.clone(), self.target.clone())
    }
}

/// Explicit mirroring signs. Nothing is inferred from names or axes: the
/// rig author states how the driver scalar and each delta component flip
/// across the character's symmetry plane.
#[derive(Clone, Copy, Debug, Serialize, Deserialize, PartialEq)]
pub struct MirrorTable {
    pub driver_sign: f32,
    pub translate_signs: [f32; 3],
    pub rotate_signs: [f32; 3],
}

impl MirrorTable {
    pub fn mirror_delta(&self, delta: &PoseDelta) -> PoseDelta {
        let mul = |v: [f32; 3], s: [f32; 3]| [v[0] * s[0], v[1] * s[1], v[2] * s[2]];
        PoseDelta {
            translate: mul(delta.translate, self.translate_signs),
            rotate: mul(delta.rotate, self.rotate_signs),
            scale: delta.scale,
        }
    }
}

impl Default for MirrorTable {
    fn default() -> Self {
        Self {
            driver_sign: 1.0,
            translate_signs: [1.0; 3],
            rotate_signs: [1.0; 3],
        }
    }
}

/// Builds and maintains corrective setups over a scene registry.
#[derive(Debug, Default)]
pub struct CorrectiveNetworkBuilder {
    pub scene: SceneGraph,
    pub network: NetworkSpec,
    pub store: CalibrationStore,
    pub mirror: MirrorTable,
}

impl CorrectiveNetworkBuilder {
    pub fn new(scene: SceneGraph) -> Self {
        Self {
            scene,
            ..Self::default()
        }
    }

    pub fn with_mirror_table(mut self, mirror: MirrorTable) -> Self {
        self.mirror = mirror;
        self
    }

    /// Build the push joint scaffolding for every listed side: the
    /// zero/offset/push transform chain in the scene, plus the driver and
    /// sink nodes in the network so a freshly built target already
    /// evaluates to neutral channels.
    ///
    /// A side whose rig joints are missing is skipped with a warning; the
    /// remaining sides still build.
    pub fn create_push_setup(
        &mut self,
        spec: &PushJointSpec,
        sides: &[SideRig],
        channel: Channel,
    ) -> Vec<PushHandle> {
        let mut handles = Vec::with_capacity(sides.len());
        for rig in sides {
            match self.create_side(spec, rig, channel) {
                Ok(handle) => handles.push(handle),
                Err(err) => {
                    log::warn!("skipping {} side of {}: {err}", rig.side, spec.name);
                }
            }
        }
        handles
    }

    fn create_side(
        &mut self,
        spec: &PushJointSpec,
        rig: &SideRig,
        channel: Channel,
    ) -> Result<PushHandle, CorrectiveError> {
        for required in [&rig.driver, &rig.flank_a, &rig.flank_b] {
            if !self.scene.contains(required) {
                return Err(CorrectiveError::MissingNode(required.clone()));
            }
        }
        self.ensure_driver_not_target(&rig.driver)?;

        let target = spec.target_path(rig.side);
        let zero = suffixed(&target, "Zero");
        let offset = suffixed(&target, "Offset");

        self.scene
            .add(zero.clone(), Some(rig.driver.clone()), ChannelValues::neutral())?;
        // Zero node bakes the rest orientation: halfway between the two
        // flanking joints, expressed in the driver's frame.
        let reference = self.scene.orientation_reference(&rig.flank_a, &rig.flank_b)?;
        let driver_rot = self.scene.world_rotation(&rig.driver)?;
        let local = driver_rot.inverse()
            * nalgebra::UnitQuaternion::from_quaternion(nalgebra::Quaternion::new(
                reference[3],
                reference[0],
                reference[1],
                reference[2],
            ));
        let c = local.quaternion().coords;
        self.scene.set_rotation(&zero, [c.x, c.y, c.z, c.w])?;

        let mut offset_channels = ChannelValues::neutral();
        offset_channels.translate[spec.offset_axis.index()] =
            rig.side.offset_sign() * spec.offset;
        self.scene
            .add(offset.clone(), Some(zero.clone()), offset_channels)?;
        self.scene
            .add(target.clone(), Some(offset.clone()), ChannelValues::neutral())?;

        let handle = PushHandle {
            side: rig.side,
            driver: rig.driver.clone(),
            target: target.clone(),
            channel,
            driver_sign: 1.0,
        };

        // Eager sink so an un-calibrated target still writes neutral
        // channels every pass.
        self.network.upsert(NodeSpec::new(
            node_id(&target, "out"),
            NodeKind::ChannelsOutput { path: target },
        ));
        Ok(handle)
    }

    /// Append a scalar pose at the next free slot and rewire the setup.
    pub fn add_scalar_pose(
        &mut self,
        handle: &PushHandle,
        lo: f32,
        hi: f32,
        delta: PoseDelta,
    ) -> Result<u32, CorrectiveError> {
        let slot = self.store.next_slot(&handle.pair_key());
        self.put_scalar_pose(handle, slot, lo, hi, delta)?;
        Ok(slot)
    }

    /// Author or re-author the scalar pose at `slot`, then rebuild the
    /// whole node chain for this setup from the store. Appending a pose
    /// retroactively patches its predecessor's ramp so the two cross-fade.
    pub fn put_scalar_pose(
        &mut self,
        handle: &PushHandle,
        slot: u32,
        lo: f32,
        hi: f32,
        delta: PoseDelta,
    ) -> Result<PutOutcome, CorrectiveError> {
        let key = handle.pair_key();
        self.check_reference_kind(&key, slot, "range")?;
        self.ensure_driver_not_target(&handle.driver)?;
        let outcome = self
            .store
            .put(&key, slot, PoseReference::Range { lo, hi }, delta)?;
        self.rebuild_scalar_chain(handle)?;
        Ok(outcome)
    }

    /// Seed `[lo, hi]` with the standard three-pose split: overlapping
    /// thirds, so the middle pose keeps its full peak while the outer
    /// poses hand over around it. Deltas are neutral, meant to be
    /// re-authored per slot afterwards.
    pub fn auto_add_poses(
        &mut self,
        handle: &PushHandle,
        lo: f32,
        hi: f32,
    ) -> Result<Vec<u32>, CorrectiveError> {
        let third = (hi - lo) / 3.0;
        let domains = [
            (lo, lo + 2.0 * third),
            (lo + third, hi),
            (lo + 2.0 * third, hi),
        ];
        let mut slots = Vec::with_capacity(domains.len());
        for (pose_lo, pose_hi) in domains {
            slots.push(self.add_scalar_pose(handle, pose_lo, pose_hi, PoseDelta::neutral())?);
        }
        Ok(slots)
    }

    /// Append a matrix-mode pose: apply `recipe` to the driver, capture
    /// its world frame and the reference frame, restore the scene, store
    /// the pose and rebuild the solver chain.
    pub fn add_frame_pose(
        &mut self,
        handle: &PushHandle,
        parent_ref: &RigPath,
        recipe: &[(Channel, f32)],
        delta: PoseDelta,
    ) -> Result<u32, CorrectiveError> {
        let key = handle.pair_key();
        let slot = self.store.next_slot(&key);
        self.check_reference_kind(&key, slot, "frame")?;
        self.ensure_driver_not_target(&handle.driver)?;

        let (pose, parent) = self.capture_frames(&handle.driver, parent_ref, recipe)?;
        self.store.put(
            &key,
            slot,
            PoseReference::Frame {
                pose,
                parent,
                parent_ref: parent_ref.clone(),
                recipe: recipe.to_vec(),
            },
            delta,
        )?;
        self.rebuild_frame_chain(handle, SolverConfig::default())?;
        Ok(slot)
    }

    /// Mirror an authored setup onto the opposite side. The counterpart
    /// rig must exist; scalar deltas flip per the mirror table, frame
    /// poses are re-captured on the mirrored joints with the identical
    /// channel recipe.
    pub fn mirror_push(
        &mut self,
        source: &PushHandle,
        spec: &PushJointSpec,
        counterpart: &SideRig,
    ) -> Result<PushHandle, CorrectiveError> {
        for required in [&counterpart.driver, &counterpart.flank_a, &counterpart.flank_b] {
            if !self.scene.contains(required) {
                let err = CorrectiveError::MirrorMismatch {
                    side: counterpart.side,
                    missing: required.clone(),
                };
                log::warn!("mirror of {} aborted: {err}", source.target);
                return Err(err);
            }
        }

        let mut handle = self.create_side(spec, counterpart, source.channel)?;
        handle.driver_sign = self.mirror.driver_sign;

        let source_poses: Vec<_> = self.store.poses(&source.pair_key()).to_vec();
        for pose in source_poses {
            let mirrored_delta = self.mirror.mirror_delta(&pose.delta);
            match pose.reference {
                PoseReference::Range { lo, hi } => {
                    self.put_scalar_pose(&handle, pose.slot, lo, hi, mirrored_delta)?;
                }
                PoseReference::Frame {
                    parent_ref, recipe, ..
                } => {
                    let reference =
                        mirrored_path(&parent_ref, source.side, counterpart.side);
                    self.add_frame_pose(&handle, &reference, &recipe, mirrored_delta)?;
                }
            }
        }
        Ok(handle)
    }

    /// A corrective target may never drive another setup.
    fn ensure_driver_not_target(&self, driver: &RigPath) -> Result<(), CorrectiveError> {
        if self.network.output_targets().any(|p| p == driver) {
            return Err(CorrectiveError::AcyclicityViolation(driver.clone()));
        }
        Ok(())
    }

    fn check_reference_kind(
        &self,
        key: &PairKey,
        slot: u32,
        expected: &'static str,
    ) -> Result<(), CorrectiveError> {
        if let Some(existing) = self.store.poses(key).first() {
            let found = existing.reference.kind_name();
            if found != expected {
                return Err(CorrectiveError::ReferenceKindMismatch {
                    slot,
                    expected,
                    found,
                });
            }
        }
        Ok(())
    }

    fn capture_frames(
        &mut self,
        driver: &RigPath,
        parent_ref: &RigPath,
        recipe: &[(Channel, f32)],
    ) -> Result<(Transform, Transform), CorrectiveError> {
        let mut restore = Vec::with_capacity(recipe.len());
        for (channel, value) in recipe {
            let prev = self.scene.set_channel(driver, *channel, *value)?;
            restore.push((*channel, prev));
        }
        let captured = self
            .scene
            .world_transform(driver)
            .and_then(|pose| Ok((pose, self.scene.world_transform(parent_ref)?)));
        for (channel, prev) in restore.into_iter().rev() {
            self.scene.set_channel(driver, channel, prev)?;
        }
        captured
    }

    /// Re-derive every node of a scalar setup from the store. Node ids are
    /// deterministic per target, so re-running replaces in place.
    fn rebuild_scalar_chain(&mut self, handle: &PushHandle) -> Result<(), CorrectiveError> {
        let key = handle.pair_key();
        let ranges: Vec<(f32, f32)> = self
            .store
            .poses(&key)
            .iter()
            .map(|p| match p.reference {
                PoseReference::Range { lo, hi } => (lo, hi),
                PoseReference::Frame { .. } => (0.0, 0.0),
            })
            .collect();
        let deltas: Vec<PoseDelta> = self.store.poses(&key).iter().map(|p| p.delta).collect();
        let n = ranges.len();

        let driver_id = node_id(&handle.target, "driver");
        self.network.upsert(NodeSpec::new(
            &driver_id,
            NodeKind::DriverChannel {
                path: handle.driver.clone(),
                channel: handle.channel,
                sign: handle.driver_sign,
            },
        ));

        let mut sum_t = NodeSpec::new(node_id(&handle.target, "sumTranslate"), NodeKind::ChannelSum);
        let mut sum_r = NodeSpec::new(node_id(&handle.target, "sumRotate"), NodeKind::ChannelSum);
        let mut scale_source: Option<InputConnection> = None;

        for (i, (lo, hi)) in ranges.iter().enumerate() {
            let k = i + 1;
            let ramp_id = node_id(&handle.target, &format!("ramp{k:02}"));
            let gain_id = node_id(&handle.target, &format!("gain{k:02}"));

            let kind = match ranges.get(i + 1) {
                // A successor extends this pose's domain and folds its
                // ramp into rise-then-fall, peaking where the successor
                // starts.
                Some((succ_lo, succ_hi)) => {
                    let span = succ_hi - lo;
                    let peak = if span.abs() <= f32::EPSILON {
                        0.5
                    } else {
                        (succ_lo - lo) / span
                    };
                    NodeKind::RampWeight {
                        lo: *lo,
                        hi: *succ_hi,
                        breakpoints: vec![
                            Breakpoint::new(0.0, 0.0),
                            Breakpoint::new(peak, 1.0),
                            Breakpoint::new(1.0, 0.0),
                        ],
                        extrapolate: false,
                    }
                }
                None => NodeKind::RampWeight {
                    lo: *lo,
                    hi: *hi,
                    breakpoints: vec![Breakpoint::new(0.0, 0.0), Breakpoint::new(1.0, 1.0)],
                    extrapolate: false,
                },
            };

            let mut ramp = NodeSpec::new(&ramp_id, kind);
            ramp.inputs
                .insert("in".into(), InputConnection::new(&driver_id, "out"));
            self.network.upsert(ramp);

            let mut gain = NodeSpec::new(&gain_id, NodeKind::PoseGain { delta: deltas[i] });
            gain.inputs
                .insert("weight".into(), InputConnection::new(&ramp_id, "weight"));
            self.network.upsert(gain);

            sum_t
                .inputs
                .insert(format!("i{k:02}"), InputConnection::new(&gain_id, "translate"));
            sum_r
                .inputs
                .insert(format!("i{k:02}"), InputConnection::new(&gain_id, "rotate"));

            // Running product of scale links; the first gain seeds the chain.
            scale_source = Some(match scale_source.take() {
                None => InputConnection::new(&gain_id, "scale"),
                Some(prev) => {
                    let link_id = node_id(&handle.target, &format!("scaleLink{k:02}"));
                    let mut link = NodeSpec::new(&link_id, NodeKind::ScaleLink);
                    link.inputs.insert("a".into(), prev);
                    link.inputs
                        .insert("b".into(), InputConnection::new(&gain_id, "scale"));
                    self.network.upsert(link);
                    InputConnection::new(&link_id, "out")
                }
            });

            // Per-pose weight probe published on the driver.
            let mut probe = NodeSpec::new(
                node_id(&handle.target, &format!("pose{k:02}Probe")),
                NodeKind::WeightOutput {
                    path: handle.driver.with_field(format!("pose{k:02}")),
                },
            );
            probe
                .inputs
                .insert("weight".into(), InputConnection::new(&ramp_id, "weight"));
            self.network.upsert(probe);
        }

        self.finish_combiners(handle, sum_t, sum_r, scale_source, n)
    }

    /// Re-derive the solver chain of a matrix-mode setup from the store.
    fn rebuild_frame_chain(
        &mut self,
        handle: &PushHandle,
        solver: SolverConfig,
    ) -> Result<(), CorrectiveError> {
        let key = handle.pair_key();
        let mut poses = Vec::new();
        let mut deltas = Vec::new();
        for entry in self.store.poses(&key) {
            if let PoseReference::Frame { pose, parent, .. } = &entry.reference {
                poses.push(crate::scene::relative_transform(pose, parent)?);
                deltas.push(entry.delta);
            }
        }
        let n = poses.len();

        let frame_id = node_id(&handle.target, "frame");
        self.network.upsert(NodeSpec::new(
            &frame_id,
            NodeKind::DriverFrame {
                path: handle.driver.clone(),
            },
        ));

        let weights_id = node_id(&handle.target, "poseWeights");
        let mut weights = NodeSpec::new(&weights_id, NodeKind::PoseWeights { poses, solver });
        weights
            .inputs
            .insert("in".into(), InputConnection::new(&frame_id, "out"));
        self.network.upsert(weights);

        let mut sum_t = NodeSpec::new(node_id(&handle.target, "sumTranslate"), NodeKind::ChannelSum);
        let mut sum_r = NodeSpec::new(node_id(&handle.target, "sumRotate"), NodeKind::ChannelSum);
        let mut scale_source: Option<InputConnection> = None;

        for (i, delta) in deltas.iter().enumerate() {
            let k = i + 1;
            let gain_id = node_id(&handle.target, &format!("gain{k:02}"));
            let mut gain = NodeSpec::new(&gain_id, NodeKind::PoseGain { delta: *delta });
            gain.inputs.insert(
                "weight".into(),
                InputConnection::new(&weights_id, format!("w{k:02}")),
            );
            self.network.upsert(gain);

            sum_t
                .inputs
                .insert(format!("i{k:02}"), InputConnection::new(&gain_id, "translate"));
            sum_r
                .inputs
                .insert(format!("i{k:02}"), InputConnection::new(&gain_id, "rotate"));

            scale_source = Some(match scale_source.take() {
                None => InputConnection::new(&gain_id, "scale"),
                Some(prev) => {
                    let link_id = node_id(&handle.target, &format!("scaleLink{k:02}"));
                    let mut link = NodeSpec::new(&link_id, NodeKind::ScaleLink);
                    link.inputs.insert("a".into(), prev);
                    link.inputs
                        .insert("b".into(), InputConnection::new(&gain_id, "scale"));
                    self.network.upsert(link);
                    InputConnection::new(&link_id, "out")
                }
            });

            let mut probe = NodeSpec::new(
                node_id(&handle.target, &format!("pose{k:02}Probe")),
                NodeKind::WeightOutput {
                    path: handle.driver.with_field(format!("pose{k:02}")),
                },
            );
            probe.inputs.insert(
                "weight".into(),
                InputConnection::new(&weights_id, format!("w{k:02}")),
            );
            self.network.upsert(probe);
        }

        self.finish_combiners(handle, sum_t, sum_r, scale_source, n)
    }

    fn finish_combiners(
        &mut self,
        handle: &PushHandle,
        sum_t: NodeSpec,
        sum_r: NodeSpec,
        scale_source: Option<InputConnection>,
        pose_count: usize,
    ) -> Result<(), CorrectiveError> {
        let out_id = node_id(&handle.target, "out");
        let mut out = NodeSpec::new(
            &out_id,
            NodeKind::ChannelsOutput {
                path: handle.target.clone(),
            },
        );
        if pose_count > 0 {
            out.inputs
                .insert("translate".into(), InputConnection::new(&sum_t.id, "out"));
            out.inputs
                .insert("rotate".into(), InputConnection::new(&sum_r.id, "out"));
            if let Some(scale) = scale_source {
                out.inputs.insert("scale".into(), scale);
            }
            self.network.upsert(sum_t);
            self.network.upsert(sum_r);
        }
        self.network.upsert(out);
        Ok(())
    }
}

fn node_id(target: &RigPath, suffix: &str) -> String {
    format!("{}/{suffix}", target.node())
}

/// The same path on the opposite side: the leading side namespace swaps
/// token, everything else is untouched (shared/center references pass
/// through unchanged).
fn mirrored_path(path: &RigPath, from: Side, to: Side) -> RigPath {
    let mut namespaces = path.namespaces.clone();
    if let Some(first) = namespaces.first_mut() {
        if first == from.token() {
            *first = to.token().to_string();
        }
    }
    RigPath::new(namespaces, path.target.clone(), path.fields.clone())
}

fn suffixed(path: &RigPath, suffix: &str) -> RigPath {
    RigPath::new(
        path.namespaces.clone(),
        format!("{}{suffix}", path.target),
        Vec::new(),
    )
}

//! Minimal named-transform hierarchy standing in for the host scene graph.
//!
//! The engine only needs enough scene to do its own authoring: verify that
//! collaborator-supplied joints exist, parent the zero/offset/push
//! transforms it creates, pose a driver channel during calibration capture
//! and read back world/local matrices. Channels are stored as Maya-style
//! TRS triples with XYZ Euler rotation in degrees.

use hashbrown::HashMap;
use nalgebra::{Matrix3, Matrix4, Quaternion, Rotation3, UnitQuaternion, Vector3};
use quadrig_api_core::{Channel, ChannelValues, RigPath, Transform};
use serde::{Deserialize, Serialize};

use crate::error::CorrectiveError;

const MAX_DEPTH: usize = 256;

#[derive(Clone, Debug, Serialize, Deserialize, PartialEq)]
pub struct SceneNode {
    pub parent: Option<RigPath>,
    pub channels: ChannelValues,
}

#[derive(Clone, Debug, Default, Serialize, Deserialize, PartialEq)]
pub struct SceneGraph {
    nodes: HashMap<RigPath, SceneNode>,
}

impl SceneGraph {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn contains(&self, path: &RigPath) -> bool {
        self.nodes.contains_key(path)
    }

    /// Insert or replace a node. A named parent must already exist.
    pub fn add(
        &mut self,
        path: RigPath,
        parent: Option<RigPath>,
        channels: ChannelValues,
    ) -> Result<(), CorrectiveError> {
        if let Some(p) = &parent {
            if !self.contains(p) {
                return Err(CorrectiveError::MissingNode(p.clone()));
            }
        }
        self.nodes.insert(path, SceneNode { parent, channels });
        Ok(())
    }

    pub fn parent(&self, path: &RigPath) -> Result<Option<&RigPath>, CorrectiveError> {
        self.node(path).map(|n| n.parent.as_ref())
    }

    fn node(&self, path: &RigPath) -> Result<&SceneNode, CorrectiveError> {
        self.nodes
            .get(path)
            .ok_or_else(|| CorrectiveError::MissingNode(path.clone()))
    }

    pub fn channels(&self, path: &RigPath) -> Result<&ChannelValues, CorrectiveError> {
        self.node(path).map(|n| &n.channels)
    }

    pub fn get_channel(&self, path: &RigPath, channel: Channel) -> Result<f32, CorrectiveError> {
        self.channels(path).map(|c| c.get(channel))
    }

    /// Set one channel, returning the previous value so calibration capture
    /// can restore the scene afterwards.
    pub fn set_channel(
        &mut self,
        path: &RigPath,
        channel: Channel,
        value: f32,
    ) -> Result<f32, CorrectiveError> {
        let node = self
            .nodes
            .get_mut(path)
            .ok_or_else(|| CorrectiveError::MissingNode(path.clone()))?;
        let previous = node.channels.get(channel);
        node.channels.set(channel, value);
        Ok(previous)
    }

    /// Overwrite a node's local rotation from a quaternion (x, y, z, w).
    pub fn set_rotation(&mut self, path: &RigPath, rot: [f32; 4]) -> Result<(), CorrectiveError> {
        let node = self
            .nodes
            .get_mut(path)
            .ok_or_else(|| CorrectiveError::MissingNode(path.clone()))?;
        let q = unit_quat(rot);
        let (rx, ry, rz) = q.euler_angles();
        node.channels.rotate = [rx.to_degrees(), ry.to_degrees(), rz.to_degrees()];
        Ok(())
    }

    /// Local TRS of a node as a Transform (rotation converted to quat).
    pub fn local_transform(&self, path: &RigPath) -> Result<Transform, CorrectiveError> {
        self.channels(path).map(channels_to_transform)
    }

    pub fn world_matrix(&self, path: &RigPath) -> Result<Matrix4<f32>, CorrectiveError> {
        let mut matrix = local_matrix(&self.node(path)?.channels);
        let mut cursor = self.node(path)?.parent.clone();
        let mut depth = 0;
        while let Some(p) = cursor {
            depth += 1;
            if depth > MAX_DEPTH {
                return Err(CorrectiveError::CycleDetected);
            }
            let node = self.node(&p)?;
            matrix = local_matrix(&node.channels) * matrix;
            cursor = node.parent.clone();
        }
        Ok(matrix)
    }

    pub fn world_transform(&self, path: &RigPath) -> Result<Transform, CorrectiveError> {
        self.world_matrix(path).map(|m| decompose(&m))
    }

    /// World rotation accumulated down the parent chain, ignoring scale.
    pub fn world_rotation(&self, path: &RigPath) -> Result<UnitQuaternion<f32>, CorrectiveError> {
        let mut chain = vec![local_rotation(&self.node(path)?.channels)];
        let mut cursor = self.node(path)?.parent.clone();
        let mut depth = 0;
        while let Some(p) = cursor {
            depth += 1;
            if depth > MAX_DEPTH {
                return Err(CorrectiveError::CycleDetected);
            }
            let node = self.node(&p)?;
            chain.push(local_rotation(&node.channels));
            cursor = node.parent.clone();
        }
        Ok(chain.into_iter().rev().fold(
            UnitQuaternion::identity(),
            |acc, q| acc * q,
        ))
    }

    /// `node` expressed in the frame of `parent_ref`:
    /// `inverse(world(parent_ref)) · world(node)`.
    pub fn local_between(
        &self,
        node: &RigPath,
        parent_ref: &RigPath,
    ) -> Result<Transform, CorrectiveError> {
        let parent_world = self.world_matrix(parent_ref)?;
        let world = self.world_matrix(node)?;
        let inverse = parent_world.try_inverse().ok_or_else(|| {
            CorrectiveError::Solver(format!("non-invertible parent frame: {parent_ref}"))
        })?;
        Ok(decompose(&(inverse * world)))
    }

    /// Orientation reference between two flanking joints: shortest-arc
    /// halfway blend of their world rotations.
    pub fn orientation_reference(
        &self,
        a: &RigPath,
        b: &RigPath,
    ) -> Result<[f32; 4], CorrectiveError> {
        let qa = self.world_rotation(a)?;
        let qb = self.world_rotation(b)?;
        let blended = nlerp_shortest(qa, qb, 0.5);
        let c = blended.quaternion().coords;
        Ok([c.x, c.y, c.z, c.w])
    }
}

/// `pose` expressed in the frame of `parent`, both given as world TRS.
pub fn relative_transform(
    pose: &Transform,
    parent: &Transform,
) -> Result<Transform, CorrectiveError> {
    let parent_m = crate::rbf::transform_matrix(parent);
    let inverse = parent_m
        .try_inverse()
        .ok_or_else(|| CorrectiveError::Solver("non-invertible captured parent frame".into()))?;
    Ok(decompose(&(inverse * crate::rbf::transform_matrix(pose))))
}

fn unit_quat(rot: [f32; 4]) -> UnitQuaternion<f32> {
    UnitQuaternion::from_quaternion(Quaternion::new(rot[3], rot[0], rot[1], rot[2]))
}

fn local_rotation(channels: &ChannelValues) -> UnitQuaternion<f32> {
    let [rx, ry, rz] = channels.rotate;
    UnitQuaternion::from_euler_angles(rx.to_radians(), ry.to_radians(), rz.to_radians())
}

fn local_matrix(channels: &ChannelValues) -> Matrix4<f32> {
    let [sx, sy, sz] = channels.scale;
    let mut m = local_rotation(channels).to_homogeneous()
        * Matrix4::new_nonuniform_scaling(&Vector3::new(sx, sy, sz));
    m[(0, 3)] = channels.translate[0];
    m[(1, 3)] = channels.translate[1];
    m[(2, 3)] = channels.translate[2];
    m
}

fn channels_to_transform(channels: &ChannelValues) -> Transform {
    let q = local_rotation(channels).quaternion().coords;
    Transform {
        pos: channels.translate,
        rot: [q.x, q.y, q.z, q.w],
        scale: channels.scale,
    }
}

/// Split a TRS matrix back into pos/quat/scale. Scale is taken from the
/// basis column lengths; shear is not represented and folds into rotation.
fn decompose(m: &Matrix4<f32>) -> Transform {
    let x = Vector3::new(m[(0, 0)], m[(1, 0)], m[(2, 0)]);
    let y = Vector3::new(m[(0, 1)], m[(1, 1)], m[(2, 1)]);
    let z = Vector3::new(m[(0, 2)], m[(1, 2)], m[(2, 2)]);
    let scale = [x.norm(), y.norm(), z.norm()];

    let safe = |v: Vector3<f32>, s: f32| if s > f32::EPSILON { v / s } else { v };
    let rot_mat = Matrix3::from_columns(&[
        safe(x, scale[0]),
        safe(y, scale[1]),
        safe(z, scale[2]),
    ]);
    let q = UnitQuaternion::from_rotation_matrix(&Rotation3::from_matrix_unchecked(rot_mat));
    let c = q.quaternion().coords;

    Transform {
        pos: [m[(0, 3)], m[(1, 3)], m[(2, 3)]],
        rot: [c.x, c.y, c.z, c.w],
        scale,
    }
}

/// Quaternion NLERP with shortest-arc correction.
fn nlerp_shortest(a: UnitQuaternion<f32>, b: UnitQuaternion<f32>, t: f32) -> UnitQuaternion<f32> {
    let qa = a.quaternion().coords;
    let mut qb = b.quaternion().coords;
    if qa.dot(&qb) < 0.0 {
        qb = -qb;
    }
    let mixed = qa.lerp(&qb, t);
    UnitQuaternion::from_quaternion(Quaternion::from_parts(
        mixed.w,
        Vector3::new(mixed.x, mixed.y, mixed.z),
    ))
}

//! Typed channel enumeration for corrective targets.
//!
//! The engine never addresses channels through string-formatted attribute
//! paths; every read and write goes through [`Channel`] and the typed
//! accessors on [`ChannelValues`].

use serde::{Deserialize, Serialize};
use std::fmt;

/// One axis of a channel family.
#[derive(Copy, Clone, Debug, Serialize, Deserialize, PartialEq, Eq, Hash)]
#[serde(rename_all = "lowercase")]
pub enum Axis {
    X,
    Y,
    Z,
}

impl Axis {
    pub const ALL: [Axis; 3] = [Axis::X, Axis::Y, Axis::Z];

    #[inline]
    pub fn index(self) -> usize {
        match self {
            Axis::X => 0,
            Axis::Y => 1,
            Axis::Z => 2,
        }
    }
}

/// A single animatable channel on a transform.
#[derive(Copy, Clone, Debug, Serialize, Deserialize, PartialEq, Eq, Hash)]
#[serde(rename_all = "camelCase")]
pub enum Channel {
    TranslateX,
    TranslateY,
    TranslateZ,
    RotateX,
    RotateY,
    RotateZ,
    ScaleX,
    ScaleY,
    ScaleZ,
}

impl Channel {
    pub const ALL: [Channel; 9] = [
        Channel::TranslateX,
        Channel::TranslateY,
        Channel::TranslateZ,
        Channel::RotateX,
        Channel::RotateY,
        Channel::RotateZ,
        Channel::ScaleX,
        Channel::ScaleY,
        Channel::ScaleZ,
    ];

    pub fn translate(axis: Axis) -> Self {
        match axis {
            Axis::X => Channel::TranslateX,
            Axis::Y => Channel::TranslateY,
            Axis::Z => Channel::TranslateZ,
        }
    }

    pub fn rotate(axis: Axis) -> Self {
        match axis {
            Axis::X => Channel::RotateX,
            Axis::Y => Channel::RotateY,
            Axis::Z => Channel::RotateZ,
        }
    }

    pub fn scale(axis: Axis) -> Self {
        match axis {
            Axis::X => Channel::ScaleX,
            Axis::Y => Channel::ScaleY,
            Axis::Z => Channel::ScaleZ,
        }
    }

    #[inline]
    pub fn axis(self) -> Axis {
        match self {
            Channel::TranslateX | Channel::RotateX | Channel::ScaleX => Axis::X,
            Channel::TranslateY | Channel::RotateY | Channel::ScaleY => Axis::Y,
            Channel::TranslateZ | Channel::RotateZ | Channel::ScaleZ => Axis::Z,
        }
    }

    #[inline]
    pub fn is_translate(self) -> bool {
        matches!(
            self,
            Channel::TranslateX | Channel::TranslateY | Channel::TranslateZ
        )
    }

    #[inline]
    pub fn is_rotate(self) -> bool {
        matches!(self, Channel::RotateX | Channel::RotateY | Channel::RotateZ)
    }

    #[inline]
    pub fn is_scale(self) -> bool {
        matches!(self, Channel::ScaleX | Channel::ScaleY | Channel::ScaleZ)
    }

    /// Neutral value of the channel: 0 for translate/rotate, 1 for scale.
    #[inline]
    pub fn neutral(self) -> f32 {
        if self.is_scale() {
            1.0
        } else {
            0.0
        }
    }

    /// Stable lowercase name used in path fields ("translateX", "rotateY", ...).
    pub fn name(self) -> &'static str {
        match self {
            Channel::TranslateX => "translateX",
            Channel::TranslateY => "translateY",
            Channel::TranslateZ => "translateZ",
            Channel::RotateX => "rotateX",
            Channel::RotateY => "rotateY",
            Channel::RotateZ => "rotateZ",
            Channel::ScaleX => "scaleX",
            Channel::ScaleY => "scaleY",
            Channel::ScaleZ => "scaleZ",
        }
    }

    /// Inverse of [`Channel::name`].
    pub fn from_name(name: &str) -> Option<Self> {
        Channel::ALL.into_iter().find(|c| c.name() == name)
    }
}

impl fmt::Display for Channel {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

/// The nine channel values of one transform, stored per family.
#[derive(Clone, Copy, Debug, Serialize, Deserialize, PartialEq)]
pub struct ChannelValues {
    pub translate: [f32; 3],
    pub rotate: [f32; 3],
    pub scale: [f32; 3],
}

impl ChannelValues {
    /// Identity output: zero translate/rotate, unit scale.
    pub fn neutral() -> Self {
        Self {
            translate: [0.0; 3],
            rotate: [0.0; 3],
            scale: [1.0; 3],
        }
    }

    pub fn get(&self, channel: Channel) -> f32 {
        let i = channel.axis().index();
        if channel.is_translate() {
            self.translate[i]
        } else if channel.is_rotate() {
            self.rotate[i]
        } else {
            self.scale[i]
        }
    }

    pub fn set(&mut self, channel: Channel, value: f32) {
        let i = channel.axis().index();
        if channel.is_translate() {
            self.translate[i] = value;
        } else if channel.is_rotate() {
            self.rotate[i] = value;
        } else {
            self.scale[i] = value;
        }
    }
}

impl Default for ChannelValues {
    fn default() -> Self {
        Self::neutral()
    }
}

//! Rig side enumeration.
//!
//! Sides are carried explicitly through construction; the engine never
//! derives a side by patching `_l_`/`_r_` tokens inside node names.

use serde::{Deserialize, Serialize};
use std::fmt;

#[derive(Copy, Clone, Debug, Serialize, Deserialize, PartialEq, Eq, Hash)]
#[serde(rename_all = "lowercase")]
pub enum Side {
    Left,
    Right,
    Center,
}

impl Side {
    /// Short token used as the leading path namespace ("l", "r", "c").
    pub fn token(self) -> &'static str {
        match self {
            Side::Left => "l",
            Side::Right => "r",
            Side::Center => "c",
        }
    }

    /// Lateral offset sign: left joints are pushed toward negative values,
    /// right joints toward positive, center joints not at all.
    pub fn offset_sign(self) -> f32 {
        match self {
            Side::Left => -1.0,
            Side::Right => 1.0,
            Side::Center => 0.0,
        }
    }

    /// The opposite side. Center mirrors onto itself.
    pub fn mirrored(self) -> Side {
        match self {
            Side::Left => Side::Right,
            Side::Right => Side::Left,
            Side::Center => Side::Center,
        }
    }
}

impl fmt::Display for Side {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.token())
    }
}

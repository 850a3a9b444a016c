//! The six canonical target directions.

use nalgebra::Vector3;
use serde::{Deserialize, Serialize};
use std::fmt;

/// A coordinate axis.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Axis {
    X,
    Y,
    Z,
}

impl Axis {
    pub const ALL: [Axis; 3] = [Axis::X, Axis::Y, Axis::Z];

    /// Component index (0, 1 or 2).
    #[inline]
    pub fn index(self) -> usize {
        self as usize
    }

    /// The two other axes, in increasing order.
    #[inline]
    pub fn others(self) -> (Axis, Axis) {
        match self {
            Axis::X => (Axis::Y, Axis::Z),
            Axis::Y => (Axis::X, Axis::Z),
            Axis::Z => (Axis::X, Axis::Y),
        }
    }
}

/// One of the six axis-aligned unit directions.
///
/// The declaration order is the enumeration order used everywhere a
/// direction is chosen by index or a tie has to be broken.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Direction {
    #[serde(rename = "+x")]
    PosX,
    #[serde(rename = "-x")]
    NegX,
    #[serde(rename = "+y")]
    PosY,
    #[serde(rename = "-y")]
    NegY,
    #[serde(rename = "+z")]
    PosZ,
    #[serde(rename = "-z")]
    NegZ,
}

/// RGBA color, presentation only.
pub type Color = [u8; 4];

impl Direction {
    /// All directions in enumeration order: +X, -X, +Y, -Y, +Z, -Z.
    pub const ALL: [Direction; 6] = [
        Direction::PosX,
        Direction::NegX,
        Direction::PosY,
        Direction::NegY,
        Direction::PosZ,
        Direction::NegZ,
    ];

    #[inline]
    pub fn index(self) -> usize {
        self as usize
    }

    pub fn from_index(index: usize) -> Option<Direction> {
        Self::ALL.get(index).copied()
    }

    #[inline]
    pub fn axis(self) -> Axis {
        Axis::ALL[self.index() / 2]
    }

    /// +1 for the positive directions, -1 otherwise.
    #[inline]
    pub fn sign(self) -> f64 {
        if self.index() % 2 == 0 { 1.0 } else { -1.0 }
    }

    #[inline]
    pub fn opposite(self) -> Direction {
        Self::ALL[self.index() ^ 1]
    }

    pub fn vector(self) -> Vector3<f64> {
        let mut v = Vector3::zeros();
        v[self.axis().index()] = self.sign();
        v
    }

    /// Exact inverse of [`Direction::vector`], tolerating rounding noise.
    pub fn from_vector(v: &Vector3<f64>) -> Option<Direction> {
        const TOL: f64 = 1e-9;
        Self::ALL
            .into_iter()
            .find(|d| (d.vector() - v).amax() <= TOL)
    }

    /// Color shown for boxes targeting this direction.
    pub fn color(self) -> Color {
        match self {
            Direction::PosX => [230, 57, 70, 255],
            Direction::NegX => [128, 32, 40, 255],
            Direction::PosY => [67, 170, 139, 255],
            Direction::NegY => [34, 96, 78, 255],
            Direction::PosZ => [69, 123, 157, 255],
            Direction::NegZ => [29, 53, 87, 255],
        }
    }

    /// Short label such as `+z`.
    pub fn label(self) -> &'static str {
        match self {
            Direction::PosX => "+x",
            Direction::NegX => "-x",
            Direction::PosY => "+y",
            Direction::NegY => "-y",
            Direction::PosZ => "+z",
            Direction::NegZ => "-z",
        }
    }

    /// Parse a label produced by [`Direction::label`] (case-insensitive).
    pub fn from_label(label: &str) -> Option<Direction> {
        let label = label.trim().to_ascii_lowercase();
        Self::ALL.into_iter().find(|d| d.label() == label)
    }
}

impl fmt::Display for Direction {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.label())
    }
}

/// The direction in `table` best aligned with `normal`.
///
/// Alignment is the dot product; on a tie the earlier table entry wins.
/// Returns `None` only for an empty table.
pub fn closest_direction(normal: &Vector3<f64>, table: &[Direction]) -> Option<Direction> {
    let mut best: Option<(Direction, f64)> = None;
    for &d in table {
        let score = d.vector().dot(normal);
        match best {
            Some((_, s)) if score <= s => {}
            _ => best = Some((d, score)),
        }
    }
    best.map(|(d, _)| d)
}

impl Direction {
    /// [`closest_direction`] over [`Direction::ALL`].
    pub fn closest(normal: &Vector3<f64>) -> Direction {
        closest_direction(normal, &Self::ALL).unwrap_or(Direction::PosX)
    }
}

//! Axis-aligned envelopes in the ground units of a coordinate reference system.

use std::fmt::{Display, Formatter};
use std::str::FromStr;

use serde::{Deserialize, Serialize};

#[derive(thiserror::Error, Debug, PartialEq)]
pub enum EnvelopeError {
    #[error("Envelope must have exactly four comma-separated numbers, got `{0}`")]
    WrongNumberOfValues(String),

    #[error("Envelope value `{0}` is not a number")]
    InvalidNumber(String),
}

/// A rectangle in ground coordinates, `min_x..max_x` by `min_y..max_y`.
///
/// Y grows to the north, so `max_y` is the top edge.
///
/// # Examples
///
/// ```
/// # use gpkg_tile_utils::Envelope;
/// let env: Envelope = "-180,-90,180,90".parse().unwrap();
/// assert_eq!(env.width(), 360.0);
/// assert_eq!(env.to_string(), "-180,-90,180,90");
/// ```
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Envelope {
    pub min_x: f64,
    pub min_y: f64,
    pub max_x: f64,
    pub max_y: f64,
}

impl Envelope {
    #[must_use]
    pub fn new(min_x: f64, min_y: f64, max_x: f64, max_y: f64) -> Self {
        Self {
            min_x,
            min_y,
            max_x,
            max_y,
        }
    }

    #[must_use]
    pub fn width(&self) -> f64 {
        self.max_x - self.min_x
    }

    #[must_use]
    pub fn height(&self) -> f64 {
        self.max_y - self.min_y
    }

    /// All four values are finite and the envelope has a positive area.
    #[must_use]
    pub fn is_valid(&self) -> bool {
        [self.min_x, self.min_y, self.max_x, self.max_y]
            .iter()
            .all(|v| v.is_finite())
            && self.min_x < self.max_x
            && self.min_y < self.max_y
    }

    /// `other` lies entirely within `self`, edges included.
    #[must_use]
    pub fn contains(&self, other: &Self) -> bool {
        self.min_x <= other.min_x
            && self.min_y <= other.min_y
            && self.max_x >= other.max_x
            && self.max_y >= other.max_y
    }

    /// The two envelopes share some area, touching edges do not count.
    #[must_use]
    pub fn intersects(&self, other: &Self) -> bool {
        self.min_x < other.max_x
            && self.max_x > other.min_x
            && self.min_y < other.max_y
            && self.max_y > other.min_y
    }

    /// Smallest envelope covering both.
    #[must_use]
    pub fn union(&self, other: &Self) -> Self {
        Self {
            min_x: self.min_x.min(other.min_x),
            min_y: self.min_y.min(other.min_y),
            max_x: self.max_x.max(other.max_x),
            max_y: self.max_y.max(other.max_y),
        }
    }
}

impl Display for Envelope {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        if let Some(prec) = f.precision() {
            write!(
                f,
                "{:.prec$},{:.prec$},{:.prec$},{:.prec$}",
                self.min_x, self.min_y, self.max_x, self.max_y
            )
        } else {
            write!(
                f,
                "{},{},{},{}",
                self.min_x, self.min_y, self.max_x, self.max_y
            )
        }
    }
}

impl FromStr for Envelope {
    type Err = EnvelopeError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let values = s
            .split(',')
            .map(|v| {
                let v = v.trim();
                v.parse::<f64>()
                    .map_err(|_| EnvelopeError::InvalidNumber(v.to_string()))
            })
            .collect::<Result<Vec<_>, _>>()?;
        match values.as_slice() {
            [min_x, min_y, max_x, max_y] => Ok(Self::new(*min_x, *min_y, *max_x, *max_y)),
            _ => Err(EnvelopeError::WrongNumberOfValues(s.to_string())),
        }
    }
}

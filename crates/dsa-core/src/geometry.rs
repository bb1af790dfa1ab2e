//! Positioned elements: points, transmitters and receivers.
//!
//! Internal coordinates are in cell units. Anything handed to a propagation
//! model is first scaled to meters with [`Element::scaled`].

use crate::wireless::{to_db, to_linear};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::ops::Add;

/// 2-D location in cell coordinates.
#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize, Deserialize)]
pub struct Point {
    pub x: f64,
    pub y: f64,
}

impl Point {
    pub const ORIGIN: Point = Point { x: 0.0, y: 0.0 };

    pub fn new(x: f64, y: f64) -> Self {
        Self { x, y }
    }

    /// Euclidean distance to another point.
    pub fn distance(&self, other: &Point) -> f64 {
        let dx = self.x - other.x;
        let dy = self.y - other.y;
        (dx * dx + dy * dy).sqrt()
    }

    /// Multiply both coordinates by `factor` (cell size → meters).
    pub fn scale(&self, factor: f64) -> Point {
        Point::new(self.x * factor, self.y * factor)
    }

    pub fn to_polar(&self) -> PolarPoint {
        PolarPoint {
            r: self.distance(&Point::ORIGIN),
            theta: self.y.atan2(self.x),
        }
    }
}

impl Add for Point {
    type Output = Point;
    fn add(self, rhs: Point) -> Point {
        Point::new(self.x + rhs.x, self.y + rhs.y)
    }
}

impl From<PolarPoint> for Point {
    fn from(p: PolarPoint) -> Self {
        Point::new(p.r * p.theta.cos(), p.r * p.theta.sin())
    }
}

impl fmt::Display for Point {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{:.3},{:.3}", self.x, self.y)
    }
}

/// Polar coordinate (radius in cells, angle in radians).
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct PolarPoint {
    pub r: f64,
    pub theta: f64,
}

impl PolarPoint {
    pub fn new(r: f64, theta: f64) -> Self {
        Self { r, theta }
    }
}

/// A point with an antenna height in meters.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Element {
    pub location: Point,
    pub height: f64,
}

impl Element {
    pub fn new(location: Point, height: f64) -> Self {
        Self { location, height }
    }

    /// Same element with its location converted to meters.
    pub fn scaled(&self, cell_size: f64) -> Element {
        Element::new(self.location.scale(cell_size), self.height)
    }

    /// Element translated by `offset`, keeping the height.
    pub fn offset(&self, offset: Point) -> Element {
        Element::new(self.location + offset, self.height)
    }
}

/// Transmitter: element plus transmit power in dB (`-inf` when idle).
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Tx {
    pub element: Element,
    pub power: f64,
}

impl Tx {
    pub fn new(element: Element, power: f64) -> Self {
        Self { element, power }
    }

    pub fn location(&self) -> Point {
        self.element.location
    }
}

/// Receiver: element plus accumulated received power in dB.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Rx {
    pub element: Element,
    pub received_power: f64,
}

impl Rx {
    /// New receiver that has not heard anything yet.
    pub fn new(element: Element) -> Self {
        Self {
            element,
            received_power: f64::NEG_INFINITY,
        }
    }

    pub fn location(&self) -> Point {
        self.element.location
    }

    pub fn reset(&mut self) {
        self.received_power = f64::NEG_INFINITY;
    }

    /// Add a contribution in the linear domain.
    pub fn accumulate(&mut self, power_db: f64) {
        self.received_power = to_db(to_linear(self.received_power) + to_linear(power_db));
    }
}

//! Secondary users.

use crate::geometry::{Element, Point, Tx};
use std::fmt;

/// A transmitter asking for spectrum.
///
/// In an SU slice the last element is the requesting SU; the ones before it
/// are incumbents whose powers are granted first.
#[derive(Debug, Clone, PartialEq)]
pub struct Su {
    id: String,
    pub tx: Tx,
    /// Receiver the SU talks to, used for SINR and data rate.
    pub rx: Option<Element>,
    /// Last computed SINR at `rx` (dB).
    pub sinr: f64,
}

impl Su {
    pub fn new(id: impl Into<String>, tx: Tx) -> Self {
        Self {
            id: id.into(),
            tx,
            rx: None,
            sinr: f64::NEG_INFINITY,
        }
    }

    pub fn with_rx(mut self, rx: Element) -> Self {
        self.rx = Some(rx);
        self
    }

    pub fn id(&self) -> &str {
        &self.id
    }

    pub fn location(&self) -> Point {
        self.tx.element.location
    }
}

impl fmt::Display for Su {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{},{:.3}", self.location(), self.tx.power)
    }
}

/// Split an SU slice into incumbents and the requesting SU.
pub fn split_requesting(sus: &[Su]) -> Option<(&[Su], &Su)> {
    sus.split_last().map(|(last, rest)| (rest, last))
}

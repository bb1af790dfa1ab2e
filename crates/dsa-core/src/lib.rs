//! # DSA Core Library
//!
//! Allocation engines for dynamic spectrum access: how much power may a
//! secondary user (SU) transmit without breaking the interference budget of
//! any primary user receiver (PUR)?
//!
//! ## Overview
//!
//! - **Oracle** ([`SpectrumManager`]): knows every transmitter and queries
//!   the propagation model directly. Also fills the sensor readings.
//! - **Crowd-sourced** ([`CsSpectrumManager`]): sees only sensor readings
//!   and PU locations, and interpolates path gains (IDW, ILDW or ordinary
//!   kriging).
//! - **Joint maximizer** ([`JointPowers`]): largest per-SU power vector when
//!   all SUs transmit at once.
//!
//! ## Sample Flow
//!
//! ```text
//! PUs/SUs → SpectrumManager → sensor readings → CsSpectrumManager
//!                 │                                     │
//!                 └──── ground truth max ───── compare ─┘
//! ```
//!
//! ## Example
//!
//! ```rust,no_run
//! use dsa_core::prelude::*;
//!
//! let pur = Pur::new("PU0_PUR0", Element::new(Point::new(2.0, 0.0), 15.0),
//!     InterferenceMethod::Beta, 0.05).unwrap();
//! let mut pus = vec![Pu::new("PU0", Tx::new(Element::new(Point::ORIGIN, 30.0), 0.0), vec![pur])];
//! let mut sss = vec![SpectrumSensor::new(Element::new(Point::new(40.0, 5.0), 15.0), 1.0, 1.0)];
//! let mut sus = vec![Su::new("SU0", Tx::new(Element::new(Point::new(50.0, 0.0), 15.0), 0.0))];
//! let model = PropagationModel::log_distance(3.0);
//!
//! let mut sm = SpectrumManager::new(&mut pus, &mut sss, &mut sus, &model, OracleParams::default());
//! let truth = sm.compute_su_max_power(false).unwrap();
//!
//! let cs = CsSpectrumManager::new(&pus, &sss, &sus, CsParams::default());
//! println!("oracle {truth:.2} dB, crowd-sourced {:.2} dB", cs.su_max_power());
//! ```

pub mod cs_manager;
pub mod error;
pub mod geometry;
pub mod ids;
pub mod interpolation;
pub mod joint;
pub mod kriging;
pub mod manager;
pub mod nearest;
pub mod propagation;
pub mod pu;
pub mod pur;
pub mod replay;
pub mod sample;
pub mod sensor;
pub mod shape;
pub mod spread;
pub mod su;
pub mod synthetic;
pub mod wireless;

pub use cs_manager::{CsParams, CsSpectrumManager};
pub use error::{DsaError, DsaResult};
pub use geometry::{Element, Point, PolarPoint, Rx, Tx};
pub use ids::IdAllocator;
pub use interpolation::Interpolation;
pub use joint::JointPowers;
pub use manager::{MaxPower, OracleParams, SpectrumManager};
pub use propagation::{LogDistance, PathLossMap, PropagationError, PropagationModel};
pub use pu::Pu;
pub use pur::{InterferenceMethod, Pur, PurLayout};
pub use sensor::SpectrumSensor;
pub use shape::{Shape, WeightTable};
pub use su::Su;
pub use synthetic::SyntheticPus;

/// Common imports.
pub mod prelude {
    pub use crate::cs_manager::{CsParams, CsSpectrumManager};
    pub use crate::error::{DsaError, DsaResult};
    pub use crate::geometry::{Element, Point, PolarPoint, Tx};
    pub use crate::interpolation::Interpolation;
    pub use crate::manager::{OracleParams, SpectrumManager};
    pub use crate::propagation::PropagationModel;
    pub use crate::pu::Pu;
    pub use crate::pur::{InterferenceMethod, Pur};
    pub use crate::sensor::SpectrumSensor;
    pub use crate::su::Su;
    pub use crate::wireless::{to_db, to_linear};
}

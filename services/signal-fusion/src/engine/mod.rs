//! Fusion pipeline: classify, fuse, validate, calibrate, grade, price

pub mod calibrator;
pub mod consensus;
pub mod ensemble;
pub mod fusion;
pub mod grade;
pub mod indicators;
pub mod market;
pub mod targets;

pub use calibrator::CalibrationBreakdown;
pub use fusion::FusionEngine;
pub use indicators::Series;
pub use targets::{PriceStructure, SellFactors};

//! Gait-cycle ensemble averaging.
//!
//! Joint-angle samples that have already been synchronised to a gait-cycle
//! percentage are grouped by activity, metric and whole gait percent, and
//! reduced to a mean and standard deviation per group.

pub mod ensemble;
pub mod loader;

pub use ensemble::{EnsembleAverager, EnsemblePoint, Welford};
pub use loader::{GaitColumns, GaitError, GaitLoader, GaitSample, GaitTable};

/// Gait percentage written for frames outside any detected cycle.
pub const UNSYNCED_GAIT_PERCENT: f64 = 999.0;

/// Hip angles compared in the stair-vs-walk study.
pub const DEFAULT_METRICS: &[&str] = &["hip_flexion_r", "hip_adduction_r", "hip_rotation_r"];

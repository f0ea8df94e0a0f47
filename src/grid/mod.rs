//! Grid lattice, calibration and snapping.
//!
//! - [`model`]: the validated parallelogram lattice ([`GridModel`]).
//! - [`calibrate`]: infer a lattice from three clicked cell corners.
//! - [`snap`]: crop or rectify an image to whole, axis-aligned cells.

pub mod calibrate;
pub mod model;
pub mod snap;

pub use calibrate::{Calibration, CalibrationError, CalibrationParams, GridCalibrator, ThirdPoint};
pub use model::{GridModel, GridModelError, MIN_CELL_AREA};
pub use snap::{GridSnapper, RectifiedImage, SnapError, SnapParams, RESAMPLE_TOLERANCE};

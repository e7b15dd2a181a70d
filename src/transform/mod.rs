//! Series transformations used to build model features.

pub mod scale;
pub mod window;

pub use scale::{standardize, Standardizer};
pub use window::{lag, rolling_mean};

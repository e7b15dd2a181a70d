//! Numerical helpers shared by the models and the optimizer.

pub mod ols;
pub mod stats;

pub use ols::{fit_linear, Column, LinearFit};
pub use stats::{mae, mean, quantile, sample_std, z_score};

//! Dimensionality reduction.

pub mod pca;

pub use pca::{FittedPca, Pca, PcaParams};

//! Target encoding.
//!
//! The class column is text; models work with dense indices `0..n_classes`.

mod label;

pub use label::{FittedLabelEncoder, LabelEncoder, LabelEncoderParams};

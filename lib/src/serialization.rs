//! Byte encoding of fitted preprocessing statistics.
//!
//! The missingness filter, scaler and PCA each expose their learned state as
//! a plain `*Params` struct (kept column names, means, loadings). Any such
//! struct deriving `serde` gets a `bincode` encoding here, which is what
//! `FittedTransformer::save_to_file` writes.

/// Learned statistics that can round-trip through bytes.
pub trait SerializableParams: Sized {
    type Error: std::error::Error + Send + Sync + 'static;

    fn to_bytes(&self) -> Result<Vec<u8>, Self::Error>;

    fn from_bytes(bytes: &[u8]) -> Result<Self, Self::Error>;
}

impl<T> SerializableParams for T
where
    T: serde::Serialize + serde::de::DeserializeOwned,
{
    type Error = bincode::Error;

    fn to_bytes(&self) -> Result<Vec<u8>, bincode::Error> {
        bincode::serialize(self)
    }

    fn from_bytes(bytes: &[u8]) -> Result<Self, bincode::Error> {
        bincode::deserialize(bytes)
    }
}

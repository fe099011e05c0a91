//! Photo preparation before upload

mod normalizer;

pub use normalizer::{ImageNormalizer, NormalizeError, NormalizedImage};

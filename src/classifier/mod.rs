pub mod complexity;
pub mod types;

pub use complexity::ComplexityClassifier;
pub use types::{Classification, ComplexityTier, Domain};

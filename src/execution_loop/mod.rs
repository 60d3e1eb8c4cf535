pub mod correction_loop;
pub mod error_classifier;

pub use correction_loop::*;
pub use error_classifier::*;

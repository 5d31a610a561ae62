pub mod config;
pub mod pipeline;
pub mod solver;
pub mod types;

// Re-export the local solver for easy access inside the library
pub use solver::{levenberg_marquardt, LmConfig, LmResult, TerminationReason};

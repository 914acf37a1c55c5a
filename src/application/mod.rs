//! Application module - the comparison orchestrator.

pub mod comparison_engine;

pub use comparison_engine::{ComparisonEngine, EngineSettings};

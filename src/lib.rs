#[cfg(feature = "cli")]
pub mod cli;
pub mod engine;
pub mod error;
pub mod model;
pub mod output;

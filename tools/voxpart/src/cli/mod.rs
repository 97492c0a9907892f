//! CLI-specific utilities for voxpart
//!
//! Kept apart from the library so that it stays free of terminal output.

pub mod progress;

pub use progress::ProgressManager;

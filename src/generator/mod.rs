//! Load generator facade.
//!
//! This module provides the main entry point.
//!
//! # Components
//!
//! | Type | Description |
//! |------|-------------|
//! | [`LoadGenerator`] | start / stop / reset and pool observers |
//! | [`LoadGeneratorBuilder`] | Fluent configuration builder |
//! | [`RampOptions`] | Target size and intervals for one `start` |
//! | [`PoolStatus`] | Snapshot for display |

// ============================================================================
// Submodules
// ============================================================================

/// Fluent builder pattern for generator configuration.
pub mod builder;

/// Core generator implementation.
pub mod core;

/// Ramp parameters.
pub mod options;

// ============================================================================
// Re-exports
// ============================================================================

pub use builder::LoadGeneratorBuilder;
pub use core::{LoadGenerator, PoolStatus};
pub use options::RampOptions;

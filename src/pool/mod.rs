//! Connection pool core.
//!
//! # Architecture
//!
//! ```text
//! ┌───────────────────────────────────────────────┐
//! │               PoolController                  │
//! │   ramp-up ─► ramp-down ─► report (cancellable)│
//! └──────────────┬────────────────────────────────┘
//!                │ opens / evicts
//!                ▼
//! ┌───────────────────────────────────────────────┐
//! │                  Registry                     │
//! │   id=1 → Connection   ready = {1}             │
//! │   id=2 → Connection                           │
//! └──────────────▲────────────────────────────────┘
//!                │ joins on open, leaves on close
//!        ┌───────┴───────┐
//!        │  Connection   │ ◄── link events, heartbeat task
//!        └───────────────┘
//! ```
//!
//! # Modules
//!
//! | Module | Description |
//! |--------|-------------|
//! | `connection` | Single pool member and its lifecycle |
//! | `controller` | Reconciliation task |
//! | `registry` | Live and ready connection bookkeeping |

// ============================================================================
// Submodules
// ============================================================================

/// Single pool member.
pub mod connection;

/// Reconciliation task.
pub mod controller;

/// Live and ready connection bookkeeping.
pub mod registry;

// ============================================================================
// Re-exports
// ============================================================================

pub use connection::{Connection, ConnectionContext, ConnectionState};
pub use controller::{PoolController, PoolReport, RampPlan};
pub use registry::Registry;

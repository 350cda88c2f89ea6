//! Node protocol payloads.
//!
//! The pool treats payloads as opaque text. This module supplies the
//! default texts and the readiness check.
//!
//! | Message | Direction | Purpose |
//! |---------|-----------|---------|
//! | `NODE_REGISTRATION` | Node → Server | Sent once after open |
//! | `NODE_HEARTBEAT` | Node → Server | Sent on the heartbeat schedule |
//! | anything containing `FRONT_END_UI_INITIAL_STATE` | Server → Node | Marks the node ready |
//!
//! # Modules
//!
//! | Module | Description |
//! |--------|-------------|
//! | `message` | Outbound message types |
//! | `payload` | [`PayloadBuilder`] seam and default implementation |

// ============================================================================
// Submodules
// ============================================================================

/// Outbound message types.
pub mod message;

/// Payload builder seam.
pub mod payload;

// ============================================================================
// Re-exports
// ============================================================================

pub use message::NodeMessage;
pub use payload::{DEFAULT_AUTH_PREFIX, NodePayloads, PayloadBuilder, READY_MARKER};

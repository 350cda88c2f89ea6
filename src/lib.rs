//! ws-loadpool - Dynamic WebSocket connection-pool load generator.
//!
//! Keeps a target number of concurrent WebSocket sessions open against an
//! endpoint, ramps the pool up or down toward that target at a bounded
//! join rate, heartbeats every session, and counts how many sessions the
//! server has brought to an application-level "ready" state.
//!
//! # Architecture
//!
//! ```text
//! control surface ──► LoadGenerator ──► PoolController ──► Connection ×N
//!        ▲                 │                  │                 │
//!        └── counts ◄── Registry ◄────────────┴──── join/leave ─┘
//! ```
//!
//! - Each [`Connection`](pool::Connection) owns its link and heartbeat task
//! - The [`Registry`](pool::Registry) is the only shared mutable state
//! - At most one reconciliation run mutates the pool at a time
//!
//! # Quick Start
//!
//! ```no_run
//! use ws_loadpool::{LoadGenerator, RampOptions, Result};
//!
//! #[tokio::main]
//! async fn main() -> Result<()> {
//!     let generator = LoadGenerator::builder().build()?;
//!
//!     // 100 sessions, one every 200ms, heartbeat every second
//!     generator
//!         .start(RampOptions::from_millis(100, 200, 1000), "ws://127.0.0.1:9000/sdpws")
//!         .await?;
//!
//!     tokio::time::sleep(std::time::Duration::from_secs(30)).await;
//!     println!("{:?}", generator.status());
//!
//!     generator.shutdown().await;
//!     Ok(())
//! }
//! ```
//!
//! # Modules
//!
//! | Module | Description |
//! |--------|-------------|
//! | [`generator`] | Facade: [`LoadGenerator`], [`RampOptions`] |
//! | [`pool`] | Connections, registry, reconciliation |
//! | [`transport`] | [`Connector`] seam, WebSocket and in-memory links |
//! | [`protocol`] | Registration/heartbeat payloads, readiness marker |
//! | [`error`] | Error types and [`Result`] alias |
//! | [`identifiers`] | [`ConnectionId`] and its allocator |

// ============================================================================
// Modules
// ============================================================================

/// Error types and result aliases.
///
/// All fallible operations return [`Result<T>`] which uses [`Error`].
pub mod error;

/// Load generator facade.
///
/// Use [`LoadGenerator::builder()`] to create a configured instance.
pub mod generator;

/// Type-safe identifiers.
pub mod identifiers;

/// Connection pool core.
pub mod pool;

/// Node protocol payloads.
pub mod protocol;

/// Transport layer.
pub mod transport;

#[cfg(test)]
mod testing;

// ============================================================================
// Re-exports
// ============================================================================

// Facade types
pub use generator::{LoadGenerator, LoadGeneratorBuilder, PoolStatus, RampOptions};

// Pool types
pub use pool::{ConnectionState, PoolReport};

// Error types
pub use error::{Error, Result};

// Identifier types
pub use identifiers::ConnectionId;

// Protocol types
pub use protocol::{NodePayloads, PayloadBuilder, READY_MARKER};

// Transport types
pub use transport::{Connector, MemoryConnector, TransportEvent, TransportLink, WebSocketConnector};

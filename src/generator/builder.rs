//! Builder pattern for generator configuration.
//!
//! Provides a fluent API for configuring and creating [`LoadGenerator`]
//! instances.
//!
//! # Example
//!
//! ```no_run
//! use ws_loadpool::LoadGenerator;
//!
//! # fn example() -> ws_loadpool::Result<()> {
//! let generator = LoadGenerator::builder()
//!     .auth_prefix("soak")
//!     .build()?;
//! # Ok(())
//! # }
//! ```

// ============================================================================
// Imports
// ============================================================================

use std::fmt;
use std::sync::Arc;

use crate::error::{Error, Result};
use crate::protocol::{NodePayloads, PayloadBuilder};
use crate::transport::{Connector, WebSocketConnector};

use super::core::LoadGenerator;

// ============================================================================
// LoadGeneratorBuilder
// ============================================================================

/// Builder for configuring a [`LoadGenerator`] instance.
///
/// Use [`LoadGenerator::builder()`] to create a new builder.
#[derive(Default, Clone)]
pub struct LoadGeneratorBuilder {
    /// Transport; WebSocket when unset.
    connector: Option<Arc<dyn Connector>>,
    /// Custom payload builder.
    payloads: Option<Arc<dyn PayloadBuilder>>,
    /// Auth token prefix for the default payload builder.
    auth_prefix: Option<String>,
}

impl fmt::Debug for LoadGeneratorBuilder {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("LoadGeneratorBuilder")
            .field("custom_connector", &self.connector.is_some())
            .field("custom_payloads", &self.payloads.is_some())
            .field("auth_prefix", &self.auth_prefix)
            .finish()
    }
}

// ============================================================================
// LoadGeneratorBuilder Implementation
// ============================================================================

impl LoadGeneratorBuilder {
    /// Creates a new builder with no configuration.
    #[inline]
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Sets the transport connector.
    ///
    /// # Arguments
    ///
    /// * `connector` - e.g. [`MemoryConnector`](crate::transport::MemoryConnector) for dry runs
    #[inline]
    #[must_use]
    pub fn connector(mut self, connector: impl Connector) -> Self {
        self.connector = Some(Arc::new(connector));
        self
    }

    /// Sets a custom payload builder.
    #[inline]
    #[must_use]
    pub fn payloads(mut self, payloads: impl PayloadBuilder) -> Self {
        self.payloads = Some(Arc::new(payloads));
        self
    }

    /// Sets the auth token prefix used by the default payload builder.
    ///
    /// # Arguments
    ///
    /// * `prefix` - tokens become `<prefix><id>`
    #[inline]
    #[must_use]
    pub fn auth_prefix(mut self, prefix: impl Into<String>) -> Self {
        self.auth_prefix = Some(prefix.into());
        self
    }

    /// Builds the generator with validation.
    ///
    /// # Errors
    ///
    /// - [`Error::Config`] if the auth prefix is empty
    /// - [`Error::Config`] if both a custom payload builder and an auth
    ///   prefix are set
    pub fn build(self) -> Result<LoadGenerator> {
        let payloads = self.validate_payloads()?;
        let connector = self
            .connector
            .unwrap_or_else(|| Arc::new(WebSocketConnector::new()));

        Ok(LoadGenerator::new(connector, payloads))
    }
}

// ============================================================================
// Validation
// ============================================================================

impl LoadGeneratorBuilder {
    /// Validates the payload configuration.
    fn validate_payloads(&self) -> Result<Arc<dyn PayloadBuilder>> {
        match (&self.payloads, &self.auth_prefix) {
            (Some(_), Some(_)) => Err(Error::config(
                "auth_prefix only applies to the default payload builder.\n\
                 Derive tokens inside the custom PayloadBuilder instead.",
            )),
            (Some(payloads), None) => Ok(Arc::clone(payloads)),
            (None, Some(prefix)) if prefix.is_empty() => {
                Err(Error::config("auth_prefix must not be empty"))
            }
            (None, Some(prefix)) => Ok(Arc::new(NodePayloads::new(prefix.clone()))),
            (None, None) => Ok(Arc::new(NodePayloads::default())),
        }
    }
}

// ============================================================================
// Tests
// ============================================================================

#[cfg(test)]
mod tests {
    use super::*;

    use crate::transport::MemoryConnector;

    #[test]
    fn test_new_creates_empty_builder() {
        let builder = LoadGeneratorBuilder::new();
        assert!(builder.connector.is_none());
        assert!(builder.payloads.is_none());
        assert!(builder.auth_prefix.is_none());
    }

    #[test]
    fn test_default_build_succeeds() {
        assert!(LoadGeneratorBuilder::new().build().is_ok());
    }

    #[test]
    fn test_connector_sets_transport() {
        let builder = LoadGeneratorBuilder::new().connector(MemoryConnector::new());
        assert!(builder.connector.is_some());
    }

    #[test]
    fn test_empty_prefix_rejected() {
        let err = LoadGeneratorBuilder::new()
            .auth_prefix("")
            .build()
            .unwrap_err();
        assert!(matches!(err, Error::Config { .. }));
    }

    #[test]
    fn test_prefix_with_custom_payloads_rejected() {
        let result = LoadGeneratorBuilder::new()
            .payloads(NodePayloads::new("x"))
            .auth_prefix("y")
            .build();

        let err = result.unwrap_err();
        assert!(err.to_string().contains("auth_prefix"));
    }
}

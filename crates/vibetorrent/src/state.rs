//! Connection lifecycle: whether the dashboard has a usable daemon yet.
//!
//! ```text
//!                configure() ok
//! [Unconfigured] ─────────────→ [Configured(client)]
//!       │  ▲                          │
//!       └──┘ configure() err          └──→ configure() again swaps the
//!          (state untouched)               client only if the new one
//!                                          answers
//! ```
//!
//! The state is an ordinary value owned by whoever handles requests (for
//! example inside an `Arc<RwLock<ClientState>>` in a web app's shared
//! state). There is no process-wide client.

use crate::client::RtorrentClient;
use crate::config::ClientConfig;
use crate::error::VibetorrentError;

/// Whether a working daemon connection has been configured.
#[derive(Debug, Clone, Default)]
pub enum ClientState {
    /// No endpoint yet, or none that answered.
    #[default]
    Unconfigured,
    /// A client whose endpoint passed a connection test.
    Configured(RtorrentClient),
}

impl ClientState {
    /// Starts configured when `config` has an endpoint that answers, and
    /// unconfigured otherwise.
    pub async fn from_config(config: &ClientConfig) -> Self {
        let mut state = Self::Unconfigured;
        if config.is_configured() {
            if let Err(e) = state.configure(config).await {
                tracing::warn!(endpoint = %config.endpoint, error = %e, "configured endpoint unreachable");
            }
        }
        state
    }

    /// Tests `config` and, if the daemon answers, switches to it.
    ///
    /// On any failure the current state is left exactly as it was and the
    /// error is returned. On success the daemon's version string is
    /// returned.
    pub async fn configure(&mut self, config: &ClientConfig) -> Result<String, VibetorrentError> {
        if !config.is_configured() {
            return Err(VibetorrentError::NotConfigured);
        }
        let client = RtorrentClient::new(config);
        let version = client.test_connection().await?;
        tracing::info!(endpoint = %config.endpoint, %version, "client configured");
        *self = Self::Configured(client);
        Ok(version)
    }

    pub fn is_configured(&self) -> bool {
        matches!(self, Self::Configured(_))
    }

    /// The configured client, or [`VibetorrentError::NotConfigured`].
    pub fn client(&self) -> Result<&RtorrentClient, VibetorrentError> {
        match self {
            Self::Configured(client) => Ok(client),
            Self::Unconfigured => Err(VibetorrentError::NotConfigured),
        }
    }

    /// Drops the client and returns to `Unconfigured`.
    pub fn reset(&mut self) {
        *self = Self::Unconfigured;
    }
}

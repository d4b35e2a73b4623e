//! `WaymarkServer` builder and accept loop.
//!
//! This is the entry point for running a Waymark server. It ties the
//! layers together: transport → session admission → tracker → hub.

use std::future::{Future, pending};
use std::sync::Arc;
use std::time::Duration;

use tokio::task::JoinHandle;
use waymark_protocol::JsonCodec;
use waymark_session::{Authenticator, Directory};
use waymark_store::{LocationLog, MemoryPositionCache, PositionCache};
use waymark_throttle::ThrottleConfig;
use waymark_transport::{Transport, WebSocketTransport};

use crate::session::run_session;
use crate::{ServerConfig, Tracker, WaymarkError};

/// Shared server state passed to each session task.
pub(crate) struct ServerState<A, D, P, L> {
    pub(crate) auth: A,
    pub(crate) tracker: Arc<Tracker<D, P, L>>,
    pub(crate) codec: JsonCodec,
    pub(crate) config: ServerConfig,
}

/// Builder for configuring and starting a Waymark server.
///
/// # Example
///
/// ```rust,no_run
/// use std::sync::Arc;
///
/// use waymark::prelude::*;
///
/// # async fn run(secret: &[u8]) -> Result<(), WaymarkError> {
/// let directory = Arc::new(MemoryDirectory::new());
/// let auth = SessionAuthenticator::new(JwtValidator::new(secret), Arc::clone(&directory));
/// let server = WaymarkServerBuilder::new()
///     .bind("0.0.0.0:8080")
///     .build_with_memory_cache(auth, directory, MemoryLocationLog::new())
///     .await?;
/// server.run().await
/// # }
/// ```
pub struct WaymarkServerBuilder {
    config: ServerConfig,
}

impl WaymarkServerBuilder {
    /// Creates a new builder with default settings.
    pub fn new() -> Self {
        Self {
            config: ServerConfig::default(),
        }
    }

    /// Replaces the whole configuration.
    pub fn config(mut self, config: ServerConfig) -> Self {
        self.config = config;
        self
    }

    /// Sets the address to bind the server to.
    pub fn bind(mut self, addr: &str) -> Self {
        self.config.bind_addr = addr.to_string();
        self
    }

    /// Sets the persistence throttle thresholds.
    pub fn throttle(mut self, throttle: ThrottleConfig) -> Self {
        self.config.throttle = throttle;
        self
    }

    /// Sets how long admission may take.
    pub fn admission_timeout(mut self, timeout: Duration) -> Self {
        self.config.admission_timeout = timeout;
        self
    }

    /// Binds the listener and assembles the server.
    ///
    /// `directory` answers group queries; pass the same `Arc` the
    /// authenticator uses to share one directory between them.
    pub async fn build<A, D, P, L>(
        self,
        auth: A,
        directory: D,
        cache: P,
        log: L,
    ) -> Result<WaymarkServer<A, D, P, L>, WaymarkError>
    where
        A: Authenticator,
        D: Directory,
        P: PositionCache,
        L: LocationLog,
    {
        let transport = WebSocketTransport::bind(&self.config.bind_addr).await?;
        let tracker = Arc::new(Tracker::new(directory, cache, log, &self.config));

        let state = Arc::new(ServerState {
            auth,
            tracker,
            codec: JsonCodec,
            config: self.config,
        });

        Ok(WaymarkServer { transport, state })
    }

    /// Like [`build`](Self::build), with an in-process position cache
    /// configured from this builder's `cache` settings.
    pub async fn build_with_memory_cache<A, D, L>(
        self,
        auth: A,
        directory: D,
        log: L,
    ) -> Result<WaymarkServer<A, D, MemoryPositionCache, L>, WaymarkError>
    where
        A: Authenticator,
        D: Directory,
        L: LocationLog,
    {
        let cache = MemoryPositionCache::new(self.config.cache.clone());
        self.build(auth, directory, cache, log).await
    }
}

impl Default for WaymarkServerBuilder {
    fn default() -> Self {
        Self::new()
    }
}

/// A bound Waymark server.
///
/// Call [`run()`](Self::run) to start accepting connections.
pub struct WaymarkServer<A, D, P, L> {
    transport: WebSocketTransport,
    state: Arc<ServerState<A, D, P, L>>,
}

impl<A, D, P, L> WaymarkServer<A, D, P, L>
where
    A: Authenticator,
    D: Directory,
    P: PositionCache,
    L: LocationLog,
{
    /// Returns the local address the server is bound to.
    pub fn local_addr(&self) -> std::io::Result<std::net::SocketAddr> {
        self.transport.local_addr()
    }

    /// The pipeline, for queries and inspection. Stays valid after
    /// [`run`](Self::run) takes the server.
    pub fn tracker(&self) -> Arc<Tracker<D, P, L>> {
        Arc::clone(&self.state.tracker)
    }

    /// The configuration in effect.
    pub fn config(&self) -> &ServerConfig {
        &self.state.config
    }

    /// Runs the accept loop until the process is terminated.
    pub async fn run(self) -> Result<(), WaymarkError> {
        self.run_until(pending()).await
    }

    /// Runs the accept loop until `shutdown` completes.
    ///
    /// Sessions already running are left to finish on their own.
    pub async fn run_until(
        mut self,
        shutdown: impl Future<Output = ()>,
    ) -> Result<(), WaymarkError> {
        let _sweeper = self.spawn_cache_sweeper();
        tracing::info!(addr = ?self.local_addr().ok(), "Waymark server running");

        tokio::pin!(shutdown);
        loop {
            tokio::select! {
                _ = &mut shutdown => {
                    tracing::info!("Waymark server shutting down");
                    return Ok(());
                }
                // Only the TCP accept happens here; the handshake runs in
                // the connection's own task.
                accepted = self.transport.accept() => match accepted {
                    Ok(incoming) => {
                        let state = Arc::clone(&self.state);
                        tokio::spawn(run_session(incoming, state));
                    }
                    Err(e) => {
                        tracing::error!(error = %e, "accept failed");
                    }
                },
            }
        }
    }

    fn spawn_cache_sweeper(&self) -> Option<AbortOnDrop> {
        let every = self.state.config.cache_sweep_interval;
        if every.is_zero() {
            return None;
        }
        let tracker = Arc::clone(&self.state.tracker);
        Some(AbortOnDrop(tokio::spawn(async move {
            let mut ticker = tokio::time::interval(every);
            // The first tick completes immediately; nothing to purge yet.
            ticker.tick().await;
            loop {
                ticker.tick().await;
                tracker.cache().purge_expired().await;
            }
        })))
    }
}

/// Stops a background task when the server stops.
struct AbortOnDrop(JoinHandle<()>);

impl Drop for AbortOnDrop {
    fn drop(&mut self) {
        self.0.abort();
    }
}

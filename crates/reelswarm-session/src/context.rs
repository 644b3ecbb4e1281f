//! Process-scoped engine context.

use std::fmt;
use std::sync::Arc;

use futures_util::FutureExt;
use futures_util::future::BoxFuture;
use reelswarm_torrent_core::{SwarmClient, TorrentError, TorrentResult};
use tokio::sync::OnceCell;
use tracing::info;

/// Builds the swarm client on first use.
pub type SwarmClientFactory =
    Box<dyn Fn() -> BoxFuture<'static, anyhow::Result<Arc<dyn SwarmClient>>> + Send + Sync>;

/// Owns the single swarm client for the lifetime of the process.
///
/// The client is created lazily by the injected factory the first time a
/// session needs it. A failed construction leaves the cell empty so the next
/// call retries.
pub struct EngineContext {
    factory: SwarmClientFactory,
    client: OnceCell<Arc<dyn SwarmClient>>,
}

impl EngineContext {
    /// Context that builds its client through `factory`.
    #[must_use]
    pub fn new(factory: SwarmClientFactory) -> Self {
        Self {
            factory,
            client: OnceCell::new(),
        }
    }

    /// Context around an already constructed client.
    #[must_use]
    pub fn with_client(client: Arc<dyn SwarmClient>) -> Self {
        let shared = Arc::clone(&client);
        Self {
            factory: Box::new(move || {
                let client = Arc::clone(&shared);
                async move { Ok::<_, anyhow::Error>(client) }.boxed()
            }),
            client: OnceCell::new_with(Some(client)),
        }
    }

    /// Shared client, constructing it on first use.
    ///
    /// # Errors
    ///
    /// Returns [`TorrentError::Engine`] when the factory fails.
    pub async fn client(&self) -> TorrentResult<Arc<dyn SwarmClient>> {
        self.client
            .get_or_try_init(|| async {
                let client = (self.factory)()
                    .await
                    .map_err(|err| TorrentError::engine("initialise_client", err))?;
                info!("swarm client initialised");
                Ok::<_, TorrentError>(client)
            })
            .await
            .map(Arc::clone)
    }

    /// Client if it has been constructed already.
    #[must_use]
    pub fn initialized(&self) -> Option<Arc<dyn SwarmClient>> {
        self.client.get().map(Arc::clone)
    }
}

impl fmt::Debug for EngineContext {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("EngineContext")
            .field("initialized", &self.client.initialized())
            .finish_non_exhaustive()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::stub::StubSwarmClient;
    use std::sync::atomic::{AtomicUsize, Ordering};

    #[tokio::test]
    async fn factory_runs_once_and_retries_after_failure() {
        let calls = Arc::new(AtomicUsize::new(0));
        let counter = Arc::clone(&calls);
        let context = EngineContext::new(Box::new(move || {
            let attempt = counter.fetch_add(1, Ordering::SeqCst);
            async move {
                if attempt == 0 {
                    anyhow::bail!("engine directory unavailable");
                }
                Ok(Arc::new(StubSwarmClient::new()) as Arc<dyn SwarmClient>)
            }
            .boxed()
        }));

        assert!(context.initialized().is_none());
        assert!(matches!(
            context.client().await,
            Err(TorrentError::Engine { .. })
        ));
        assert!(context.client().await.is_ok());
        assert!(context.client().await.is_ok());
        assert_eq!(calls.load(Ordering::SeqCst), 2);
        assert!(context.initialized().is_some());
    }

    #[tokio::test]
    async fn prebuilt_client_is_returned_as_is() -> TorrentResult<()> {
        let stub: Arc<dyn SwarmClient> = Arc::new(StubSwarmClient::new());
        let context = EngineContext::with_client(Arc::clone(&stub));
        let client = context.client().await?;
        assert!(Arc::ptr_eq(&client, &stub));
        Ok(())
    }
}

//! Engine seam implemented by swarm client adapters.

use std::fmt;
use std::pin::Pin;

use crate::model::{AddTorrent, ClientStats, EngineEvent, EngineFile, PlaybackLocator, RemoveTorrent};
use anyhow::bail;
use async_trait::async_trait;
use tokio::io::{AsyncRead, AsyncSeek};
use uuid::Uuid;

/// Seekable byte source over one torrent file.
pub trait ByteSource: AsyncRead + AsyncSeek + Send {}

impl<T: AsyncRead + AsyncSeek + Send + ?Sized> ByteSource for T {}

/// Readable view of a selected file while it downloads.
///
/// Reads block until the requested pieces are present, so a reader positioned
/// past the downloaded prefix waits rather than seeing unwritten bytes.
pub struct FileStream {
    /// Reader positioned at offset zero.
    pub reader: Pin<Box<dyn ByteSource>>,
    /// Total file length in bytes.
    pub length: u64,
    /// MIME type guessed from the file extension.
    pub content_type: String,
}

impl fmt::Debug for FileStream {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("FileStream")
            .field("length", &self.length)
            .field("content_type", &self.content_type)
            .finish_non_exhaustive()
    }
}

/// Swarm client driven exclusively by the session manager.
///
/// Adapters queue engine signals internally and hand them out through
/// [`SwarmClient::poll_events`]; the manager polls on a fixed cadence and feeds
/// them to its reducer. One client instance is shared for the whole process.
#[async_trait]
pub trait SwarmClient: Send + Sync {
    /// Admit a magnet into the engine.
    async fn add_torrent(&self, request: AddTorrent) -> anyhow::Result<()>;

    /// Destroy a torrent, optionally deleting its data. The client stays usable.
    async fn destroy_torrent(&self, id: Uuid, options: RemoveTorrent) -> anyhow::Result<()>;

    /// Drain engine signals queued since the previous call.
    async fn poll_events(&self) -> anyhow::Result<Vec<EngineEvent>>;

    /// Resolve a locator a media sink can play while the file downloads.
    async fn resolve_locator(&self, id: Uuid, file: &EngineFile) -> anyhow::Result<PlaybackLocator> {
        let _ = (id, file);
        bail!("playback locators not supported by this engine");
    }

    /// Open a reader over `file` that serves bytes as pieces arrive.
    async fn open_stream(&self, id: Uuid, file: &EngineFile) -> anyhow::Result<FileStream> {
        let _ = (id, file);
        bail!("file streaming not supported by this engine");
    }

    /// Client-wide torrent count and throughput.
    async fn stats(&self) -> anyhow::Result<ClientStats> {
        bail!("client statistics not supported by this engine");
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    struct MinimalClient;

    #[async_trait]
    impl SwarmClient for MinimalClient {
        async fn add_torrent(&self, _request: AddTorrent) -> anyhow::Result<()> {
            Ok(())
        }

        async fn destroy_torrent(&self, _id: Uuid, _options: RemoveTorrent) -> anyhow::Result<()> {
            Ok(())
        }

        async fn poll_events(&self) -> anyhow::Result<Vec<EngineEvent>> {
            Ok(Vec::new())
        }
    }

    #[tokio::test]
    async fn optional_methods_report_lack_of_support() {
        let client = MinimalClient;
        let file = EngineFile::new(0, "movie.mkv", 10);
        let err = client
            .resolve_locator(Uuid::new_v4(), &file)
            .await
            .expect_err("locator should be unsupported");
        assert!(err.to_string().contains("locators"));
        let err = client
            .open_stream(Uuid::new_v4(), &file)
            .await
            .expect_err("streaming should be unsupported");
        assert!(err.to_string().contains("streaming"));
        assert!(client.stats().await.is_err());
    }
}

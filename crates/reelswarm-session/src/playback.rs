//! Bridge between a resolved locator and the media sink playing it.

use std::fmt;
use std::sync::Arc;

use reelswarm_torrent_core::PlaybackLocator;
use tracing::{debug, info};

/// Media element the selected file is played through.
pub trait PlaybackSink: Send + Sync {
    /// Point the sink at `locator`.
    ///
    /// # Errors
    ///
    /// Returns an error if the sink cannot use the locator.
    fn attach(&self, locator: &PlaybackLocator) -> anyhow::Result<()>;

    /// Start playback of the attached locator.
    ///
    /// # Errors
    ///
    /// Returns an error if playback cannot start.
    fn play(&self) -> anyhow::Result<()>;

    /// Release the current locator.
    fn detach(&self);
}

/// Sink that only logs; used when no player is embedded in the process and
/// clients pick the locator up from the event stream.
#[derive(Debug, Default, Clone, Copy)]
pub struct TracingSink;

impl PlaybackSink for TracingSink {
    fn attach(&self, locator: &PlaybackLocator) -> anyhow::Result<()> {
        info!(uri = %locator.uri, content_type = %locator.content_type, "playback locator attached");
        Ok(())
    }

    fn play(&self) -> anyhow::Result<()> {
        Ok(())
    }

    fn detach(&self) {
        debug!("playback locator detached");
    }
}

/// Keeps the registered sink and whether it currently holds a locator.
#[derive(Default)]
pub(crate) struct ProgressivePlaybackBridge {
    sink: Option<Arc<dyn PlaybackSink>>,
    bound: bool,
}

impl ProgressivePlaybackBridge {
    pub(crate) fn register(&mut self, sink: Arc<dyn PlaybackSink>) {
        self.detach();
        self.sink = Some(sink);
    }

    pub(crate) const fn has_sink(&self) -> bool {
        self.sink.is_some()
    }

    /// Attach and start; a failed `play` leaves the sink detached.
    pub(crate) fn bind(&mut self, locator: &PlaybackLocator) -> anyhow::Result<()> {
        let Some(sink) = self.sink.clone() else {
            anyhow::bail!("no playback sink registered");
        };
        self.detach();
        sink.attach(locator)?;
        if let Err(err) = sink.play() {
            sink.detach();
            return Err(err);
        }
        self.bound = true;
        Ok(())
    }

    pub(crate) fn detach(&mut self) {
        if self.bound
            && let Some(sink) = &self.sink
        {
            sink.detach();
        }
        self.bound = false;
    }
}

impl fmt::Debug for ProgressivePlaybackBridge {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ProgressivePlaybackBridge")
            .field("has_sink", &self.sink.is_some())
            .field("bound", &self.bound)
            .finish()
    }
}

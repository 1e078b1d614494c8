//! Screen capture and frame encoding seam for deskhand.
//!
//! [`ScreenSource`] is the boundary the screenshot handler and the
//! frame-stream channel drive. Platform capture/encoder backends implement
//! it; the built-in [`HeadlessScreen`] stands in on hosts without a
//! display, and the `mock` feature adds a deterministic backend for tests.

use std::path::Path;

use async_trait::async_trait;
use deskhand_types::ScreenSize;

pub mod error;
pub mod headless;
#[cfg(feature = "mock")]
pub mod mock;

pub use error::ScreenError;
pub use headless::HeadlessScreen;

/// Captures the screen and encodes it for streaming.
#[async_trait]
pub trait ScreenSource: Send + Sync + 'static {
    /// Native screen dimensions.
    async fn dimensions(&self) -> Result<ScreenSize, ScreenError>;

    /// Capture a still image into `path`.
    async fn capture(&self, path: &Path) -> Result<(), ScreenError>;

    /// Open an encoded frame stream for one streaming session.
    async fn open_stream(&self) -> Result<Box<dyn FrameStream>, ScreenError>;
}

/// A live stream of encoded frame packets.
#[async_trait]
pub trait FrameStream: Send {
    /// Pull the next batch of encoded packets.
    ///
    /// `None` means nothing was ready this round; the caller just tries
    /// again. Implementations pace themselves so an empty round does not
    /// spin.
    async fn next_packets(&mut self) -> Result<Option<Vec<Vec<u8>>>, ScreenError>;
}

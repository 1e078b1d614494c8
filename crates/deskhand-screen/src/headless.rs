//! Display-less screen backend.

use std::path::Path;
use std::time::Duration;

use async_trait::async_trait;
use deskhand_types::ScreenSize;

use crate::{FrameStream, ScreenError, ScreenSource};

/// Screen source for hosts without a display server.
///
/// Reports configured dimensions, refuses captures, and streams paced
/// empty rounds so the frame loop stays idle without spinning.
#[derive(Debug, Clone, Copy)]
pub struct HeadlessScreen {
    size: ScreenSize,
    interval: Duration,
}

impl HeadlessScreen {
    pub fn new(size: ScreenSize) -> Self {
        Self {
            size,
            interval: Duration::from_millis(33),
        }
    }
}

impl Default for HeadlessScreen {
    fn default() -> Self {
        Self::new(ScreenSize::new(1920, 1080))
    }
}

#[async_trait]
impl ScreenSource for HeadlessScreen {
    async fn dimensions(&self) -> Result<ScreenSize, ScreenError> {
        Ok(self.size)
    }

    async fn capture(&self, _path: &Path) -> Result<(), ScreenError> {
        Err(ScreenError::Unavailable)
    }

    async fn open_stream(&self) -> Result<Box<dyn FrameStream>, ScreenError> {
        Ok(Box::new(IdleStream {
            interval: self.interval,
        }))
    }
}

struct IdleStream {
    interval: Duration,
}

#[async_trait]
impl FrameStream for IdleStream {
    async fn next_packets(&mut self) -> Result<Option<Vec<Vec<u8>>>, ScreenError> {
        tokio::time::sleep(self.interval).await;
        Ok(None)
    }
}

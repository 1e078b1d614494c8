//! Deterministic screen backend for tests.

use std::path::Path;
use std::time::Duration;

use async_trait::async_trait;
use deskhand_types::ScreenSize;

use crate::{FrameStream, ScreenError, ScreenSource};

/// Byte pattern written by [`MockScreen::capture`].
pub const MOCK_CAPTURE: &[u8] = b"mock-screen-capture";

/// Mock screen with fixed dimensions and synthesized frame packets.
#[derive(Debug, Clone, Copy)]
pub struct MockScreen {
    size: ScreenSize,
}

impl MockScreen {
    pub fn new(width: u32, height: u32) -> Self {
        Self {
            size: ScreenSize::new(width, height),
        }
    }
}

#[async_trait]
impl ScreenSource for MockScreen {
    async fn dimensions(&self) -> Result<ScreenSize, ScreenError> {
        Ok(self.size)
    }

    async fn capture(&self, path: &Path) -> Result<(), ScreenError> {
        tokio::fs::write(path, MOCK_CAPTURE).await?;
        Ok(())
    }

    async fn open_stream(&self) -> Result<Box<dyn FrameStream>, ScreenError> {
        Ok(Box::new(MockFrameStream { frame: 0 }))
    }
}

/// Stream of one synthesized packet per round.
///
/// Packets deliberately contain separator bytes, so receivers that parse
/// frame messages must use bounded splits.
pub struct MockFrameStream {
    frame: u32,
}

#[async_trait]
impl FrameStream for MockFrameStream {
    async fn next_packets(&mut self) -> Result<Option<Vec<Vec<u8>>>, ScreenError> {
        tokio::time::sleep(Duration::from_millis(5)).await;
        let mut packet = self.frame.to_be_bytes().to_vec();
        packet.extend_from_slice(&[0x00, 0xAB, 0xCD]);
        self.frame += 1;
        Ok(Some(vec![packet]))
    }
}

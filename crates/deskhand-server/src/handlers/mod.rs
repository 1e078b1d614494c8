//! Event handlers and registry wiring.

pub mod command;
pub mod files;
pub mod lifecycle;
pub mod screen;

use std::sync::Arc;

use deskhand_types::Event;

use crate::control::ControlMode;
use crate::registry::{EventRegistry, PayloadMode};

/// Build the full dispatch table.
pub fn build_registry() -> EventRegistry {
    EventRegistry::builder()
        .register(
            Event::ScreenshotRequest,
            PayloadMode::Decoded,
            Arc::new(screen::TakeScreenshot),
        )
        .register(
            Event::FileRequest,
            PayloadMode::Decoded,
            Arc::new(files::SendFile),
        )
        .register(
            Event::ListRequest,
            PayloadMode::Decoded,
            Arc::new(files::ListDir),
        )
        .register(
            Event::CopyRequest,
            PayloadMode::Decoded,
            Arc::new(files::CopyFile),
        )
        .register(
            Event::MoveRequest,
            PayloadMode::Decoded,
            Arc::new(files::MoveEntry),
        )
        .register(
            Event::RemoveRequest,
            PayloadMode::Decoded,
            Arc::new(files::RemoveEntry),
        )
        .register(
            Event::UploadChunk,
            PayloadMode::Raw,
            Arc::new(files::ReceiveChunk),
        )
        .register(
            Event::CommandRequest,
            PayloadMode::Decoded,
            Arc::new(command::RunCommand),
        )
        .register(
            Event::ControlRequest,
            PayloadMode::Decoded,
            Arc::new(screen::OpenSession {
                mode: ControlMode::Full,
            }),
        )
        .register(
            Event::WatchRequest,
            PayloadMode::Decoded,
            Arc::new(screen::OpenSession {
                mode: ControlMode::WatchOnly,
            }),
        )
        .register(
            Event::ControlDisconnect,
            PayloadMode::Decoded,
            Arc::new(screen::CloseSession),
        )
        .register(
            Event::WatchDisconnect,
            PayloadMode::Decoded,
            Arc::new(screen::CloseSession),
        )
        .register(
            Event::ConnectionClosed,
            PayloadMode::Decoded,
            Arc::new(lifecycle::PeerClosed),
        )
        .fallback(Arc::new(lifecycle::UnknownEvent))
        .build()
}

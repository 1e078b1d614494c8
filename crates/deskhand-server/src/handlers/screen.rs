//! Screenshot and session handlers.

use async_trait::async_trait;
use deskhand_protocol::ProtocolError;
use deskhand_types::{Event, FailureKind};
use tracing::{info, warn};
use uuid::Uuid;

use crate::control::{self, ControlMode};
use crate::error::ServerError;
use crate::registry::{EventContext, EventHandler};

/// Capture the screen to a fresh file and reply with its absolute path.
pub struct TakeScreenshot;

#[async_trait]
impl EventHandler for TakeScreenshot {
    async fn handle(
        &self,
        ctx: &mut EventContext<'_>,
        _fields: &[Vec<u8>],
    ) -> Result<(), ServerError> {
        let dir = &ctx.server.config.transfer.screenshot_dir;
        if let Err(error) = tokio::fs::create_dir_all(dir).await {
            warn!(dir = %dir.display(), error = %error, "screenshot dir unavailable");
            ctx.conn
                .send_failure(FailureKind::UnknownError, &[])
                .await?;
            return Ok(());
        }
        let path = dir.join(format!("{}.png", Uuid::new_v4()));

        match ctx.server.screen.capture(&path).await {
            Ok(()) => {
                let path = match tokio::fs::canonicalize(&path).await {
                    Ok(absolute) => absolute,
                    Err(_) => path,
                };
                let shown = path.to_string_lossy();
                ctx.conn
                    .send_message(Event::ScreenshotDone, &[shown.as_bytes()])
                    .await?;
                ctx.conn.send_success().await?;
                info!(path = %path.display(), "screenshot saved");
            }
            Err(error) => {
                warn!(error = %error, "screenshot failed");
                ctx.conn
                    .send_failure(FailureKind::UnknownError, &[])
                    .await?;
            }
        }
        Ok(())
    }
}

/// Advertise scaled dimensions, then start a session over the side
/// channels.
pub struct OpenSession {
    pub mode: ControlMode,
}

#[async_trait]
impl EventHandler for OpenSession {
    async fn handle(
        &self,
        ctx: &mut EventContext<'_>,
        _fields: &[Vec<u8>],
    ) -> Result<(), ServerError> {
        let Some(key) = ctx.conn.session_key().await else {
            return Err(ServerError::Protocol(ProtocolError::NotEstablished));
        };
        let size = ctx.server.screen.dimensions().await?;
        let scaled = size.scaled(ctx.server.config.control.size_factor);

        let accept = match self.mode {
            ControlMode::Full => Event::AcceptControl,
            ControlMode::WatchOnly => Event::AcceptWatch,
        };
        ctx.conn
            .send_message(
                accept,
                &[&scaled.width.to_be_bytes(), &scaled.height.to_be_bytes()],
            )
            .await?;
        control::start_session(ctx.server, self.mode, key, size).await;
        Ok(())
    }
}

/// Stop the live session, if any. No reply is sent.
pub struct CloseSession;

#[async_trait]
impl EventHandler for CloseSession {
    async fn handle(
        &self,
        ctx: &mut EventContext<'_>,
        _fields: &[Vec<u8>],
    ) -> Result<(), ServerError> {
        control::stop_session(ctx.server).await;
        Ok(())
    }
}

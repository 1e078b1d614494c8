//! Connection lifecycle handlers.

use async_trait::async_trait;
use tracing::{info, warn};

use crate::error::ServerError;
use crate::registry::{EventContext, EventHandler};

/// Close notice from the peer, or a synthesized one when the transport
/// drops: deregister the peer, shut the socket down and flag the dispatch
/// loop to exit.
pub struct PeerClosed;

#[async_trait]
impl EventHandler for PeerClosed {
    async fn handle(
        &self,
        ctx: &mut EventContext<'_>,
        _fields: &[Vec<u8>],
    ) -> Result<(), ServerError> {
        let peer = ctx.conn.peer();
        info!(%peer, "close requested");
        ctx.server.connections.lock().await.remove(&peer);
        ctx.conn.disconnect().await;
        ctx.state.cancel.cancel();
        Ok(())
    }
}

/// Fallback for unregistered codes: log and carry on.
pub struct UnknownEvent;

#[async_trait]
impl EventHandler for UnknownEvent {
    async fn handle(
        &self,
        _ctx: &mut EventContext<'_>,
        fields: &[Vec<u8>],
    ) -> Result<(), ServerError> {
        let code = fields
            .first()
            .map_or_else(String::new, |code| String::from_utf8_lossy(code).into_owned());
        let size: usize = fields.iter().skip(1).map(Vec::len).sum();
        warn!(code = %code, size, "unknown event");
        Ok(())
    }
}

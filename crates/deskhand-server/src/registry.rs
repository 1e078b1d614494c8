//! Event dispatch table.
//!
//! Incoming messages are routed by their four-byte code. Handlers declare
//! whether they want the payload split into fields or handed over raw, and
//! anything without a registration lands on the fallback handler.

use std::collections::HashMap;
use std::sync::Arc;

use async_trait::async_trait;
use deskhand_protocol::{Connection, Message};
use deskhand_types::Event;
use tracing::warn;

use crate::daemon::{ConnState, ServerShared};
use crate::error::ServerError;

/// How a handler wants its payload delivered.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PayloadMode {
    /// Separator-split fields after the event code.
    Decoded,
    /// The untouched payload after the event code, as a single field.
    /// For events whose body may itself contain separator bytes.
    Raw,
}

/// Per-dispatch context handed to handlers.
pub struct EventContext<'a> {
    pub conn: &'a Arc<Connection>,
    pub server: &'a Arc<ServerShared>,
    pub state: &'a mut ConnState,
}

/// One event handler.
#[async_trait]
pub trait EventHandler: Send + Sync {
    async fn handle(
        &self,
        ctx: &mut EventContext<'_>,
        fields: &[Vec<u8>],
    ) -> Result<(), ServerError>;
}

struct Registration {
    mode: PayloadMode,
    handler: Arc<dyn EventHandler>,
}

/// Dispatch table mapping event codes to handlers.
pub struct EventRegistry {
    entries: HashMap<Event, Registration>,
    fallback: Arc<dyn EventHandler>,
}

impl EventRegistry {
    pub fn builder() -> EventRegistryBuilder {
        EventRegistryBuilder::default()
    }

    /// Route one message. Handler failures are logged here and never
    /// terminate the connection.
    pub async fn dispatch(&self, ctx: &mut EventContext<'_>, message: &Message) {
        let registration = message.event().and_then(|event| self.entries.get(&event));

        let owned: Vec<Vec<u8>>;
        let (handler, fields): (&Arc<dyn EventHandler>, &[Vec<u8>]) = match registration {
            Some(reg) => match reg.mode {
                PayloadMode::Decoded => (&reg.handler, message.fields()),
                PayloadMode::Raw => {
                    owned = vec![message.raw().to_vec()];
                    (&reg.handler, &owned)
                }
            },
            // The fallback sees the code as its first field.
            None => {
                owned = std::iter::once(message.code_bytes().to_vec())
                    .chain(message.fields().iter().cloned())
                    .collect();
                (&self.fallback, &owned)
            }
        };

        if let Err(error) = handler.handle(ctx, fields).await {
            warn!(
                code = %String::from_utf8_lossy(message.code_bytes()),
                error = %error,
                "event handler failed"
            );
        }
    }
}

/// Builder for [`EventRegistry`].
#[derive(Default)]
pub struct EventRegistryBuilder {
    entries: HashMap<Event, Registration>,
    fallback: Option<Arc<dyn EventHandler>>,
}

impl EventRegistryBuilder {
    pub fn register(
        mut self,
        event: Event,
        mode: PayloadMode,
        handler: Arc<dyn EventHandler>,
    ) -> Self {
        self.entries.insert(event, Registration { mode, handler });
        self
    }

    pub fn fallback(mut self, handler: Arc<dyn EventHandler>) -> Self {
        self.fallback = Some(handler);
        self
    }

    pub fn build(self) -> EventRegistry {
        EventRegistry {
            entries: self.entries,
            fallback: self.fallback.unwrap_or_else(|| Arc::new(DropUnregistered)),
        }
    }
}

/// Stand-in fallback when none is registered: log and drop.
struct DropUnregistered;

#[async_trait]
impl EventHandler for DropUnregistered {
    async fn handle(
        &self,
        _ctx: &mut EventContext<'_>,
        fields: &[Vec<u8>],
    ) -> Result<(), ServerError> {
        let code = fields
            .first()
            .map_or_else(String::new, |code| String::from_utf8_lossy(code).into_owned());
        warn!(code = %code, "dropped unregistered event");
        Ok(())
    }
}

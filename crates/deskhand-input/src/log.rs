//! Logging injector for headless runs.

use async_trait::async_trait;
use deskhand_types::{KeyState, PointerButton, ScrollDirection};
use tracing::debug;

use crate::{InputError, InputInjector};

/// Injector that logs every action and performs nothing.
#[derive(Debug, Default, Clone, Copy)]
pub struct LogInjector;

#[async_trait]
impl InputInjector for LogInjector {
    async fn pointer_move(&self, x: u32, y: u32) -> Result<(), InputError> {
        debug!(x, y, "pointer move");
        Ok(())
    }

    async fn button_press(
        &self,
        button: PointerButton,
        x: u32,
        y: u32,
    ) -> Result<(), InputError> {
        debug!(?button, x, y, "button press");
        Ok(())
    }

    async fn button_release(
        &self,
        button: PointerButton,
        x: u32,
        y: u32,
    ) -> Result<(), InputError> {
        debug!(?button, x, y, "button release");
        Ok(())
    }

    async fn scroll(&self, direction: ScrollDirection, x: u32, y: u32) -> Result<(), InputError> {
        debug!(?direction, x, y, "scroll");
        Ok(())
    }

    async fn key(&self, name: &str, state: KeyState) -> Result<(), InputError> {
        debug!(name, ?state, "key");
        Ok(())
    }
}

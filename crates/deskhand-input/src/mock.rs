//! Recording input backend for tests.

use std::sync::{Arc, Mutex};

use async_trait::async_trait;
use deskhand_types::{KeyState, PointerButton, ScrollDirection};

use crate::{InputError, InputInjector};

/// One recorded injection, in arrival order.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum InjectedAction {
    PointerMove {
        x: u32,
        y: u32,
    },
    ButtonPress {
        button: PointerButton,
        x: u32,
        y: u32,
    },
    ButtonRelease {
        button: PointerButton,
        x: u32,
        y: u32,
    },
    Scroll {
        direction: ScrollDirection,
        x: u32,
        y: u32,
    },
    Key {
        name: String,
        state: KeyState,
    },
}

/// Mock injector that records every action for test observation.
#[derive(Default)]
pub struct MockInjector {
    actions: Arc<Mutex<Vec<InjectedAction>>>,
}

impl MockInjector {
    /// Create a new mock injector.
    pub fn new() -> Self {
        Self::default()
    }

    /// Get a clonable handle for observing recorded actions from tests.
    pub fn handle(&self) -> MockInjectorHandle {
        MockInjectorHandle {
            actions: Arc::clone(&self.actions),
        }
    }

    fn record(&self, action: InjectedAction) {
        self.actions.lock().unwrap().push(action);
    }
}

/// Clonable observer handle for [`MockInjector`].
#[derive(Clone)]
pub struct MockInjectorHandle {
    actions: Arc<Mutex<Vec<InjectedAction>>>,
}

impl MockInjectorHandle {
    /// Get a snapshot of all recorded actions.
    pub fn actions(&self) -> Vec<InjectedAction> {
        self.actions.lock().unwrap().clone()
    }
}

#[async_trait]
impl InputInjector for MockInjector {
    async fn pointer_move(&self, x: u32, y: u32) -> Result<(), InputError> {
        self.record(InjectedAction::PointerMove { x, y });
        Ok(())
    }

    async fn button_press(
        &self,
        button: PointerButton,
        x: u32,
        y: u32,
    ) -> Result<(), InputError> {
        self.record(InjectedAction::ButtonPress { button, x, y });
        Ok(())
    }

    async fn button_release(
        &self,
        button: PointerButton,
        x: u32,
        y: u32,
    ) -> Result<(), InputError> {
        self.record(InjectedAction::ButtonRelease { button, x, y });
        Ok(())
    }

    async fn scroll(&self, direction: ScrollDirection, x: u32, y: u32) -> Result<(), InputError> {
        self.record(InjectedAction::Scroll { direction, x, y });
        Ok(())
    }

    async fn key(&self, name: &str, state: KeyState) -> Result<(), InputError> {
        self.record(InjectedAction::Key {
            name: name.to_string(),
            state,
        });
        Ok(())
    }
}

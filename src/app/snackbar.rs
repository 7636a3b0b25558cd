// Transient user-visible notifications fed by failed operations
use tokio::sync::watch;

/// Where view-models send failures the user should hear about.
///
/// Passed explicitly to every screen scope instead of living in a global.
pub trait ErrorSink: Send + Sync {
    fn report(&self, message: String);
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SnackbarMessage(pub String);

// Holds the message currently on screen, if any
pub struct SnackbarManager {
    message: watch::Sender<Option<SnackbarMessage>>,
}

impl SnackbarManager {
    pub fn new() -> Self {
        Self {
            message: watch::Sender::new(None),
        }
    }

    pub fn show_message(&self, message: impl Into<String>) {
        self.message
            .send_replace(Some(SnackbarMessage(message.into())));
    }

    pub fn clear(&self) {
        self.message.send_replace(None);
    }

    pub fn subscribe(&self) -> watch::Receiver<Option<SnackbarMessage>> {
        self.message.subscribe()
    }

    pub fn current(&self) -> Option<SnackbarMessage> {
        self.message.borrow().clone()
    }
}

impl Default for SnackbarManager {
    fn default() -> Self {
        Self::new()
    }
}

impl ErrorSink for SnackbarManager {
    fn report(&self, message: String) {
        self.show_message(message);
    }
}

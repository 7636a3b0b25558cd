// First screen: make sure someone is signed in before showing tasks
use std::sync::Arc;

use ratatui::style::{Color, Style};
use ratatui::text::{Line, Span};
use tokio::sync::watch;
use tracing::info;

use crate::app::account::AccountService;
use crate::app::scope::ScreenScope;
use crate::app::snackbar::ErrorSink;

pub struct SplashViewModel {
    account: Arc<dyn AccountService>,
    show_error: Arc<watch::Sender<bool>>,
    scope: ScreenScope,
}

impl SplashViewModel {
    pub fn new(account: Arc<dyn AccountService>, sink: Arc<dyn ErrorSink>) -> Self {
        Self {
            account,
            show_error: Arc::new(watch::Sender::new(false)),
            scope: ScreenScope::new("splash", sink),
        }
    }

    // True once account creation failed; cleared by the next attempt
    pub fn show_error(&self) -> bool {
        *self.show_error.borrow()
    }

    /// Continues straight away for a signed-in user, otherwise creates an
    /// anonymous account first. A failure flips `show_error` instead of
    /// raising a snackbar.
    pub fn on_app_start<F>(&self, on_splashed: F)
    where
        F: FnOnce() + Send + 'static,
    {
        self.show_error.send_replace(false);

        if self.account.has_user() {
            on_splashed();
            return;
        }

        let account = Arc::clone(&self.account);
        let show_error = Arc::clone(&self.show_error);
        self.scope.launch_catching_quietly(async move {
            if let Err(err) = account.create_anonymous_account().await {
                show_error.send_replace(true);
                return Err(err);
            }
            info!("anonymous account ready");
            on_splashed();
            Ok(())
        });
    }

    pub async fn wait_idle(&self) {
        self.scope.wait_idle().await;
    }
}

pub fn get_splash_ui<'a>(show_error: bool) -> Vec<Line<'a>> {
    if show_error {
        vec![
            Line::from(Span::styled(
                "Something went wrong while signing in.",
                Style::new().fg(Color::Red),
            )),
            Line::from("r - try again, q - quit"),
        ]
    } else {
        vec![Line::from("Loading...")]
    }
}

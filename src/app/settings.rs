// Account settings
use std::sync::Arc;

use ratatui::text::Line;

use crate::app::account::AccountService;
use crate::app::scope::ScreenScope;
use crate::app::snackbar::ErrorSink;

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct SettingsUiState {
    pub is_anonymous_account: bool,
}

pub struct SettingsViewModel {
    account: Arc<dyn AccountService>,
    scope: ScreenScope,
}

impl SettingsViewModel {
    pub fn new(account: Arc<dyn AccountService>, sink: Arc<dyn ErrorSink>) -> Self {
        Self {
            account,
            scope: ScreenScope::new("settings", sink),
        }
    }

    pub fn ui_state(&self) -> SettingsUiState {
        let user = self.account.current_user();
        let is_anonymous_account = user.borrow().as_ref().is_some_and(|u| u.is_anonymous);
        SettingsUiState {
            is_anonymous_account,
        }
    }

    pub fn on_sign_out_click<F>(&self, restart_app: F)
    where
        F: FnOnce() + Send + 'static,
    {
        let account = Arc::clone(&self.account);
        self.scope.launch_catching(async move {
            account.sign_out().await?;
            restart_app();
            Ok(())
        });
    }

    pub fn on_delete_my_account_click<F>(&self, restart_app: F)
    where
        F: FnOnce() + Send + 'static,
    {
        let account = Arc::clone(&self.account);
        self.scope.launch_catching(async move {
            account.delete_account().await?;
            restart_app();
            Ok(())
        });
    }

    pub async fn wait_idle(&self) {
        self.scope.wait_idle().await;
    }
}

// Anonymous accounts are offered sign-in and sign-up, email accounts sign-out and delete
pub fn get_settings_ui<'a>(state: SettingsUiState) -> Vec<Line<'a>> {
    let mut lines = if state.is_anonymous_account {
        vec![
            Line::from("Signed in anonymously."),
            Line::from(""),
            Line::from("l - sign in"),
            Line::from("c - create account"),
        ]
    } else {
        vec![
            Line::from("Signed in."),
            Line::from(""),
            Line::from("o - sign out"),
            Line::from("x - delete my account"),
        ]
    };
    lines.push(Line::from("Esc - back"));
    lines
}

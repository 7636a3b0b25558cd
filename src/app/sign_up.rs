// Turning an anonymous account into an email account
use std::sync::Arc;

use ratatui::style::{Color, Style};
use ratatui::text::{Line, Span};
use tokio::sync::watch;

use crate::app::account::AccountService;
use crate::app::scope::ScreenScope;
use crate::app::snackbar::ErrorSink;
use crate::app::validation::{
    is_valid_email, is_valid_password, password_matches, EMAIL_ERROR, PASSWORD_ERROR,
    PASSWORD_MATCH_ERROR,
};

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct SignUpUiState {
    pub email: String,
    pub password: String,
    pub repeat_password: String,
}

/// Collects credentials and links them to the current anonymous account.
/// Invalid input is reported to the error sink without calling the account service.
pub struct SignUpViewModel {
    ui_state: watch::Sender<SignUpUiState>,
    account: Arc<dyn AccountService>,
    sink: Arc<dyn ErrorSink>,
    scope: ScreenScope,
}

impl SignUpViewModel {
    pub fn new(account: Arc<dyn AccountService>, sink: Arc<dyn ErrorSink>) -> Self {
        Self {
            ui_state: watch::Sender::new(SignUpUiState::default()),
            account,
            scope: ScreenScope::new("sign_up", Arc::clone(&sink)),
            sink,
        }
    }

    pub fn ui_state(&self) -> SignUpUiState {
        self.ui_state.borrow().clone()
    }

    pub fn on_email_change(&self, email: impl Into<String>) {
        let email = email.into();
        self.ui_state.send_modify(|state| state.email = email);
    }

    pub fn on_password_change(&self, password: impl Into<String>) {
        let password = password.into();
        self.ui_state.send_modify(|state| state.password = password);
    }

    pub fn on_repeat_password_change(&self, repeat_password: impl Into<String>) {
        let repeat_password = repeat_password.into();
        self.ui_state
            .send_modify(|state| state.repeat_password = repeat_password);
    }

    pub fn on_sign_up_click<F>(&self, open_settings: F)
    where
        F: FnOnce() + Send + 'static,
    {
        let state = self.ui_state();
        let rejection = if !is_valid_email(&state.email) {
            Some(EMAIL_ERROR)
        } else if !is_valid_password(&state.password) {
            Some(PASSWORD_ERROR)
        } else if !password_matches(&state.password, &state.repeat_password) {
            Some(PASSWORD_MATCH_ERROR)
        } else {
            None
        };
        if let Some(message) = rejection {
            self.sink.report(message.to_string());
            return;
        }

        let account = Arc::clone(&self.account);
        self.scope.launch_catching(async move {
            account.link_account(&state.email, &state.password).await?;
            open_settings();
            Ok(())
        });
    }

    pub async fn wait_idle(&self) {
        self.scope.wait_idle().await;
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum SignUpField {
    #[default]
    Email,
    Password,
    RepeatPassword,
}

// Focus for the sign-up form; text goes straight to the view-model
#[derive(Default)]
pub struct SignUpDialogState {
    field: SignUpField,
}

impl SignUpDialogState {
    pub fn move_cursor_down(&mut self) {
        self.field = match self.field {
            SignUpField::Email => SignUpField::Password,
            _ => SignUpField::RepeatPassword,
        };
    }

    pub fn move_cursor_up(&mut self) {
        self.field = match self.field {
            SignUpField::RepeatPassword => SignUpField::Password,
            _ => SignUpField::Email,
        };
    }

    pub fn input(&mut self, view_model: &SignUpViewModel, to_insert: char) {
        let state = view_model.ui_state();
        match self.field {
            SignUpField::Email => view_model.on_email_change(format!("{}{to_insert}", state.email)),
            SignUpField::Password => {
                view_model.on_password_change(format!("{}{to_insert}", state.password))
            }
            SignUpField::RepeatPassword => view_model
                .on_repeat_password_change(format!("{}{to_insert}", state.repeat_password)),
        }
    }

    pub fn delete_char(&mut self, view_model: &SignUpViewModel) {
        let mut state = view_model.ui_state();
        match self.field {
            SignUpField::Email => {
                state.email.pop();
                view_model.on_email_change(state.email);
            }
            SignUpField::Password => {
                state.password.pop();
                view_model.on_password_change(state.password);
            }
            SignUpField::RepeatPassword => {
                state.repeat_password.pop();
                view_model.on_repeat_password_change(state.repeat_password);
            }
        }
    }
}

pub fn get_sign_up_ui<'a>(state: &SignUpUiState, dialog: &SignUpDialogState) -> Vec<Line<'a>> {
    let fields = [
        (SignUpField::Email, "Email:           ", state.email.clone()),
        (SignUpField::Password, "Password:        ", "*".repeat(state.password.chars().count())),
        (
            SignUpField::RepeatPassword,
            "Repeat password: ",
            "*".repeat(state.repeat_password.chars().count()),
        ),
    ];

    let mut text: Vec<Line> = fields
        .into_iter()
        .map(|(field, prefix, value)| {
            let mut spans = vec![Span::from(prefix), Span::from(value)];
            if field == dialog.field {
                spans.push(Span::styled(" ", Style::new().fg(Color::Black).bg(Color::White)));
            }
            Line::from(spans)
        })
        .collect();
    text.push(Line::raw(""));
    text.push(Line::from("Enter - create account, Esc - cancel, Up/Down - field"));
    text
}

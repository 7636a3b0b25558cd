// Signing back into an email account
use std::sync::Arc;

use ratatui::style::{Color, Style};
use ratatui::text::{Line, Span};
use tokio::sync::watch;

use crate::app::account::AccountService;
use crate::app::scope::ScreenScope;
use crate::app::snackbar::ErrorSink;
use crate::app::validation::{is_valid_email, EMAIL_ERROR, EMPTY_PASSWORD_ERROR};

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct LoginUiState {
    pub email: String,
    pub password: String,
}

pub struct LoginViewModel {
    ui_state: watch::Sender<LoginUiState>,
    account: Arc<dyn AccountService>,
    sink: Arc<dyn ErrorSink>,
    scope: ScreenScope,
}

impl LoginViewModel {
    pub fn new(account: Arc<dyn AccountService>, sink: Arc<dyn ErrorSink>) -> Self {
        Self {
            ui_state: watch::Sender::new(LoginUiState::default()),
            account,
            scope: ScreenScope::new("login", Arc::clone(&sink)),
            sink,
        }
    }

    pub fn ui_state(&self) -> LoginUiState {
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

    pub fn on_sign_in_click<F>(&self, open_settings: F)
    where
        F: FnOnce() + Send + 'static,
    {
        let state = self.ui_state();
        if !is_valid_email(&state.email) {
            self.sink.report(EMAIL_ERROR.to_string());
            return;
        }
        if state.password.is_empty() {
            self.sink.report(EMPTY_PASSWORD_ERROR.to_string());
            return;
        }

        let account = Arc::clone(&self.account);
        self.scope.launch_catching(async move {
            account.authenticate(&state.email, &state.password).await?;
            open_settings();
            Ok(())
        });
    }

    pub async fn wait_idle(&self) {
        self.scope.wait_idle().await;
    }
}

// Focus for the login form: false on the email line, true on the password line
#[derive(Default)]
pub struct LoginDialogState {
    on_password: bool,
}

impl LoginDialogState {
    pub fn move_cursor_down(&mut self) {
        self.on_password = true;
    }

    pub fn move_cursor_up(&mut self) {
        self.on_password = false;
    }

    pub fn input(&mut self, view_model: &LoginViewModel, to_insert: char) {
        let state = view_model.ui_state();
        if self.on_password {
            view_model.on_password_change(format!("{}{to_insert}", state.password));
        } else {
            view_model.on_email_change(format!("{}{to_insert}", state.email));
        }
    }

    pub fn delete_char(&mut self, view_model: &LoginViewModel) {
        let mut state = view_model.ui_state();
        if self.on_password {
            state.password.pop();
            view_model.on_password_change(state.password);
        } else {
            state.email.pop();
            view_model.on_email_change(state.email);
        }
    }
}

pub fn get_login_ui<'a>(state: &LoginUiState, dialog: &LoginDialogState) -> Vec<Line<'a>> {
    let cursor = || Span::styled(" ", Style::new().fg(Color::Black).bg(Color::White));

    let mut email = vec![Span::from("Email:    "), Span::from(state.email.clone())];
    let mut password = vec![
        Span::from("Password: "),
        Span::from("*".repeat(state.password.chars().count())),
    ];
    if dialog.on_password {
        password.push(cursor());
    } else {
        email.push(cursor());
    }

    vec![
        Line::from(email),
        Line::from(password),
        Line::raw(""),
        Line::from("Enter - sign in, Esc - cancel, Up/Down - field"),
    ]
}

use crossterm::event::{self, Event, KeyCode, KeyEventKind};
use ratatui::{prelude::*, widgets::*};
use std::{
    io,
    sync::{mpsc, Arc},
    time::{Duration, Instant},
};
use tracing::debug;

use crate::app::account::AccountService;
use crate::app::login::{get_login_ui, LoginDialogState, LoginViewModel};
use crate::app::settings::{get_settings_ui, SettingsViewModel};
use crate::app::sign_up::{get_sign_up_ui, SignUpDialogState, SignUpViewModel};
use crate::app::snackbar::{ErrorSink, SnackbarManager};
use crate::app::splash::{get_splash_ui, SplashViewModel};
use crate::app::stats::{get_statistics_ui, StatsViewModel};
use crate::app::storage::StorageService;
use crate::app::task_edit::{get_task_edit_ui, EditTaskDialogState, EditTaskViewModel};
use crate::app::task_list::*;

// Screens the app can show
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Route {
    Splash,
    Tasks,
    EditTask(Option<String>),
    Stats,
    Settings,
    Login,
    SignUp,
}

// Each screen owns its view-model; replacing the screen cancels its pending work
enum Screen {
    Splash(SplashViewModel),
    Tasks {
        view_model: TasksViewModel,
        selection: TaskSelection,
    },
    EditTask {
        view_model: EditTaskViewModel,
        dialog: EditTaskDialogState,
    },
    Stats(StatsViewModel),
    Settings(SettingsViewModel),
    Login {
        view_model: LoginViewModel,
        dialog: LoginDialogState,
    },
    SignUp {
        view_model: SignUpViewModel,
        dialog: SignUpDialogState,
    },
}

// Navigation requests coming back from view-model callbacks
#[derive(Clone)]
pub struct Navigator {
    tx: mpsc::Sender<Route>,
}

impl Navigator {
    pub fn callback(&self, route: Route) -> impl FnOnce() + Send + 'static {
        let tx = self.tx.clone();
        move || {
            // The receiver only disappears when the app is shutting down
            let _ = tx.send(route);
        }
    }
}

pub struct App {
    storage: Arc<dyn StorageService>,
    account: Arc<dyn AccountService>,
    snackbar: Arc<SnackbarManager>,
    snackbar_ticks: u32,
    snackbar_age: u32,
    navigator: Navigator,
    routes: mpsc::Receiver<Route>,
    screen: Screen,
}

impl App {
    pub fn new(
        storage: Arc<dyn StorageService>,
        account: Arc<dyn AccountService>,
        snackbar: Arc<SnackbarManager>,
        snackbar_ticks: u32,
    ) -> App {
        let (tx, routes) = mpsc::channel();
        let navigator = Navigator { tx };

        let sink: Arc<dyn ErrorSink> = snackbar.clone();
        let splash = SplashViewModel::new(Arc::clone(&account), sink);
        splash.on_app_start(navigator.callback(Route::Tasks));

        App {
            storage,
            account,
            snackbar,
            snackbar_ticks,
            snackbar_age: 0,
            navigator,
            routes,
            screen: Screen::Splash(splash),
        }
    }

    fn sink(&self) -> Arc<dyn ErrorSink> {
        self.snackbar.clone()
    }

    pub fn navigate(&mut self, route: Route) {
        debug!(?route, "navigate");
        self.screen = match route {
            Route::Splash => {
                let view_model = SplashViewModel::new(Arc::clone(&self.account), self.sink());
                view_model.on_app_start(self.navigator.callback(Route::Tasks));
                Screen::Splash(view_model)
            }
            Route::Tasks => {
                let mut view_model = TasksViewModel::new(Arc::clone(&self.storage), self.sink());
                view_model.subscribe();
                Screen::Tasks {
                    view_model,
                    selection: TaskSelection::default(),
                }
            }
            Route::EditTask(task_id) => Screen::EditTask {
                view_model: EditTaskViewModel::new(task_id, Arc::clone(&self.storage), self.sink()),
                dialog: EditTaskDialogState::default(),
            },
            Route::Stats => Screen::Stats(StatsViewModel::new(Arc::clone(&self.storage), self.sink())),
            Route::Settings => {
                Screen::Settings(SettingsViewModel::new(Arc::clone(&self.account), self.sink()))
            }
            Route::Login => Screen::Login {
                view_model: LoginViewModel::new(Arc::clone(&self.account), self.sink()),
                dialog: LoginDialogState::default(),
            },
            Route::SignUp => Screen::SignUp {
                view_model: SignUpViewModel::new(Arc::clone(&self.account), self.sink()),
                dialog: SignUpDialogState::default(),
            },
        };
    }

    // Apply pending navigation and age out the snackbar
    fn on_tick(&mut self) {
        while let Ok(route) = self.routes.try_recv() {
            self.navigate(route);
        }

        if self.snackbar.current().is_some() {
            self.snackbar_age += 1;
            if self.snackbar_age >= self.snackbar_ticks {
                self.snackbar.clear();
                self.snackbar_age = 0;
            }
        } else {
            self.snackbar_age = 0;
        }

        if let Screen::Tasks { view_model, .. } = &mut self.screen {
            view_model.poll();
        }
    }

    // Returns false when the user asked to quit
    fn handle_key(&mut self, code: KeyCode) -> bool {
        let mut next_route = None;

        match &mut self.screen {
            Screen::Splash(view_model) => match code {
                KeyCode::Char('q') => return false,
                KeyCode::Char('r') if view_model.show_error() => {
                    view_model.on_app_start(self.navigator.callback(Route::Tasks))
                }
                _ => {}
            },
            Screen::Tasks {
                view_model,
                selection,
            } => {
                let len = view_model.tasks().len();
                let selected = selection.get_selected(view_model.tasks()).cloned();
                // Handle input for the task list navigation and state change
                match code {
                    KeyCode::Char('q') => return false,
                    KeyCode::Left => selection.unselect(),
                    KeyCode::Down => selection.next(len),
                    KeyCode::Up => selection.previous(len),
                    KeyCode::Char('a') => next_route = Some(Route::EditTask(None)),
                    KeyCode::Char('s') => next_route = Some(Route::Stats),
                    KeyCode::Char('o') => next_route = Some(Route::Settings),
                    KeyCode::Enter => {
                        if let Some(task) = &selected {
                            view_model.on_task_check_change(task);
                        }
                    }
                    KeyCode::Char(key @ ('e' | 'f' | 'x')) => {
                        let option = match key {
                            'e' => TaskActionOption::EditTask,
                            'f' => TaskActionOption::ToggleFlag,
                            _ => TaskActionOption::DeleteTask,
                        };
                        if let Some(task) = &selected {
                            if let Some(task_id) = view_model.on_task_action(option, task) {
                                next_route = Some(Route::EditTask(Some(task_id)));
                            }
                        }
                    }
                    _ => {}
                }
            }
            Screen::EditTask { view_model, dialog } => match code {
                KeyCode::Esc => next_route = Some(Route::Tasks),
                KeyCode::Down => dialog.move_cursor_down(),
                KeyCode::Up => dialog.move_cursor_up(),
                KeyCode::Enter => {
                    dialog.save_task(view_model, self.navigator.callback(Route::Tasks))
                }
                KeyCode::Backspace => dialog.delete_char(view_model),
                KeyCode::Char(to_insert) => dialog.input(view_model, to_insert),
                _ => {}
            },
            Screen::Stats(_) => {
                if matches!(code, KeyCode::Esc | KeyCode::Char('q')) {
                    next_route = Some(Route::Tasks);
                }
            }
            Screen::Settings(view_model) => {
                let is_anonymous = view_model.ui_state().is_anonymous_account;
                match code {
                    KeyCode::Esc | KeyCode::Char('q') => next_route = Some(Route::Tasks),
                    KeyCode::Char('l') if is_anonymous => next_route = Some(Route::Login),
                    KeyCode::Char('c') if is_anonymous => next_route = Some(Route::SignUp),
                    KeyCode::Char('o') if !is_anonymous => {
                        view_model.on_sign_out_click(self.navigator.callback(Route::Splash))
                    }
                    KeyCode::Char('x') if !is_anonymous => view_model
                        .on_delete_my_account_click(self.navigator.callback(Route::Splash)),
                    _ => {}
                }
            }
            Screen::Login { view_model, dialog } => match code {
                KeyCode::Esc => next_route = Some(Route::Settings),
                KeyCode::Down => dialog.move_cursor_down(),
                KeyCode::Up => dialog.move_cursor_up(),
                KeyCode::Enter => {
                    view_model.on_sign_in_click(self.navigator.callback(Route::Settings))
                }
                KeyCode::Backspace => dialog.delete_char(view_model),
                KeyCode::Char(to_insert) => dialog.input(view_model, to_insert),
                _ => {}
            },
            Screen::SignUp { view_model, dialog } => match code {
                KeyCode::Esc => next_route = Some(Route::Settings),
                KeyCode::Down => dialog.move_cursor_down(),
                KeyCode::Up => dialog.move_cursor_up(),
                KeyCode::Enter => {
                    view_model.on_sign_up_click(self.navigator.callback(Route::Settings))
                }
                KeyCode::Backspace => dialog.delete_char(view_model),
                KeyCode::Char(to_insert) => dialog.input(view_model, to_insert),
                _ => {}
            },
        }

        if let Some(route) = next_route {
            self.navigate(route);
        }
        true
    }
}

pub fn run_app<B: Backend>(
    terminal: &mut Terminal<B>,
    mut app: App,
    tick_rate: Duration,
) -> io::Result<()> {
    let mut last_tick = Instant::now();
    loop {
        terminal.draw(|f| draw_ui(f, &mut app))?;
        let timeout = tick_rate.saturating_sub(last_tick.elapsed());

        if crossterm::event::poll(timeout)? {
            if let Event::Key(key) = event::read()? {
                if key.kind == KeyEventKind::Press && !app.handle_key(key.code) {
                    return Ok(());
                }
            }
        }

        if last_tick.elapsed() >= tick_rate {
            app.on_tick();
            last_tick = Instant::now();
        }
    }
}

// Draws the whole user interface
fn draw_ui(f: &mut Frame, app: &mut App) {
    // Main area on top, one line for the snackbar below
    let rows = Layout::default()
        .direction(Direction::Vertical)
        .constraints([Constraint::Min(3), Constraint::Length(1)])
        .split(f.size());

    match &mut app.screen {
        Screen::Splash(view_model) => {
            let splash = Paragraph::new(get_splash_ui(view_model.show_error()))
                .block(Block::default().title("To-do list").borders(Borders::ALL))
                .alignment(Alignment::Center);
            f.render_widget(splash, rows[0]);
        }
        Screen::Tasks {
            view_model,
            selection,
        } => {
            // Create two chunks of screen in 60-40 ratio
            let chunks = Layout::default()
                .direction(Direction::Horizontal)
                .constraints([Constraint::Percentage(60), Constraint::Percentage(40)])
                .split(rows[0]);

            let title = match view_model.state() {
                TasksScreenState::Rendering(_) => "Tasks",
                _ => "Tasks (loading)",
            };
            let task_list = List::new(get_list_items_ui(view_model.tasks()))
                .block(Block::default().borders(Borders::ALL).title(title))
                .highlight_style(
                    Style::default()
                        .bg(Color::LightGreen)
                        .add_modifier(Modifier::BOLD),
                )
                .highlight_symbol(">> ");
            f.render_stateful_widget(task_list, chunks[0], &mut selection.state);

            let instructions = Paragraph::new(get_instructions_ui())
                .block(Block::new().title("Commands").borders(Borders::ALL))
                .style(Style::new().white());
            f.render_widget(instructions, chunks[1]);
        }
        Screen::EditTask { view_model, dialog } => {
            let task = view_model.task();
            let title = if task.is_new() { "Add Task" } else { "Edit Task" };
            let create_or_edit_task = Paragraph::new(get_task_edit_ui(&task, dialog))
                .block(Block::new().title(title).borders(Borders::ALL))
                .style(Style::new().white());
            f.render_widget(create_or_edit_task, rows[0]);
        }
        Screen::Stats(view_model) => {
            let statistics = Paragraph::new(get_statistics_ui(view_model.ui_state()))
                .block(Block::new().title("Statistics").borders(Borders::ALL))
                .style(Style::new().white());
            f.render_widget(statistics, rows[0]);
        }
        Screen::Settings(view_model) => {
            let settings = Paragraph::new(get_settings_ui(view_model.ui_state()))
                .block(Block::new().title("Settings").borders(Borders::ALL))
                .style(Style::new().white());
            f.render_widget(settings, rows[0]);
        }
        Screen::Login { view_model, dialog } => {
            let login = Paragraph::new(get_login_ui(&view_model.ui_state(), dialog))
                .block(Block::new().title("Sign in").borders(Borders::ALL))
                .style(Style::new().white());
            f.render_widget(login, rows[0]);
        }
        Screen::SignUp { view_model, dialog } => {
            let sign_up = Paragraph::new(get_sign_up_ui(&view_model.ui_state(), dialog))
                .block(Block::new().title("Create account").borders(Borders::ALL))
                .style(Style::new().white());
            f.render_widget(sign_up, rows[0]);
        }
    }

    if let Some(message) = app.snackbar.current() {
        let snackbar = Paragraph::new(message.0).style(Style::new().fg(Color::Black).bg(Color::Yellow));
        f.render_widget(snackbar, rows[1]);
    }
}

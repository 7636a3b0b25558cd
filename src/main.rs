use crossterm::{
    event::{DisableMouseCapture, EnableMouseCapture},
    execute,
    terminal::{disable_raw_mode, enable_raw_mode, EnterAlternateScreen, LeaveAlternateScreen},
};
use ratatui::prelude::*;
use std::{error::Error, io, sync::Arc};
use tracing::{error, info};

use todo_list::app::{
    account::{AccountService, LocalAccountService},
    config::AppConfig,
    database::Database,
    logging,
    snackbar::SnackbarManager,
    storage::SqliteStorage,
    ui::{run_app, App},
};

// Start the app.
// Terminal handling follows https://github.com/ratatui-org/ratatui/blob/main/examples/list.rs
pub fn main() -> Result<(), Box<dyn Error>> {
    let config = AppConfig::load()?;
    let _log_guard = logging::init(&config.log)?;
    info!(database = %config.database_path.display(), "starting");

    // View-models spawn their work onto this runtime while the UI loop stays synchronous
    let runtime = tokio::runtime::Builder::new_multi_thread()
        .enable_all()
        .build()?;
    let _runtime_guard = runtime.enter();

    // Initialize connection to the database
    let db = Database::open(&config.database_path)?;
    let account = Arc::new(runtime.block_on(LocalAccountService::restore(db.clone()))?);
    let storage = Arc::new(SqliteStorage::new(db, account.current_user()));
    let snackbar = Arc::new(SnackbarManager::new());

    enable_raw_mode()?;
    let mut stdout = io::stdout();
    execute!(stdout, EnterAlternateScreen, EnableMouseCapture)?;
    let backend = CrosstermBackend::new(stdout);
    let mut terminal = Terminal::new(backend)?;

    let app = App::new(storage, account, snackbar, config.snackbar_ticks);
    let res = run_app(&mut terminal, app, config.tick_rate());

    // Restore previous terminal state after exit
    disable_raw_mode()?;
    execute!(
        terminal.backend_mut(),
        LeaveAlternateScreen,
        DisableMouseCapture
    )?;
    terminal.show_cursor()?;

    if let Err(err) = res {
        error!(error = %err, "ui loop failed");
        println!("{err:?}");
    }

    info!("exiting");
    Ok(())
}

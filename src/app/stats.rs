// Completion statistics
use std::sync::Arc;

use ratatui::text::Line;
use tokio::sync::watch;
use tracing::debug;

use crate::app::scope::ScreenScope;
use crate::app::snackbar::ErrorSink;
use crate::app::storage::StorageService;

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct StatsUiState {
    pub completed_tasks_count: u32,
    pub important_completed_tasks_count: u32,
    pub medium_high_tasks_to_complete_count: u32,
}

pub struct StatsViewModel {
    ui_state: Arc<watch::Sender<StatsUiState>>,
    scope: ScreenScope,
}

impl StatsViewModel {
    // Counts start at zero and are filled in once storage answers
    pub fn new(storage: Arc<dyn StorageService>, sink: Arc<dyn ErrorSink>) -> Self {
        let view_model = Self {
            ui_state: Arc::new(watch::Sender::new(StatsUiState::default())),
            scope: ScreenScope::new("stats", sink),
        };
        view_model.load_stats(storage);
        view_model
    }

    fn load_stats(&self, storage: Arc<dyn StorageService>) {
        let ui_state = Arc::clone(&self.ui_state);
        self.scope.launch_catching(async move {
            let (completed, important_completed, medium_high_to_complete) = tokio::try_join!(
                storage.completed_tasks_count(),
                storage.important_completed_tasks_count(),
                storage.medium_high_tasks_to_complete_count(),
            )?;
            debug!(completed, important_completed, medium_high_to_complete, "stats loaded");
            ui_state.send_replace(StatsUiState {
                completed_tasks_count: completed,
                important_completed_tasks_count: important_completed,
                medium_high_tasks_to_complete_count: medium_high_to_complete,
            });
            Ok(())
        });
    }

    pub fn ui_state(&self) -> StatsUiState {
        *self.ui_state.borrow()
    }

    pub async fn wait_idle(&self) {
        self.scope.wait_idle().await;
    }
}

// Build the UI (lines) for statistics infobox
pub fn get_statistics_ui<'a>(state: StatsUiState) -> Vec<Line<'a>> {
    vec![
        Line::from(format!("Completed tasks: {}", state.completed_tasks_count)),
        Line::from(format!(
            "Important completed tasks: {}",
            state.important_completed_tasks_count
        )),
        Line::from(format!(
            "Medium/high tasks to complete: {}",
            state.medium_high_tasks_to_complete_count
        )),
        Line::from(""),
        Line::from("Esc - back"),
    ]
}

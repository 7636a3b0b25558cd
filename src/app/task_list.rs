use std::sync::Arc;

use ratatui::style::{Color, Style, Stylize};
use ratatui::text::{Line, Span};
use ratatui::widgets::*;
use tracing::{debug, warn};

use crate::app::models::{Priority, Task};
use crate::app::scope::ScreenScope;
use crate::app::snackbar::ErrorSink;
use crate::app::storage::{StorageService, TaskStream};

// Per-item actions offered from a task's context menu
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TaskActionOption {
    EditTask,
    ToggleFlag,
    DeleteTask,
}

impl TaskActionOption {
    pub const ALL: [TaskActionOption; 3] = [
        TaskActionOption::EditTask,
        TaskActionOption::ToggleFlag,
        TaskActionOption::DeleteTask,
    ];

    pub fn title(self) -> &'static str {
        match self {
            TaskActionOption::EditTask => "Edit task",
            TaskActionOption::ToggleFlag => "Toggle flag",
            TaskActionOption::DeleteTask => "Delete task",
        }
    }

    // Unknown titles fall back to editing
    pub fn by_title(title: &str) -> TaskActionOption {
        Self::ALL
            .into_iter()
            .find(|action| action.title() == title)
            .unwrap_or(TaskActionOption::EditTask)
    }

    pub fn options(has_edit_option: bool) -> Vec<&'static str> {
        Self::ALL
            .into_iter()
            .filter(|action| has_edit_option || *action != TaskActionOption::EditTask)
            .map(TaskActionOption::title)
            .collect()
    }
}

/// Where the list screen is in its subscription.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum TasksScreenState {
    Idle,
    Loading,
    Rendering(Vec<Task>),
}

/// Relays per-item intents to storage and exposes the live collection.
///
/// Nothing is changed locally: a toggle or delete only shows up once
/// storage re-emits the list.
pub struct TasksViewModel {
    storage: Arc<dyn StorageService>,
    scope: ScreenScope,
    stream: Option<TaskStream>,
    state: TasksScreenState,
}

impl TasksViewModel {
    pub fn new(storage: Arc<dyn StorageService>, sink: Arc<dyn ErrorSink>) -> Self {
        Self {
            storage,
            scope: ScreenScope::new("tasks", sink),
            stream: None,
            state: TasksScreenState::Idle,
        }
    }

    pub fn subscribe(&mut self) {
        if self.stream.is_none() {
            debug!("subscribing to tasks");
            self.stream = Some(self.storage.observe_tasks());
            self.state = TasksScreenState::Loading;
        }
    }

    pub fn unsubscribe(&mut self) {
        self.stream = None;
        self.state = TasksScreenState::Idle;
    }

    pub fn state(&self) -> &TasksScreenState {
        &self.state
    }

    pub fn tasks(&self) -> &[Task] {
        match &self.state {
            TasksScreenState::Rendering(tasks) => tasks,
            _ => &[],
        }
    }

    // Take the latest emission, if one arrived since the last look
    pub fn poll(&mut self) -> &TasksScreenState {
        if let Some(stream) = self.stream.as_mut() {
            match stream.has_changed() {
                Ok(true) => {
                    let tasks = stream.borrow_and_update().clone();
                    self.state = TasksScreenState::Rendering(tasks);
                }
                Ok(false) => {}
                Err(_) => warn!("task stream closed"),
            }
        }
        &self.state
    }

    /// Waits for the next emission. Returns immediately when not subscribed.
    pub async fn changed(&mut self) -> &TasksScreenState {
        if let Some(stream) = self.stream.as_mut() {
            if stream.changed().await.is_ok() {
                let tasks = stream.borrow_and_update().clone();
                self.state = TasksScreenState::Rendering(tasks);
            }
        }
        &self.state
    }

    pub fn on_task_check_change(&self, task: &Task) {
        self.submit_update(task.clone().with_completed(!task.completed));
    }

    pub fn on_toggle_flag(&self, task: &Task) {
        self.submit_update(task.clone().with_flag(!task.flag));
    }

    pub fn on_delete_task(&self, id: &str) {
        let storage = Arc::clone(&self.storage);
        let id = id.to_string();
        self.scope
            .launch_catching(async move { storage.delete(&id).await });
    }

    // Dispatch a context-menu action; editing is navigation, so its id is handed back
    pub fn on_task_action(&self, option: TaskActionOption, task: &Task) -> Option<String> {
        match option {
            TaskActionOption::EditTask => return Some(task.id().to_string()),
            TaskActionOption::ToggleFlag => self.on_toggle_flag(task),
            TaskActionOption::DeleteTask => self.on_delete_task(task.id()),
        }
        None
    }

    fn submit_update(&self, updated: Task) {
        let storage = Arc::clone(&self.storage);
        self.scope
            .launch_catching(async move { storage.update(updated).await });
    }

    pub async fn wait_idle(&self) {
        self.scope.wait_idle().await;
    }
}

// Selection cursor over the rendered list
#[derive(Default)]
pub struct TaskSelection {
    pub state: ListState,
}

impl TaskSelection {
    // Move the selection to the next item, wrapping at the end
    pub fn next(&mut self, len: usize) {
        let i = match self.state.selected() {
            Some(i) if len > 0 && i < len - 1 => i + 1,
            _ => 0,
        };
        self.state.select(Some(i));
    }

    // Move the selection to the previous item, wrapping at the start
    pub fn previous(&mut self, len: usize) {
        let i = match self.state.selected() {
            Some(0) | None => len.saturating_sub(1),
            Some(i) => (i - 1).min(len.saturating_sub(1)),
        };
        self.state.select(Some(i));
    }

    pub fn unselect(&mut self) {
        self.state.select(None);
    }

    pub fn get_selected<'a>(&self, tasks: &'a [Task]) -> Option<&'a Task> {
        self.state.selected().and_then(|i| tasks.get(i))
    }
}

// Build the UI (list) for task list
pub fn get_list_items_ui(tasks: &[Task]) -> Vec<ListItem<'_>> {
    tasks
        .iter()
        .map(|task| {
            let title_color = match task.priority {
                Priority::Medium => Color::Yellow,
                Priority::High => Color::Red,
                Priority::Low => Color::White,
            };

            let mut first_line = vec![
                Span::from(if task.completed { "[✓] " } else { "[ ] " }),
                Span::from(task.title.as_str()).fg(title_color),
            ];
            if task.flag {
                first_line.push(Span::from(" ⚑").fg(Color::LightRed));
            }

            let mut lines = vec![Line::from(first_line)];
            let due = task.due_date_and_time();
            if !due.is_empty() {
                lines.push(Line::from(format!("    {due}")));
            }

            ListItem::new(lines).style(Style::default().fg(Color::White))
        })
        .collect()
}

// Build the UI (lines) for instructions infobox
pub fn get_instructions_ui<'a>() -> Vec<Line<'a>> {
    let mut lines = vec![Line::from("Enter - toggle do/done"), Line::from("a - add a task")];
    let keys = ["e", "f", "x"];
    for (key, title) in keys.iter().zip(TaskActionOption::options(true)) {
        lines.push(Line::from(format!("{key} - {}", title.to_lowercase())));
    }
    lines.push(Line::from("s - statistics"));
    lines.push(Line::from("o - settings"));
    lines.push(Line::from("q - quit"));
    lines
}

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use derivative::Derivative;
use ratatui::style::{Color, Style};
use ratatui::text::{Line, Span};
use tokio::sync::watch;
use tracing::{debug, info, warn};

use crate::app::datetime::{format_due_date, format_due_time, parse_date_input, parse_time_input};
use crate::app::error::Result;
use crate::app::models::{Priority, Task};
use crate::app::scope::ScreenScope;
use crate::app::snackbar::ErrorSink;
use crate::app::storage::StorageService;

/// Stages edits to one task and commits them with create-or-update.
///
/// The held task is only ever replaced as a whole: each `on_*_change`
/// swaps in a copy that differs from the previous value in one field.
pub struct EditTaskViewModel {
    task: Arc<watch::Sender<Task>>,
    storage: Arc<dyn StorageService>,
    // Set while a commit runs; cleared only when it fails
    committing: Arc<AtomicBool>,
    scope: ScreenScope,
}

impl EditTaskViewModel {
    // With an id the stored task replaces the blank one once it arrives;
    // an id storage does not know leaves the blank task in place
    pub fn new(
        task_id: Option<String>,
        storage: Arc<dyn StorageService>,
        sink: Arc<dyn ErrorSink>,
    ) -> Self {
        let view_model = Self {
            task: Arc::new(watch::Sender::new(Task::default())),
            storage,
            committing: Arc::new(AtomicBool::new(false)),
            scope: ScreenScope::new("edit_task", sink),
        };

        if let Some(task_id) = task_id {
            view_model.load(task_id);
        }

        view_model
    }

    // Edits made before the stored task arrives are overwritten by it
    fn load(&self, task_id: String) {
        let storage = Arc::clone(&self.storage);
        let task = Arc::clone(&self.task);

        self.scope.launch_catching(async move {
            match storage.get_task(&task_id).await? {
                Some(stored) => {
                    task.send_replace(stored);
                }
                None => debug!(%task_id, "task not found, editing a new one"),
            }
            Ok(())
        });
    }

    pub fn task(&self) -> Task {
        self.task.borrow().clone()
    }

    pub fn subscribe(&self) -> watch::Receiver<Task> {
        self.task.subscribe()
    }

    fn replace(&self, change: impl FnOnce(Task) -> Task) {
        self.task
            .send_modify(|task| *task = change(std::mem::take(task)));
    }

    pub fn on_title_change(&self, title: impl Into<String>) {
        let title = title.into();
        self.replace(|task| task.with_title(title));
    }

    pub fn on_description_change(&self, description: impl Into<String>) {
        let description = description.into();
        self.replace(|task| task.with_description(description));
    }

    pub fn on_url_change(&self, url: impl Into<String>) {
        let url = url.into();
        self.replace(|task| task.with_url(url));
    }

    pub fn on_date_change(&self, epoch_millis: i64) {
        match format_due_date(epoch_millis) {
            Some(due_date) => self.replace(|task| task.with_due_date(due_date)),
            None => warn!(epoch_millis, "picked date is out of range"),
        }
    }

    pub fn on_time_change(&self, hour: u32, minute: u32) {
        let due_time = format_due_time(hour, minute);
        self.replace(|task| task.with_due_time(due_time));
    }

    pub fn on_flag_toggle(&self, flag: bool) {
        self.replace(|task| task.with_flag(flag));
    }

    pub fn on_priority_change(&self, priority: Priority) {
        self.replace(|task| task.with_priority(priority));
    }

    /// Persists the staged task, then calls `pop_up_screen`. A failed
    /// save goes to the error sink and the screen stays open.
    ///
    /// Clicks while a commit is running, or after one succeeded, are ignored.
    pub fn on_done_click<F>(&self, pop_up_screen: F)
    where
        F: FnOnce() + Send + 'static,
    {
        if self.committing.swap(true, Ordering::SeqCst) {
            debug!("commit already in progress");
            return;
        }
        let edited = self.task();
        let storage = Arc::clone(&self.storage);
        let committing = Arc::clone(&self.committing);

        self.scope.launch_catching(async move {
            let result = commit(storage.as_ref(), edited).await;
            if result.is_err() {
                committing.store(false, Ordering::SeqCst);
            }
            result?;
            pop_up_screen();
            Ok(())
        });
    }

    pub async fn wait_idle(&self) {
        self.scope.wait_idle().await;
    }
}

// Create when storage has never seen the task, update otherwise
async fn commit(storage: &dyn StorageService, edited: Task) -> Result<()> {
    if edited.is_new() {
        let task_id = storage.save(edited).await?;
        info!(%task_id, "saved new task");
    } else {
        let task_id = edited.id().to_string();
        storage.update(edited).await?;
        info!(%task_id, "updated task");
    }
    Ok(())
}

// Input fields of the edit dialog, top to bottom
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum EditField {
    #[default]
    Title,
    Description,
    Url,
    DueDate,
    DueTime,
    Priority,
    Flag,
}

impl EditField {
    const ALL: [EditField; 7] = [
        EditField::Title,
        EditField::Description,
        EditField::Url,
        EditField::DueDate,
        EditField::DueTime,
        EditField::Priority,
        EditField::Flag,
    ];

    fn index(self) -> usize {
        Self::ALL.iter().position(|f| *f == self).unwrap_or(0)
    }
}

// State object for the task edit dialog
// Tracks the focused field and the raw text typed into the date/time prompts.
// Everything else is written straight through to the view-model.
#[derive(Derivative)]
#[derivative(Default)]
pub struct EditTaskDialogState {
    field: EditField,
    date_input: String,
    time_input: String,
    error_message: Option<String>,
}

impl EditTaskDialogState {
    // Move the focus one field BELOW the current one, stopping at the last
    pub fn move_cursor_down(&mut self) {
        let next = (self.field.index() + 1).min(EditField::ALL.len() - 1);
        self.field = EditField::ALL[next];
    }

    // Move the focus one field ABOVE the current one, stopping at the first
    pub fn move_cursor_up(&mut self) {
        self.field = EditField::ALL[self.field.index().saturating_sub(1)];
    }

    // Handles the input of a char by appending it to the value of the focused field
    pub fn input(&mut self, view_model: &EditTaskViewModel, to_insert: char) {
        let task = view_model.task();
        match self.field {
            EditField::Title => view_model.on_title_change(format!("{}{to_insert}", task.title)),
            EditField::Description => {
                view_model.on_description_change(format!("{}{to_insert}", task.description))
            }
            EditField::Url => view_model.on_url_change(format!("{}{to_insert}", task.url)),
            EditField::DueDate => self.date_input.push(to_insert),
            EditField::DueTime => self.time_input.push(to_insert),
            EditField::Priority => {
                if let Some(priority) = to_insert
                    .to_digit(10)
                    .and_then(|digit| Priority::ALL.get(digit as usize))
                {
                    view_model.on_priority_change(*priority);
                }
            }
            EditField::Flag => match to_insert {
                'y' => view_model.on_flag_toggle(true),
                'n' => view_model.on_flag_toggle(false),
                ' ' => view_model.on_flag_toggle(!task.flag),
                _ => {}
            },
        }
    }

    // Delete the last char of the focused field
    pub fn delete_char(&mut self, view_model: &EditTaskViewModel) {
        let task = view_model.task();
        match self.field {
            EditField::Title => view_model.on_title_change(without_last_char(&task.title)),
            EditField::Description => {
                view_model.on_description_change(without_last_char(&task.description))
            }
            EditField::Url => view_model.on_url_change(without_last_char(&task.url)),
            EditField::DueDate => {
                self.date_input.pop();
            }
            EditField::DueTime => {
                self.time_input.pop();
            }
            EditField::Priority | EditField::Flag => {}
        }
    }

    // Feeds the typed date/time to the view-model as a picker would, then commits.
    // Malformed prompt text keeps the dialog open with an error line.
    pub fn save_task<F>(&mut self, view_model: &EditTaskViewModel, pop_up_screen: F)
    where
        F: FnOnce() + Send + 'static,
    {
        let picked_date = if self.date_input.trim().is_empty() {
            None
        } else {
            match parse_date_input(&self.date_input) {
                Some(millis) => Some(millis),
                None => {
                    self.error_message = Some("Date should be in format dd.mm.yyyy".to_string());
                    return;
                }
            }
        };
        let picked_time = if self.time_input.trim().is_empty() {
            None
        } else {
            match parse_time_input(&self.time_input) {
                Some(time) => Some(time),
                None => {
                    self.error_message = Some("Time should be in format HH:MM".to_string());
                    return;
                }
            }
        };

        if let Some(millis) = picked_date {
            view_model.on_date_change(millis);
        }
        if let Some((hour, minute)) = picked_time {
            view_model.on_time_change(hour, minute);
        }
        self.date_input.clear();
        self.time_input.clear();
        self.error_message = None;
        view_model.on_done_click(pop_up_screen);
    }
}

fn without_last_char(value: &str) -> String {
    let mut value = value.to_string();
    value.pop();
    value
}

// Returns the UI content for the task edit dialog
pub fn get_task_edit_ui<'a>(task: &Task, dialog: &'a EditTaskDialogState) -> Vec<Line<'a>> {
    const GRAY_TEXT: Style = Style::new().fg(Color::Rgb(62, 62, 62));
    const WHITE_TEXT: Style = Style::new().fg(Color::White);
    const BLACK_ON_WHITE: Style = Style::new().fg(Color::Black).bg(Color::White);

    struct TextDialogInputLine {
        field: EditField,
        prefix: &'static str,
        placeholder: String,
        value: String,
    }

    // Date and time show what was typed, falling back to the stored value
    let lines = vec![
        TextDialogInputLine {
            field: EditField::Title,
            prefix: "Title:       ",
            placeholder: "My task name".into(),
            value: task.title.clone(),
        },
        TextDialogInputLine {
            field: EditField::Description,
            prefix: "Description: ",
            placeholder: "My description".into(),
            value: task.description.clone(),
        },
        TextDialogInputLine {
            field: EditField::Url,
            prefix: "Url:         ",
            placeholder: "https://".into(),
            value: task.url.clone(),
        },
        TextDialogInputLine {
            field: EditField::DueDate,
            prefix: "Due date:    ",
            placeholder: if task.has_due_date() { task.due_date.clone() } else { "23.11.2023".into() },
            value: dialog.date_input.clone(),
        },
        TextDialogInputLine {
            field: EditField::DueTime,
            prefix: "Due time:    ",
            placeholder: if task.has_due_time() { task.due_time.clone() } else { "14:30".into() },
            value: dialog.time_input.clone(),
        },
        TextDialogInputLine {
            field: EditField::Priority,
            prefix: "Priority:    ",
            placeholder: String::new(),
            value: format!("{} (0 low, 1 medium, 2 high)", task.priority),
        },
        TextDialogInputLine {
            field: EditField::Flag,
            prefix: "Flag:        ",
            placeholder: String::new(),
            value: format!("{} (y/n)", if task.flag { "on" } else { "off" }),
        },
    ];

    let mut text = Vec::new();
    for line in lines {
        let selected = line.field == dialog.field;
        let mut spans = vec![Span::styled(line.prefix, WHITE_TEXT)];

        if line.value.is_empty() {
            // Empty fields show a gray placeholder
            spans.push(Span::styled(line.placeholder, GRAY_TEXT));
        } else {
            spans.push(Span::styled(line.value, WHITE_TEXT));
        }
        if selected {
            spans.push(Span::styled(" ", BLACK_ON_WHITE));
        }

        text.push(Line::from(spans));
    }

    text.push(Line::raw(""));

    if let Some(ref error_message) = dialog.error_message {
        text.push(Line::from(vec![Span::styled(
            error_message.as_str(),
            Style::new().fg(Color::Red),
        )]));
        text.push(Line::raw(""));
    }

    text.push(Line::from(vec![Span::styled(
        "Enter - save, Esc - cancel, Up/Down - field",
        WHITE_TEXT,
    )]));

    text
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::app::testing::{FakeStorage, RecordingSink, StorageCall};
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::time::Duration;

    fn stored_task() -> Task {
        Task::persisted(
            "42",
            Task::default()
                .with_title("Water plants")
                .with_priority(Priority::Medium),
        )
    }

    fn view_model(
        task_id: Option<&str>,
        storage: &Arc<FakeStorage>,
    ) -> (EditTaskViewModel, Arc<RecordingSink>) {
        let sink = Arc::new(RecordingSink::default());
        let vm = EditTaskViewModel::new(
            task_id.map(str::to_string),
            Arc::clone(storage) as Arc<dyn StorageService>,
            sink.clone(),
        );
        (vm, sink)
    }

    fn counting_callback() -> (Arc<AtomicUsize>, impl FnOnce() + Send + 'static) {
        let calls = Arc::new(AtomicUsize::new(0));
        let counter = Arc::clone(&calls);
        (calls, move || {
            counter.fetch_add(1, Ordering::SeqCst);
        })
    }

    #[tokio::test]
    async fn new_task_commit_creates_exactly_once() {
        let storage = Arc::new(FakeStorage::new());
        let (vm, sink) = view_model(None, &storage);
        let (popped, pop_up_screen) = counting_callback();

        vm.on_title_change("Buy milk");
        vm.on_priority_change(Priority::High);
        vm.on_done_click(pop_up_screen);
        vm.wait_idle().await;

        let calls = storage.calls();
        assert_eq!(calls.len(), 1);
        match &calls[0] {
            StorageCall::Save(task) => {
                assert_eq!(task.title, "Buy milk");
                assert_eq!(task.priority.name(), "HIGH");
                assert_eq!(task.id(), "");
            }
            other => panic!("expected a save, got {other:?}"),
        }
        assert_eq!(popped.load(Ordering::SeqCst), 1);
        assert!(sink.messages().is_empty());
    }

    #[tokio::test]
    async fn existing_task_commit_updates_and_never_creates() {
        let storage = Arc::new(FakeStorage::with_tasks(vec![stored_task()]));
        let (vm, _sink) = view_model(Some("42"), &storage);
        vm.wait_idle().await;
        assert_eq!(vm.task(), stored_task());

        vm.on_flag_toggle(true);
        let (popped, pop_up_screen) = counting_callback();
        vm.on_done_click(pop_up_screen);
        vm.wait_idle().await;

        let writes: Vec<_> = storage
            .calls()
            .into_iter()
            .filter(|call| !matches!(call, StorageCall::Get(_)))
            .collect();
        assert_eq!(writes, vec![StorageCall::Update(stored_task().with_flag(true))]);
        assert_eq!(popped.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn unknown_id_falls_back_to_a_new_task() {
        let storage = Arc::new(FakeStorage::new());
        let (vm, sink) = view_model(Some("missing"), &storage);
        vm.wait_idle().await;

        assert_eq!(vm.task(), Task::default());
        assert_eq!(storage.calls(), vec![StorageCall::Get("missing".into())]);
        assert!(sink.messages().is_empty());

        let (_popped, pop_up_screen) = counting_callback();
        vm.on_done_click(pop_up_screen);
        vm.wait_idle().await;
        assert!(matches!(storage.calls().last(), Some(StorageCall::Save(_))));
    }

    #[tokio::test]
    async fn failed_commit_reports_and_stays_open() {
        let storage = Arc::new(FakeStorage::new());
        storage.fail_writes();
        let (vm, sink) = view_model(None, &storage);
        let (popped, pop_up_screen) = counting_callback();

        vm.on_title_change("won't stick");
        vm.on_done_click(pop_up_screen);
        vm.wait_idle().await;

        assert_eq!(popped.load(Ordering::SeqCst), 0);
        assert_eq!(sink.messages().len(), 1);
        assert_eq!(vm.task().title, "won't stick");
    }

    #[tokio::test]
    async fn repeated_done_clicks_commit_once() {
        let storage = Arc::new(FakeStorage::new());
        storage.delay_writes([Duration::from_millis(50)]);
        let (vm, sink) = view_model(None, &storage);
        let (popped, first) = counting_callback();
        let second = {
            let popped = Arc::clone(&popped);
            move || {
                popped.fetch_add(1, Ordering::SeqCst);
            }
        };

        vm.on_title_change("Buy milk");
        vm.on_done_click(first);
        vm.on_done_click(second);
        vm.wait_idle().await;
        vm.on_done_click(|| {});
        vm.wait_idle().await;

        assert_eq!(storage.calls().len(), 1);
        assert_eq!(storage.tasks().len(), 1);
        assert_eq!(popped.load(Ordering::SeqCst), 1);
        assert!(sink.messages().is_empty());
    }

    #[tokio::test]
    async fn done_works_again_after_a_failed_commit() {
        let storage = Arc::new(FakeStorage::new());
        storage.fail_writes();
        let (vm, sink) = view_model(None, &storage);

        vm.on_done_click(|| {});
        vm.wait_idle().await;
        vm.on_done_click(|| {});
        vm.wait_idle().await;

        assert_eq!(storage.calls().len(), 2);
        assert_eq!(sink.messages().len(), 2);
    }

    #[tokio::test]
    async fn stored_task_replaces_edits_typed_before_it_loads() {
        let storage = Arc::new(FakeStorage::with_tasks(vec![stored_task()]));
        let (vm, _sink) = view_model(Some("42"), &storage);

        // The load has not been polled yet on this single-threaded runtime
        vm.on_title_change("typed early");
        vm.wait_idle().await;

        assert_eq!(vm.task(), stored_task());
    }

    #[tokio::test]
    async fn each_change_touches_one_field() {
        let storage = Arc::new(FakeStorage::new());
        let (vm, _sink) = view_model(None, &storage);

        vm.on_title_change("t");
        vm.on_description_change("d");
        vm.on_url_change("u");
        let before = vm.task();
        vm.on_time_change(7, 5);
        assert_eq!(vm.task(), before.clone().with_due_time("07:05"));

        vm.on_description_change("");
        assert_eq!(vm.task(), before.with_due_time("07:05").with_description(""));
    }

    #[tokio::test]
    async fn date_change_is_idempotent_and_day_based() {
        let storage = Arc::new(FakeStorage::new());
        let (vm, _sink) = view_model(None, &storage);

        vm.on_date_change(1_710_460_800_000);
        let first = vm.task();
        vm.on_date_change(1_710_460_800_000);

        assert_eq!(first.due_date, "Fri, 15 Mar 2024");
        assert_eq!(vm.task(), first);
    }

    #[tokio::test]
    async fn out_of_range_date_keeps_previous_value() {
        let storage = Arc::new(FakeStorage::new());
        let (vm, _sink) = view_model(None, &storage);

        vm.on_date_change(1_710_460_800_000);
        vm.on_date_change(i64::MAX);
        assert_eq!(vm.task().due_date, "Fri, 15 Mar 2024");
    }

    #[tokio::test]
    async fn subscribers_see_every_replacement() {
        let storage = Arc::new(FakeStorage::new());
        let (vm, _sink) = view_model(None, &storage);
        let mut updates = vm.subscribe();

        vm.on_flag_toggle(true);
        assert!(updates.has_changed().expect("sender alive"));
        assert!(updates.borrow_and_update().flag);
    }

    #[tokio::test]
    async fn dropping_the_screen_cancels_a_slow_commit() {
        let storage = Arc::new(FakeStorage::new());
        storage.delay_writes([Duration::from_millis(200)]);
        let (vm, sink) = view_model(None, &storage);
        let (popped, pop_up_screen) = counting_callback();

        vm.on_done_click(pop_up_screen);
        tokio::time::sleep(Duration::from_millis(20)).await;
        drop(vm);
        tokio::time::sleep(Duration::from_millis(300)).await;

        assert_eq!(popped.load(Ordering::SeqCst), 0);
        assert!(storage.tasks().is_empty());
        assert!(sink.messages().is_empty());
    }

    #[tokio::test]
    async fn dialog_types_into_the_focused_field() {
        let storage = Arc::new(FakeStorage::new());
        let (vm, _sink) = view_model(None, &storage);
        let mut dialog = EditTaskDialogState::default();

        for c in "Milk".chars() {
            dialog.input(&vm, c);
        }
        dialog.delete_char(&vm);
        dialog.move_cursor_down();
        dialog.input(&vm, 'x');
        for _ in 0..4 {
            dialog.move_cursor_down();
        }
        dialog.input(&vm, '2');
        dialog.move_cursor_down();
        dialog.input(&vm, 'y');
        dialog.move_cursor_down();
        dialog.input(&vm, 'n');

        let task = vm.task();
        assert_eq!(task.title, "Mil");
        assert_eq!(task.description, "x");
        assert_eq!(task.priority, Priority::High);
        assert!(!task.flag);
    }

    #[tokio::test]
    async fn dialog_rejects_malformed_date_without_committing() {
        let storage = Arc::new(FakeStorage::new());
        let (vm, _sink) = view_model(None, &storage);
        let mut dialog = EditTaskDialogState::default();
        dialog.move_cursor_down();
        dialog.move_cursor_down();
        dialog.move_cursor_down();
        for c in "2024-03-15".chars() {
            dialog.input(&vm, c);
        }

        let (popped, pop_up_screen) = counting_callback();
        dialog.save_task(&vm, pop_up_screen);
        vm.wait_idle().await;

        assert!(dialog.error_message.is_some());
        assert!(storage.calls().is_empty());
        assert_eq!(popped.load(Ordering::SeqCst), 0);
    }

    #[tokio::test]
    async fn dialog_feeds_typed_date_and_time_before_saving() {
        let storage = Arc::new(FakeStorage::new());
        let (vm, _sink) = view_model(None, &storage);
        let mut dialog = EditTaskDialogState::default();
        for _ in 0..3 {
            dialog.move_cursor_down();
        }
        for c in "15.03.2024".chars() {
            dialog.input(&vm, c);
        }
        dialog.move_cursor_down();
        for c in "09:05".chars() {
            dialog.input(&vm, c);
        }

        let (popped, pop_up_screen) = counting_callback();
        dialog.save_task(&vm, pop_up_screen);
        vm.wait_idle().await;

        match storage.calls().as_slice() {
            [StorageCall::Save(task)] => {
                assert_eq!(task.due_date, "Fri, 15 Mar 2024");
                assert_eq!(task.due_time, "09:05");
            }
            other => panic!("unexpected calls {other:?}"),
        }
        assert_eq!(popped.load(Ordering::SeqCst), 1);
    }
}

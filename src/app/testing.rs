// In-memory collaborators for view-model tests
use std::collections::VecDeque;
use std::sync::Mutex;
use std::time::Duration;

use async_trait::async_trait;
use tokio::sync::watch;

use crate::app::account::AccountService;
use crate::app::error::{Result, TodoError};
use crate::app::models::{Task, User};
use crate::app::snackbar::ErrorSink;
use crate::app::storage::{StorageService, TaskStream};

#[derive(Default)]
pub struct RecordingSink {
    messages: Mutex<Vec<String>>,
}

impl RecordingSink {
    pub fn messages(&self) -> Vec<String> {
        self.messages.lock().expect("sink lock").clone()
    }
}

impl ErrorSink for RecordingSink {
    fn report(&self, message: String) {
        self.messages.lock().expect("sink lock").push(message);
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum StorageCall {
    Get(String),
    Save(Task),
    Update(Task),
    Delete(String),
}

/// Storage stub that records every call and echoes writes into its stream.
pub struct FakeStorage {
    tasks: watch::Sender<Vec<Task>>,
    calls: Mutex<Vec<StorageCall>>,
    // Consumed front to back, one per write
    delays: Mutex<VecDeque<Duration>>,
    fail_writes: Mutex<bool>,
    next_id: Mutex<u64>,
}

impl FakeStorage {
    pub fn new() -> Self {
        Self::with_tasks(Vec::new())
    }

    pub fn with_tasks(tasks: Vec<Task>) -> Self {
        Self {
            tasks: watch::Sender::new(tasks),
            calls: Mutex::new(Vec::new()),
            delays: Mutex::new(VecDeque::new()),
            fail_writes: Mutex::new(false),
            next_id: Mutex::new(100),
        }
    }

    pub fn calls(&self) -> Vec<StorageCall> {
        self.calls.lock().expect("calls lock").clone()
    }

    pub fn tasks(&self) -> Vec<Task> {
        self.tasks.borrow().clone()
    }

    pub fn fail_writes(&self) {
        *self.fail_writes.lock().expect("fail lock") = true;
    }

    pub fn delay_writes(&self, delays: impl IntoIterator<Item = Duration>) {
        self.delays.lock().expect("delay lock").extend(delays);
    }

    fn record(&self, call: StorageCall) {
        self.calls.lock().expect("calls lock").push(call);
    }

    async fn before_write(&self) -> Result<()> {
        let delay = self.delays.lock().expect("delay lock").pop_front();
        if let Some(delay) = delay {
            tokio::time::sleep(delay).await;
        }
        if *self.fail_writes.lock().expect("fail lock") {
            return Err(TodoError::Account("backend unavailable".to_string()));
        }
        Ok(())
    }
}

#[async_trait]
impl StorageService for FakeStorage {
    fn observe_tasks(&self) -> TaskStream {
        let mut stream = self.tasks.subscribe();
        stream.mark_changed();
        stream
    }

    async fn get_task(&self, id: &str) -> Result<Option<Task>> {
        self.record(StorageCall::Get(id.to_string()));
        Ok(self.tasks.borrow().iter().find(|t| t.id() == id).cloned())
    }

    async fn save(&self, task: Task) -> Result<String> {
        self.record(StorageCall::Save(task.clone()));
        self.before_write().await?;
        let id = {
            let mut next_id = self.next_id.lock().expect("id lock");
            *next_id += 1;
            next_id.to_string()
        };
        let stored = Task::persisted(id.clone(), task);
        self.tasks.send_modify(|tasks| tasks.push(stored));
        Ok(id)
    }

    async fn update(&self, task: Task) -> Result<()> {
        self.record(StorageCall::Update(task.clone()));
        self.before_write().await?;
        let mut found = false;
        self.tasks.send_modify(|tasks| {
            if let Some(slot) = tasks.iter_mut().find(|t| t.id() == task.id()) {
                *slot = task.clone();
                found = true;
            }
        });
        if found {
            Ok(())
        } else {
            Err(TodoError::TaskNotFound(task.id().to_string()))
        }
    }

    async fn delete(&self, id: &str) -> Result<()> {
        self.record(StorageCall::Delete(id.to_string()));
        self.before_write().await?;
        self.tasks.send_modify(|tasks| tasks.retain(|t| t.id() != id));
        Ok(())
    }

    async fn completed_tasks_count(&self) -> Result<u32> {
        Ok(self.tasks.borrow().iter().filter(|t| t.completed).count() as u32)
    }

    async fn important_completed_tasks_count(&self) -> Result<u32> {
        Ok(self
            .tasks
            .borrow()
            .iter()
            .filter(|t| t.completed && t.flag)
            .count() as u32)
    }

    async fn medium_high_tasks_to_complete_count(&self) -> Result<u32> {
        use crate::app::models::Priority;

        Ok(self
            .tasks
            .borrow()
            .iter()
            .filter(|t| !t.completed && t.priority >= Priority::Medium)
            .count() as u32)
    }
}

/// Account stub with switchable failure.
pub struct FakeAccount {
    user: watch::Sender<Option<User>>,
    fail: Mutex<bool>,
    calls: Mutex<Vec<&'static str>>,
}

impl FakeAccount {
    pub fn signed_out() -> Self {
        Self {
            user: watch::Sender::new(None),
            fail: Mutex::new(false),
            calls: Mutex::new(Vec::new()),
        }
    }

    pub fn signed_in(user: User) -> Self {
        let account = Self::signed_out();
        account.user.send_replace(Some(user));
        account
    }

    pub fn fail_calls(&self) {
        *self.fail.lock().expect("fail lock") = true;
    }

    pub fn calls(&self) -> Vec<&'static str> {
        self.calls.lock().expect("calls lock").clone()
    }

    fn enter(&self, call: &'static str) -> Result<()> {
        self.calls.lock().expect("calls lock").push(call);
        if *self.fail.lock().expect("fail lock") {
            return Err(TodoError::Account(format!("{call} rejected")));
        }
        Ok(())
    }
}

#[async_trait]
impl AccountService for FakeAccount {
    fn current_user(&self) -> watch::Receiver<Option<User>> {
        self.user.subscribe()
    }

    async fn create_anonymous_account(&self) -> Result<User> {
        self.enter("create_anonymous_account")?;
        let user = User {
            id: "anon-1".to_string(),
            is_anonymous: true,
        };
        self.user.send_replace(Some(user.clone()));
        Ok(user)
    }

    async fn link_account(&self, _email: &str, _password: &str) -> Result<()> {
        self.enter("link_account")?;
        self.user.send_modify(|user| {
            if let Some(user) = user {
                user.is_anonymous = false;
            }
        });
        Ok(())
    }

    async fn authenticate(&self, _email: &str, _password: &str) -> Result<()> {
        self.enter("authenticate")?;
        self.user.send_replace(Some(User {
            id: "email-1".to_string(),
            is_anonymous: false,
        }));
        Ok(())
    }

    async fn sign_out(&self) -> Result<()> {
        self.enter("sign_out")?;
        self.user.send_replace(None);
        Ok(())
    }

    async fn delete_account(&self) -> Result<()> {
        self.enter("delete_account")?;
        self.user.send_replace(None);
        Ok(())
    }
}

// Task persistence
// View-models see the StorageService trait; the binary runs on SqliteStorage
use std::sync::Arc;

use async_trait::async_trait;
use rusqlite::{params, Connection, Row};
use tokio::sync::watch;
use tracing::{debug, warn};

use crate::app::database::Database;
use crate::app::error::{Result, TodoError};
use crate::app::models::{Task, User};

/// Live view of the current user's tasks. Every write re-emits the whole list.
pub type TaskStream = watch::Receiver<Vec<Task>>;

#[async_trait]
pub trait StorageService: Send + Sync {
    /// Subscribes to the task collection. Each subscription asks storage to
    /// re-publish, so a fresh screen always gets a first emission.
    fn observe_tasks(&self) -> TaskStream;

    /// `Ok(None)` when no task has this id.
    async fn get_task(&self, id: &str) -> Result<Option<Task>>;

    /// Stores a new task and returns its assigned id. The input id is ignored.
    async fn save(&self, task: Task) -> Result<String>;

    async fn update(&self, task: Task) -> Result<()>;

    /// Deleting an id that does not exist succeeds.
    async fn delete(&self, id: &str) -> Result<()>;

    async fn completed_tasks_count(&self) -> Result<u32>;

    async fn important_completed_tasks_count(&self) -> Result<u32>;

    async fn medium_high_tasks_to_complete_count(&self) -> Result<u32>;
}

const SELECT_TASK_COLUMNS: &str =
    "SELECT Id, Title, Description, Url, DueDate, DueTime, Priority, Flag, Completed FROM task_item";

/// SQLite-backed task store. Tasks belong to whichever user is signed in.
pub struct SqliteStorage {
    db: Database,
    user: watch::Receiver<Option<User>>,
    tasks: Arc<watch::Sender<Vec<Task>>>,
}

impl SqliteStorage {
    pub fn new(db: Database, user: watch::Receiver<Option<User>>) -> Self {
        Self {
            db,
            user,
            tasks: Arc::new(watch::Sender::new(Vec::new())),
        }
    }

    fn user_id(&self) -> Result<String> {
        self.user
            .borrow()
            .as_ref()
            .map(|user| user.id.clone())
            .ok_or(TodoError::NoUser)
    }

    // Re-read the current user's tasks and push them to every subscriber.
    // The write itself already succeeded, so a failed refresh is only logged.
    async fn publish(&self) {
        if let Err(err) = publish_tasks(&self.db, self.user_id().ok(), Arc::clone(&self.tasks)).await {
            warn!(error = %err, "failed to refresh tasks after write");
        }
    }

    async fn count(&self, condition: &'static str) -> Result<u32> {
        let user_id = self.user_id()?;
        self.db
            .call(move |conn| {
                let sql = format!("SELECT COUNT(*) FROM task_item WHERE UserId = ?1 AND {condition}");
                let count: u32 = conn.query_row(&sql, [&user_id], |row| row.get(0))?;
                Ok(count)
            })
            .await
    }
}

// Read and send under the connection lock, so emissions follow write order
async fn publish_tasks(
    db: &Database,
    user_id: Option<String>,
    sender: Arc<watch::Sender<Vec<Task>>>,
) -> Result<()> {
    db.call(move |conn| {
        let tasks = match user_id {
            Some(user_id) => get_all_tasks(conn, &user_id)?,
            None => Vec::new(),
        };
        debug!(count = tasks.len(), "publishing tasks");
        sender.send_replace(tasks);
        Ok(())
    })
    .await
}

fn row_to_task(row: &Row<'_>) -> rusqlite::Result<Task> {
    let id: i64 = row.get(0)?;
    let draft = Task::default()
        .with_title(row.get::<_, String>(1)?)
        .with_description(row.get::<_, String>(2)?)
        .with_url(row.get::<_, String>(3)?)
        .with_due_date(row.get::<_, String>(4)?)
        .with_due_time(row.get::<_, String>(5)?)
        .with_priority(row.get(6)?)
        .with_flag(row.get(7)?)
        .with_completed(row.get(8)?);
    Ok(Task::persisted(id.to_string(), draft))
}

// READ
fn get_all_tasks(conn: &Connection, user_id: &str) -> Result<Vec<Task>> {
    let mut stmt = conn.prepare(&format!("{SELECT_TASK_COLUMNS} WHERE UserId = ?1 ORDER BY Id"))?;
    let tasks = stmt
        .query_map([user_id], row_to_task)?
        .collect::<rusqlite::Result<Vec<_>>>()?;
    Ok(tasks)
}

#[async_trait]
impl StorageService for SqliteStorage {
    fn observe_tasks(&self) -> TaskStream {
        let stream = self.tasks.subscribe();

        let db = self.db.clone();
        let sender = Arc::clone(&self.tasks);
        let user_id = self.user_id().ok();
        tokio::spawn(async move {
            if let Err(err) = publish_tasks(&db, user_id, sender).await {
                warn!(error = %err, "failed to refresh tasks for new subscriber");
            }
        });

        stream
    }

    async fn get_task(&self, id: &str) -> Result<Option<Task>> {
        let user_id = self.user_id()?;
        let id = id.to_string();
        self.db
            .call(move |conn| {
                let mut stmt =
                    conn.prepare(&format!("{SELECT_TASK_COLUMNS} WHERE Id = ?1 AND UserId = ?2"))?;
                let mut rows = stmt.query_map([&id, &user_id], row_to_task)?;
                Ok(rows.next().transpose()?)
            })
            .await
    }

    // CREATE
    async fn save(&self, task: Task) -> Result<String> {
        let user_id = self.user_id()?;
        let id = self
            .db
            .call(move |conn| {
                conn.execute(
                    "INSERT INTO task_item (UserId, Title, Description, Url, DueDate, DueTime, Priority, Flag, Completed)
                     VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9);",
                    params![
                        user_id,
                        task.title,
                        task.description,
                        task.url,
                        task.due_date,
                        task.due_time,
                        task.priority,
                        task.flag,
                        task.completed
                    ],
                )?;
                Ok(conn.last_insert_rowid().to_string())
            })
            .await?;
        debug!(task_id = %id, "task created");
        self.publish().await;
        Ok(id)
    }

    // UPDATE
    async fn update(&self, task: Task) -> Result<()> {
        let user_id = self.user_id()?;
        let task_id = task.id().to_string();
        let changed = self
            .db
            .call(move |conn| {
                Ok(conn.execute(
                    "UPDATE task_item SET Title = ?1, Description = ?2, Url = ?3, DueDate = ?4, DueTime = ?5,
                     Priority = ?6, Flag = ?7, Completed = ?8 WHERE Id = ?9 AND UserId = ?10;",
                    params![
                        task.title,
                        task.description,
                        task.url,
                        task.due_date,
                        task.due_time,
                        task.priority,
                        task.flag,
                        task.completed,
                        task.id(),
                        user_id
                    ],
                )?)
            })
            .await?;
        if changed == 0 {
            return Err(TodoError::TaskNotFound(task_id));
        }
        debug!(%task_id, "task updated");
        self.publish().await;
        Ok(())
    }

    // DELETE
    async fn delete(&self, id: &str) -> Result<()> {
        let user_id = self.user_id()?;
        let task_id = id.to_string();
        let removed = self
            .db
            .call(move |conn| {
                Ok(conn.execute(
                    "DELETE FROM task_item WHERE Id = ?1 AND UserId = ?2;",
                    [&task_id, &user_id],
                )?)
            })
            .await?;
        debug!(task_id = %id, removed, "task deleted");
        self.publish().await;
        Ok(())
    }

    async fn completed_tasks_count(&self) -> Result<u32> {
        self.count("Completed = 1").await
    }

    async fn important_completed_tasks_count(&self) -> Result<u32> {
        self.count("Completed = 1 AND Flag = 1").await
    }

    async fn medium_high_tasks_to_complete_count(&self) -> Result<u32> {
        self.count("Completed = 0 AND Priority IN ('MEDIUM', 'HIGH')")
            .await
    }
}

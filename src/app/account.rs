// Account identity
// Anonymous accounts can later be linked to an email; the session survives restarts.
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use rusqlite::{params, OptionalExtension};
use sha2::{Digest, Sha256};
use tokio::sync::watch;
use tracing::{info, warn};

use crate::app::database::Database;
use crate::app::error::{Result, TodoError};
use crate::app::models::User;

const SESSION_KEY: &str = "current";

#[async_trait]
pub trait AccountService: Send + Sync {
    /// Stream of the signed-in user; `None` while signed out.
    fn current_user(&self) -> watch::Receiver<Option<User>>;

    fn has_user(&self) -> bool {
        self.current_user_id().is_some()
    }

    fn current_user_id(&self) -> Option<String> {
        let user = self.current_user();
        let id = user.borrow().as_ref().map(|user| user.id.clone());
        id
    }

    async fn create_anonymous_account(&self) -> Result<User>;

    /// Gives the signed-in anonymous account an email and password. The
    /// account keeps its id, so its tasks stay with it.
    async fn link_account(&self, email: &str, password: &str) -> Result<()>;

    /// Signs into an email account.
    async fn authenticate(&self, email: &str, password: &str) -> Result<()>;

    async fn sign_out(&self) -> Result<()>;

    async fn delete_account(&self) -> Result<()>;
}

fn password_hash(salt: &str, password: &str) -> String {
    let mut hasher = Sha256::new();
    hasher.update(salt.as_bytes());
    hasher.update(password.as_bytes());
    format!("{:x}", hasher.finalize())
}

pub struct LocalAccountService {
    db: Database,
    user: watch::Sender<Option<User>>,
}

impl LocalAccountService {
    // Open the service, restoring whoever was signed in last time
    pub async fn restore(db: Database) -> Result<Self> {
        let user = db
            .call(|conn| {
                let user = conn
                    .query_row(
                        "SELECT account.Id, account.Anonymous FROM session
                         JOIN account ON account.Id = session.AccountId
                         WHERE session.Key = ?1",
                        [SESSION_KEY],
                        |row| {
                            Ok(User {
                                id: row.get::<_, i64>(0)?.to_string(),
                                is_anonymous: row.get(1)?,
                            })
                        },
                    )
                    .optional()?;
                Ok(user)
            })
            .await?;

        match &user {
            Some(user) => info!(user_id = %user.id, "restored session"),
            None => info!("no stored session"),
        }

        Ok(Self {
            db,
            user: watch::Sender::new(user),
        })
    }

    fn signed_in_user(&self) -> Result<User> {
        self.user.borrow().clone().ok_or(TodoError::NoUser)
    }

    // Drop the account row, its session and every task it owns
    async fn remove_account(&self, user: &User) -> Result<()> {
        let user_id = user.id.clone();
        self.db
            .call(move |conn| {
                let tx = conn.transaction()?;
                tx.execute("DELETE FROM task_item WHERE UserId = ?1", [&user_id])?;
                tx.execute("DELETE FROM session WHERE AccountId = ?1", [&user_id])?;
                let removed = tx.execute("DELETE FROM account WHERE Id = ?1", [&user_id])?;
                if removed == 0 {
                    return Err(TodoError::Account(format!("account {user_id} does not exist")));
                }
                tx.commit()?;
                Ok(())
            })
            .await
    }
}

#[async_trait]
impl AccountService for LocalAccountService {
    fn current_user(&self) -> watch::Receiver<Option<User>> {
        self.user.subscribe()
    }

    async fn create_anonymous_account(&self) -> Result<User> {
        let created_at: DateTime<Utc> = Utc::now();
        let user = self
            .db
            .call(move |conn| {
                let tx = conn.transaction()?;
                tx.execute(
                    "INSERT INTO account (Anonymous, CreatedAt) VALUES (?1, ?2)",
                    params![true, created_at],
                )?;
                let id = tx.last_insert_rowid();
                tx.execute(
                    "INSERT OR REPLACE INTO session (Key, AccountId) VALUES (?1, ?2)",
                    params![SESSION_KEY, id],
                )?;
                tx.commit()?;
                Ok(User {
                    id: id.to_string(),
                    is_anonymous: true,
                })
            })
            .await?;

        info!(user_id = %user.id, "created anonymous account");
        self.user.send_replace(Some(user.clone()));
        Ok(user)
    }

    async fn link_account(&self, email: &str, password: &str) -> Result<()> {
        let user = self.signed_in_user()?;
        if !user.is_anonymous {
            return Err(TodoError::Account("account is already linked to an email".to_string()));
        }

        let salt = format!("{:032x}", rand::random::<u128>());
        let hash = password_hash(&salt, password);
        let email = email.trim().to_string();
        let user_id = user.id.clone();
        self.db
            .call(move |conn| {
                let tx = conn.transaction()?;
                let taken: bool = tx.query_row(
                    "SELECT EXISTS(SELECT 1 FROM account WHERE Email = ?1)",
                    [&email],
                    |row| row.get(0),
                )?;
                if taken {
                    return Err(TodoError::Account(format!("{email} is already in use")));
                }
                let linked = tx.execute(
                    "UPDATE account SET Anonymous = 0, Email = ?1, Salt = ?2, PasswordHash = ?3
                     WHERE Id = ?4 AND Anonymous = 1",
                    params![email, salt, hash, user_id],
                )?;
                if linked == 0 {
                    return Err(TodoError::Account(format!("account {user_id} does not exist")));
                }
                tx.commit()?;
                Ok(())
            })
            .await?;

        info!(user_id = %user.id, "linked account to email");
        self.user.send_replace(Some(User {
            id: user.id,
            is_anonymous: false,
        }));
        Ok(())
    }

    async fn authenticate(&self, email: &str, password: &str) -> Result<()> {
        let email = email.trim().to_string();
        let password = password.to_string();
        let user = self
            .db
            .call(move |conn| {
                let stored = conn
                    .query_row(
                        "SELECT Id, Salt, PasswordHash FROM account WHERE Email = ?1",
                        [&email],
                        |row| Ok((row.get::<_, i64>(0)?, row.get::<_, String>(1)?, row.get::<_, String>(2)?)),
                    )
                    .optional()?;
                let id = match stored {
                    Some((id, salt, hash)) if password_hash(&salt, &password) == hash => id,
                    _ => return Err(TodoError::Account("wrong email or password".to_string())),
                };
                conn.execute(
                    "INSERT OR REPLACE INTO session (Key, AccountId) VALUES (?1, ?2)",
                    params![SESSION_KEY, id],
                )?;
                Ok(User {
                    id: id.to_string(),
                    is_anonymous: false,
                })
            })
            .await?;

        // The anonymous account being left behind cannot be signed back into
        let previous = self.user.borrow().clone();
        if let Some(previous) = previous.filter(|p| p.is_anonymous && p.id != user.id) {
            if let Err(err) = self.remove_account(&previous).await {
                warn!(user_id = %previous.id, error = %err, "failed to discard anonymous account");
            }
        }

        info!(user_id = %user.id, "signed in");
        self.user.send_replace(Some(user));
        Ok(())
    }

    async fn sign_out(&self) -> Result<()> {
        let user = self.signed_in_user()?;

        // An anonymous account cannot be signed back into
        if user.is_anonymous {
            self.remove_account(&user).await?;
        } else {
            self.db
                .call(|conn| {
                    conn.execute("DELETE FROM session WHERE Key = ?1", [SESSION_KEY])?;
                    Ok(())
                })
                .await?;
        }

        info!(user_id = %user.id, "signed out");
        self.user.send_replace(None);
        Ok(())
    }

    async fn delete_account(&self) -> Result<()> {
        let user = self.signed_in_user()?;
        self.remove_account(&user).await?;

        info!(user_id = %user.id, "deleted account");
        self.user.send_replace(None);
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::app::models::Task;
    use crate::app::storage::{SqliteStorage, StorageService};

    #[tokio::test]
    async fn starts_signed_out_on_a_fresh_database() {
        let db = Database::open_in_memory().expect("open db");
        let account = LocalAccountService::restore(db).await.expect("restore");
        assert!(!account.has_user());
        assert_eq!(account.current_user_id(), None);
    }

    #[tokio::test]
    async fn anonymous_account_is_restored_from_session() {
        let db = Database::open_in_memory().expect("open db");
        let account = LocalAccountService::restore(db.clone()).await.expect("restore");
        let user = account.create_anonymous_account().await.expect("create");
        assert!(user.is_anonymous);
        assert_eq!(account.current_user_id(), Some(user.id.clone()));

        let reopened = LocalAccountService::restore(db).await.expect("restore again");
        assert_eq!(*reopened.current_user().borrow(), Some(user));
    }

    #[tokio::test]
    async fn sign_out_discards_anonymous_account_and_tasks() {
        let db = Database::open_in_memory().expect("open db");
        let account = LocalAccountService::restore(db.clone()).await.expect("restore");
        account.create_anonymous_account().await.expect("create");
        let storage = SqliteStorage::new(db.clone(), account.current_user());
        let id = storage.save(Task::default().with_title("gone")).await.expect("save");

        let mut user_stream = account.current_user();
        account.sign_out().await.expect("sign out");
        assert!(user_stream.has_changed().expect("sender alive"));
        assert_eq!(*user_stream.borrow_and_update(), None);

        let leftovers: i64 = db
            .call(move |conn| {
                Ok(conn.query_row(
                    "SELECT (SELECT COUNT(*) FROM account) + (SELECT COUNT(*) FROM task_item WHERE Id = ?1)",
                    [&id],
                    |row| row.get(0),
                )?)
            })
            .await
            .expect("count");
        assert_eq!(leftovers, 0);
        assert!(LocalAccountService::restore(db).await.expect("restore").current_user_id().is_none());
    }

    #[tokio::test]
    async fn delete_account_requires_a_user() {
        let db = Database::open_in_memory().expect("open db");
        let account = LocalAccountService::restore(db).await.expect("restore");
        assert!(matches!(account.delete_account().await, Err(TodoError::NoUser)));
        assert!(matches!(account.sign_out().await, Err(TodoError::NoUser)));
    }

    #[tokio::test]
    async fn delete_account_signs_out() {
        let db = Database::open_in_memory().expect("open db");
        let account = LocalAccountService::restore(db).await.expect("restore");
        account.create_anonymous_account().await.expect("create");
        account.delete_account().await.expect("delete");
        assert!(!account.has_user());
    }

    #[tokio::test]
    async fn linking_keeps_the_id_and_tasks() {
        let db = Database::open_in_memory().expect("open db");
        let account = LocalAccountService::restore(db.clone()).await.expect("restore");
        let anonymous = account.create_anonymous_account().await.expect("create");
        let storage = SqliteStorage::new(db.clone(), account.current_user());
        let id = storage.save(Task::default().with_title("kept")).await.expect("save");

        account
            .link_account("me@example.com", "Secret1")
            .await
            .expect("link");

        let linked = account.current_user().borrow().clone().expect("signed in");
        assert_eq!(linked.id, anonymous.id);
        assert!(!linked.is_anonymous);
        assert!(storage.get_task(&id).await.expect("get").is_some());

        let reopened = LocalAccountService::restore(db).await.expect("restore again");
        assert_eq!(*reopened.current_user().borrow(), Some(linked));
    }

    #[tokio::test]
    async fn linking_twice_or_with_a_taken_email_fails() {
        let db = Database::open_in_memory().expect("open db");
        let account = LocalAccountService::restore(db.clone()).await.expect("restore");
        account.create_anonymous_account().await.expect("create");
        account.link_account("me@example.com", "Secret1").await.expect("link");
        assert!(matches!(
            account.link_account("other@example.com", "Secret1").await,
            Err(TodoError::Account(_))
        ));

        account.sign_out().await.expect("sign out");
        account.create_anonymous_account().await.expect("create");
        let err = account
            .link_account("me@example.com", "Other1x")
            .await
            .expect_err("email taken");
        assert_eq!(err.to_string(), "account error: me@example.com is already in use");
        assert!(account.current_user().borrow().as_ref().is_some_and(|u| u.is_anonymous));
    }

    #[tokio::test]
    async fn signing_out_of_a_linked_account_keeps_it_for_later() {
        let db = Database::open_in_memory().expect("open db");
        let account = LocalAccountService::restore(db.clone()).await.expect("restore");
        let user = account.create_anonymous_account().await.expect("create");
        let storage = SqliteStorage::new(db.clone(), account.current_user());
        let id = storage.save(Task::default().with_title("mine")).await.expect("save");
        account.link_account("me@example.com", "Secret1").await.expect("link");

        account.sign_out().await.expect("sign out");
        assert!(!account.has_user());

        assert!(matches!(
            account.authenticate("me@example.com", "wrong").await,
            Err(TodoError::Account(_))
        ));
        assert!(!account.has_user());

        account.authenticate("me@example.com", "Secret1").await.expect("sign in");
        assert_eq!(account.current_user_id(), Some(user.id));
        assert!(storage.get_task(&id).await.expect("get").is_some());
    }

    #[tokio::test]
    async fn signing_in_discards_the_anonymous_account() {
        let db = Database::open_in_memory().expect("open db");
        let account = LocalAccountService::restore(db.clone()).await.expect("restore");
        let linked = account.create_anonymous_account().await.expect("create");
        account.link_account("me@example.com", "Secret1").await.expect("link");
        account.sign_out().await.expect("sign out");

        let anonymous = account.create_anonymous_account().await.expect("create");
        account.authenticate("me@example.com", "Secret1").await.expect("sign in");

        assert_eq!(account.current_user_id(), Some(linked.id));
        let anonymous_id = anonymous.id.clone();
        let remaining: i64 = db
            .call(move |conn| {
                Ok(conn.query_row("SELECT COUNT(*) FROM account WHERE Id = ?1", [&anonymous_id], |row| {
                    row.get(0)
                })?)
            })
            .await
            .expect("count");
        assert_eq!(remaining, 0);
    }
}

use std::fmt;
use std::str::FromStr;

use rusqlite::types::{FromSql, FromSqlError, FromSqlResult, ToSql, ToSqlOutput, ValueRef};

// Priority levels, lowest first.
// Persisted by textual name, e.g. "MEDIUM".
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum Priority {
    #[default]
    Low,
    Medium,
    High,
}

impl Priority {
    pub const ALL: [Priority; 3] = [Priority::Low, Priority::Medium, Priority::High];

    pub fn name(self) -> &'static str {
        match self {
            Priority::Low => "LOW",
            Priority::Medium => "MEDIUM",
            Priority::High => "HIGH",
        }
    }
}

impl fmt::Display for Priority {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("unknown priority {0:?}")]
pub struct UnknownPriority(pub String);

impl FromStr for Priority {
    type Err = UnknownPriority;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Priority::ALL
            .into_iter()
            .find(|priority| priority.name() == s)
            .ok_or_else(|| UnknownPriority(s.to_string()))
    }
}

impl ToSql for Priority {
    fn to_sql(&self) -> rusqlite::Result<ToSqlOutput<'_>> {
        Ok(ToSqlOutput::from(self.name()))
    }
}

impl FromSql for Priority {
    fn column_result(value: ValueRef<'_>) -> FromSqlResult<Self> {
        value
            .as_str()?
            .parse()
            .map_err(|e| FromSqlError::Other(Box::new(e)))
    }
}

/// A single to-do item.
///
/// Values are never edited in place: every change goes through one of the
/// `with_*` methods, which consume the task and return a copy differing in
/// exactly one field. The `id` has no such method; only storage assigns it.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Task {
    id: String,
    pub title: String,
    pub description: String,
    pub url: String,
    pub due_date: String,
    pub due_time: String,
    pub priority: Priority,
    pub flag: bool,
    pub completed: bool,
}

impl Task {
    // Rebuild a task that storage already knows about
    pub(crate) fn persisted(id: impl Into<String>, draft: Task) -> Task {
        Task {
            id: id.into(),
            ..draft
        }
    }

    pub fn id(&self) -> &str {
        &self.id
    }

    // A blank id means storage has never seen this task
    pub fn is_new(&self) -> bool {
        self.id.trim().is_empty()
    }

    pub fn with_title(self, title: impl Into<String>) -> Task {
        Task {
            title: title.into(),
            ..self
        }
    }

    pub fn with_description(self, description: impl Into<String>) -> Task {
        Task {
            description: description.into(),
            ..self
        }
    }

    pub fn with_url(self, url: impl Into<String>) -> Task {
        Task {
            url: url.into(),
            ..self
        }
    }

    pub fn with_due_date(self, due_date: impl Into<String>) -> Task {
        Task {
            due_date: due_date.into(),
            ..self
        }
    }

    pub fn with_due_time(self, due_time: impl Into<String>) -> Task {
        Task {
            due_time: due_time.into(),
            ..self
        }
    }

    pub fn with_priority(self, priority: Priority) -> Task {
        Task { priority, ..self }
    }

    pub fn with_flag(self, flag: bool) -> Task {
        Task { flag, ..self }
    }

    pub fn with_completed(self, completed: bool) -> Task {
        Task { completed, ..self }
    }

    pub fn has_due_date(&self) -> bool {
        !self.due_date.is_empty()
    }

    pub fn has_due_time(&self) -> bool {
        !self.due_time.is_empty()
    }

    // Second line of a list entry: "<date> at <time>", skipping unset parts
    pub fn due_date_and_time(&self) -> String {
        let mut line = String::new();

        if self.has_due_date() {
            line.push_str(&self.due_date);
            line.push(' ');
        }

        if self.has_due_time() {
            line.push_str("at ");
            line.push_str(&self.due_time);
        }

        line
    }
}

/// Identity of the signed-in account.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct User {
    pub id: String,
    pub is_anonymous: bool,
}

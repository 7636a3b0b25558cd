//! A to-do list: view-models that stage task edits and relay list intents
//! to a storage backend, plus the SQLite collaborators and terminal UI the
//! binary runs on.

pub mod app;

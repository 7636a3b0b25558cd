pub mod account;
pub mod config;
pub mod database;
pub mod datetime;
pub mod error;
pub mod logging;
pub mod login;
pub mod models;
pub mod scope;
pub mod settings;
pub mod sign_up;
pub mod snackbar;
pub mod splash;
pub mod stats;
pub mod storage;
pub mod task_edit;
pub mod task_list;
pub mod ui;
pub mod validation;

#[cfg(test)]
mod testing;

pub use error::{Result, TodoError};

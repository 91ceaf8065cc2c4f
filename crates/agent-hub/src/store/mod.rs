//! SQLite-backed persistent message store for the agent hub.

mod db;
mod models;
mod queries;

pub use db::{DatabaseError, MessageStore};
pub use models::Message;

//! Session table: the hub's live map from agent identity to delivery queue.

mod session;

pub use session::SessionTable;

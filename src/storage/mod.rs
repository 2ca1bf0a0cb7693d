//! Persistent history
//!
//! Scene summaries and alerts are stored in sled (see [`HistoryStorage`]).
//! The handle is `Clone` and shared between the processing loop and the API.

mod history;

pub use history::{HistoryStorage, StorageError, StorageStats};

pub mod common;
pub mod entry;
pub mod supervisor;
pub mod watcher;

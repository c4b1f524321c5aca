pub mod commands;
pub mod modules;

pub use modules::common::error::RemovalError;
pub use modules::common::utils;
pub use modules::entry;
pub use modules::supervisor;
pub use modules::watcher;

//! Shared helpers: filesystem access and logging setup

pub mod io;
pub mod logging;

pub use self::io::{atomic_write, ensure_parent_dir, has_allowed_extension};
pub use self::logging::{init_logging, LogLevel};

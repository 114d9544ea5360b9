//! Job description, per-file outcomes and secret handling

pub mod job;
pub mod outcome;
pub mod secret;

pub use job::*;
pub use outcome::*;
pub use secret::Secret;

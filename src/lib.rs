pub mod admin;
pub mod commands;
pub mod error;
pub mod server;
pub mod transport;
pub mod utils;

pub use admin::result::{
    AdminResult, ProcessHandle, ResultValue, TaskEvent, TaskState, TaskTransition,
};
pub use admin::{AdminCall, AdminFactory, PendingResult, ServerAdmin};
pub use commands::{Command, StartDasArgs};
pub use error::{AdminError, CommandError, WaitError};
pub use server::{AdminInterface, Protocol, ServerConnection};

// Crate version exposed for runtime queries
pub const VERSION: &str = env!("CARGO_PKG_VERSION");

pub mod classpath;
pub mod command;
pub mod sanitize;
pub mod task;

pub use command::{CommandBuilder, CommandRequest, Placeholders, VersionCommandBuilder};
pub use sanitize::{prune_library_store, sanitize_classpath, sanitize_command};
pub use task::{LaunchOrchestrator, LaunchStage, LaunchedGame};

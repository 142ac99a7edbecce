//! # stockroom-core
//!
//! Shared foundation for the stockroom inventory crates: the validated
//! database configuration, the declarative schema model consumed by the
//! migrator, structured logging setup and the interactive prompt interface.

pub mod config;
pub mod logging;
pub mod prompt;
pub mod schema;

pub use config::*;
pub use logging::{init_logging, LoggingConfig};
pub use prompt::{PromptError, PromptResult, Prompter, ScriptedAnswer, ScriptedPrompter, TerminalPrompter};
pub use schema::*;

//! Lifeline binary support: CLI, logging, console transport and wiring.

#![forbid(unsafe_code)]
#![warn(missing_docs)]

mod app;
mod cli;
mod console;
mod observability;

pub use app::{build_executor, build_server, console_principal};
pub use cli::Cli;
pub use console::{ConsoleResponder, ConsoleSource, LocalFile};
pub use observability::{LoggingOptions, init_logging};

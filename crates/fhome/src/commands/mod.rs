//! Command dispatch: bridges CLI args -> client calls -> output formatting.

pub mod config_cmd;
pub mod event;
pub mod object;
pub mod util;

use fhome_api::Client;

use crate::cli::{Command, OutputFormat};
use crate::error::CliError;

/// Resolved output preferences shared by every handler.
#[derive(Debug, Clone, Copy)]
pub struct Ctx {
    pub output: OutputFormat,
    pub color: bool,
    pub quiet: bool,
}

/// Dispatch a session-bound command to the appropriate handler.
pub async fn dispatch(cmd: Command, client: &Client, ctx: &Ctx) -> Result<(), CliError> {
    match cmd {
        Command::Config(args) => config_cmd::handle(client, args, ctx).await,
        Command::Event(args) => event::handle(client, args, ctx).await,
        Command::Object(args) => object::handle(client, args, ctx).await,
        // Completions are handled before dispatch
        Command::Completions(_) => Ok(()),
    }
}

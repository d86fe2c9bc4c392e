//! Command dispatch: bridges CLI args -> core operations -> output formatting.

pub mod config_cmd;
pub mod motor;
pub mod readings;
pub mod resources;
pub mod status;
pub mod util;
pub mod watch;

use crate::cli::{Command, GlobalOpts};
use crate::error::CliError;

use self::util::Runtime;

/// Dispatch a robot-bound command to the appropriate handler.
pub async fn dispatch(cmd: Command, rt: &Runtime, global: &GlobalOpts) -> Result<(), CliError> {
    match cmd {
        Command::Status => status::handle(rt, global).await,
        Command::Resources => resources::handle(rt, global).await,
        Command::Readings(args) => readings::handle(rt, args, global).await,
        Command::Watch(args) => watch::handle(rt, args, global).await,
        Command::Motor(args) => motor::handle(rt, args, global).await,
        // Config and Completions are handled before a runtime exists
        Command::Config(_) | Command::Completions(_) => Err(CliError::Validation {
            field: "command".into(),
            reason: "does not need a robot connection".into(),
        }),
    }
}

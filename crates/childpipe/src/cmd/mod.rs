use clap::{Args, Subcommand};

use crate::exit::CliResult;

pub mod emit;
pub mod run;
pub mod version;

#[derive(Subcommand, Debug)]
pub enum Command {
    /// Spawn a command and print each message it publishes as a JSON line.
    Run(RunArgs),
    /// Connect back to a coordinator and publish messages (child side).
    Emit(EmitArgs),
    /// Show version information.
    Version,
}

pub fn run(command: Command) -> CliResult<i32> {
    match command {
        Command::Run(args) => run::run(args),
        Command::Emit(args) => emit::run(args),
        Command::Version => version::run(),
    }
}

#[derive(Args, Debug)]
pub struct RunArgs {
    /// Force-kill the child's process tree if it ignores cancellation.
    #[arg(long)]
    pub force_kill: bool,
    /// How long to wait for a cancelled child before force-killing
    /// (e.g. 5s, 500ms). Without this, the wait is unbounded.
    #[arg(long, value_name = "DURATION")]
    pub kill_timeout: Option<String>,
    /// The command to spawn, with its arguments.
    #[arg(trailing_var_arg = true, required = true)]
    pub command: Vec<String>,
}

#[derive(Args, Debug)]
pub struct EmitArgs {
    /// JSON document to publish; repeatable, sent in order.
    #[arg(long = "message", value_name = "JSON")]
    pub messages: Vec<String>,
    /// Pause between messages (e.g. 100ms).
    #[arg(long, value_name = "DURATION")]
    pub interval: Option<String>,
}

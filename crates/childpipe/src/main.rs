mod cmd;
mod exit;
mod logging;

use clap::Parser;

use crate::cmd::Command;
use crate::logging::{init_logging, LogFormat, LogLevel};

#[derive(Parser, Debug)]
#[command(
    name = "childpipe",
    version,
    about = "Spawn a child process and stream its typed messages"
)]
struct Cli {
    /// Log output format (stderr).
    #[arg(long, value_name = "FORMAT", default_value = "text", global = true)]
    log_format: LogFormat,

    /// Minimum log level (stderr).
    #[arg(long, value_name = "LEVEL", default_value = "info", global = true)]
    log_level: LogLevel,

    #[command(subcommand)]
    command: Command,
}

fn main() {
    let cli = Cli::parse();
    init_logging(cli.log_format, cli.log_level);

    match cmd::run(cli.command) {
        Ok(code) => std::process::exit(code),
        Err(err) => {
            eprintln!("error: {err}");
            std::process::exit(err.code);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_run_subcommand() {
        let cli = Cli::try_parse_from([
            "childpipe",
            "run",
            "--force-kill",
            "--kill-timeout",
            "2s",
            "--",
            "worker",
            "--flag",
        ])
        .expect("run args should parse");

        match cli.command {
            Command::Run(args) => {
                assert!(args.force_kill);
                assert_eq!(args.kill_timeout.as_deref(), Some("2s"));
                assert_eq!(args.command, vec!["worker", "--flag"]);
            }
            other => panic!("unexpected command: {other:?}"),
        }
    }

    #[test]
    fn parses_emit_with_repeated_messages() {
        let cli = Cli::try_parse_from([
            "childpipe",
            "emit",
            "--message",
            "1",
            "--message",
            "2",
        ])
        .expect("emit args should parse");

        match cli.command {
            Command::Emit(args) => assert_eq!(args.messages, vec!["1", "2"]),
            other => panic!("unexpected command: {other:?}"),
        }
    }

    #[test]
    fn run_requires_a_command() {
        let err = Cli::try_parse_from(["childpipe", "run"]).expect_err("missing command");
        assert_eq!(
            err.kind(),
            clap::error::ErrorKind::MissingRequiredArgument
        );
    }
}

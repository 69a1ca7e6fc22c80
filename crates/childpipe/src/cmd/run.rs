use std::process::Command;
use std::time::Duration;

use childpipe_session::{CancelToken, PipeProcess};

use crate::cmd::RunArgs;
use crate::exit::{session_error, CliError, CliResult, INTERNAL, USAGE};

pub fn run(args: RunArgs) -> CliResult<i32> {
    let Some((program, rest)) = args.command.split_first() else {
        return Err(CliError::new(USAGE, "missing command to run"));
    };
    let kill_timeout = args
        .kill_timeout
        .as_deref()
        .map(parse_duration)
        .transpose()?;

    let mut command = Command::new(program);
    command.args(rest);

    let shutdown = CancelToken::new();
    let cancel = CancelToken::new();
    let interrupt_shutdown = shutdown.clone();
    let interrupt_cancel = cancel.clone();
    // Shutdown first so the child's one reason read sees Shutdown; the
    // per-call token then drives the kill timeout.
    ctrlc::set_handler(move || {
        tracing::info!("interrupt received; signalling shutdown");
        interrupt_shutdown.cancel();
        interrupt_cancel.cancel();
    })
    .map_err(|err| CliError::new(INTERNAL, format!("failed to install signal handler: {err}")))?;

    let process = PipeProcess::spawn(command, &shutdown)
        .map_err(|err| session_error("failed to start child", err))?;
    tracing::info!(pid = process.id(), "child started");

    let code = process
        .wait_for_exit(
            |message: serde_json::Value| println!("{message}"),
            &cancel,
            args.force_kill,
            kill_timeout,
        )
        .map_err(|err| session_error("wait failed", err))?;

    Ok(code)
}

pub(crate) fn parse_duration(input: &str) -> CliResult<Duration> {
    let input = input.trim();
    if input.is_empty() {
        return Err(CliError::new(USAGE, "duration must not be empty"));
    }

    let (number, unit) = if let Some(num) = input.strip_suffix("ms") {
        (num, "ms")
    } else if let Some(num) = input.strip_suffix('s') {
        (num, "s")
    } else {
        (input, "s")
    };

    let value: u64 = number
        .parse()
        .map_err(|_| CliError::new(USAGE, format!("invalid duration value: {input}")))?;
    if value == 0 {
        return Err(CliError::new(USAGE, "duration must be greater than zero"));
    }

    match unit {
        "ms" => Ok(Duration::from_millis(value)),
        _ => Ok(Duration::from_secs(value)),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parse_duration_seconds_and_millis() {
        assert_eq!(parse_duration("5s").unwrap(), Duration::from_secs(5));
        assert_eq!(parse_duration("250ms").unwrap(), Duration::from_millis(250));
        assert_eq!(parse_duration("3").unwrap(), Duration::from_secs(3));
    }

    #[test]
    fn parse_duration_rejects_zero_and_garbage() {
        assert!(parse_duration("0s").is_err());
        assert!(parse_duration("").is_err());
        assert!(parse_duration("soon").is_err());
    }

    #[test]
    fn empty_command_is_usage_error() {
        let err = run(RunArgs {
            force_kill: false,
            kill_timeout: None,
            command: Vec::new(),
        })
        .unwrap_err();
        assert_eq!(err.code, USAGE);
    }
}

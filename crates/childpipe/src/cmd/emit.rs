use std::io::BufRead;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use childpipe_session::ChildChannel;

use crate::cmd::run::parse_duration;
use crate::cmd::EmitArgs;
use crate::exit::{session_error, CliError, CliResult, SUCCESS, USAGE};

pub fn run(args: EmitArgs) -> CliResult<i32> {
    let interval = args.interval.as_deref().map(parse_duration).transpose()?;
    let messages = collect_messages(&args)?;

    let channel = match ChildChannel::try_connect()
        .map_err(|err| session_error("failed to connect to coordinator", err))?
    {
        Some(channel) => channel,
        None => {
            tracing::info!("no coordinator in environment; nothing to emit");
            return Ok(SUCCESS);
        }
    };

    let cancelled = Arc::new(AtomicBool::new(false));
    let flag = Arc::clone(&cancelled);
    channel.register_exit_callback(move |reason| {
        tracing::info!(%reason, "coordinator requested exit");
        flag.store(true, Ordering::SeqCst);
    });

    for message in messages {
        if cancelled.load(Ordering::SeqCst) {
            tracing::debug!("stopping early on coordinator request");
            break;
        }
        channel
            .send(&message)
            .map_err(|err| session_error("send failed", err))?;
        if let Some(pause) = interval {
            std::thread::sleep(pause);
        }
    }

    Ok(SUCCESS)
}

/// Messages from `--message` flags, or JSON lines from stdin when none given.
fn collect_messages(args: &EmitArgs) -> CliResult<Vec<serde_json::Value>> {
    if !args.messages.is_empty() {
        return args.messages.iter().map(|raw| parse_json(raw)).collect();
    }

    let stdin = std::io::stdin();
    let mut messages = Vec::new();
    for line in stdin.lock().lines() {
        let line = line.map_err(|err| crate::exit::io_error("failed reading stdin", err))?;
        if line.trim().is_empty() {
            continue;
        }
        messages.push(parse_json(&line)?);
    }
    Ok(messages)
}

fn parse_json(raw: &str) -> CliResult<serde_json::Value> {
    serde_json::from_str(raw)
        .map_err(|err| CliError::new(USAGE, format!("--message is not valid JSON: {err}")))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn flag_messages_parse_in_order() {
        let args = EmitArgs {
            messages: vec!["1".to_string(), "{\"a\":2}".to_string()],
            interval: None,
        };
        let messages = collect_messages(&args).unwrap();
        assert_eq!(messages.len(), 2);
        assert_eq!(messages[0], serde_json::json!(1));
        assert_eq!(messages[1], serde_json::json!({"a": 2}));
    }

    #[test]
    fn invalid_json_is_usage_error() {
        let args = EmitArgs {
            messages: vec!["{not json".to_string()],
            interval: None,
        };
        let err = collect_messages(&args).unwrap_err();
        assert_eq!(err.code, USAGE);
    }
}

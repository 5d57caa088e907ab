//! ---
//! sw_section: "05-networking-external-interfaces"
//! sw_subsection: "binary"
//! sw_type: "source"
//! sw_scope: "code"
//! sw_description: "Interactive terminal stopwatch backed by the record API."
//! sw_version: "v0.0.0-prealpha"
//! sw_owner: "tbd"
//! ---
use std::io::Write;
use std::sync::Arc;
use std::time::Duration;

use anyhow::Result;
use clap::Args;
use splitwatch_client::ApiClient;
use splitwatch_common::{format_duration, SystemClock};
use splitwatch_store::SharedStore;
use splitwatch_timer::{StopwatchSession, TimerEngine};
use tokio::io::{AsyncBufReadExt, BufReader};
use tracing::debug;

#[derive(Debug, Args)]
pub struct RunOptions {
    /// Owner recorded on saved sessions.
    #[arg(long)]
    pub user: Option<i64>,
    /// Display refresh period in milliseconds.
    #[arg(long, default_value_t = 10)]
    pub tick_ms: u64,
}

#[derive(Debug, Clone, PartialEq, Eq)]
enum SessionCommand {
    Start,
    Stop,
    Reset,
    Save(Option<String>),
    Help,
    Quit,
}

fn parse_command(line: &str) -> Option<SessionCommand> {
    let line = line.trim();
    let (verb, rest) = match line.split_once(char::is_whitespace) {
        Some((verb, rest)) => (verb, rest.trim()),
        None => (line, ""),
    };
    let command = match verb.to_ascii_lowercase().as_str() {
        "start" | "s" => SessionCommand::Start,
        "stop" | "p" => SessionCommand::Stop,
        "reset" | "r" => SessionCommand::Reset,
        "save" | "w" => {
            SessionCommand::Save((!rest.is_empty()).then(|| rest.to_owned()))
        }
        "help" | "?" => SessionCommand::Help,
        "quit" | "exit" | "q" => SessionCommand::Quit,
        _ => return None,
    };
    Some(command)
}

const HELP: &str = "commands: start | stop | reset | save [title] | help | quit";

pub async fn run(client: ApiClient, options: RunOptions) -> Result<()> {
    let engine = TimerEngine::new(
        SystemClock::shared(),
        Duration::from_millis(options.tick_ms),
        |elapsed_ms: u64| {
            let mut out = std::io::stdout().lock();
            let _ = write!(out, "\r{}", format_duration(elapsed_ms, true));
            let _ = out.flush();
        },
    )?;
    let store: SharedStore = Arc::new(client);
    let mut session = StopwatchSession::new(engine, store);
    if let Some(user) = options.user {
        session = session.with_user(user);
    }

    println!("{HELP}");
    let mut lines = BufReader::new(tokio::io::stdin()).lines();
    while let Some(line) = lines.next_line().await? {
        let Some(command) = parse_command(&line) else {
            if !line.trim().is_empty() {
                println!("unknown command; {HELP}");
            }
            continue;
        };
        debug!(?command, "session command");
        let engine = session.engine();
        match command {
            SessionCommand::Start => {
                if !engine.start() {
                    println!("already running");
                }
            }
            SessionCommand::Stop => {
                if !engine.stop() {
                    println!("not running");
                }
            }
            SessionCommand::Reset => {
                if !engine.reset() {
                    println!("reset is only available once stopped");
                }
            }
            SessionCommand::Save(title) => match session.save(title.as_deref()).await {
                Ok(record) => println!(
                    "\nsaved record #{} ({})",
                    record.id,
                    format_duration(record.duration_ms, true)
                ),
                Err(err) => println!("\nsave failed: {err}"),
            },
            SessionCommand::Help => println!("{HELP}"),
            SessionCommand::Quit => break,
        }
    }
    session.engine().shutdown();
    println!();
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_verbs_and_aliases() {
        assert_eq!(parse_command("start"), Some(SessionCommand::Start));
        assert_eq!(parse_command("  P "), Some(SessionCommand::Stop));
        assert_eq!(parse_command("reset"), Some(SessionCommand::Reset));
        assert_eq!(parse_command("q"), Some(SessionCommand::Quit));
        assert_eq!(parse_command("dance"), None);
        assert_eq!(parse_command(""), None);
    }

    #[test]
    fn save_keeps_title_text() {
        assert_eq!(parse_command("save"), Some(SessionCommand::Save(None)));
        assert_eq!(
            parse_command("save  Lap two "),
            Some(SessionCommand::Save(Some("Lap two".to_owned())))
        );
    }
}

use crate::core::tracker::Tracker;
use crate::core::{DispatchOutcome, Transport};
use crate::utils::error::{Result, TrackerError};
use tokio::io::{AsyncBufRead, AsyncBufReadExt, AsyncWrite, AsyncWriteExt};

pub const STARTUP_EVENT: &str = "ConsoleStarted";

const HELP: &str = "\
Commands:
  track <name>             track an event
  props <name> <value>     track an event with a property value
  endpoint <url>           change the collector endpoint
  session                  start a new session identifier
  whoami                   show the current session identifier
  forget <identifier>      forget everything tracked under an identifier
  stop | resume            pause or resume tracking
  reset                    drop all buffered events
  flush                    dispatch buffered events now
  status                   show tracker state
  quit                     exit";

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Command {
    Track { name: String },
    TrackWithProperties { name: String, value: String },
    SetEndpoint { url: String },
    NewSession,
    WhoAmI,
    Forget { identifier: String },
    Stop,
    Resume,
    Reset,
    Flush,
    Status,
    Help,
    Quit,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Reply {
    Text(String),
    Quit,
}

/// Splits off the first word; the rest starts after exactly one separator.
fn split_word(input: &str) -> (&str, &str) {
    match input.find(char::is_whitespace) {
        Some(idx) => {
            let sep_len = input[idx..].chars().next().map_or(1, char::len_utf8);
            (&input[..idx], &input[idx + sep_len..])
        }
        None => (input, ""),
    }
}

fn command_error(message: impl Into<String>) -> TrackerError {
    TrackerError::CommandError {
        message: message.into(),
    }
}

fn required_argument(command: &str, what: &str, value: &str) -> Result<String> {
    let value = value.trim();
    if value.is_empty() {
        return Err(command_error(format!("'{}' needs {}", command, what)));
    }
    Ok(value.to_string())
}

fn no_arguments(command: &str, rest: &str, parsed: Command) -> Result<Command> {
    if !rest.trim().is_empty() {
        return Err(command_error(format!("'{}' takes no arguments", command)));
    }
    Ok(parsed)
}

impl Command {
    /// Blank lines and `#` comments parse to `None`.
    pub fn parse(line: &str) -> Result<Option<Command>> {
        let line = line.trim_start().trim_end_matches(['\r', '\n']);
        if line.trim().is_empty() || line.starts_with('#') {
            return Ok(None);
        }

        let (keyword, rest) = split_word(line);
        let keyword = keyword.to_ascii_lowercase();
        let command = match keyword.as_str() {
            "track" => Command::Track {
                name: required_argument("track", "an event name", rest)?,
            },
            "props" => {
                let (name, value) = split_word(rest.trim_start());
                Command::TrackWithProperties {
                    name: required_argument("props", "an event name", name)?,
                    // 屬性值原樣傳遞
                    value: value.to_string(),
                }
            }
            "endpoint" => Command::SetEndpoint {
                url: required_argument("endpoint", "a URL", rest)?,
            },
            "session" => no_arguments(&keyword, rest, Command::NewSession)?,
            "whoami" => no_arguments(&keyword, rest, Command::WhoAmI)?,
            "forget" => Command::Forget {
                identifier: required_argument("forget", "an identifier", rest)?,
            },
            "stop" => no_arguments(&keyword, rest, Command::Stop)?,
            "resume" => no_arguments(&keyword, rest, Command::Resume)?,
            "reset" => no_arguments(&keyword, rest, Command::Reset)?,
            "flush" => no_arguments(&keyword, rest, Command::Flush)?,
            "status" => no_arguments(&keyword, rest, Command::Status)?,
            "help" | "?" => no_arguments(&keyword, rest, Command::Help)?,
            "quit" | "exit" => no_arguments(&keyword, rest, Command::Quit)?,
            other => return Err(command_error(format!("unknown command '{}'", other))),
        };

        Ok(Some(command))
    }
}

fn describe(outcome: &DispatchOutcome) -> String {
    match outcome {
        DispatchOutcome::Stopped => "tracking is stopped".to_string(),
        DispatchOutcome::Idle => "nothing to send".to_string(),
        DispatchOutcome::AwaitingCallback => "previous dispatch still in flight".to_string(),
        DispatchOutcome::RetryLimitReached { retries } => {
            format!("gave up after {} failed attempts; tracking stopped", retries)
        }
        DispatchOutcome::Sent { number, events } => {
            format!("sent batch #{} with {} events", number, events)
        }
        DispatchOutcome::Failed { retries } => {
            format!("dispatch failed ({} in a row), will retry", retries)
        }
    }
}

/// Line-oriented front-end that drives a [`Tracker`].
pub struct Console<T: Transport> {
    tracker: Tracker<T>,
}

impl<T: Transport> Console<T> {
    pub fn new(tracker: Tracker<T>) -> Self {
        Self { tracker }
    }

    pub fn tracker(&self) -> &Tracker<T> {
        &self.tracker
    }

    pub async fn execute(&self, command: Command) -> Result<Reply> {
        let tracker = &self.tracker;
        let text = match command {
            Command::Track { name } => {
                tracker.track(&name);
                format!("tracked '{}'", name)
            }
            Command::TrackWithProperties { name, value } => {
                tracker.track_with_properties(&name, &value);
                format!("tracked '{}' with value '{}'", name, value)
            }
            Command::SetEndpoint { url } => {
                tracker.set_endpoint(&url)?;
                format!("endpoint set to {}", url)
            }
            Command::NewSession => {
                tracker.set_session_identifier();
                format!("session: {}", tracker.session_identifier())
            }
            Command::WhoAmI => format!("session: {}", tracker.session_identifier()),
            Command::Forget { identifier } => {
                tracker.forget_by_identifier(&identifier).await?;
                format!("forgot '{}'", identifier)
            }
            Command::Stop => {
                tracker.stop();
                "tracking stopped".to_string()
            }
            Command::Resume => {
                tracker.resume();
                "tracking resumed".to_string()
            }
            Command::Reset => {
                tracker.reset();
                "buffers cleared".to_string()
            }
            Command::Flush => describe(&tracker.flush().await?),
            Command::Status => format!(
                "tracking: {}, endpoint: {}, session: {}, buffered: {}, retries: {}",
                tracker.is_tracking(),
                tracker.endpoint(),
                tracker.session_identifier(),
                tracker.buffered_events(),
                tracker.retries()
            ),
            Command::Help => HELP.to_string(),
            Command::Quit => return Ok(Reply::Quit),
        };
        Ok(Reply::Text(text))
    }

    /// Reads commands until EOF or `quit`. Command errors are reported and do not end the loop.
    pub async fn run<R, W>(&self, reader: R, mut writer: W) -> Result<()>
    where
        R: AsyncBufRead + Unpin,
        W: AsyncWrite + Unpin,
    {
        self.tracker.track(STARTUP_EVENT);

        let mut lines = reader.lines();
        while let Some(line) = lines.next_line().await? {
            let reply = match Command::parse(&line) {
                Ok(None) => continue,
                Ok(Some(command)) => self.execute(command).await,
                Err(e) => Err(e),
            };

            let output = match reply {
                Ok(Reply::Quit) => break,
                Ok(Reply::Text(text)) => format!("{}\n", text),
                Err(e) => {
                    tracing::debug!("Command failed: {}", e);
                    format!("❌ {}\n💡 {}\n", e, e.recovery_suggestion())
                }
            };
            writer.write_all(output.as_bytes()).await?;
            writer.flush().await?;
        }

        Ok(())
    }
}

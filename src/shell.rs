//! Line-oriented command shell
//!
//! Parses one command per line and runs it against the runtime. Timer ids may
//! be abbreviated to any unique prefix.

use std::fmt::Write as _;
use std::str::FromStr;

use tokio::io::{AsyncBufRead, AsyncBufReadExt};
use tracing::{error, warn};

use crate::bulk::{BulkAction, BulkController};
use crate::error::{Result, TimerError};
use crate::runtime::{TimerEvent, TimerRuntime};
use crate::timer::{parse_duration, TimerId};

/// Characters of an id shown in listings
const SHORT_ID_LEN: usize = 8;

pub const HELP: &str = "\
Commands:
  add <seconds> <category> <name...>   create a paused timer
  start|pause|reset|delete <id>        control one timer (id prefix is enough)
  alert <id>                           toggle the halfway alert
  start-all|pause-all|reset-all <cat>  control every timer in a category
  list                                 show timers grouped by category
  history                              show completed timers
  reload                               re-read the saved timer list
  help                                 show this help
  quit                                 stop all timers and exit";

/// Single-timer commands
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TimerAction {
    Start,
    Pause,
    Reset,
    Delete,
    ToggleAlert,
}

/// A parsed shell command
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Command {
    Add {
        duration: u64,
        category: String,
        name: String,
    },
    Timer {
        action: TimerAction,
        id: String,
    },
    Bulk {
        action: BulkAction,
        category: String,
    },
    List,
    History,
    Reload,
    Help,
    Quit,
}

impl FromStr for Command {
    type Err = TimerError;

    fn from_str(line: &str) -> Result<Self> {
        let line = line.trim();
        let (verb, rest) = match line.split_once(char::is_whitespace) {
            Some((verb, rest)) => (verb, rest.trim()),
            None => (line, ""),
        };

        let timer = |action: TimerAction| {
            if rest.is_empty() {
                return Err(usage(&format!("{} <id>", verb)));
            }
            Ok(Command::Timer {
                action,
                id: rest.to_string(),
            })
        };
        let bulk = |action: BulkAction| {
            if rest.is_empty() {
                return Err(usage(&format!("{} <category>", verb)));
            }
            Ok(Command::Bulk {
                action,
                category: rest.to_string(),
            })
        };

        match verb.to_ascii_lowercase().as_str() {
            "add" => {
                let mut parts = rest.splitn(3, char::is_whitespace);
                let (Some(secs), Some(category), Some(name)) =
                    (parts.next(), parts.next(), parts.next())
                else {
                    return Err(usage("add <seconds> <category> <name...>"));
                };
                Ok(Command::Add {
                    duration: parse_duration(secs)?,
                    category: category.to_string(),
                    name: name.trim().to_string(),
                })
            }
            "start" => timer(TimerAction::Start),
            "pause" => timer(TimerAction::Pause),
            "reset" => timer(TimerAction::Reset),
            "delete" | "rm" => timer(TimerAction::Delete),
            "alert" => timer(TimerAction::ToggleAlert),
            "start-all" => bulk(BulkAction::Start),
            "pause-all" => bulk(BulkAction::Pause),
            "reset-all" => bulk(BulkAction::Reset),
            "list" | "ls" => Ok(Command::List),
            "history" => Ok(Command::History),
            "reload" => Ok(Command::Reload),
            "help" | "?" => Ok(Command::Help),
            "quit" | "exit" => Ok(Command::Quit),
            "" => Err(TimerError::Validation("empty command".to_string())),
            other => Err(TimerError::Validation(format!(
                "unknown command '{}', try 'help'",
                other
            ))),
        }
    }
}

fn usage(text: &str) -> TimerError {
    TimerError::Validation(format!("usage: {}", text))
}

/// Executes commands against a runtime
#[derive(Debug, Clone)]
pub struct Shell {
    runtime: TimerRuntime,
    bulk: BulkController,
}

impl Shell {
    pub fn new(runtime: TimerRuntime) -> Self {
        Self {
            bulk: BulkController::new(runtime.clone()),
            runtime,
        }
    }

    /// Run a command and render its result
    pub fn execute(&self, command: &Command) -> Result<String> {
        match command {
            Command::Add {
                duration,
                category,
                name,
            } => {
                let timer = self.runtime.create(name, category, *duration)?;
                Ok(format!(
                    "Added \"{}\" to {} ({})",
                    timer.name,
                    timer.category,
                    short_id(&timer.id)
                ))
            }
            Command::Timer { action, id } => self.timer_command(*action, id),
            Command::Bulk { action, category } => self.bulk_command(*action, category),
            Command::List => Ok(self.render_list()),
            Command::History => Ok(self.render_history()),
            Command::Reload => {
                let count = self.runtime.reload()?;
                Ok(format!("Reloaded {} timer(s)", count))
            }
            Command::Help => Ok(HELP.to_string()),
            Command::Quit => {
                self.runtime.shutdown();
                Ok("Bye".to_string())
            }
        }
    }

    /// Read and execute commands until `quit`, end of input or a read error
    ///
    /// Always leaves the runtime shut down with a final snapshot written.
    pub async fn run<R: AsyncBufRead + Unpin>(&self, input: R) {
        let mut lines = input.lines();
        loop {
            let line = match lines.next_line().await {
                Ok(Some(line)) => line,
                Ok(None) => break,
                Err(e) => {
                    error!("Failed to read command: {}", e);
                    break;
                }
            };
            if line.trim().is_empty() {
                continue;
            }

            let command = match line.parse::<Command>() {
                Ok(command) => command,
                Err(e) => {
                    println!("{}", e);
                    continue;
                }
            };
            match self.execute(&command) {
                Ok(output) => println!("{}", output),
                Err(e) if e.is_blocking() => eprintln!("{}", e),
                Err(e) => {
                    warn!("Command failed: {}", e);
                    println!("{}", e);
                }
            }
            if command == Command::Quit {
                return;
            }
        }

        self.runtime.shutdown();
    }

    fn timer_command(&self, action: TimerAction, prefix: &str) -> Result<String> {
        let id = self.resolve(prefix)?;
        let message = match action {
            TimerAction::Start => {
                if self.runtime.start(&id)? {
                    "Started"
                } else {
                    "Already running or completed"
                }
            }
            TimerAction::Pause => {
                if self.runtime.pause(&id)? {
                    "Paused"
                } else {
                    "Not running"
                }
            }
            TimerAction::Reset => {
                self.runtime.reset(&id)?;
                "Reset"
            }
            TimerAction::Delete => {
                self.runtime.delete(&id)?;
                "Deleted"
            }
            TimerAction::ToggleAlert => {
                if self.runtime.toggle_halfway_alert(&id)? {
                    "Halfway alert on"
                } else {
                    "Halfway alert off"
                }
            }
        };
        Ok(format!("{} ({})", message, short_id(&id)))
    }

    fn bulk_command(&self, action: BulkAction, category: &str) -> Result<String> {
        let known = !self.runtime.timers_in_category(category).is_empty();
        if known && action == BulkAction::Pause && !self.bulk.category_has_running(category) {
            return Ok(format!("Nothing running in {}", category));
        }
        let outcome = self.bulk.apply_to_category(category, action)?;
        let mut out = format!(
            "{}: {} applied, {} skipped",
            category,
            outcome.applied.len(),
            outcome.skipped.len()
        );
        for (id, err) in &outcome.failed {
            let _ = write!(out, "\n  {} failed: {}", short_id(id), err);
        }
        Ok(out)
    }

    /// Resolve a unique id prefix
    fn resolve(&self, prefix: &str) -> Result<TimerId> {
        let mut matches = self.runtime.ids_with_prefix(prefix);
        match matches.len() {
            0 => Err(TimerError::NotFound(TimerId::from(prefix))),
            1 => Ok(matches.remove(0)),
            n => Err(TimerError::Validation(format!(
                "'{}' matches {} timers, use a longer prefix",
                prefix, n
            ))),
        }
    }

    fn render_list(&self) -> String {
        let groups = self.runtime.list_by_category();
        if groups.is_empty() {
            return "No timers added yet.".to_string();
        }

        let mut out = String::new();
        for group in groups {
            let marker = if group.has_running() { " *" } else { "" };
            let _ = writeln!(out, "{}{}", group.category, marker);
            for timer in &group.timers {
                let alert = if timer.halfway_alert_enabled { " [half]" } else { "" };
                let _ = writeln!(
                    out,
                    "  {:<8}  {:<20} {:<9} {:>13} {:>3.0}%{}",
                    short_id(&timer.id),
                    timer.name,
                    timer.status.as_str(),
                    timer.format_progress(),
                    timer.progress_percent(),
                    alert
                );
            }
        }
        out.trim_end().to_string()
    }

    fn render_history(&self) -> String {
        let log = self.runtime.completion_log();
        if log.is_empty() {
            return "No completed timers yet.".to_string();
        }
        log.iter()
            .map(|e| format!("{}  {}", e.completion_time, e.name))
            .collect::<Vec<_>>()
            .join("\n")
    }
}

/// Human-facing line for an event, `None` for plain ticks
pub fn render_event(event: &TimerEvent) -> Option<String> {
    match event {
        TimerEvent::Ticked { .. } => None,
        TimerEvent::Halfway { name, .. } => Some(format!("Halfway alert for timer \"{}\"", name)),
        TimerEvent::Completed { entry, .. } => {
            Some(format!("Timer \"{}\" has completed.", entry.name))
        }
    }
}

fn short_id(id: &TimerId) -> &str {
    let s = id.as_str();
    match s.char_indices().nth(SHORT_ID_LEN) {
        Some((end, _)) => &s[..end],
        None => s,
    }
}

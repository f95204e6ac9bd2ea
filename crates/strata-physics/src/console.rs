//! Console commands
//!
//! Text commands that change physics state at runtime. Currently only
//! `noclip`, which toggles or sets the player's free-flight flag.

use std::fmt;
use std::str::FromStr;

use thiserror::Error;

use crate::body::Player;

/// Errors produced while parsing a console line
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum ConsoleError {
    #[error("Empty command")]
    Empty,

    #[error("Unknown command: {0}")]
    UnknownCommand(String),

    #[error("Invalid argument for {command}: {argument}")]
    InvalidArgument {
        command: &'static str,
        argument: String,
    },

    #[error("Too many arguments for {0}")]
    TooManyArguments(&'static str),
}

/// A parsed console command
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ConsoleCommand {
    /// `noclip [on|off]`; no argument toggles
    NoClip(Option<bool>),
}

impl ConsoleCommand {
    pub fn parse(line: &str) -> Result<Self, ConsoleError> {
        let mut words = line.split_whitespace();
        let name = words.next().ok_or(ConsoleError::Empty)?;

        match name.to_ascii_lowercase().as_str() {
            "noclip" => {
                let setting = match words.next() {
                    None => None,
                    Some(argument) => Some(parse_switch("noclip", argument)?),
                };
                if words.next().is_some() {
                    return Err(ConsoleError::TooManyArguments("noclip"));
                }
                Ok(ConsoleCommand::NoClip(setting))
            }
            _ => Err(ConsoleError::UnknownCommand(name.to_string())),
        }
    }

    /// Apply the command to a player and describe the result
    pub fn apply(self, player: &mut Player) -> String {
        match self {
            ConsoleCommand::NoClip(setting) => {
                player.no_clip = setting.unwrap_or(!player.no_clip);
                log::info!("noclip {}", on_off(player.no_clip));
                format!("noclip {}", on_off(player.no_clip))
            }
        }
    }
}

impl FromStr for ConsoleCommand {
    type Err = ConsoleError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::parse(s)
    }
}

impl fmt::Display for ConsoleCommand {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ConsoleCommand::NoClip(None) => write!(f, "noclip"),
            ConsoleCommand::NoClip(Some(on)) => write!(f, "noclip {}", on_off(*on)),
        }
    }
}

fn parse_switch(command: &'static str, argument: &str) -> Result<bool, ConsoleError> {
    match argument.to_ascii_lowercase().as_str() {
        "on" | "1" | "true" => Ok(true),
        "off" | "0" | "false" => Ok(false),
        _ => Err(ConsoleError::InvalidArgument {
            command,
            argument: argument.to_string(),
        }),
    }
}

fn on_off(on: bool) -> &'static str {
    if on { "on" } else { "off" }
}

//! Typed commands, parsed once from raw query parameters.

use std::collections::HashMap;

use crate::error::ListcastError;

/// A request to read or change one channel's list.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Command {
    /// Broadcast the current list. `me` is passed through untouched.
    Init { me: Option<String> },
    Insert { id: String, contents: String },
    Delete { id: String },
    Toggle { id: String, checked: bool },
    ToggleAll { checked: bool },
    UpdateContents { id: String, contents: String },
    ClearCompleted,
    UpdatePositions { ordered_ids: Vec<String> },
}

impl Command {
    /// Commands that leave the stored list as it is.
    pub fn is_read_only(&self) -> bool {
        matches!(self, Command::Init { .. })
    }

    pub fn kind(&self) -> CommandKind {
        match self {
            Command::Init { .. } => CommandKind::Init,
            Command::Insert { .. } => CommandKind::Insert,
            Command::Delete { .. } => CommandKind::Delete,
            Command::Toggle { .. } => CommandKind::Toggle,
            Command::ToggleAll { .. } => CommandKind::ToggleAll,
            Command::UpdateContents { .. } => CommandKind::UpdateContents,
            Command::ClearCompleted => CommandKind::ClearCompleted,
            Command::UpdatePositions { .. } => CommandKind::UpdatePositions,
        }
    }
}

/// The HTTP-facing name of each command.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum CommandKind {
    Init,
    Insert,
    Delete,
    Toggle,
    ToggleAll,
    UpdateContents,
    ClearCompleted,
    UpdatePositions,
}

impl CommandKind {
    pub const ALL: [CommandKind; 8] = [
        CommandKind::Init,
        CommandKind::Delete,
        CommandKind::Insert,
        CommandKind::Toggle,
        CommandKind::UpdateContents,
        CommandKind::ToggleAll,
        CommandKind::ClearCompleted,
        CommandKind::UpdatePositions,
    ];

    pub fn path(&self) -> &'static str {
        match self {
            CommandKind::Init => "/init",
            CommandKind::Insert => "/insert",
            CommandKind::Delete => "/delete",
            CommandKind::Toggle => "/toggle",
            CommandKind::ToggleAll => "/toggle-all",
            CommandKind::UpdateContents => "/update-contents",
            CommandKind::ClearCompleted => "/clear-completed",
            CommandKind::UpdatePositions => "/update-positions",
        }
    }

    /// Build the typed command from query parameters.
    pub fn parse(&self, params: &QueryParams<'_>) -> Result<Command, ListcastError> {
        let command = match self {
            CommandKind::Init => Command::Init {
                me: params.optional("me").map(str::to_string),
            },
            CommandKind::Insert => Command::Insert {
                id: params.required("id")?.to_string(),
                contents: params.required("contents")?.to_string(),
            },
            CommandKind::Delete => Command::Delete {
                id: params.required("id")?.to_string(),
            },
            CommandKind::Toggle => Command::Toggle {
                id: params.required("id")?.to_string(),
                checked: params.boolean("checked")?,
            },
            CommandKind::ToggleAll => Command::ToggleAll {
                checked: params.boolean("checked")?,
            },
            CommandKind::UpdateContents => Command::UpdateContents {
                id: params.required("id")?.to_string(),
                contents: params.required("contents")?.to_string(),
            },
            CommandKind::ClearCompleted => Command::ClearCompleted,
            CommandKind::UpdatePositions => Command::UpdatePositions {
                ordered_ids: params.id_array("positions")?,
            },
        };
        Ok(command)
    }
}

/// Borrowed view over decoded query parameters.
#[derive(Debug, Clone, Copy)]
pub struct QueryParams<'a> {
    raw: &'a HashMap<String, String>,
}

impl<'a> QueryParams<'a> {
    pub fn new(raw: &'a HashMap<String, String>) -> Self {
        Self { raw }
    }

    pub fn optional(&self, name: &str) -> Option<&'a str> {
        self.raw.get(name).map(String::as_str)
    }

    pub fn required(&self, name: &'static str) -> Result<&'a str, ListcastError> {
        self.optional(name)
            .ok_or_else(|| ListcastError::malformed(name, "missing"))
    }

    /// The channel every command is addressed to. Must be non-empty.
    pub fn channel(&self) -> Result<&'a str, ListcastError> {
        match self.required("channel")? {
            "" => Err(ListcastError::malformed("channel", "empty")),
            channel => Ok(channel),
        }
    }

    /// A literal JSON boolean: `true` or `false`.
    pub fn boolean(&self, name: &'static str) -> Result<bool, ListcastError> {
        let raw = self.required(name)?;
        serde_json::from_str::<bool>(raw)
            .map_err(|_| ListcastError::malformed(name, format!("expected true or false, got `{raw}`")))
    }

    /// A JSON array of string ids.
    pub fn id_array(&self, name: &'static str) -> Result<Vec<String>, ListcastError> {
        let raw = self.required(name)?;
        serde_json::from_str::<Vec<String>>(raw)
            .map_err(|err| ListcastError::malformed(name, format!("expected a JSON array of ids: {err}")))
    }
}

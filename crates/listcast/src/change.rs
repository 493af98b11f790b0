use serde::Serialize;

use crate::item::List;

/// What a command did, in the smallest form a subscriber can replay.
///
/// Serializes to the event payload; [`Change::event_name`] gives the event.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(untagged)]
pub enum Change {
    Init {
        list: List,
        #[serde(skip_serializing_if = "Option::is_none")]
        me: Option<String>,
    },
    Insert {
        id: String,
        contents: String,
    },
    Delete {
        id: String,
    },
    Toggle {
        id: String,
        checked: bool,
    },
    UpdateContents {
        id: String,
        contents: String,
    },
    ToggleAll {
        checked: bool,
    },
    ClearCompleted {},
    UpdatedPositions {
        list: List,
    },
}

impl Change {
    pub fn event_name(&self) -> &'static str {
        match self {
            Change::Init { .. } => "init",
            Change::Insert { .. } => "insert",
            Change::Delete { .. } => "delete",
            Change::Toggle { .. } => "toggle",
            Change::UpdateContents { .. } => "update-contents",
            Change::ToggleAll { .. } => "toggle-all",
            Change::ClearCompleted {} => "clear-completed",
            Change::UpdatedPositions { .. } => "updated-positions",
        }
    }

    pub fn payload(&self) -> serde_json::Result<serde_json::Value> {
        serde_json::to_value(self)
    }
}

//! Pure list mutations.
//!
//! The engine does no IO and holds no state. Every command either succeeds,
//! leaving positions dense (`0..n-1`), or fails leaving the list untouched.

use std::collections::HashMap;

use crate::change::Change;
use crate::command::Command;
use crate::error::ListcastError;
use crate::item::{Item, List};

/// Applies [`Command`]s to a [`List`].
#[derive(Debug, Clone, Copy, Default)]
pub struct MutationEngine;

impl MutationEngine {
    pub fn new() -> Self {
        Self
    }

    /// Apply `command` to `list` in place and describe what changed.
    pub fn apply(&self, list: &mut List, command: &Command) -> Result<Change, ListcastError> {
        match command {
            Command::Init { me } => Ok(Change::Init {
                list: list.clone(),
                me: me.clone(),
            }),
            Command::Insert { id, contents } => {
                let position = list.len() as u64;
                list.items_mut()
                    .push(Item::new(id.clone(), contents.clone(), position));
                Ok(Change::Insert {
                    id: id.clone(),
                    contents: contents.clone(),
                })
            }
            Command::Delete { id } => {
                let items = list.items_mut();
                if let Some(index) = items.iter().position(|item| item.id == *id) {
                    items.remove(index);
                }
                list.reindex();
                Ok(Change::Delete { id: id.clone() })
            }
            Command::Toggle { id, checked } => {
                target(list, id)?.checked = *checked;
                Ok(Change::Toggle {
                    id: id.clone(),
                    checked: *checked,
                })
            }
            Command::ToggleAll { checked } => {
                for item in list.items_mut() {
                    item.checked = *checked;
                }
                Ok(Change::ToggleAll { checked: *checked })
            }
            Command::UpdateContents { id, contents } => {
                target(list, id)?.contents = contents.clone();
                Ok(Change::UpdateContents {
                    id: id.clone(),
                    contents: contents.clone(),
                })
            }
            Command::ClearCompleted => {
                list.items_mut().retain(|item| !item.checked);
                list.reindex();
                Ok(Change::ClearCompleted {})
            }
            Command::UpdatePositions { ordered_ids } => {
                reorder(list, ordered_ids);
                Ok(Change::UpdatedPositions { list: list.clone() })
            }
        }
    }
}

fn target<'l>(list: &'l mut List, id: &str) -> Result<&'l mut Item, ListcastError> {
    list.find_mut(id)
        .ok_or_else(|| ListcastError::NotFound { id: id.to_string() })
}

/// Stable sort by rank in `ordered_ids`; ids not named there sink to the end.
fn reorder(list: &mut List, ordered_ids: &[String]) {
    let mut rank: HashMap<&str, usize> = HashMap::with_capacity(ordered_ids.len());
    for (index, id) in ordered_ids.iter().enumerate() {
        rank.entry(id.as_str()).or_insert(index);
    }

    list.items_mut()
        .sort_by_key(|item| rank.get(item.id.as_str()).copied().unwrap_or(usize::MAX));
    list.reindex();
}

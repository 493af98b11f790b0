//! Checklist items and the list they live in.

use serde::{Deserialize, Deserializer, Serialize, Serializer};
use serde_json::Value;

/// One entry of a checklist.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Item {
    pub id: String,
    pub contents: String,
    pub checked: bool,
    /// Display rank. Dense `0..n-1` across the list once a command completes.
    pub position: u64,
}

impl Item {
    pub fn new(id: impl Into<String>, contents: impl Into<String>, position: u64) -> Self {
        Self {
            id: id.into(),
            contents: contents.into(),
            checked: false,
            position,
        }
    }
}

/// Item as it may appear in storage.
///
/// Older records were written without `checked` or `position`, an item
/// inserted without contents or id had none either, and `checked` could be
/// any JSON value.
#[derive(Debug, Deserialize)]
pub struct StoredItem {
    #[serde(default)]
    id: String,
    #[serde(default)]
    contents: String,
    #[serde(default, deserialize_with = "truthy")]
    checked: bool,
    #[serde(default)]
    position: Option<u64>,
}

/// The ordered items of one channel.
///
/// Encodes as a bare JSON array. Decoding repairs legacy positions: a missing
/// one becomes the array index, and a list whose positions are not exactly
/// `0..n-1` is stably sorted by stored position and renumbered.
#[derive(Debug, Clone, Default, PartialEq, Eq, Deserialize)]
#[serde(from = "Vec<StoredItem>")]
pub struct List {
    items: Vec<Item>,
}

impl From<Vec<StoredItem>> for List {
    fn from(stored: Vec<StoredItem>) -> Self {
        let items = stored
            .into_iter()
            .enumerate()
            .map(|(index, item)| Item {
                id: item.id,
                contents: item.contents,
                checked: item.checked,
                position: item.position.unwrap_or(index as u64),
            })
            .collect();
        let mut list = Self { items };
        if !list.has_dense_positions() {
            list.items.sort_by_key(|item| item.position);
            list.reindex();
        }
        list
    }
}

/// JSON truthiness: `false`, `null`, `0` and `""` are false, anything else true.
fn truthy<'de, D: Deserializer<'de>>(deserializer: D) -> Result<bool, D::Error> {
    Ok(match Value::deserialize(deserializer)? {
        Value::Null => false,
        Value::Bool(b) => b,
        Value::Number(n) => n.as_f64().is_some_and(|f| f != 0.0),
        Value::String(s) => !s.is_empty(),
        Value::Array(_) | Value::Object(_) => true,
    })
}

impl Serialize for List {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        self.items.serialize(serializer)
    }
}

impl From<Vec<Item>> for List {
    fn from(items: Vec<Item>) -> Self {
        Self { items }
    }
}

impl List {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn items(&self) -> &[Item] {
        &self.items
    }

    pub fn len(&self) -> usize {
        self.items.len()
    }

    pub fn is_empty(&self) -> bool {
        self.items.is_empty()
    }

    pub fn get(&self, id: &str) -> Option<&Item> {
        self.items.iter().find(|item| item.id == id)
    }

    pub fn ids(&self) -> Vec<&str> {
        self.items.iter().map(|item| item.id.as_str()).collect()
    }

    pub(crate) fn items_mut(&mut self) -> &mut Vec<Item> {
        &mut self.items
    }

    pub(crate) fn find_mut(&mut self, id: &str) -> Option<&mut Item> {
        self.items.iter_mut().find(|item| item.id == id)
    }

    /// Assign every item its array index as position.
    pub(crate) fn reindex(&mut self) {
        for (index, item) in self.items.iter_mut().enumerate() {
            item.position = index as u64;
        }
    }

    /// True when positions are exactly `0..n-1`, each used once.
    pub fn has_dense_positions(&self) -> bool {
        let mut seen = vec![false; self.items.len()];
        for item in &self.items {
            match seen.get_mut(item.position as usize) {
                Some(slot) if !*slot => *slot = true,
                _ => return false,
            }
        }
        true
    }

    pub fn from_json(bytes: &[u8]) -> serde_json::Result<Self> {
        serde_json::from_slice(bytes)
    }

    pub fn to_json(&self) -> serde_json::Result<String> {
        serde_json::to_string(self)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn encodes_as_bare_array() {
        let list = List::from(vec![Item::new("a", "milk", 0)]);
        assert_eq!(
            list.to_json().unwrap(),
            r#"[{"id":"a","contents":"milk","checked":false,"position":0}]"#
        );
    }

    #[test]
    fn legacy_items_get_their_index_as_position() {
        let raw = br#"[
            {"id":"a","contents":"milk","checked":true,"position":0},
            {"id":"b","contents":"eggs"},
            {"id":"c","position":null}
        ]"#;

        let list = List::from_json(raw).unwrap();

        assert_eq!(list.items()[1].position, 1);
        assert!(!list.items()[1].checked);
        assert_eq!(list.items()[2].position, 2);
        assert_eq!(list.items()[2].contents, "");
        assert!(list.items()[0].checked);
    }

    #[test]
    fn stored_positions_are_kept_even_when_out_of_order() {
        let raw = br#"[{"id":"a","position":1},{"id":"b","position":0}]"#;
        let list = List::from_json(raw).unwrap();
        assert_eq!(list.items()[0].position, 1);
        assert_eq!(list.items()[1].position, 0);
        assert!(list.has_dense_positions());
    }

    #[test]
    fn gapped_positions_are_renumbered_in_stored_order() {
        let raw = br#"[
            {"id":"c","position":7},
            {"id":"a","position":1},
            {"id":"b","position":1}
        ]"#;

        let list = List::from_json(raw).unwrap();

        assert_eq!(list.ids(), vec!["a", "b", "c"]);
        assert!(list.has_dense_positions());
        assert_eq!(list.items()[2].position, 2);
    }

    #[test]
    fn lone_item_with_stale_position_starts_at_zero() {
        let list = List::from_json(br#"[{"id":"a","contents":"x","position":1}]"#).unwrap();
        assert_eq!(list.items()[0].position, 0);
    }

    #[test]
    fn item_without_id_decodes_with_empty_id() {
        let list = List::from_json(br#"[{"contents":"x","position":0}]"#).unwrap();
        assert_eq!(list.ids(), vec![""]);
        assert_eq!(list.items()[0].contents, "x");
    }

    #[test]
    fn checked_follows_json_truthiness() {
        let raw = br#"[
            {"id":"a","checked":1},
            {"id":"b","checked":0},
            {"id":"c","checked":"true"},
            {"id":"d","checked":""},
            {"id":"e","checked":null},
            {"id":"f","checked":{}}
        ]"#;

        let list = List::from_json(raw).unwrap();

        let checked: Vec<bool> = list.items().iter().map(|item| item.checked).collect();
        assert_eq!(checked, [true, false, true, false, false, true]);
    }

    #[test]
    fn save_shape_round_trips() {
        let mut checked = Item::new("b", "eggs", 1);
        checked.checked = true;
        let list = List::from(vec![Item::new("a", "milk", 0), checked]);

        let decoded = List::from_json(list.to_json().unwrap().as_bytes()).unwrap();

        assert_eq!(decoded, list);
    }

    #[test]
    fn dense_position_check_spots_gaps_and_duplicates() {
        let gap = List::from(vec![Item::new("a", "", 0), Item::new("b", "", 2)]);
        let dup = List::from(vec![Item::new("a", "", 0), Item::new("b", "", 0)]);
        assert!(!gap.has_dense_positions());
        assert!(!dup.has_dense_positions());
        assert!(List::new().has_dense_positions());
    }
}

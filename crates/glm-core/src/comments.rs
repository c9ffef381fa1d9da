//! Comment side tables.
//!
//! Comments never live on the typed entities themselves; they are carried
//! in side tables keyed by entity identity so the serializer can replay
//! them at the right position. Three positions exist:
//!
//! - *outside*: verbatim full lines appearing above an object block
//! - *inside*: stripped comment text appearing on its own line inside a
//!   block, anchored to the attribute that follows it (or to the
//!   [`KEY_LAST`] anchor when no attribute follows before the close)
//! - *inline*: stripped comment text trailing an attribute line

use indexmap::IndexMap;

/// Anchor for an inside comment that precedes the `name` attribute line.
pub const KEY_NAME: &str = "name";
/// Anchor for inside comments that trail every attribute, sitting just
/// before the closing brace.
pub const KEY_LAST: &str = "__last__";

/// Comments attached to a single entity.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct EntityComments {
    /// Verbatim lines (including the `//`) emitted above the block header.
    pub outside: Vec<String>,
    /// Comment text (without `//`) keyed by the attribute the comment
    /// precedes; [`KEY_NAME`] and [`KEY_LAST`] are positional anchors.
    pub inside: IndexMap<String, Vec<String>>,
    /// Comment text (without `//`) trailing the keyed attribute's line.
    pub inline: IndexMap<String, String>,
}

impl EntityComments {
    pub fn is_empty(&self) -> bool {
        self.outside.is_empty() && self.inside.is_empty() && self.inline.is_empty()
    }

    pub fn push_outside(&mut self, line: impl Into<String>) {
        self.outside.push(line.into());
    }

    pub fn push_inside(&mut self, anchor: &str, text: impl Into<String>) {
        self.inside.entry(anchor.to_string()).or_default().push(text.into());
    }

    pub fn set_inline(&mut self, attr: &str, text: impl Into<String>) {
        self.inline.insert(attr.to_string(), text.into());
    }

    pub fn inside_for(&self, anchor: &str) -> &[String] {
        self.inside.get(anchor).map(Vec::as_slice).unwrap_or(&[])
    }

    pub fn inline_for(&self, attr: &str) -> Option<&str> {
        self.inline.get(attr).map(String::as_str)
    }
}

/// Comment tables for a whole model, keyed by entity identity.
#[derive(Debug, Clone, Default)]
pub struct CommentTables {
    entities: IndexMap<String, EntityComments>,
}

impl CommentTables {
    pub fn new() -> Self {
        Self::default()
    }

    /// Comments for `identity`, creating an empty entry on first access.
    pub fn entry_mut(&mut self, identity: &str) -> &mut EntityComments {
        self.entities.entry(identity.to_string()).or_default()
    }

    pub fn get(&self, identity: &str) -> Option<&EntityComments> {
        self.entities.get(identity)
    }

    /// Move comments across an identity change, preserving table position.
    pub fn rename_entity(&mut self, old: &str, new: &str) {
        if let Some(index) = self.entities.get_index_of(old) {
            if let Some((_, comments)) = self.entities.swap_remove_index(index) {
                let (inserted, _) = self.entities.insert_full(new.to_string(), comments);
                self.entities.swap_indices(index, inserted);
            }
        }
    }

    pub fn remove_entity(&mut self, identity: &str) -> Option<EntityComments> {
        self.entities.shift_remove(identity)
    }

    pub fn is_empty(&self) -> bool {
        self.entities.values().all(EntityComments::is_empty)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_positions() {
        let mut tables = CommentTables::new();
        let entry = tables.entry_mut("meter_m1");
        entry.push_outside("// feeder head metering");
        entry.push_inside(KEY_NAME, "renamed during conversion");
        entry.push_inside("phases", "all three phases");
        entry.push_inside(KEY_LAST, "end of meter");
        entry.set_inline("nominal_voltage", "line-to-line");

        let entry = tables.get("meter_m1").unwrap();
        assert_eq!(entry.outside, vec!["// feeder head metering"]);
        assert_eq!(entry.inside_for("phases"), ["all three phases"]);
        assert_eq!(entry.inside_for(KEY_LAST), ["end of meter"]);
        assert_eq!(entry.inline_for("nominal_voltage"), Some("line-to-line"));
        assert_eq!(entry.inline_for("phases"), None);
    }

    #[test]
    fn test_multiple_inside_comments_same_anchor() {
        let mut tables = CommentTables::new();
        let entry = tables.entry_mut("load_1");
        entry.push_inside("constant_power_A", "first");
        entry.push_inside("constant_power_A", "second");
        assert_eq!(
            tables.get("load_1").unwrap().inside_for("constant_power_A"),
            ["first", "second"]
        );
    }

    #[test]
    fn test_rename_entity() {
        let mut tables = CommentTables::new();
        tables.entry_mut("n1").push_outside("// keep me");
        tables.entry_mut("n2").push_outside("// other");

        tables.rename_entity("n1", "n1_renamed");
        assert!(tables.get("n1").is_none());
        assert_eq!(
            tables.get("n1_renamed").unwrap().outside,
            vec!["// keep me"]
        );
        // position preserved
        assert_eq!(tables.entities.get_index_of("n1_renamed"), Some(0));
    }

    #[test]
    fn test_remove_entity() {
        let mut tables = CommentTables::new();
        tables.entry_mut("n1").push_outside("// gone");
        assert!(tables.remove_entity("n1").is_some());
        assert!(tables.get("n1").is_none());
        assert!(tables.is_empty());
    }
}

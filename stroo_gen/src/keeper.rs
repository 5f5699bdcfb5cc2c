use indexmap::IndexMap;
use minijinja::Value;

/// What the keeper holds under one key.
#[derive(Debug, Clone)]
pub enum Entry {
    /// Sentinel: a render of this key is in progress.
    Pending,
    Rendered(String),
    /// The inline comment standing in for a failed render.
    Failed(String),
    /// A value stored by a template author.
    Scratch(Value),
}

impl Entry {
    /// The non-empty text this entry contributes to a listing.
    pub fn text(&self) -> Option<&str> {
        match self {
            Self::Pending => None,
            Self::Rendered(text) | Self::Failed(text) => Some(text.as_str()),
            Self::Scratch(value) => value.as_str(),
        }
        .filter(|text| !text.is_empty())
    }

    /// The entry as a template value.
    pub fn to_value(&self) -> Value {
        match self {
            Self::Pending => Value::from(""),
            Self::Rendered(text) | Self::Failed(text) => Value::from(text.as_str()),
            Self::Scratch(value) => value.clone(),
        }
    }
}

/// Insertion-ordered store of one generation run.
///
/// Keys are the active template name followed by a declaration kind for
/// generated entries, and anything a template chooses for scratch values.
#[derive(Debug, Default)]
pub struct Keeper {
    entries: IndexMap<String, Entry>,
}

impl Keeper {
    /// An empty keeper.
    pub fn new() -> Self {
        Self::default()
    }

    /// Whether `key` has an entry, pending or not.
    pub fn contains(&self, key: &str) -> bool {
        self.entries.contains_key(key)
    }

    /// The entry at `key`.
    pub fn get(&self, key: &str) -> Option<&Entry> {
        self.entries.get(key)
    }

    /// Returns `true` when an existing entry was replaced. A replaced entry
    /// keeps its position.
    pub fn insert(&mut self, key: String, entry: Entry) -> bool {
        self.entries.insert(key, entry).is_some()
    }

    /// Removes the entry at `key`, keeping the order of the rest.
    pub fn remove(&mut self, key: &str) -> Option<Entry> {
        self.entries.shift_remove(key)
    }

    /// Texts of the entries whose key starts with `prefix`, in insertion
    /// order.
    pub fn texts_with_prefix<'k>(&'k self, prefix: &'k str) -> impl Iterator<Item = &'k str> {
        self.entries
            .iter()
            .filter(move |(key, _)| key.starts_with(prefix))
            .filter_map(|(_, entry)| entry.text())
    }

    /// Number of entries.
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    /// Whether there are no entries.
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn replaced_entries_keep_their_position() {
        let mut keeper = Keeper::new();
        assert!(!keeper.insert("JsonA".into(), Entry::Pending));
        assert!(!keeper.insert("JsonB".into(), Entry::Rendered("b".into())));
        assert!(keeper.insert("JsonA".into(), Entry::Rendered("a".into())));
        let texts: Vec<&str> = keeper.texts_with_prefix("Json").collect();
        assert_eq!(texts, ["a", "b"]);
    }

    #[test]
    fn listing_skips_sentinels_empty_text_and_non_strings() {
        let mut keeper = Keeper::new();
        keeper.insert("StrA".into(), Entry::Pending);
        keeper.insert("StrB".into(), Entry::Rendered(String::new()));
        keeper.insert("StrC".into(), Entry::Scratch(Value::from(42)));
        keeper.insert("StrD".into(), Entry::Scratch(Value::from("kept")));
        keeper.insert("StrE".into(), Entry::Failed("/* error */".into()));
        keeper.insert("Other".into(), Entry::Rendered("elsewhere".into()));
        let texts: Vec<&str> = keeper.texts_with_prefix("Str").collect();
        assert_eq!(texts, ["kept", "/* error */"]);
    }
}

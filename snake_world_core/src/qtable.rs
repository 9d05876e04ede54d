use std::{
    collections::{BTreeMap, HashMap},
    fmt,
    path::{Path, PathBuf},
};

use serde::{
    Deserialize, Deserializer,
    de::{MapAccess, Visitor},
};

use crate::{
    action::RelativeAction,
    perception::{StateKey, StateKeyError},
};

/// Action values for one state, indexed by [`RelativeAction::index`].
pub type QRow = [f64; 3];

/// Errors raised while loading or saving a Q-table.
#[derive(Debug, thiserror::Error)]
pub enum PersistError {
    #[error("failed to access Q-table file {path}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
    #[error("malformed Q-table JSON")]
    Json(#[from] serde_json::Error),
    #[error("invalid state key {key:?}")]
    InvalidKey {
        key: String,
        #[source]
        source: StateKeyError,
    },
    #[error("state key {key:?} appears more than once")]
    DuplicateKey { key: String },
}

/// Sparse value table. Rows appear on first mutable access, zero-filled.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct QTable {
    rows: HashMap<StateKey, QRow>,
}

impl QTable {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn len(&self) -> usize {
        self.rows.len()
    }

    pub fn is_empty(&self) -> bool {
        self.rows.is_empty()
    }

    pub fn contains(&self, key: StateKey) -> bool {
        self.rows.contains_key(&key)
    }

    /// Read-only lookup; unseen states read as zeros and are not stored.
    pub fn row(&self, key: StateKey) -> QRow {
        self.rows.get(&key).copied().unwrap_or_default()
    }

    /// Mutable row, created zero-filled if the state is new.
    pub fn row_mut(&mut self, key: StateKey) -> &mut QRow {
        self.rows.entry(key).or_insert_with(|| {
            tracing::debug!(state = %key, "new Q-table row");
            [0.0; 3]
        })
    }

    pub fn value(&self, key: StateKey, action: RelativeAction) -> f64 {
        self.row(key)[action.index()]
    }

    pub fn set_value(&mut self, key: StateKey, action: RelativeAction, value: f64) {
        self.row_mut(key)[action.index()] = value;
    }

    pub fn iter(&self) -> impl Iterator<Item = (StateKey, &QRow)> {
        self.rows.iter().map(|(key, row)| (*key, row))
    }

    /// Serializes to a JSON object of canonical key strings to
    /// `[LEFT, FRONT, RIGHT]` arrays. Keys are sorted for stable output.
    pub fn to_json(&self) -> Result<String, PersistError> {
        let flat: BTreeMap<String, QRow> = self
            .rows
            .iter()
            .map(|(key, row)| (key.to_string(), *row))
            .collect();
        Ok(serde_json::to_string_pretty(&flat)?)
    }

    pub fn from_json(text: &str) -> Result<Self, PersistError> {
        let FileEntries(entries) = serde_json::from_str(text)?;
        let mut rows = HashMap::with_capacity(entries.len());
        for (key, row) in entries {
            let parsed = key
                .parse::<StateKey>()
                .map_err(|source| PersistError::InvalidKey { key, source })?;
            if rows.insert(parsed, row).is_some() {
                return Err(PersistError::DuplicateKey {
                    key: parsed.to_string(),
                });
            }
        }
        Ok(Self { rows })
    }

    /// Loads a table from `path`. A missing file yields an empty table.
    pub fn load(path: &Path) -> Result<Self, PersistError> {
        let text = match std::fs::read_to_string(path) {
            Ok(text) => text,
            Err(err) if err.kind() == std::io::ErrorKind::NotFound => {
                tracing::info!(path = %path.display(), "no learned Q-table found, starting empty");
                return Ok(Self::new());
            }
            Err(source) => {
                return Err(PersistError::Io {
                    path: path.to_path_buf(),
                    source,
                });
            }
        };
        let table = Self::from_json(&text)?;
        tracing::info!(path = %path.display(), states = table.len(), "loaded Q-table");
        Ok(table)
    }

    /// Writes the table to `path`, creating parent directories as needed.
    pub fn save(&self, path: &Path) -> Result<(), PersistError> {
        let io_err = |source| PersistError::Io {
            path: path.to_path_buf(),
            source,
        };
        if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
            std::fs::create_dir_all(parent).map_err(io_err)?;
        }
        std::fs::write(path, self.to_json()?).map_err(io_err)?;
        tracing::info!(path = %path.display(), states = self.len(), "saved Q-table");
        Ok(())
    }
}

/// Object entries in file order. Unlike a map, repeated keys survive
/// decoding so they can be reported.
struct FileEntries(Vec<(String, QRow)>);

impl<'de> Deserialize<'de> for FileEntries {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        struct EntriesVisitor;

        impl<'de> Visitor<'de> for EntriesVisitor {
            type Value = FileEntries;

            fn expecting(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
                f.write_str("an object of state keys to [LEFT, FRONT, RIGHT] rows")
            }

            fn visit_map<M: MapAccess<'de>>(self, mut map: M) -> Result<Self::Value, M::Error> {
                let mut entries = Vec::with_capacity(map.size_hint().unwrap_or(0));
                while let Some(entry) = map.next_entry::<String, QRow>()? {
                    entries.push(entry);
                }
                Ok(FileEntries(entries))
            }
        }

        deserializer.deserialize_map(EntriesVisitor)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{
        perception::{Sight, SystemState, to_egocentric},
        snake::Heading,
    };

    fn key(text: &str) -> StateKey {
        text.parse().unwrap()
    }

    #[test]
    fn test_lazy_rows() {
        let mut table = QTable::new();
        let k = key("[ ^  ],[+0,+0,-1]");
        assert_eq!(table.row(k), [0.0; 3]);
        assert!(table.is_empty());
        assert_eq!(*table.row_mut(k), [0.0; 3]);
        assert_eq!(table.len(), 1);
        table.set_value(k, RelativeAction::Right, -3.5);
        assert_eq!(table.value(k, RelativeAction::Right), -3.5);
        assert_eq!(table.value(k, RelativeAction::Left), 0.0);
    }

    #[test]
    fn test_save_load_round_trip() {
        let mut table = QTable::new();
        let mut state = SystemState::empty(Heading::East);
        for (i, sight) in [Sight::Blocked, Sight::Empty, Sight::Food].into_iter().enumerate() {
            state.obj_east = sight;
            state.food_north = i % 2 == 0;
            let k = to_egocentric(&state).key();
            table.set_value(k, RelativeAction::Left, 0.1 * i as f64);
            table.set_value(k, RelativeAction::Front, -7.25 + i as f64);
            table.set_value(k, RelativeAction::Right, 1.0 / 3.0);
        }

        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("nested").join("sarsa.json");
        table.save(&path).unwrap();
        let loaded = QTable::load(&path).unwrap();

        assert_eq!(loaded.len(), table.len());
        for (k, row) in table.iter() {
            let other = loaded.row(k);
            for (a, b) in row.iter().zip(other.iter()) {
                assert!((a - b).abs() < 1e-12);
            }
        }
    }

    #[test]
    fn test_missing_file_is_empty_table() {
        let dir = tempfile::tempdir().unwrap();
        let table = QTable::load(&dir.path().join("absent.json")).unwrap();
        assert!(table.is_empty());
    }

    #[test]
    fn test_reads_original_layout() {
        let text = r#"{
            "[<   ],[+0,+0,-1]": [0.0, 1.5, -2.0],
            "[ ^  ],[-1,+1,+0]": [3, 4, 5]
        }"#;
        let table = QTable::from_json(text).unwrap();
        assert_eq!(table.row(key("[<   ],[+0,+0,-1]")), [0.0, 1.5, -2.0]);
        assert_eq!(table.row(key("[ ^  ],[-1,+1,+0]")), [3.0, 4.0, 5.0]);
    }

    #[test]
    fn test_decode_errors() {
        assert!(matches!(
            QTable::from_json(r#"{"bogus": [0, 0, 0]}"#),
            Err(PersistError::InvalidKey { .. })
        ));
        assert!(matches!(
            QTable::from_json(r#"{"[    ],[+0,+0,+0]": [0, 0]}"#),
            Err(PersistError::Json(_))
        ));
        assert!(matches!(QTable::from_json("not json"), Err(PersistError::Json(_))));
    }

    #[test]
    fn test_non_canonical_key_is_not_merged() {
        let text = r#"{"[    ],[+0,+0,+0]": [1, 2, 3], "[    ],[0,0,0]": [9, 9, 9]}"#;
        assert!(matches!(
            QTable::from_json(text),
            Err(PersistError::InvalidKey { .. })
        ));
    }

    #[test]
    fn test_repeated_key_is_rejected() {
        let text = r#"{"[    ],[+0,+0,+0]": [1, 2, 3], "[    ],[+0,+0,+0]": [9, 9, 9]}"#;
        assert!(matches!(
            QTable::from_json(text),
            Err(PersistError::DuplicateKey { .. })
        ));
    }
}

use std::collections::{BTreeSet, HashMap};
use std::path::Path;

use serde::Deserialize;
use tracing::warn;

use crate::error::Result;

#[derive(Debug, Deserialize)]
struct HardsetRow {
    match_id: String,
    score_a: u32,
    score_b: u32,
}

/// Pinned scorelines keyed by fixture id. Fixture ids are built from short
/// course codes, so an alias table maps long display names down to their
/// short form before lookup.
#[derive(Debug, Clone, Default)]
pub struct HardsetManager {
    entries: HashMap<String, (u32, u32)>,
    /// long display name -> short code, applied segment-wise.
    aliases: HashMap<String, String>,
}

impl HardsetManager {
    pub fn new() -> Self {
        Self::default()
    }

    /// Builds a manager with a long-name -> short-code alias table.
    pub fn with_aliases<I>(aliases: I) -> Self
    where
        I: IntoIterator<Item = (String, String)>,
    {
        Self {
            entries: HashMap::new(),
            aliases: aliases.into_iter().collect(),
        }
    }

    /// Canonical form of a fixture id: every `_`-separated segment that
    /// matches a long course name is replaced by its short code.
    fn canonicalize(&self, fixture_id: &str) -> String {
        fixture_id
            .trim()
            .split('_')
            .map(|segment| {
                self.aliases
                    .get(segment)
                    .map(String::as_str)
                    .unwrap_or(segment)
            })
            .collect::<Vec<_>>()
            .join("_")
    }

    pub fn add(&mut self, fixture_id: &str, score_a: u32, score_b: u32) {
        let key = self.canonicalize(fixture_id);
        self.entries.insert(key, (score_a, score_b));
    }

    pub fn has(&self, fixture_id: &str) -> bool {
        self.get(fixture_id).is_some()
    }

    pub fn get(&self, fixture_id: &str) -> Option<(u32, u32)> {
        if let Some(&scores) = self.entries.get(fixture_id) {
            return Some(scores);
        }
        self.entries.get(&self.canonicalize(fixture_id)).copied()
    }

    pub fn clear(&mut self) {
        self.entries.clear();
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Competitions touched by at least one pinned result, derived from the
    /// fixture-id prefix (everything before the round and team segments).
    pub fn affected_sports(&self) -> BTreeSet<String> {
        self.entries
            .keys()
            .filter_map(|id| {
                let segments: Vec<&str> = id.split('_').collect();
                (segments.len() > 3).then(|| segments[..segments.len() - 3].join("_"))
            })
            .collect()
    }

    pub fn summary(&self) -> String {
        if self.entries.is_empty() {
            return "no pinned results".to_string();
        }
        let mut ids: Vec<&String> = self.entries.keys().collect();
        ids.sort();
        let pins: Vec<String> = ids
            .iter()
            .map(|id| {
                let (a, b) = self.entries[*id];
                format!("{id}={a}-{b}")
            })
            .collect();
        format!("{} pinned result(s): {}", self.entries.len(), pins.join(", "))
    }

    /// Loads `match_id,score_a,score_b` rows; malformed rows are skipped
    /// with a warning. Returns the number of entries loaded.
    pub fn load_csv(&mut self, path: &Path) -> Result<usize> {
        let mut reader = csv::ReaderBuilder::new()
            .trim(csv::Trim::All)
            .from_path(path)?;
        let mut loaded = 0usize;
        for row in reader.deserialize::<HardsetRow>() {
            match row {
                Ok(row) => {
                    self.add(&row.match_id, row.score_a, row.score_b);
                    loaded += 1;
                }
                Err(err) => warn!("skipping malformed hardset row: {err}"),
            }
        }
        Ok(loaded)
    }
}

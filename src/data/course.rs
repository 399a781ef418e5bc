use std::collections::HashMap;
use std::fs;
use std::path::Path;

use serde::Deserialize;

use crate::error::Result;

#[derive(Debug, Deserialize)]
struct CourseEntry {
    #[serde(rename = "displayName")]
    display_name: String,
}

#[derive(Debug, Default, Deserialize)]
struct CourseFile {
    #[serde(default)]
    courses: HashMap<String, CourseEntry>,
}

/// Course lookup table: both the short code and the display name of a
/// course map to the same canonical identity (the display name). Fixture
/// identifiers always use the short form.
#[derive(Debug, Clone, Default)]
pub struct CourseMap {
    short_to_display: HashMap<String, String>,
    display_to_short: HashMap<String, String>,
}

impl CourseMap {
    pub fn empty() -> Self {
        Self::default()
    }

    pub fn load(path: &Path) -> Result<Self> {
        let content = fs::read_to_string(path)?;
        let file: CourseFile = serde_json::from_str(content.trim_start_matches('\u{feff}'))?;
        let mut map = CourseMap::default();
        for (short, entry) in file.courses {
            map.display_to_short
                .insert(entry.display_name.clone(), short.clone());
            map.short_to_display.insert(short, entry.display_name);
        }
        Ok(map)
    }

    /// Canonical team identity for a raw cell value. Placeholder opponents
    /// from undrawn playoff rows ("Vencedor QF1", "1º Class. …") are not
    /// teams and yield `None`; unknown names pass through trimmed.
    pub fn canonical(&self, raw: &str) -> Option<String> {
        let trimmed = raw.trim();
        if trimmed.is_empty() || is_placeholder(trimmed) {
            return None;
        }
        if let Some(display) = self.short_to_display.get(trimmed) {
            return Some(display.clone());
        }
        Some(trimmed.to_string())
    }

    /// Short course code used in fixture identifiers; names outside the
    /// table keep their literal form.
    pub fn short_code(&self, name: &str) -> String {
        self.display_to_short
            .get(name)
            .cloned()
            .unwrap_or_else(|| name.to_string())
    }

    /// (display name, short code) pairs, for fixture-id canonicalization.
    pub fn aliases(&self) -> impl Iterator<Item = (String, String)> + '_ {
        self.display_to_short
            .iter()
            .map(|(display, short)| (display.clone(), short.clone()))
    }
}

/// Matches the placeholder patterns used before a bracket is drawn:
/// "Vencedor X", "Vencido X", "1º Class. …", "2º Grupo A".
pub fn is_placeholder(name: &str) -> bool {
    if name.starts_with("Vencedor ") || name.starts_with("Vencido ") {
        return true;
    }
    let digits: String = name.chars().take_while(|c| c.is_ascii_digit()).collect();
    if digits.is_empty() {
        return false;
    }
    let rest = &name[digits.len()..];
    if let Some(rest) = rest.strip_prefix('º') {
        let rest = rest.trim_start();
        return rest.starts_with("Class.") || rest.starts_with("Grupo");
    }
    false
}

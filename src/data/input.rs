use std::collections::HashMap;
use std::fs;
use std::path::{Path, PathBuf};

use tracing::{debug, warn};

use crate::calibration::CalibrationFile;
use crate::data::course::CourseMap;
use crate::error::{Error, Result};
use crate::models::{Fixture, MatchRecord, Sport};

/// One normalized match CSV on disk: `{COMPETITION}_{YY}_{YY}.csv`.
#[derive(Debug, Clone)]
pub struct SeasonFile {
    pub path: PathBuf,
    pub competition: String,
    pub season: String,
    pub sport: Sport,
}

/// Enumerates the season files in a directory. Missing directories are a
/// fatal configuration error.
pub fn find_season_files(dir: &Path) -> Result<Vec<SeasonFile>> {
    if !dir.is_dir() {
        return Err(Error::MissingInput(dir.to_path_buf()));
    }
    let mut files = Vec::new();
    let mut entries: Vec<PathBuf> = fs::read_dir(dir)?
        .filter_map(|entry| entry.ok().map(|e| e.path()))
        .filter(|path| path.extension().is_some_and(|ext| ext == "csv"))
        .collect();
    entries.sort();
    for path in entries {
        let Some(stem) = path.file_stem().and_then(|s| s.to_str()) else {
            continue;
        };
        let Some((competition, season)) = split_season_stem(stem) else {
            debug!("ignoring csv without season suffix: {stem}");
            continue;
        };
        files.push(SeasonFile {
            sport: Sport::from_competition_name(&competition),
            path,
            competition,
            season,
        });
    }
    Ok(files)
}

/// Splits `FUTSAL_MASCULINO_25_26` into (`FUTSAL_MASCULINO`, `25_26`).
fn split_season_stem(stem: &str) -> Option<(String, String)> {
    let parts: Vec<&str> = stem.split('_').collect();
    if parts.len() < 3 {
        return None;
    }
    let (y1, y2) = (parts[parts.len() - 2], parts[parts.len() - 1]);
    if y1.len() != 2 || y2.len() != 2 || y1.parse::<u32>().is_err() || y2.parse::<u32>().is_err() {
        return None;
    }
    Some((
        parts[..parts.len() - 2].join("_"),
        format!("{y1}_{y2}"),
    ))
}

/// Most recent season tag among the files, `YY_YY` ordered numerically and
/// tolerant of a century crossing.
pub fn latest_season(files: &[SeasonFile]) -> Option<String> {
    files
        .iter()
        .map(|f| f.season.clone())
        .max_by_key(|season| season_sort_key(season))
}

fn season_sort_key(season: &str) -> (u32, u32) {
    let mut parts = season.split('_');
    let y1: u32 = parts.next().and_then(|p| p.parse().ok()).unwrap_or(0);
    let mut y2: u32 = parts.next().and_then(|p| p.parse().ok()).unwrap_or(0);
    if y2 < y1 {
        y2 += 100;
    }
    (y1, y2)
}

/// The season before `25_26` is `24_25`.
pub fn previous_season(season: &str) -> Option<String> {
    let mut parts = season.split('_');
    let y1: i32 = parts.next()?.parse().ok()?;
    let y2: i32 = parts.next()?.parse().ok()?;
    if y1 == 0 || y2 == 0 {
        return None;
    }
    Some(format!("{:02}_{:02}", y1 - 1, y2 - 1))
}

fn normalize_header(header: &str) -> String {
    header
        .trim()
        .trim_start_matches('\u{feff}')
        .to_lowercase()
        .replace(['ã', 'á', 'â'], "a")
        .replace('ç', "c")
        .replace(['é', 'ê'], "e")
        .replace('í', "i")
}

/// Reads a normalized match CSV. Rows with unusable team names (playoff
/// placeholders, empty cells) or unparseable numeric fields are skipped
/// with a warning; everything else becomes a typed record.
pub fn read_match_csv(path: &Path, courses: &CourseMap) -> Result<Vec<MatchRecord>> {
    let content = fs::read_to_string(path)?;
    let mut reader = csv::ReaderBuilder::new()
        .flexible(true)
        .trim(csv::Trim::All)
        .from_reader(content.trim_start_matches('\u{feff}').as_bytes());

    let headers = reader.headers()?.clone();
    let column = |wanted: &[&str]| -> Option<usize> {
        headers
            .iter()
            .position(|h| wanted.contains(&normalize_header(h).as_str()))
    };
    let col_round = column(&["jornada"]);
    let col_date = column(&["dia", "data"]);
    let col_time = column(&["hora"]);
    let col_venue = column(&["local"]);
    let col_team_a = column(&["equipa 1", "equipa1"]);
    let col_score_a = column(&["golos 1", "golos1"]);
    let col_score_b = column(&["golos 2", "golos2"]);
    let col_team_b = column(&["equipa 2", "equipa2"]);
    let col_sets_a = column(&["sets 1", "sets1"]);
    let col_sets_b = column(&["sets 2", "sets2"]);
    let col_absence = column(&["falta de comparencia", "falta"]);
    let col_division = column(&["divisao"]);
    let col_group = column(&["grupo"]);

    fn cell<'r>(row: &'r csv::StringRecord, col: Option<usize>) -> &'r str {
        col.and_then(|i| row.get(i)).unwrap_or("")
    }

    let mut records = Vec::new();
    for (row_index, row) in reader.records().enumerate() {
        let row = row?;

        let Some(team_a) = courses.canonical(cell(&row, col_team_a)) else {
            debug!("row {row_index}: no usable home team, skipped");
            continue;
        };
        let Some(team_b) = courses.canonical(cell(&row, col_team_b)) else {
            debug!("row {row_index}: no usable away team, skipped");
            continue;
        };

        let score_a = match parse_optional_u32(cell(&row, col_score_a)) {
            Ok(value) => value,
            Err(raw) => {
                warn!("row {row_index}: unparseable score {raw:?}, skipped");
                continue;
            }
        };
        let score_b = match parse_optional_u32(cell(&row, col_score_b)) {
            Ok(value) => value,
            Err(raw) => {
                warn!("row {row_index}: unparseable score {raw:?}, skipped");
                continue;
            }
        };
        let sets_a = parse_optional_u32(cell(&row, col_sets_a)).unwrap_or(None);
        let sets_b = parse_optional_u32(cell(&row, col_sets_b)).unwrap_or(None);
        let division = parse_optional_u32(cell(&row, col_division)).unwrap_or_else(|raw| {
            warn!("row {row_index}: unparseable division {raw:?}, ignored");
            None
        });
        let group = {
            let raw = cell(&row, col_group).trim();
            (!raw.is_empty()).then(|| raw.to_uppercase())
        };
        let absences: Vec<String> = cell(&row, col_absence)
            .split(',')
            .filter_map(|name| courses.canonical(name))
            .collect();

        records.push(MatchRecord {
            round: cell(&row, col_round).to_string(),
            date: cell(&row, col_date).to_string(),
            time: cell(&row, col_time).to_string(),
            venue: cell(&row, col_venue).to_string(),
            team_a,
            team_b,
            score_a,
            score_b,
            sets_a,
            sets_b,
            absences,
            division,
            group,
        });
    }
    Ok(records)
}

/// Empty cells are `None`; `3` and `3.0` both parse; anything else is an
/// error carrying the raw text.
fn parse_optional_u32(raw: &str) -> std::result::Result<Option<u32>, String> {
    let raw = raw.trim();
    if raw.is_empty() {
        return Ok(None);
    }
    raw.parse::<f64>()
        .ok()
        .filter(|v| *v >= 0.0 && v.fract() == 0.0)
        .map(|v| Some(v as u32))
        .ok_or_else(|| raw.to_string())
}

/// Reads a wide rating snapshot CSV (one column per team) and returns the
/// last row, the end-of-season ratings.
pub fn read_rating_snapshot(path: &Path, courses: &CourseMap) -> Result<HashMap<String, f64>> {
    let content = fs::read_to_string(path)?;
    let mut reader = csv::ReaderBuilder::new()
        .flexible(true)
        .trim(csv::Trim::All)
        .from_reader(content.trim_start_matches('\u{feff}').as_bytes());
    let headers = reader.headers()?.clone();
    let mut last = None;
    for row in reader.records() {
        last = Some(row?);
    }
    let Some(last) = last else {
        return Ok(HashMap::new());
    };

    let mut ratings = HashMap::new();
    for (header, value) in headers.iter().zip(last.iter()) {
        let Some(team) = courses.canonical(header) else {
            continue;
        };
        match value.trim().parse::<f64>() {
            Ok(rating) => {
                ratings.insert(team, rating);
            }
            Err(_) => warn!("snapshot {path:?}: unparseable rating for {team}, ignored"),
        }
    }
    Ok(ratings)
}

pub fn read_calibration(path: &Path) -> Result<CalibrationFile> {
    let content = fs::read_to_string(path)?;
    Ok(serde_json::from_str(
        content.trim_start_matches('\u{feff}'),
    )?)
}

/// Builds the future-fixture list: every record the season still has to
/// play, with a stable id `{competition}_{round}_{shortA}_{shortB}`.
pub fn build_fixtures(
    matches: &[MatchRecord],
    sport: Sport,
    competition: &str,
    courses: &CourseMap,
) -> Vec<Fixture> {
    matches
        .iter()
        .filter(|m| m.effective_scores(sport).is_none())
        .map(|m| Fixture {
            id: format!(
                "{competition}_{}_{}_{}",
                m.round,
                courses.short_code(&m.team_a),
                courses.short_code(&m.team_b)
            ),
            team_a: m.team_a.clone(),
            team_b: m.team_b.clone(),
            round: m.round.clone(),
            date: m.date.clone(),
            time: m.time.clone(),
            division: m.division,
            group: m.group.clone(),
        })
        .collect()
}

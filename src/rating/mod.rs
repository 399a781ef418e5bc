use std::collections::{HashMap, HashSet};

use chrono::{Datelike, NaiveDate};
use serde::Serialize;
use tracing::warn;

use crate::models::{is_playoff_round, MatchRecord, Sport, StandingRow, Team};
use crate::standings;

/// K factor applied to every regular rating update before modulation.
pub const K_BASE: f64 = 100.0;

/// K factor for cross-group corrective adjustments.
pub const K_INTER_GROUP: f64 = 100.0;

/// Rating difference that maps to one order of magnitude in expected score.
const ELO_SCALE: f64 = 250.0;

/// Expected score of side A against side B.
pub fn expected_score(rating_a: f64, rating_b: f64) -> f64 {
    1.0 / (1.0 + 10f64.powf((rating_b - rating_a) / ELO_SCALE))
}

/// Score-margin multiplier. Zero scores are remapped to 0.5 so blowouts
/// against scoreless sides still register, and the tenth root keeps the
/// multiplier close to 1.
pub fn score_proportion(score_a: u32, score_b: u32) -> f64 {
    let a = if score_a == 0 { 0.5 } else { score_a as f64 };
    let b = if score_b == 0 { 0.5 } else { score_b as f64 };
    (a / b).max(b / a).powf(0.1)
}

fn log16(value: f64) -> f64 {
    value.ln() / 16f64.ln()
}

/// Time-of-season multiplier for the K factor.
///
/// The season is mapped onto a 0..8 scale. Early-season and post-winter
/// games are amplified (up to 2x and sqrt(2)x respectively, decaying along
/// a log-16 ramp), elimination games count 1.5x, and the third-place match
/// (`E3L`) is dampened to 0.75.
pub fn season_phase_multiplier(
    game_index: u32,
    total_group_games: u32,
    games_before_winter: Option<u32>,
    round: &str,
) -> f64 {
    if round.trim().eq_ignore_ascii_case("E3L") {
        return 0.75;
    }
    if total_group_games == 0 {
        return 1.0;
    }
    let total = total_group_games as f64;
    let scaled = 8.0 * game_index as f64 / total;
    if scaled > 8.0 {
        return 1.5;
    }
    if let Some(before) = games_before_winter {
        // The elimination branch never takes the winter ramp.
        if !is_playoff_round(round) && game_index > before {
            let after = (game_index - before - 1) as f64;
            let scaled_post = 5.0 + 8.0 * after / total;
            if scaled_post < 8.0 / 3.0 + 5.0 {
                return (1.0 / log16(4.0 * (scaled_post - 4.0))).sqrt();
            }
            return 1.0;
        }
    }
    if scaled < 8.0 / 3.0 {
        let scaled_start = 1.0 + 8.0 * (game_index - 1) as f64 / total;
        return 1.0 / log16(4.0 * scaled_start);
    }
    1.0
}

/// Inputs for a single-match rating update.
#[derive(Debug, Clone)]
pub struct MatchUpdate<'a> {
    pub rating_a: f64,
    pub rating_b: f64,
    pub score_a: u32,
    pub score_b: u32,
    pub game_index_a: u32,
    pub game_index_b: u32,
    pub total_group_games_a: u32,
    pub total_group_games_b: u32,
    pub games_before_winter_a: Option<u32>,
    pub games_before_winter_b: Option<u32>,
    pub round: &'a str,
    pub has_absence: bool,
}

/// Breakdown of a single update, kept for the detailed log.
#[derive(Debug, Clone, Copy)]
pub struct UpdateBreakdown {
    pub expected_a: f64,
    pub phase_a: f64,
    pub phase_b: f64,
    pub proportion: f64,
    pub k_a: f64,
    pub k_b: f64,
    pub change_a: f64,
    pub change_b: f64,
    pub delta_a: i32,
    pub delta_b: i32,
}

/// One entry of the detailed per-match log. Cross-group adjustments emit
/// synthetic entries after the last real match.
#[derive(Debug, Clone, Serialize)]
pub enum LogEntry {
    Match(MatchLogRow),
    AdjustmentHeader,
    Adjustment {
        team: String,
        rating_before: f64,
        delta: i32,
        rating_after: f64,
    },
}

#[derive(Debug, Clone, Serialize)]
pub struct MatchLogRow {
    pub round: String,
    pub date: String,
    pub time: String,
    pub team_a: String,
    pub team_b: String,
    pub score_a: u32,
    pub score_b: u32,
    pub rating_a_before: f64,
    pub rating_b_before: f64,
    pub phase_a: f64,
    pub phase_b: f64,
    pub proportion: f64,
    pub k_a: f64,
    pub k_b: f64,
    pub change_a: f64,
    pub change_b: f64,
    pub delta_a: i32,
    pub delta_b: i32,
    pub rating_a_after: f64,
    pub rating_b_after: f64,
    pub has_absence: bool,
}

/// Per-team rating series, appended at match boundaries and right-padded
/// with the last observed value so all series stay the same length.
#[derive(Debug, Clone, Default)]
pub struct RatingHistory {
    series: HashMap<String, Vec<f64>>,
}

impl RatingHistory {
    pub fn insert_team(&mut self, name: &str, initial: f64) {
        self.series.entry(name.to_string()).or_insert_with(|| vec![initial]);
    }

    pub fn append(&mut self, name: &str, value: f64) {
        self.series.entry(name.to_string()).or_default().push(value);
    }

    /// Right-pads every series to the current maximum length.
    pub fn pad(&mut self) {
        let max_len = self.series.values().map(Vec::len).max().unwrap_or(0);
        for series in self.series.values_mut() {
            let last = series.last().copied().unwrap_or(0.0);
            series.resize(max_len, last);
        }
    }

    pub fn series(&self) -> &HashMap<String, Vec<f64>> {
        &self.series
    }

    pub fn len(&self) -> usize {
        self.series.values().map(Vec::len).max().unwrap_or(0)
    }

    pub fn is_empty(&self) -> bool {
        self.series.is_empty()
    }
}

/// Everything produced by a full-season rating pass.
#[derive(Debug, Clone)]
pub struct SeasonOutcome {
    pub teams: HashMap<String, Team>,
    pub history: RatingHistory,
    pub log: Vec<LogEntry>,
    pub standings: Vec<StandingRow>,
    pub total_group_games: HashMap<String, u32>,
}

/// Modified Elo engine with time-of-season, score-margin, and absence
/// modulation plus cross-group corrective adjustments.
#[derive(Debug, Clone, Default)]
pub struct RatingEngine {
    previous_ratings: HashMap<String, f64>,
}

impl RatingEngine {
    pub fn new() -> Self {
        Self::default()
    }

    /// Seeds the engine with end-of-season ratings from the previous season.
    pub fn load_previous_ratings(&mut self, ratings: HashMap<String, f64>) {
        self.previous_ratings = ratings;
    }

    /// Initial rating for a team: the previous-season rating when known,
    /// otherwise a division-based default.
    pub fn initialize_team(&self, name: &str, division: Option<u32>) -> f64 {
        if let Some(&rating) = self.previous_ratings.get(name) {
            return rating;
        }
        match division {
            Some(1) => 1000.0,
            Some(2) => 500.0,
            _ => 750.0,
        }
    }

    /// Integer-rounded rating deltas for one match. An absence zeroes both.
    pub fn update_match(&self, m: &MatchUpdate<'_>) -> (i32, i32) {
        let breakdown = self.update_match_detailed(m);
        (breakdown.delta_a, breakdown.delta_b)
    }

    fn update_match_detailed(&self, m: &MatchUpdate<'_>) -> UpdateBreakdown {
        let expected_a = expected_score(m.rating_a, m.rating_b);
        let expected_b = 1.0 - expected_a;
        let (actual_a, actual_b) = match m.score_a.cmp(&m.score_b) {
            std::cmp::Ordering::Greater => (1.0, 0.0),
            std::cmp::Ordering::Less => (0.0, 1.0),
            std::cmp::Ordering::Equal => (0.5, 0.5),
        };
        let phase_a = season_phase_multiplier(
            m.game_index_a,
            m.total_group_games_a,
            m.games_before_winter_a,
            m.round,
        );
        let phase_b = season_phase_multiplier(
            m.game_index_b,
            m.total_group_games_b,
            m.games_before_winter_b,
            m.round,
        );
        let proportion = score_proportion(m.score_a, m.score_b);
        let k_a = K_BASE * phase_a * proportion;
        let k_b = K_BASE * phase_b * proportion;
        let change_a = actual_a - expected_a;
        let change_b = actual_b - expected_b;
        let (delta_a, delta_b) = if m.has_absence {
            (0, 0)
        } else {
            (
                (k_a * change_a).round() as i32,
                (k_b * change_b).round() as i32,
            )
        };
        UpdateBreakdown {
            expected_a,
            phase_a,
            phase_b,
            proportion,
            k_a,
            k_b,
            change_a,
            change_b,
            delta_a,
            delta_b,
        }
    }

    /// Processes a season's match table in file order: creates teams on
    /// first sighting, applies per-match updates, keeps the rating history
    /// aligned, and runs cross-group adjustments once the table has a group
    /// column but no division column.
    pub fn process_season(&self, matches: &[MatchRecord], sport: Sport) -> SeasonOutcome {
        let mut teams: HashMap<String, Team> = HashMap::new();
        let mut history = RatingHistory::default();

        let has_division = matches.iter().any(|m| m.division.is_some());
        let has_group = matches.iter().any(|m| m.group.is_some());

        // Group-phase sightings seed the team set; playoff rows may still
        // introduce stragglers later.
        for record in matches.iter().filter(|m| !m.is_playoff()) {
            for name in [&record.team_a, &record.team_b] {
                if !teams.contains_key(name.as_str()) {
                    let rating = self.initialize_team(name, record.division);
                    teams.insert(name.clone(), Team::new(name.clone(), rating));
                    history.insert_team(name, rating);
                }
            }
        }

        let total_group_games = total_group_games(matches);
        let games_before_winter = detect_winter_break(matches);

        let mut log = Vec::new();
        for record in matches {
            let Some((score_a, score_b)) = record.effective_scores(sport) else {
                continue; // future fixture
            };
            for name in [&record.team_a, &record.team_b] {
                if !teams.contains_key(name.as_str()) {
                    let rating = self.initialize_team(name, record.division);
                    teams.insert(name.clone(), Team::new(name.clone(), rating));
                    history.insert_team(name, rating);
                    history.pad();
                }
            }

            let (index_a, index_b) = {
                let a = &teams[&record.team_a];
                let b = &teams[&record.team_b];
                (a.games_played + 1, b.games_played + 1)
            };
            let winter_a = games_before_winter
                .as_ref()
                .map(|g| g.get(&record.team_a).copied().unwrap_or(0));
            let winter_b = games_before_winter
                .as_ref()
                .map(|g| g.get(&record.team_b).copied().unwrap_or(0));
            let update = MatchUpdate {
                rating_a: teams[&record.team_a].rating,
                rating_b: teams[&record.team_b].rating,
                score_a,
                score_b,
                game_index_a: index_a,
                game_index_b: index_b,
                total_group_games_a: total_group_games.get(&record.team_a).copied().unwrap_or(0),
                total_group_games_b: total_group_games.get(&record.team_b).copied().unwrap_or(0),
                games_before_winter_a: winter_a,
                games_before_winter_b: winter_b,
                round: &record.round,
                has_absence: record.has_absence(),
            };
            let breakdown = self.update_match_detailed(&update);

            log.push(LogEntry::Match(MatchLogRow {
                round: record.round.clone(),
                date: record.date.clone(),
                time: record.time.clone(),
                team_a: record.team_a.clone(),
                team_b: record.team_b.clone(),
                score_a,
                score_b,
                rating_a_before: update.rating_a,
                rating_b_before: update.rating_b,
                phase_a: breakdown.phase_a,
                phase_b: breakdown.phase_b,
                proportion: breakdown.proportion,
                k_a: breakdown.k_a,
                k_b: breakdown.k_b,
                change_a: breakdown.change_a,
                change_b: breakdown.change_b,
                delta_a: breakdown.delta_a,
                delta_b: breakdown.delta_b,
                rating_a_after: update.rating_a + breakdown.delta_a as f64,
                rating_b_after: update.rating_b + breakdown.delta_b as f64,
                has_absence: update.has_absence,
            }));

            {
                let team_a = teams.get_mut(&record.team_a).expect("team created above");
                team_a.rating += breakdown.delta_a as f64;
                team_a.games_played += 1;
            }
            {
                let team_b = teams.get_mut(&record.team_b).expect("team created above");
                team_b.rating += breakdown.delta_b as f64;
                team_b.games_played += 1;
            }
            history.append(&record.team_a, teams[&record.team_a].rating);
            history.append(&record.team_b, teams[&record.team_b].rating);
            history.pad();
        }

        if let Some(before) = &games_before_winter {
            for (name, team) in teams.iter_mut() {
                team.games_before_winter = Some(before.get(name).copied().unwrap_or(0));
            }
        }

        if has_group && !has_division {
            let adjustments = cross_group_adjustments(matches, sport, &teams);
            if !adjustments.is_empty() {
                log.push(LogEntry::AdjustmentHeader);
                let mut adjusted: Vec<_> = adjustments.into_iter().collect();
                adjusted.sort_by(|a, b| a.0.cmp(&b.0));
                for (name, delta) in adjusted {
                    if delta == 0 {
                        continue;
                    }
                    if let Some(team) = teams.get_mut(&name) {
                        let before = team.rating;
                        team.rating += delta as f64;
                        history.append(&name, team.rating);
                        log.push(LogEntry::Adjustment {
                            team: name.clone(),
                            rating_before: before,
                            delta,
                            rating_after: team.rating,
                        });
                    }
                }
                history.pad();
            }
        }

        let team_names: HashSet<String> = teams.keys().cloned().collect();
        let standings = standings::compute(matches, sport, &team_names);

        SeasonOutcome {
            teams,
            history,
            log,
            standings,
            total_group_games,
        }
    }
}

/// Number of group-phase appearances per team.
pub fn total_group_games(matches: &[MatchRecord]) -> HashMap<String, u32> {
    let mut counts: HashMap<String, u32> = HashMap::new();
    for record in matches.iter().filter(|m| !m.is_playoff()) {
        *counts.entry(record.team_a.clone()).or_default() += 1;
        *counts.entry(record.team_b.clone()).or_default() += 1;
    }
    counts
}

/// Scans the match sequence for the first calendar-year increase and counts
/// each team's appearances strictly before it. Returns `None` when no break
/// is found (including when no date parses at all).
pub fn detect_winter_break(matches: &[MatchRecord]) -> Option<HashMap<String, u32>> {
    let years: Vec<Option<i32>> = matches.iter().map(|m| parse_year(&m.date)).collect();
    if years.iter().all(Option::is_none) && !matches.is_empty() {
        warn!("no match date parsed; season-phase multiplier falls back to early/mid/late only");
        return None;
    }

    let mut break_index = None;
    for i in 1..years.len() {
        if let (Some(prev), Some(curr)) = (years[i - 1], years[i]) {
            if curr > prev {
                break_index = Some(i);
                break;
            }
        }
    }
    let break_index = break_index?;

    let mut counts: HashMap<String, u32> = HashMap::new();
    for record in &matches[..break_index] {
        *counts.entry(record.team_a.clone()).or_default() += 1;
        *counts.entry(record.team_b.clone()).or_default() += 1;
    }
    Some(counts)
}

fn parse_year(date: &str) -> Option<i32> {
    let date = date.trim();
    if date.is_empty() {
        return None;
    }
    const FORMATS: [&str; 4] = ["%d/%m/%Y", "%Y-%m-%d", "%d-%m-%Y", "%d/%m/%y"];
    FORMATS
        .iter()
        .find_map(|fmt| NaiveDate::parse_from_str(date, fmt).ok())
        .map(|d| d.year())
}

/// Elo-style correction between groups that never meet in the regular
/// phase, driven by inter-group playoff win rates. Positions are compared
/// only among teams that stayed out of the playoffs; the bracket already
/// compares the rest directly.
fn cross_group_adjustments(
    matches: &[MatchRecord],
    sport: Sport,
    teams: &HashMap<String, Team>,
) -> HashMap<String, i32> {
    let playoff: Vec<&MatchRecord> = matches.iter().filter(|m| m.is_playoff()).collect();
    if playoff.is_empty() {
        return HashMap::new();
    }

    // Team -> group, from the regular phase.
    let mut team_group: HashMap<&str, &str> = HashMap::new();
    for record in matches.iter().filter(|m| !m.is_playoff()) {
        if let Some(group) = record.group.as_deref() {
            team_group.insert(record.team_a.as_str(), group);
            team_group.insert(record.team_b.as_str(), group);
        }
    }
    let mut groups: Vec<&str> = {
        let set: HashSet<&str> = team_group.values().copied().collect();
        set.into_iter().collect()
    };
    groups.sort_unstable();
    if groups.len() < 2 {
        return HashMap::new();
    }

    // Inter-group win counts across the observed playoffs.
    let mut wins: HashMap<&str, (u32, u32)> = HashMap::new(); // (wins, total)
    let mut playoff_teams: HashSet<&str> = HashSet::new();
    for record in &playoff {
        playoff_teams.insert(record.team_a.as_str());
        playoff_teams.insert(record.team_b.as_str());
        let (Some(&ga), Some(&gb)) = (
            team_group.get(record.team_a.as_str()),
            team_group.get(record.team_b.as_str()),
        ) else {
            continue;
        };
        if ga == gb {
            continue;
        }
        let Some((score_a, score_b)) = record.effective_scores(sport) else {
            continue;
        };
        let entry_a = wins.entry(ga).or_default();
        entry_a.1 += 1;
        if score_a > score_b {
            entry_a.0 += 1;
        }
        let entry_b = wins.entry(gb).or_default();
        entry_b.1 += 1;
        if score_b > score_a {
            entry_b.0 += 1;
        }
    }
    if wins.values().all(|(_, total)| *total == 0) {
        return HashMap::new();
    }
    let win_rate = |group: &str| -> f64 {
        match wins.get(group) {
            Some(&(w, t)) if t > 0 => w as f64 / t as f64,
            _ => 0.5,
        }
    };

    // Within-group orderings of non-playoff teams, from the real standings.
    let team_names: HashSet<String> = teams.keys().cloned().collect();
    let table = standings::compute(matches, sport, &team_names);
    let mut by_group: HashMap<&str, Vec<&str>> = HashMap::new();
    for row in &table {
        let name = row.team.as_str();
        if playoff_teams.contains(name) {
            continue;
        }
        if let Some(&group) = team_group.get(name) {
            by_group.entry(group).or_default().push(name);
        }
    }

    let max_positions = by_group.values().map(Vec::len).max().unwrap_or(0);
    let mut adjustments: HashMap<String, i32> = HashMap::new();
    for position in 0..max_positions {
        for (i, &group_a) in groups.iter().enumerate() {
            let Some(&name_a) = by_group.get(group_a).and_then(|g| g.get(position)) else {
                continue;
            };
            for &group_b in &groups[i + 1..] {
                let Some(&name_b) = by_group.get(group_b).and_then(|g| g.get(position)) else {
                    continue;
                };
                let (Some(team_a), Some(team_b)) = (teams.get(name_a), teams.get(name_b)) else {
                    continue;
                };
                let expected_a = expected_score(team_a.rating, team_b.rating);
                let expected_b = 1.0 - expected_a;
                let delta_a = (K_INTER_GROUP * (win_rate(group_a) - expected_a)).round() as i32;
                let delta_b = (K_INTER_GROUP * (win_rate(group_b) - expected_b)).round() as i32;
                *adjustments.entry(name_a.to_string()).or_default() += delta_a;
                *adjustments.entry(name_b.to_string()).or_default() += delta_b;
            }
        }
    }
    adjustments
}

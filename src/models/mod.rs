use serde::{Deserialize, Serialize};

/// Rating given to a team that has no division information and no
/// previous-season snapshot at all (historical replays start here).
pub const UNRATED_DEFAULT: f64 = 1500.0;

/// Sports contested in the cup.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Sport {
    Handball,
    Futsal,
    Football7,
    Basketball,
    Volleyball,
}

impl Sport {
    /// Infers the sport from a competition name such as `FUTSAL_MASCULINO`
    /// or a CSV file stem. Falls back to futsal for unknown names.
    pub fn from_competition_name(name: &str) -> Sport {
        let lower = name.to_lowercase();
        if lower.contains("andebol") {
            Sport::Handball
        } else if lower.contains("basquete") {
            Sport::Basketball
        } else if lower.contains("volei") {
            Sport::Volleyball
        } else if lower.contains("futebol") && lower.contains('7') {
            Sport::Football7
        } else {
            Sport::Futsal
        }
    }

    pub fn key(&self) -> &'static str {
        match self {
            Sport::Handball => "andebol",
            Sport::Futsal => "futsal",
            Sport::Football7 => "futebol7",
            Sport::Basketball => "basquete",
            Sport::Volleyball => "volei",
        }
    }

    /// Whether the sport admits drawn matches in the regular phase.
    pub fn has_draws(&self) -> bool {
        !matches!(self, Sport::Basketball | Sport::Volleyball)
    }

    /// Score imputed in favor of the present team when the opponent forfeits.
    pub fn forfeit_score(&self) -> (u32, u32) {
        match self {
            Sport::Volleyball => (2, 0),
            Sport::Futsal | Sport::Football7 => (3, 0),
            Sport::Handball => (15, 0),
            Sport::Basketball => (21, 0),
        }
    }

    /// Table points awarded to each side for a result. Volleyball derives
    /// points from sets; when no set columns exist the score columns carry
    /// the sets, so they are used as the fallback.
    pub fn points(
        &self,
        score_a: u32,
        score_b: u32,
        sets_a: Option<u32>,
        sets_b: Option<u32>,
    ) -> (u32, u32) {
        use std::cmp::Ordering::*;
        match self {
            Sport::Handball => match score_a.cmp(&score_b) {
                Greater => (3, 1),
                Less => (1, 3),
                Equal => (2, 2),
            },
            Sport::Futsal | Sport::Football7 => match score_a.cmp(&score_b) {
                Greater => (3, 0),
                Less => (0, 3),
                Equal => (1, 1),
            },
            Sport::Basketball => match score_a.cmp(&score_b) {
                Greater => (2, 0),
                Less => (0, 2),
                Equal => (1, 1),
            },
            Sport::Volleyball => {
                let sa = sets_a.unwrap_or(score_a);
                let sb = sets_b.unwrap_or(score_b);
                match (sa, sb) {
                    (2, 0) => (3, 0),
                    (2, 1) => (2, 1),
                    (1, 2) => (1, 2),
                    (0, 2) => (0, 3),
                    // Unexpected set combination: fall back to winner/loser split
                    _ => match sa.cmp(&sb) {
                        Greater => (2, 1),
                        Less => (1, 2),
                        Equal => (1, 1),
                    },
                }
            }
        }
    }
}

/// Round labels starting with any of these prefixes belong to the
/// elimination phase: E1/E2/E3L/E3 winner bracket, PM maintenance bracket,
/// LM mini-league, plus the legacy MP/LP spellings.
pub fn is_playoff_round(label: &str) -> bool {
    let label = label.trim().to_ascii_uppercase();
    !label.is_empty()
        && ["E", "MP", "PM", "LM", "LP"]
            .iter()
            .any(|prefix| label.starts_with(prefix))
}

/// A team as tracked by the rating engine.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Team {
    pub name: String,
    pub rating: f64,
    pub games_played: u32,
    /// Games played strictly before the winter break, when one was detected.
    pub games_before_winter: Option<u32>,
}

impl Team {
    pub fn new(name: impl Into<String>, rating: f64) -> Self {
        Team {
            name: name.into(),
            rating,
            games_played: 0,
            games_before_winter: None,
        }
    }

    /// Secondary squads carry a trailing " B" and are ineligible for playoffs.
    pub fn is_b_team(&self) -> bool {
        is_b_team(&self.name)
    }
}

pub fn is_b_team(name: &str) -> bool {
    name.ends_with(" B")
}

/// For a B team, the name of its primary squad.
pub fn a_team_name(name: &str) -> Option<&str> {
    name.strip_suffix(" B")
}

/// One normalized row of the match table.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MatchRecord {
    pub round: String,
    pub date: String,
    pub time: String,
    pub venue: String,
    pub team_a: String,
    pub team_b: String,
    pub score_a: Option<u32>,
    pub score_b: Option<u32>,
    pub sets_a: Option<u32>,
    pub sets_b: Option<u32>,
    /// Teams that failed to appear, as listed in the absence column.
    pub absences: Vec<String>,
    pub division: Option<u32>,
    pub group: Option<String>,
}

impl MatchRecord {
    /// A record with both scores is a played match; anything else is a
    /// future fixture.
    pub fn is_past(&self) -> bool {
        self.score_a.is_some() && self.score_b.is_some()
    }

    pub fn is_playoff(&self) -> bool {
        is_playoff_round(&self.round)
    }

    /// The absent team, when the absence column names exactly one.
    pub fn single_absentee(&self) -> Option<&str> {
        match self.absences.as_slice() {
            [only] => Some(only.as_str()),
            _ => None,
        }
    }

    pub fn has_absence(&self) -> bool {
        !self.absences.is_empty()
    }

    /// Scores as recorded, or the sport's forfeit score when the match was
    /// decided administratively and never played.
    pub fn effective_scores(&self, sport: Sport) -> Option<(u32, u32)> {
        if let (Some(a), Some(b)) = (self.score_a, self.score_b) {
            return Some((a, b));
        }
        let absent = self.single_absentee()?;
        let (win, lose) = sport.forfeit_score();
        if absent == self.team_a {
            Some((lose, win))
        } else if absent == self.team_b {
            Some((win, lose))
        } else {
            None
        }
    }
}

/// A match still to be played, identified by a stable fixture id built
/// from the competition, round, and short course codes.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Fixture {
    pub id: String,
    pub team_a: String,
    pub team_b: String,
    pub round: String,
    pub date: String,
    pub time: String,
    pub division: Option<u32>,
    pub group: Option<String>,
}

/// One row of a computed league table.
#[derive(Debug, Clone, Serialize)]
pub struct StandingRow {
    pub division: Option<u32>,
    pub group: Option<String>,
    pub position: usize,
    pub team: String,
    pub points: u32,
    pub played: u32,
    pub wins: u32,
    pub draws: u32,
    pub losses: u32,
    pub goals_for: u32,
    pub goals_against: u32,
    pub goal_difference: i64,
    pub sets_for: u32,
    pub sets_against: u32,
    pub set_difference: i64,
    pub forfeits: u32,
}

/// Monte-Carlo run configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SimulationParams {
    pub iterations: usize,
    pub base_seed: u64,
    /// Batch size used for progress reporting on large runs.
    pub batch_size: usize,
}

impl Default for SimulationParams {
    fn default() -> Self {
        Self {
            iterations: 10_000,
            base_seed: 0,
            batch_size: 10_000,
        }
    }
}

impl SimulationParams {
    pub fn with_iterations(iterations: usize) -> Self {
        Self {
            iterations,
            ..Default::default()
        }
    }

    /// Large runs report progress every `batch_size` iterations; smaller
    /// runs execute as a single batch.
    pub fn effective_batch(&self) -> usize {
        if self.iterations >= 100_000 {
            self.batch_size.max(1)
        } else {
            self.iterations.max(1)
        }
    }
}

/// Aggregated forecast for a single team.
#[derive(Debug, Clone, Default, Serialize)]
pub struct TeamForecast {
    pub team: String,
    pub p_playoffs: f64,
    pub p_semifinal: f64,
    pub p_final: f64,
    pub p_champion: f64,
    pub p_promotion: f64,
    pub p_relegation: f64,
    pub expected_points: f64,
    pub expected_points_std: f64,
    pub expected_place: f64,
    pub expected_place_std: f64,
    pub avg_final_rating: f64,
    pub avg_final_rating_std: f64,
}

/// Aggregated forecast for a single future fixture.
#[derive(Debug, Clone, Serialize)]
pub struct FixtureForecast {
    pub fixture: Fixture,
    pub p_win_a: f64,
    pub p_draw: f64,
    pub p_win_b: f64,
    pub rating_a_mean: f64,
    pub rating_a_std: f64,
    pub rating_b_mean: f64,
    pub rating_b_std: f64,
    /// Scoreline frequencies in percent, most frequent first.
    pub score_distribution: Vec<(String, f64)>,
}

/// Full output of a Monte-Carlo forecast.
#[derive(Debug, Clone, Serialize)]
pub struct Forecast {
    pub iterations: usize,
    pub teams: Vec<TeamForecast>,
    pub fixtures: Vec<FixtureForecast>,
}

impl Forecast {
    pub fn team(&self, name: &str) -> Option<&TeamForecast> {
        self.teams.iter().find(|t| t.team == name)
    }
}

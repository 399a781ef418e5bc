use std::collections::HashMap;

use rayon::prelude::*;

use crate::hardset::HardsetManager;
use crate::models::{
    is_b_team, is_playoff_round, Fixture, FixtureForecast, Forecast, SimulationParams, Sport, Team,
    TeamForecast,
};
use crate::progress::ProgressHandle;
use crate::rating::RatingEngine;
use crate::sampler::OutcomeSampler;

mod iteration;
mod promotion;

/// Inputs for a Monte-Carlo forecast of the remainder of a season.
#[derive(Debug, Clone)]
pub struct ForecastRequest<'a> {
    pub sport: Sport,
    pub teams: &'a HashMap<String, Team>,
    pub fixtures: &'a [Fixture],
    pub engine: &'a RatingEngine,
    pub sampler: &'a OutcomeSampler,
    pub params: SimulationParams,
    /// Group-phase appearances per team, for the season-phase multiplier.
    pub total_group_games: &'a HashMap<String, u32>,
    /// Points already banked in completed matches.
    pub real_points: &'a HashMap<String, u32>,
    /// (division, group) of each team.
    pub team_division: &'a HashMap<String, (Option<u32>, Option<String>)>,
    /// Playoff slots per (division, group); empty means a global cut.
    pub playoff_slots: &'a HashMap<(Option<u32>, Option<String>), usize>,
    pub total_playoff_slots: usize,
    pub has_liguilla: bool,
    pub hardsets: Option<&'a HardsetManager>,
}

/// Immutable per-run simulation model with teams and fixtures resolved to
/// indices, shared read-only by all workers.
#[derive(Debug, Clone)]
pub(crate) struct SimTeam {
    pub name: String,
    pub rating: f64,
    pub games_played: u32,
    pub games_before_winter: Option<u32>,
    pub total_group_games: u32,
    pub division: Option<u32>,
    pub partition: usize,
    pub real_points: u32,
    pub is_b: bool,
    pub a_team: Option<usize>,
}

#[derive(Debug, Clone)]
pub(crate) struct SimFixture {
    pub a: usize,
    pub b: usize,
    pub round: String,
    pub division: Option<u32>,
    pub counts_for_table: bool,
    pub pinned: Option<(u32, u32)>,
}

#[derive(Debug, Clone)]
pub(crate) struct SimModel {
    pub sport: Sport,
    pub teams: Vec<SimTeam>,
    pub fixtures: Vec<SimFixture>,
    pub partitions: Vec<(Option<u32>, Option<String>)>,
    pub partition_slots: Vec<usize>,
    pub use_partition_slots: bool,
    pub total_playoff_slots: usize,
    pub has_divisions: bool,
    pub has_liguilla: bool,
}

impl SimModel {
    fn build(request: &ForecastRequest<'_>) -> Self {
        let mut names: Vec<&String> = request.teams.keys().collect();
        names.sort();
        let index_of: HashMap<&str, usize> = names
            .iter()
            .enumerate()
            .map(|(i, name)| (name.as_str(), i))
            .collect();

        let partitions: Vec<(Option<u32>, Option<String>)> = names
            .iter()
            .map(|name| {
                request
                    .team_division
                    .get(name.as_str())
                    .cloned()
                    .unwrap_or((None, None))
            })
            .collect::<std::collections::BTreeSet<_>>()
            .into_iter()
            .collect();

        let teams: Vec<SimTeam> = names
            .iter()
            .map(|name| {
                let team = &request.teams[name.as_str()];
                let (division, group) = request
                    .team_division
                    .get(name.as_str())
                    .cloned()
                    .unwrap_or((None, None));
                let partition = partitions
                    .iter()
                    .position(|p| *p == (division, group.clone()))
                    .unwrap_or(0);
                SimTeam {
                    name: (*name).clone(),
                    rating: team.rating,
                    games_played: team.games_played,
                    games_before_winter: team.games_before_winter,
                    total_group_games: request
                        .total_group_games
                        .get(name.as_str())
                        .copied()
                        .unwrap_or(0),
                    division,
                    partition,
                    real_points: request.real_points.get(name.as_str()).copied().unwrap_or(0),
                    is_b: is_b_team(name),
                    a_team: None,
                }
            })
            .collect();

        // Resolve B teams to their primary squads for A-protection.
        let mut teams = teams;
        for i in 0..teams.len() {
            if teams[i].is_b {
                if let Some(primary) = crate::models::a_team_name(&teams[i].name) {
                    teams[i].a_team = index_of.get(primary).copied();
                }
            }
        }

        let fixtures: Vec<SimFixture> = request
            .fixtures
            .iter()
            .filter_map(|fx| {
                let a = index_of.get(fx.team_a.as_str()).copied()?;
                let b = index_of.get(fx.team_b.as_str()).copied()?;
                Some(SimFixture {
                    a,
                    b,
                    round: fx.round.clone(),
                    division: fx.division,
                    counts_for_table: !is_playoff_round(&fx.round),
                    pinned: request.hardsets.and_then(|h| h.get(&fx.id)),
                })
            })
            .collect();

        let partition_slots: Vec<usize> = partitions
            .iter()
            .map(|p| request.playoff_slots.get(p).copied().unwrap_or(0))
            .collect();

        SimModel {
            sport: request.sport,
            has_divisions: teams.iter().any(|t| t.division.is_some()),
            teams,
            fixtures,
            partitions,
            use_partition_slots: !request.playoff_slots.is_empty(),
            partition_slots,
            total_playoff_slots: request.total_playoff_slots,
            has_liguilla: request.has_liguilla,
        }
    }
}

/// Streaming aggregation state: O(1) per tracked quantity, independent of
/// the iteration count.
#[derive(Debug, Clone, Default)]
pub(crate) struct TeamAgg {
    pub points_sum: f64,
    pub points_sq: f64,
    pub place_sum: f64,
    pub place_sq: f64,
    pub rating_sum: f64,
    pub rating_sq: f64,
    pub playoffs: u64,
    pub semis: u64,
    pub finals: u64,
    pub champion: u64,
    pub promoted: u64,
    pub relegated: u64,
}

#[derive(Debug, Clone, Default)]
pub(crate) struct FixtureAgg {
    pub win_a: u64,
    pub draw: u64,
    pub win_b: u64,
    pub rating_a_sum: f64,
    pub rating_a_sq: f64,
    pub rating_b_sum: f64,
    pub rating_b_sq: f64,
    pub scores: HashMap<(u32, u32), u64>,
}

#[derive(Debug, Clone)]
pub(crate) struct Aggregates {
    pub teams: Vec<TeamAgg>,
    pub fixtures: Vec<FixtureAgg>,
}

impl Aggregates {
    fn new(n_teams: usize, n_fixtures: usize) -> Self {
        Self {
            teams: vec![TeamAgg::default(); n_teams],
            fixtures: vec![FixtureAgg::default(); n_fixtures],
        }
    }

    fn merge(mut self, other: Aggregates) -> Aggregates {
        for (mine, theirs) in self.teams.iter_mut().zip(other.teams) {
            mine.points_sum += theirs.points_sum;
            mine.points_sq += theirs.points_sq;
            mine.place_sum += theirs.place_sum;
            mine.place_sq += theirs.place_sq;
            mine.rating_sum += theirs.rating_sum;
            mine.rating_sq += theirs.rating_sq;
            mine.playoffs += theirs.playoffs;
            mine.semis += theirs.semis;
            mine.finals += theirs.finals;
            mine.champion += theirs.champion;
            mine.promoted += theirs.promoted;
            mine.relegated += theirs.relegated;
        }
        for (mine, theirs) in self.fixtures.iter_mut().zip(other.fixtures) {
            mine.win_a += theirs.win_a;
            mine.draw += theirs.draw;
            mine.win_b += theirs.win_b;
            mine.rating_a_sum += theirs.rating_a_sum;
            mine.rating_a_sq += theirs.rating_a_sq;
            mine.rating_b_sum += theirs.rating_b_sum;
            mine.rating_b_sq += theirs.rating_b_sq;
            for (key, count) in theirs.scores {
                *mine.scores.entry(key).or_default() += count;
            }
        }
        self
    }
}

fn std_dev(sum: f64, sq: f64, n: f64) -> f64 {
    let mean = sum / n;
    (sq / n - mean * mean).max(0.0).sqrt()
}

/// Iterations handled by one worker task before its partial sums are
/// handed back. Boundaries are fixed up front so the merge order, and with
/// it every floating-point sum, is identical from run to run.
const WORKER_CHUNK: usize = 256;

/// Runs the parallel Monte-Carlo projection. Iterations are independent;
/// each worker accumulates into its own partial sums over a fixed chunk of
/// the iteration range, and the driver merges the partials in chunk order,
/// so results are bitwise reproducible for a fixed seed.
pub fn forecast(request: &ForecastRequest<'_>, progress: &ProgressHandle) -> Forecast {
    let model = SimModel::build(request);
    let iterations = request.params.iterations;
    let batch = request.params.effective_batch();

    let mut agg = Aggregates::new(model.teams.len(), model.fixtures.len());
    let mut start = 0usize;
    while start < iterations {
        let end = (start + batch).min(iterations);
        let chunks: Vec<(usize, usize)> = (start..end)
            .step_by(WORKER_CHUNK)
            .map(|s| (s, (s + WORKER_CHUNK).min(end)))
            .collect();
        let partials: Vec<Aggregates> = chunks
            .into_par_iter()
            .map(|(chunk_start, chunk_end)| {
                let mut acc = Aggregates::new(model.teams.len(), model.fixtures.len());
                for i in chunk_start..chunk_end {
                    let seed = request.params.base_seed.wrapping_add(i as u64);
                    iteration::run_iteration(&model, request.engine, request.sampler, seed, &mut acc);
                }
                acc
            })
            .collect();
        for partial in partials {
            agg = agg.merge(partial);
        }
        progress.advance((end - start) as u64);
        start = end;
    }

    let n = iterations.max(1) as f64;
    let teams = model
        .teams
        .iter()
        .zip(&agg.teams)
        .map(|(team, t)| TeamForecast {
            team: team.name.clone(),
            p_playoffs: t.playoffs as f64 / n,
            p_semifinal: t.semis as f64 / n,
            p_final: t.finals as f64 / n,
            p_champion: t.champion as f64 / n,
            p_promotion: t.promoted as f64 / n,
            p_relegation: t.relegated as f64 / n,
            expected_points: t.points_sum / n,
            expected_points_std: std_dev(t.points_sum, t.points_sq, n),
            expected_place: t.place_sum / n,
            expected_place_std: std_dev(t.place_sum, t.place_sq, n),
            avg_final_rating: t.rating_sum / n,
            avg_final_rating_std: std_dev(t.rating_sum, t.rating_sq, n),
        })
        .collect();

    // Re-associate aggregates with the original fixture records; fixtures
    // naming unknown teams were dropped at model build time.
    let kept: Vec<&Fixture> = request
        .fixtures
        .iter()
        .filter(|fx| {
            request.teams.contains_key(fx.team_a.as_str())
                && request.teams.contains_key(fx.team_b.as_str())
        })
        .collect();
    let fixtures = kept
        .iter()
        .zip(&agg.fixtures)
        .map(|(fx, f)| {
            let mut distribution: Vec<((u32, u32), u64)> =
                f.scores.iter().map(|(&k, &v)| (k, v)).collect();
            distribution.sort_by(|a, b| b.1.cmp(&a.1).then(a.0.cmp(&b.0)));
            FixtureForecast {
                fixture: (*fx).clone(),
                p_win_a: f.win_a as f64 / n,
                p_draw: f.draw as f64 / n,
                p_win_b: f.win_b as f64 / n,
                rating_a_mean: f.rating_a_sum / n,
                rating_a_std: std_dev(f.rating_a_sum, f.rating_a_sq, n),
                rating_b_mean: f.rating_b_sum / n,
                rating_b_std: std_dev(f.rating_b_sum, f.rating_b_sq, n),
                score_distribution: distribution
                    .into_iter()
                    .map(|((a, b), count)| {
                        (format!("{a}-{b}"), 100.0 * count as f64 / n)
                    })
                    .collect(),
            }
        })
        .collect();

    Forecast {
        iterations,
        teams,
        fixtures,
    }
}

/// (division, group) of every team, taken from its regular-phase rows.
pub fn team_divisions(
    matches: &[crate::models::MatchRecord],
) -> HashMap<String, (Option<u32>, Option<String>)> {
    let mut divisions = HashMap::new();
    for record in matches.iter().filter(|m| !m.is_playoff()) {
        for name in [&record.team_a, &record.team_b] {
            divisions.insert(name.clone(), (record.division, record.group.clone()));
        }
    }
    divisions
}

/// Whether the season schedule contains mini-league or maintenance rounds.
pub fn detect_liguilla(matches: &[crate::models::MatchRecord]) -> bool {
    matches.iter().any(|m| {
        let round = m.round.trim().to_ascii_uppercase();
        round.starts_with("LM") || round.starts_with("PM")
    })
}

/// Derives playoff slot counts from the drawn bracket: every distinct team
/// scheduled in a quarter-final (`E1`) round occupies one slot of its
/// (division, group). Before the draw the map is empty and the caller
/// falls back to a global eight-team cut.
pub fn parse_playoff_slots(
    matches: &[crate::models::MatchRecord],
) -> (HashMap<(Option<u32>, Option<String>), usize>, usize) {
    let divisions = team_divisions(matches);
    let mut seen: std::collections::HashSet<&str> = std::collections::HashSet::new();
    let mut slots: HashMap<(Option<u32>, Option<String>), usize> = HashMap::new();
    for record in matches {
        if !record.round.trim().eq_ignore_ascii_case("E1") {
            continue;
        }
        for name in [&record.team_a, &record.team_b] {
            if seen.insert(name.as_str()) {
                let partition = divisions.get(name.as_str()).cloned().unwrap_or((None, None));
                *slots.entry(partition).or_default() += 1;
            }
        }
    }
    let total = seen.len();
    if total == 0 {
        (HashMap::new(), 8)
    } else {
        (slots, total)
    }
}

/// Points already banked in completed matches, read off the real standings.
pub fn real_points(standings: &[crate::models::StandingRow]) -> HashMap<String, u32> {
    standings
        .iter()
        .map(|row| (row.team.clone(), row.points))
        .collect()
}

#[cfg(test)]
mod tests;

use std::collections::HashMap;

use super::*;
use crate::models::{Fixture, MatchRecord, SimulationParams, Sport, Team};
use crate::progress::ProgressHandle;
use crate::rating::RatingEngine;
use crate::sampler::OutcomeSampler;

/// Owns every input a `ForecastRequest` borrows, so tests can build small
/// leagues declaratively.
struct League {
    sport: Sport,
    teams: HashMap<String, Team>,
    fixtures: Vec<Fixture>,
    engine: RatingEngine,
    sampler: OutcomeSampler,
    total_group_games: HashMap<String, u32>,
    real_points: HashMap<String, u32>,
    team_division: HashMap<String, (Option<u32>, Option<String>)>,
    playoff_slots: HashMap<(Option<u32>, Option<String>), usize>,
    total_playoff_slots: usize,
    has_liguilla: bool,
}

impl League {
    fn new(sport: Sport, names: &[(&str, f64)]) -> Self {
        let teams: HashMap<String, Team> = names
            .iter()
            .map(|(name, rating)| (name.to_string(), Team::new(*name, *rating)))
            .collect();
        League {
            sport,
            total_group_games: teams.keys().map(|n| (n.clone(), 10)).collect(),
            real_points: HashMap::new(),
            team_division: HashMap::new(),
            playoff_slots: HashMap::new(),
            total_playoff_slots: 8,
            has_liguilla: false,
            fixtures: Vec::new(),
            engine: RatingEngine::new(),
            sampler: OutcomeSampler::new(sport),
            teams,
        }
    }

    fn fixture(&mut self, round: &str, a: &str, b: &str) {
        self.fixtures.push(Fixture {
            id: format!("TEST_{round}_{a}_{b}"),
            team_a: a.to_string(),
            team_b: b.to_string(),
            round: round.to_string(),
            date: String::new(),
            time: String::new(),
            division: None,
            group: None,
        });
    }

    fn run(&self, params: SimulationParams, hardsets: Option<&crate::HardsetManager>) -> crate::models::Forecast {
        let request = ForecastRequest {
            sport: self.sport,
            teams: &self.teams,
            fixtures: &self.fixtures,
            engine: &self.engine,
            sampler: &self.sampler,
            params,
            total_group_games: &self.total_group_games,
            real_points: &self.real_points,
            team_division: &self.team_division,
            playoff_slots: &self.playoff_slots,
            total_playoff_slots: self.total_playoff_slots,
            has_liguilla: self.has_liguilla,
            hardsets,
        };
        forecast(&request, &ProgressHandle::hidden())
    }
}

#[test]
fn test_two_equal_teams_split_the_title() {
    let mut league = League::new(Sport::Futsal, &[("A", 1500.0), ("B", 1500.0)]);
    for round in 1..=4 {
        league.fixture(&round.to_string(), "A", "B");
    }
    let result = league.run(SimulationParams::default(), None);

    let a = result.team("A").unwrap();
    let b = result.team("B").unwrap();
    assert!((a.p_champion - 0.5).abs() < 0.02, "p_champion(A) = {}", a.p_champion);
    assert!((b.p_champion - 0.5).abs() < 0.02, "p_champion(B) = {}", b.p_champion);
    assert!(
        (a.expected_points - b.expected_points).abs() <= 0.3,
        "expected points diverged: {} vs {}",
        a.expected_points,
        b.expected_points
    );
}

#[test]
fn test_hardset_scores_appear_in_every_iteration() {
    let mut league = League::new(Sport::Futsal, &[("A", 1500.0), ("B", 1500.0), ("C", 1500.0)]);
    league.fixture("1", "A", "B");
    league.fixture("2", "B", "C");

    let mut hardsets = crate::HardsetManager::new();
    hardsets.add("TEST_1_A_B", 5, 0);

    let result = league.run(SimulationParams::with_iterations(2_000), Some(&hardsets));
    let pinned = &result.fixtures[0];
    assert_eq!(pinned.p_win_a, 1.0);
    assert_eq!(pinned.p_draw, 0.0);
    assert_eq!(pinned.score_distribution, vec![("5-0".to_string(), 100.0)]);
    // The other fixture stays stochastic.
    assert!(result.fixtures[1].score_distribution.len() > 1);
}

#[test]
fn test_empty_fixture_list_returns_real_points_exactly() {
    let mut league = League::new(Sport::Futsal, &[("A", 1600.0), ("B", 1400.0)]);
    league.real_points = [("A".to_string(), 12u32), ("B".to_string(), 7u32)].into();
    let result = league.run(SimulationParams::with_iterations(500), None);

    let a = result.team("A").unwrap();
    let b = result.team("B").unwrap();
    assert_eq!(a.expected_points, 12.0);
    assert_eq!(b.expected_points, 7.0);
    assert_eq!(a.expected_points_std, 0.0);
}

#[test]
fn test_same_seed_is_bitwise_reproducible() {
    let mut league = League::new(
        Sport::Futsal,
        &[("A", 1550.0), ("B", 1500.0), ("C", 1450.0), ("D", 1400.0)],
    );
    for (round, (a, b)) in [("1", ("A", "B")), ("1", ("C", "D")), ("2", ("A", "C")), ("2", ("B", "D"))] {
        league.fixture(round, a, b);
    }
    let params = SimulationParams {
        iterations: 1_000,
        base_seed: 99,
        ..Default::default()
    };
    let first = league.run(params.clone(), None);
    let second = league.run(params, None);

    for (x, y) in first.teams.iter().zip(&second.teams) {
        assert_eq!(x.expected_points, y.expected_points);
        assert_eq!(x.p_champion, y.p_champion);
        assert_eq!(x.avg_final_rating, y.avg_final_rating);
    }
    for (x, y) in first.fixtures.iter().zip(&second.fixtures) {
        assert_eq!(x.p_win_a, y.p_win_a);
        assert_eq!(x.score_distribution, y.score_distribution);
    }
}

#[test]
fn test_different_seeds_diverge() {
    let mut league = League::new(Sport::Futsal, &[("A", 1500.0), ("B", 1500.0)]);
    for round in 1..=4 {
        league.fixture(&round.to_string(), "A", "B");
    }
    let first = league.run(
        SimulationParams { iterations: 500, base_seed: 1, ..Default::default() },
        None,
    );
    let second = league.run(
        SimulationParams { iterations: 500, base_seed: 2, ..Default::default() },
        None,
    );
    assert_ne!(
        first.team("A").unwrap().expected_points,
        second.team("A").unwrap().expected_points
    );
}

#[test]
fn test_probability_containment_chain() {
    let names: Vec<(String, f64)> = (0..10)
        .map(|i| (format!("T{i:02}"), 1400.0 + 20.0 * i as f64))
        .collect();
    let refs: Vec<(&str, f64)> = names.iter().map(|(n, r)| (n.as_str(), *r)).collect();
    let mut league = League::new(Sport::Futsal, &refs);
    // Single round robin.
    for i in 0..10 {
        for j in (i + 1)..10 {
            let (a, b) = (format!("T{i:02}"), format!("T{j:02}"));
            league.fixture(&format!("{}", i + 1), &a, &b);
        }
    }
    let result = league.run(SimulationParams::with_iterations(2_000), None);

    let mut playoff_mass = 0.0;
    for team in &result.teams {
        assert!(team.p_champion <= team.p_final + 1e-12);
        assert!(team.p_final <= team.p_semifinal + 1e-12);
        assert!(team.p_semifinal <= team.p_playoffs + 1e-12);
        assert!(team.p_promotion + team.p_relegation <= 1.0);
        playoff_mass += team.p_playoffs;
    }
    // Eight global slots for ten teams: the playoff mass is exactly eight.
    assert!((playoff_mass - 8.0).abs() < 1e-9, "playoff mass {playoff_mass}");
}

#[test]
fn test_b_teams_never_qualify() {
    let mut league = League::new(
        Sport::Futsal,
        &[("EGI", 1500.0), ("EGI B", 2500.0), ("EI", 1500.0), ("BIO", 1500.0)],
    );
    league.total_playoff_slots = 2;
    league.fixture("1", "EGI", "EGI B");
    league.fixture("1", "EI", "BIO");
    let result = league.run(SimulationParams::with_iterations(1_000), None);
    assert_eq!(result.team("EGI B").unwrap().p_playoffs, 0.0);
}

#[test]
fn test_parse_playoff_slots_from_drawn_bracket() {
    let make = |round: &str, a: &str, b: &str| MatchRecord {
        round: round.to_string(),
        date: String::new(),
        time: String::new(),
        venue: String::new(),
        team_a: a.to_string(),
        team_b: b.to_string(),
        score_a: None,
        score_b: None,
        sets_a: None,
        sets_b: None,
        absences: Vec::new(),
        division: None,
        group: None,
    };
    let mut regular = make("1", "A", "B");
    regular.group = Some("A".to_string());
    let mut regular2 = make("1", "C", "D");
    regular2.group = Some("B".to_string());
    let matches = vec![
        regular,
        regular2,
        make("E1", "A", "C"),
        make("E1", "B", "D"),
    ];
    let (slots, total) = parse_playoff_slots(&matches);
    assert_eq!(total, 4);
    assert_eq!(slots[&(None, Some("A".to_string()))], 2);
    assert_eq!(slots[&(None, Some("B".to_string()))], 2);

    let (default_slots, default_total) = parse_playoff_slots(&matches[..2]);
    assert!(default_slots.is_empty());
    assert_eq!(default_total, 8);
}

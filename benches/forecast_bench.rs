use std::collections::HashMap;

use criterion::{black_box, criterion_group, criterion_main, BenchmarkId, Criterion};
use tacaua_forecast::models::{Fixture, SimulationParams, Sport, Team};
use tacaua_forecast::monte_carlo::{forecast, ForecastRequest};
use tacaua_forecast::rating::MatchUpdate;
use tacaua_forecast::{OutcomeSampler, ProgressHandle, RatingEngine};

struct LeagueFixture {
    teams: HashMap<String, Team>,
    fixtures: Vec<Fixture>,
    total_group_games: HashMap<String, u32>,
    real_points: HashMap<String, u32>,
    team_division: HashMap<String, (Option<u32>, Option<String>)>,
    playoff_slots: HashMap<(Option<u32>, Option<String>), usize>,
}

/// A realistic single-division league: 12 teams, half the double round
/// robin still to play.
fn twelve_team_league() -> LeagueFixture {
    let mut teams = HashMap::new();
    let mut total_group_games = HashMap::new();
    let mut real_points = HashMap::new();
    for i in 0..12u32 {
        let name = format!("T{i:02}");
        teams.insert(name.clone(), Team::new(&name, 1350.0 + 30.0 * i as f64));
        total_group_games.insert(name.clone(), 22);
        real_points.insert(name, 3 * (i / 2));
    }
    let mut fixtures = Vec::new();
    for i in 0..12u32 {
        for j in 0..12u32 {
            if i == j || (i + j) % 2 == 0 {
                continue;
            }
            fixtures.push(Fixture {
                id: format!("BENCH_{}_T{i:02}_T{j:02}", (i + j) % 11 + 1),
                team_a: format!("T{i:02}"),
                team_b: format!("T{j:02}"),
                round: ((i + j) % 11 + 1).to_string(),
                date: String::new(),
                time: String::new(),
                division: None,
                group: None,
            });
        }
    }
    LeagueFixture {
        teams,
        fixtures,
        total_group_games,
        real_points,
        team_division: HashMap::new(),
        playoff_slots: HashMap::new(),
    }
}

fn benchmark_single_update(c: &mut Criterion) {
    let engine = RatingEngine::new();
    let update = MatchUpdate {
        rating_a: 1100.0,
        rating_b: 900.0,
        score_a: 3,
        score_b: 1,
        game_index_a: 5,
        game_index_b: 5,
        total_group_games_a: 10,
        total_group_games_b: 10,
        games_before_winter_a: None,
        games_before_winter_b: None,
        round: "5",
        has_absence: false,
    };
    c.bench_function("rating_single_update", |b| {
        b.iter(|| engine.update_match(black_box(&update)))
    });
}

fn benchmark_forecast(c: &mut Criterion) {
    let league = twelve_team_league();
    let engine = RatingEngine::new();
    let sampler = OutcomeSampler::new(Sport::Futsal);

    let mut group = c.benchmark_group("forecast");
    group.sample_size(10);
    for iterations in [1_000usize, 10_000] {
        group.bench_with_input(
            BenchmarkId::from_parameter(iterations),
            &iterations,
            |b, &iterations| {
                b.iter(|| {
                    let request = ForecastRequest {
                        sport: Sport::Futsal,
                        teams: &league.teams,
                        fixtures: &league.fixtures,
                        engine: &engine,
                        sampler: &sampler,
                        params: SimulationParams::with_iterations(iterations),
                        total_group_games: &league.total_group_games,
                        real_points: &league.real_points,
                        team_division: &league.team_division,
                        playoff_slots: &league.playoff_slots,
                        total_playoff_slots: 8,
                        has_liguilla: false,
                        hardsets: None,
                    };
                    forecast(black_box(&request), &ProgressHandle::hidden())
                })
            },
        );
    }
    group.finish();
}

criterion_group!(benches, benchmark_single_update, benchmark_forecast);
criterion_main!(benches);

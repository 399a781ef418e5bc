use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};

use crate::rating::{MatchUpdate, RatingEngine};
use crate::sampler::OutcomeSampler;

use super::promotion;
use super::{Aggregates, SimModel};

/// Mutable state owned by a single iteration.
pub(crate) struct IterationState {
    pub ratings: Vec<f64>,
    pub games: Vec<u32>,
    pub points: Vec<u32>,
}

/// Replays the remainder of the season once: regular phase in input order,
/// playoff qualification, bracket, and promotion/relegation, folding the
/// outcome into the worker-local aggregates.
pub(crate) fn run_iteration(
    model: &SimModel,
    engine: &RatingEngine,
    sampler: &OutcomeSampler,
    seed: u64,
    agg: &mut Aggregates,
) {
    let mut rng = StdRng::seed_from_u64(seed);
    let mut state = IterationState {
        ratings: model.teams.iter().map(|t| t.rating).collect(),
        games: model.teams.iter().map(|t| t.games_played).collect(),
        points: model.teams.iter().map(|t| t.real_points).collect(),
    };

    for (index, fx) in model.fixtures.iter().enumerate() {
        let pre_a = state.ratings[fx.a];
        let pre_b = state.ratings[fx.b];
        let (score_a, score_b) = fx
            .pinned
            .unwrap_or_else(|| sampler.sample(pre_a, pre_b, false, fx.division, &mut rng));

        apply_update(model, engine, &mut state, fx.a, fx.b, score_a, score_b, &fx.round);

        if fx.counts_for_table {
            let (points_a, points_b) = model.sport.points(score_a, score_b, None, None);
            state.points[fx.a] += points_a;
            state.points[fx.b] += points_b;
        }

        let f = &mut agg.fixtures[index];
        match score_a.cmp(&score_b) {
            std::cmp::Ordering::Greater => f.win_a += 1,
            std::cmp::Ordering::Equal => f.draw += 1,
            std::cmp::Ordering::Less => f.win_b += 1,
        }
        f.rating_a_sum += pre_a;
        f.rating_a_sq += pre_a * pre_a;
        f.rating_b_sum += pre_b;
        f.rating_b_sq += pre_b * pre_b;
        *f.scores.entry((score_a, score_b)).or_default() += 1;
    }

    // Ranking: points first, simulated rating as the deterministic tie cut.
    let mut order: Vec<usize> = (0..model.teams.len()).collect();
    order.sort_by(|&i, &j| {
        state.points[j]
            .cmp(&state.points[i])
            .then_with(|| {
                state.ratings[j]
                    .partial_cmp(&state.ratings[i])
                    .unwrap_or(std::cmp::Ordering::Equal)
            })
            .then(i.cmp(&j))
    });

    let mut partition_orders: Vec<Vec<usize>> = vec![Vec::new(); model.partitions.len()];
    for &team in &order {
        partition_orders[model.teams[team].partition].push(team);
    }
    for group_order in &partition_orders {
        for (rank, &team) in group_order.iter().enumerate() {
            let place = (rank + 1) as f64;
            agg.teams[team].place_sum += place;
            agg.teams[team].place_sq += place * place;
        }
    }

    let qualified = qualify(model, &order, &partition_orders);
    for &team in &qualified {
        agg.teams[team].playoffs += 1;
    }

    play_bracket(model, engine, sampler, &mut state, &qualified, &mut rng, agg);

    let (promoted, relegated) = promotion::resolve(model, &state.ratings, &order, &partition_orders);
    for &team in &promoted {
        agg.teams[team].promoted += 1;
    }
    for &team in &relegated {
        agg.teams[team].relegated += 1;
    }

    for (team, agg_team) in agg.teams.iter_mut().enumerate() {
        let points = state.points[team] as f64;
        agg_team.points_sum += points;
        agg_team.points_sq += points * points;
        let rating = state.ratings[team];
        agg_team.rating_sum += rating;
        agg_team.rating_sq += rating * rating;
    }
}

#[allow(clippy::too_many_arguments)]
fn apply_update(
    model: &SimModel,
    engine: &RatingEngine,
    state: &mut IterationState,
    a: usize,
    b: usize,
    score_a: u32,
    score_b: u32,
    round: &str,
) {
    state.games[a] += 1;
    state.games[b] += 1;
    let update = MatchUpdate {
        rating_a: state.ratings[a],
        rating_b: state.ratings[b],
        score_a,
        score_b,
        game_index_a: state.games[a],
        game_index_b: state.games[b],
        total_group_games_a: model.teams[a].total_group_games,
        total_group_games_b: model.teams[b].total_group_games,
        games_before_winter_a: model.teams[a].games_before_winter,
        games_before_winter_b: model.teams[b].games_before_winter,
        round,
        has_absence: false,
    };
    let (delta_a, delta_b) = engine.update_match(&update);
    state.ratings[a] += delta_a as f64;
    state.ratings[b] += delta_b as f64;
}

/// Picks the playoff field: per-(division, group) slot counts when the
/// competition defines them, otherwise a single global cut. B teams are
/// never eligible.
fn qualify(model: &SimModel, order: &[usize], partition_orders: &[Vec<usize>]) -> Vec<usize> {
    let mut qualified: Vec<usize> = if model.use_partition_slots {
        let mut picked = Vec::new();
        for (partition, group_order) in partition_orders.iter().enumerate() {
            let slots = model.partition_slots[partition];
            if slots == 0 {
                continue;
            }
            picked.extend(
                group_order
                    .iter()
                    .copied()
                    .filter(|&team| !model.teams[team].is_b)
                    .take(slots),
            );
        }
        picked
    } else {
        order
            .iter()
            .copied()
            .filter(|&team| !model.teams[team].is_b)
            .take(model.total_playoff_slots)
            .collect()
    };

    // Seed order follows the overall ranking.
    let rank_of: Vec<usize> = {
        let mut ranks = vec![0usize; model.teams.len()];
        for (rank, &team) in order.iter().enumerate() {
            ranks[team] = rank;
        }
        ranks
    };
    qualified.sort_by_key(|&team| rank_of[team]);
    qualified
}

/// Single-elimination bracket: quarters seeded 1-8/2-7/3-6/4-5, degrading
/// to a four-team bracket and then a bare final as the field shrinks.
fn play_bracket(
    model: &SimModel,
    engine: &RatingEngine,
    sampler: &OutcomeSampler,
    state: &mut IterationState,
    qualified: &[usize],
    rng: &mut StdRng,
    agg: &mut Aggregates,
) {
    let n = qualified.len();
    let mut semifinalists: Vec<usize> = Vec::new();
    let mut finalists: Vec<usize> = Vec::new();

    if n >= 8 {
        for (x, y) in [(0usize, 7usize), (1, 6), (2, 5), (3, 4)] {
            semifinalists.push(play_match(
                model, engine, sampler, state, qualified[x], qualified[y], "E1", rng,
            ));
        }
    } else if n >= 4 {
        semifinalists.extend_from_slice(&qualified[..4]);
    }

    if semifinalists.len() == 4 {
        let first = play_match(
            model,
            engine,
            sampler,
            state,
            semifinalists[0],
            semifinalists[3],
            "E2",
            rng,
        );
        let second = play_match(
            model,
            engine,
            sampler,
            state,
            semifinalists[1],
            semifinalists[2],
            "E2",
            rng,
        );
        finalists = vec![first, second];
    } else if n >= 2 {
        finalists = qualified[..2].to_vec();
    }

    let champion = (finalists.len() == 2).then(|| {
        play_match(
            model,
            engine,
            sampler,
            state,
            finalists[0],
            finalists[1],
            "E3",
            rng,
        )
    });

    for &team in &semifinalists {
        agg.teams[team].semis += 1;
    }
    if semifinalists.is_empty() {
        // A two- or three-team field jumps straight to the final; the
        // finalists still count as semifinal reachers.
        for &team in &finalists {
            agg.teams[team].semis += 1;
        }
    }
    for &team in &finalists {
        agg.teams[team].finals += 1;
    }
    if let Some(team) = champion {
        agg.teams[team].champion += 1;
    }
}

#[allow(clippy::too_many_arguments)]
fn play_match(
    model: &SimModel,
    engine: &RatingEngine,
    sampler: &OutcomeSampler,
    state: &mut IterationState,
    a: usize,
    b: usize,
    round: &str,
    rng: &mut impl Rng,
) -> usize {
    let (score_a, score_b) = sampler.sample(
        state.ratings[a],
        state.ratings[b],
        true,
        model.teams[a].division,
        rng,
    );
    apply_update(model, engine, state, a, b, score_a, score_b, round);
    if score_a > score_b {
        a
    } else {
        b
    }
}

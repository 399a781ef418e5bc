use std::collections::HashSet;

use super::SimModel;

/// Resolves promotion and relegation for one simulated season. The rule set
/// is keyed by the number of Division-2 groups; mini-league and playoff
/// slots are decided by the highest simulated rating among the candidates.
/// A promoting B team protects its primary squad from relegation.
pub(crate) fn resolve(
    model: &SimModel,
    ratings: &[f64],
    order: &[usize],
    partition_orders: &[Vec<usize>],
) -> (Vec<usize>, Vec<usize>) {
    if !model.has_divisions {
        return (Vec::new(), Vec::new());
    }

    // Division-1 ranking, best to worst, across its partitions.
    let division_one: Vec<usize> = order
        .iter()
        .copied()
        .filter(|&team| model.teams[team].division == Some(1))
        .collect();

    // Division-2 group orderings, in partition order (group label order).
    let division_two: Vec<&Vec<usize>> = model
        .partitions
        .iter()
        .enumerate()
        .filter(|(_, (division, _))| *division == Some(2))
        .map(|(partition, _)| &partition_orders[partition])
        .collect();

    if division_one.is_empty() || division_two.is_empty() {
        return (Vec::new(), Vec::new());
    }

    // The one- and two-group rule sets name their promotion slots "non-B";
    // the direct-promotion rules do not, which is how a B team can go up
    // and trigger A-protection.
    let nth_non_b = |group_order: &[usize], nth: usize| -> Option<usize> {
        group_order
            .iter()
            .copied()
            .filter(|&team| !model.teams[team].is_b)
            .nth(nth)
    };
    let nth_any = |group_order: &[usize], nth: usize| -> Option<usize> {
        group_order.get(nth).copied()
    };
    let bottom = |count: usize| -> Vec<usize> {
        let len = division_one.len();
        division_one[len.saturating_sub(count)..].to_vec()
    };

    let mut promoted: Vec<usize> = Vec::new();
    let mut relegated: Vec<usize>;

    match division_two.len() {
        1 => {
            promoted.extend(nth_non_b(division_two[0], 0));
            promoted.extend(nth_non_b(division_two[0], 1));
            relegated = bottom(2);
        }
        2 if !model.has_liguilla => {
            for group_order in &division_two {
                promoted.extend(nth_non_b(group_order, 0));
                promoted.extend(nth_non_b(group_order, 1));
            }
            relegated = bottom(4);
        }
        _ => {
            // Two groups with a mini-league, or three and more groups: the
            // group winners go up directly and the runners-up plus the
            // fourth team from the bottom of Division 1 contest the last
            // slot.
            relegated = bottom(3);
            for group_order in &division_two {
                promoted.extend(nth_any(group_order, 0));
            }
            let survivor = (division_one.len() >= 4)
                .then(|| division_one[division_one.len() - 4]);
            let mut candidates: Vec<usize> = division_two
                .iter()
                .filter_map(|group_order| nth_any(group_order, 1))
                .collect();
            candidates.extend(survivor);
            resolve_playout(model, ratings, &candidates, survivor, &mut promoted, &mut relegated);
        }
    }

    // A-protection: a promoting B team shields its primary squad.
    let protected: HashSet<usize> = promoted
        .iter()
        .filter_map(|&team| model.teams[team].a_team)
        .collect();
    relegated.retain(|team| !protected.contains(team));

    (promoted, relegated)
}

/// Decides a promotion playout by highest simulated rating. When a
/// Division-2 candidate wins, the Division-1 survivor also goes down.
fn resolve_playout(
    model: &SimModel,
    ratings: &[f64],
    candidates: &[usize],
    survivor: Option<usize>,
    promoted: &mut Vec<usize>,
    relegated: &mut Vec<usize>,
) {
    let Some(&winner) = candidates.iter().max_by(|&&a, &&b| {
        ratings[a]
            .partial_cmp(&ratings[b])
            .unwrap_or(std::cmp::Ordering::Equal)
    }) else {
        return;
    };
    if model.teams[winner].division == Some(2) {
        promoted.push(winner);
        if let Some(survivor) = survivor {
            relegated.push(survivor);
        }
    }
}

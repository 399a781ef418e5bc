use std::collections::{BTreeMap, HashMap, HashSet};

use crate::models::{MatchRecord, Sport, StandingRow};

/// Partition key for a standings table. Which variant applies depends on
/// the columns present in the fixture set, not on individual rows.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash)]
enum Partition {
    DivisionGroup(u32, String),
    Group(String),
    Division(u32),
    Single,
}

#[derive(Debug, Clone, Default)]
struct TeamStats {
    points: u32,
    played: u32,
    wins: u32,
    draws: u32,
    losses: u32,
    goals_for: u32,
    goals_against: u32,
    sets_for: u32,
    sets_against: u32,
    forfeits: u32,
}

impl TeamStats {
    fn goal_difference(&self) -> i64 {
        self.goals_for as i64 - self.goals_against as i64
    }

    fn set_difference(&self) -> i64 {
        self.sets_for as i64 - self.sets_against as i64
    }
}

/// Computes the league tables for the regular phase of a season, one table
/// per (division, group) partition, with the full tiebreak cascade applied.
pub fn compute(matches: &[MatchRecord], sport: Sport, team_set: &HashSet<String>) -> Vec<StandingRow> {
    let has_division = matches.iter().any(|m| m.division.is_some());
    let has_group = matches.iter().any(|m| m.group.is_some());

    let regular: Vec<&MatchRecord> = matches.iter().filter(|m| !m.is_playoff()).collect();

    let key_of = |m: &MatchRecord| -> Partition {
        match (has_division, has_group) {
            (true, true) => Partition::DivisionGroup(
                m.division.unwrap_or(0),
                m.group.clone().unwrap_or_default(),
            ),
            (false, true) => Partition::Group(m.group.clone().unwrap_or_default()),
            (true, false) => Partition::Division(m.division.unwrap_or(0)),
            (false, false) => Partition::Single,
        }
    };

    let mut partitions: BTreeMap<Partition, Vec<&MatchRecord>> = BTreeMap::new();
    for &record in &regular {
        partitions.entry(key_of(record)).or_default().push(record);
    }
    if partitions.is_empty() {
        partitions.insert(Partition::Single, Vec::new());
    }

    let mut rows = Vec::new();
    for (partition, records) in &partitions {
        let teams: Vec<String> = if *partition == Partition::Single {
            let mut names: Vec<String> = team_set.iter().cloned().collect();
            names.sort();
            names
        } else {
            let mut names: HashSet<String> = HashSet::new();
            for record in records {
                names.insert(record.team_a.clone());
                names.insert(record.team_b.clone());
            }
            let mut names: Vec<String> = names.into_iter().collect();
            names.sort();
            names
        };

        let stats = accumulate(records, sport, &teams);
        let ordered = rank(&teams, &stats, records, sport);

        let (division, group) = match partition {
            Partition::DivisionGroup(d, g) => (Some(*d), Some(g.clone())),
            Partition::Group(g) => (None, Some(g.clone())),
            Partition::Division(d) => (Some(*d), None),
            Partition::Single => (None, None),
        };
        for (position, team) in ordered.iter().enumerate() {
            let s = &stats[team.as_str()];
            rows.push(StandingRow {
                division,
                group: group.clone(),
                position: position + 1,
                team: team.clone(),
                points: s.points,
                played: s.played,
                wins: s.wins,
                draws: s.draws,
                losses: s.losses,
                goals_for: s.goals_for,
                goals_against: s.goals_against,
                goal_difference: s.goal_difference(),
                sets_for: s.sets_for,
                sets_against: s.sets_against,
                set_difference: s.set_difference(),
                forfeits: s.forfeits,
            });
        }
    }
    rows
}

fn accumulate<'a>(
    records: &[&MatchRecord],
    sport: Sport,
    teams: &'a [String],
) -> HashMap<&'a str, TeamStats> {
    let mut stats: HashMap<&str, TeamStats> = teams
        .iter()
        .map(|name| (name.as_str(), TeamStats::default()))
        .collect();

    for &record in records {
        apply_match(&mut stats, record, sport);
    }
    stats
}

fn apply_match(stats: &mut HashMap<&str, TeamStats>, record: &MatchRecord, sport: Sport) {
    if !stats.contains_key(record.team_a.as_str()) || !stats.contains_key(record.team_b.as_str()) {
        return;
    }
    let Some((score_a, score_b)) = record.effective_scores(sport) else {
        return;
    };

    if let Some(absent) = record.single_absentee() {
        if let Some(entry) = stats.get_mut(absent) {
            entry.forfeits += 1;
        }
    }

    let sets_a = record.sets_a.or_else(|| {
        matches!(sport, Sport::Volleyball).then_some(score_a)
    });
    let sets_b = record.sets_b.or_else(|| {
        matches!(sport, Sport::Volleyball).then_some(score_b)
    });
    let (points_a, points_b) = sport.points(score_a, score_b, sets_a, sets_b);

    {
        let a = stats.get_mut(record.team_a.as_str()).expect("checked above");
        a.points += points_a;
        a.played += 1;
        a.goals_for += score_a;
        a.goals_against += score_b;
        a.sets_for += sets_a.unwrap_or(0);
        a.sets_against += sets_b.unwrap_or(0);
        match score_a.cmp(&score_b) {
            std::cmp::Ordering::Greater => a.wins += 1,
            std::cmp::Ordering::Less => a.losses += 1,
            std::cmp::Ordering::Equal => a.draws += 1,
        }
    }
    {
        let b = stats.get_mut(record.team_b.as_str()).expect("checked above");
        b.points += points_b;
        b.played += 1;
        b.goals_for += score_b;
        b.goals_against += score_a;
        b.sets_for += sets_b.unwrap_or(0);
        b.sets_against += sets_a.unwrap_or(0);
        match score_b.cmp(&score_a) {
            std::cmp::Ordering::Greater => b.wins += 1,
            std::cmp::Ordering::Less => b.losses += 1,
            std::cmp::Ordering::Equal => b.draws += 1,
        }
    }
}

/// Orders teams by points, then resolves each points-tied set through the
/// cascade: forfeits, head-to-head points, head-to-head forfeits,
/// head-to-head set difference, head-to-head goal difference, head-to-head
/// goals for, overall set difference, overall goal difference, overall
/// goals for. Teams never tied on points keep their relative order.
fn rank(
    teams: &[String],
    stats: &HashMap<&str, TeamStats>,
    records: &[&MatchRecord],
    sport: Sport,
) -> Vec<String> {
    let mut ordered: Vec<String> = teams.to_vec();
    ordered.sort_by(|a, b| stats[b.as_str()].points.cmp(&stats[a.as_str()].points));

    let mut result: Vec<String> = Vec::with_capacity(ordered.len());
    let mut i = 0;
    while i < ordered.len() {
        let points = stats[ordered[i].as_str()].points;
        let mut j = i + 1;
        while j < ordered.len() && stats[ordered[j].as_str()].points == points {
            j += 1;
        }
        if j - i == 1 {
            result.push(ordered[i].clone());
        } else {
            let tied = &ordered[i..j];
            result.extend(resolve_tie(tied, stats, records, sport));
        }
        i = j;
    }
    result
}

fn resolve_tie(
    tied: &[String],
    stats: &HashMap<&str, TeamStats>,
    records: &[&MatchRecord],
    sport: Sport,
) -> Vec<String> {
    let tied_set: HashSet<&str> = tied.iter().map(String::as_str).collect();
    let head_to_head: Vec<&MatchRecord> = records
        .iter()
        .filter(|m| tied_set.contains(m.team_a.as_str()) && tied_set.contains(m.team_b.as_str()))
        .copied()
        .collect();

    let mut h2h: HashMap<&str, TeamStats> = tied
        .iter()
        .map(|name| (name.as_str(), TeamStats::default()))
        .collect();
    for &record in &head_to_head {
        apply_match(&mut h2h, record, sport);
    }

    let mut resolved: Vec<String> = tied.to_vec();
    resolved.sort_by(|a, b| {
        let (sa, sb) = (&stats[a.as_str()], &stats[b.as_str()]);
        let (ha, hb) = (&h2h[a.as_str()], &h2h[b.as_str()]);
        sa.forfeits
            .cmp(&sb.forfeits)
            .then_with(|| hb.points.cmp(&ha.points))
            .then_with(|| ha.forfeits.cmp(&hb.forfeits))
            .then_with(|| hb.set_difference().cmp(&ha.set_difference()))
            .then_with(|| hb.goal_difference().cmp(&ha.goal_difference()))
            .then_with(|| hb.goals_for.cmp(&ha.goals_for))
            .then_with(|| sb.set_difference().cmp(&sa.set_difference()))
            .then_with(|| sb.goal_difference().cmp(&sa.goal_difference()))
            .then_with(|| sb.goals_for.cmp(&sa.goals_for))
    });
    resolved
}

#[cfg(test)]
mod tests;

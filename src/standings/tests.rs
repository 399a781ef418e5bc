use std::collections::HashSet;

use super::*;
use crate::models::{MatchRecord, Sport};

fn record(round: &str, a: &str, b: &str, score_a: u32, score_b: u32) -> MatchRecord {
    MatchRecord {
        round: round.to_string(),
        date: String::new(),
        time: String::new(),
        venue: String::new(),
        team_a: a.to_string(),
        team_b: b.to_string(),
        score_a: Some(score_a),
        score_b: Some(score_b),
        sets_a: None,
        sets_b: None,
        absences: Vec::new(),
        division: None,
        group: None,
    }
}

fn teams(names: &[&str]) -> HashSet<String> {
    names.iter().map(|n| n.to_string()).collect()
}

fn position_of(rows: &[crate::models::StandingRow], team: &str) -> usize {
    rows.iter().find(|r| r.team == team).expect("team ranked").position
}

#[test]
fn test_handball_draw_points() {
    // Handball awards 3/1 for a win and 2/2 for a draw.
    let matches = vec![
        record("1", "A", "B", 20, 20),
        record("2", "A", "C", 25, 19),
    ];
    let rows = compute(&matches, Sport::Handball, &teams(&["A", "B", "C"]));
    assert_eq!(rows.iter().find(|r| r.team == "A").unwrap().points, 5);
    assert_eq!(rows.iter().find(|r| r.team == "B").unwrap().points, 2);
    assert_eq!(rows.iter().find(|r| r.team == "C").unwrap().points, 1);
}

#[test]
fn test_volleyball_points_from_sets() {
    let mut close = record("1", "A", "B", 2, 1);
    close.sets_a = Some(2);
    close.sets_b = Some(1);
    let mut sweep = record("2", "A", "C", 2, 0);
    sweep.sets_a = Some(2);
    sweep.sets_b = Some(0);
    let rows = compute(&[close, sweep], Sport::Volleyball, &teams(&["A", "B", "C"]));
    let a = rows.iter().find(|r| r.team == "A").unwrap();
    assert_eq!(a.points, 5); // 2 + 3
    assert_eq!(a.set_difference, 3);
    assert_eq!(rows.iter().find(|r| r.team == "B").unwrap().points, 1);
    assert_eq!(rows.iter().find(|r| r.team == "C").unwrap().points, 0);
}

#[test]
fn test_forfeit_imputation() {
    // No score recorded; the absent side concedes the sport default.
    let mut forfeited = record("1", "A", "B", 0, 0);
    forfeited.score_a = None;
    forfeited.score_b = None;
    forfeited.absences = vec!["B".to_string()];
    let rows = compute(&[forfeited], Sport::Futsal, &teams(&["A", "B"]));
    let a = rows.iter().find(|r| r.team == "A").unwrap();
    let b = rows.iter().find(|r| r.team == "B").unwrap();
    assert_eq!((a.points, a.goals_for), (3, 3));
    assert_eq!((b.points, b.forfeits), (0, 1));
}

#[test]
fn test_playoff_rounds_excluded_from_table() {
    let matches = vec![
        record("1", "A", "B", 2, 0),
        record("E1", "A", "B", 0, 9),
    ];
    let rows = compute(&matches, Sport::Futsal, &teams(&["A", "B"]));
    let a = rows.iter().find(|r| r.team == "A").unwrap();
    assert_eq!(a.played, 1);
    assert_eq!(a.goals_against, 0);
}

#[test]
fn test_head_to_head_overrides_overall_goal_difference() {
    // A, B, C all finish on 9 points. Head-to-head points order them
    // A (9) > B (6) > C (3), even though overall goal difference says
    // C (+18) > B (0) > A (-8).
    let matches = vec![
        // Head-to-head double round robin.
        record("1", "A", "B", 1, 0),
        record("2", "B", "A", 0, 1),
        record("3", "A", "C", 1, 0),
        record("4", "C", "A", 1, 0),
        record("5", "B", "C", 1, 0),
        record("6", "C", "B", 0, 1),
        // Filler results balancing the points while skewing goal difference.
        record("7", "D", "A", 5, 0),
        record("8", "A", "D", 0, 5),
        record("9", "B", "D", 1, 0),
        record("10", "E", "B", 1, 0),
        record("11", "C", "E", 10, 0),
        record("12", "E", "C", 0, 10),
    ];
    let all = teams(&["A", "B", "C", "D", "E"]);
    let rows = compute(&matches, Sport::Futsal, &all);

    for team in ["A", "B", "C"] {
        assert_eq!(rows.iter().find(|r| r.team == team).unwrap().points, 9);
    }
    assert_eq!(position_of(&rows, "A"), 1);
    assert_eq!(position_of(&rows, "B"), 2);
    assert_eq!(position_of(&rows, "C"), 3);
}

#[test]
fn test_fewer_forfeits_rank_first_among_tied() {
    // X and Y both finish on 6 points, but Y has a forfeit on record.
    let mut x_walkover = record("3", "X", "W", 0, 0);
    x_walkover.score_a = None;
    x_walkover.score_b = None;
    x_walkover.absences = vec!["W".to_string()];
    let mut y_forfeit = record("4", "Y", "W", 0, 0);
    y_forfeit.score_a = None;
    y_forfeit.score_b = None;
    y_forfeit.absences = vec!["Y".to_string()];
    let matches = vec![
        record("1", "X", "Z", 2, 0),
        record("2", "Y", "Z", 2, 0),
        x_walkover,
        y_forfeit,
        record("5", "Y", "V", 4, 1),
    ];
    let rows = compute(&matches, Sport::Futsal, &teams(&["X", "Y", "Z", "W", "V"]));
    let x = rows.iter().find(|r| r.team == "X").unwrap();
    let y = rows.iter().find(|r| r.team == "Y").unwrap();
    assert_eq!(x.points, 6);
    assert_eq!(y.points, 6);
    assert_eq!(y.forfeits, 1);
    assert!(x.position < y.position, "clean record must outrank the forfeiter");
}

#[test]
fn test_positions_are_a_strict_total_order() {
    let matches = vec![
        record("1", "A", "B", 2, 1),
        record("1", "C", "D", 0, 0),
        record("2", "A", "C", 1, 1),
        record("2", "B", "D", 4, 0),
        record("3", "A", "D", 2, 2),
        record("3", "B", "C", 1, 3),
    ];
    let rows = compute(&matches, Sport::Futsal, &teams(&["A", "B", "C", "D"]));
    let mut positions: Vec<usize> = rows.iter().map(|r| r.position).collect();
    positions.sort_unstable();
    assert_eq!(positions, vec![1, 2, 3, 4]);
    for pair in rows.windows(2) {
        assert!(
            pair[0].points >= pair[1].points,
            "points must be non-increasing down the table"
        );
    }
}

#[test]
fn test_division_and_group_partitioning() {
    let mut d1 = record("1", "A", "B", 1, 0);
    d1.division = Some(1);
    d1.group = Some("A".to_string());
    let mut d2 = record("1", "C", "D", 1, 0);
    d2.division = Some(2);
    d2.group = Some("B".to_string());
    let rows = compute(&[d1, d2], Sport::Futsal, &teams(&["A", "B", "C", "D"]));
    assert_eq!(rows.len(), 4);
    // Each partition ranks independently from position 1.
    assert_eq!(position_of(&rows, "A"), 1);
    assert_eq!(position_of(&rows, "C"), 1);
}

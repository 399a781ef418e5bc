use std::collections::HashMap;

use tacaua_forecast::models::{Fixture, SimulationParams, Sport, Team};
use tacaua_forecast::monte_carlo::{forecast, ForecastRequest};
use tacaua_forecast::{HardsetManager, OutcomeSampler, ProgressHandle, RatingEngine};

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
    fn new(sport: Sport) -> Self {
        League {
            sport,
            teams: HashMap::new(),
            fixtures: Vec::new(),
            engine: RatingEngine::new(),
            sampler: OutcomeSampler::new(sport),
            total_group_games: HashMap::new(),
            real_points: HashMap::new(),
            team_division: HashMap::new(),
            playoff_slots: HashMap::new(),
            total_playoff_slots: 8,
            has_liguilla: false,
        }
    }

    fn team(&mut self, name: &str, rating: f64) {
        self.teams.insert(name.to_string(), Team::new(name, rating));
        self.total_group_games.insert(name.to_string(), 9);
    }

    fn division_team(
        &mut self,
        name: &str,
        rating: f64,
        division: u32,
        group: Option<&str>,
        points: u32,
    ) {
        self.team(name, rating);
        self.real_points.insert(name.to_string(), points);
        self.team_division.insert(
            name.to_string(),
            (Some(division), group.map(|g| g.to_string())),
        );
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

    fn run(
        &self,
        params: SimulationParams,
        hardsets: Option<&HardsetManager>,
    ) -> tacaua_forecast::models::Forecast {
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

/// Pinning a heavy upset moves the winner's expected points by roughly the
/// full value of the match and barely disturbs the uninvolved teams.
#[test]
fn hardset_upset_shifts_expected_points() {
    let mut league = League::new(Sport::Futsal);
    league.team("Underdog", 1000.0);
    league.team("Favorito", 1900.0);
    for i in 0..8 {
        league.team(&format!("Meio{i}"), 1500.0);
    }
    let names: Vec<String> = {
        let mut names: Vec<String> = league.teams.keys().cloned().collect();
        names.sort();
        names
    };
    for i in 0..names.len() {
        for j in (i + 1)..names.len() {
            let round = ((i + j) % 9 + 1).to_string();
            let (a, b) = (names[i].clone(), names[j].clone());
            league.fixture(&round, &a, &b);
        }
    }

    let params = SimulationParams::default();
    let baseline = league.run(params.clone(), None);

    let mut hardsets = HardsetManager::new();
    let pinned_id = league
        .fixtures
        .iter()
        .find(|fx| {
            (fx.team_a == "Underdog" && fx.team_b == "Favorito")
                || (fx.team_a == "Favorito" && fx.team_b == "Underdog")
        })
        .map(|fx| fx.id.clone())
        .expect("upset fixture scheduled");
    let underdog_is_home = pinned_id.contains("_Underdog_Favorito");
    if underdog_is_home {
        hardsets.add(&pinned_id, 5, 0);
    } else {
        hardsets.add(&pinned_id, 0, 5);
    }
    let scenario = league.run(params, Some(&hardsets));

    let change = |team: &str| {
        scenario.team(team).unwrap().expected_points - baseline.team(team).unwrap().expected_points
    };
    assert!(
        change("Underdog") >= 2.7,
        "underdog gained only {:.2}",
        change("Underdog")
    );
    assert!(
        change("Favorito") <= 0.3,
        "favorite changed by {:.2}",
        change("Favorito")
    );
    for i in 0..8 {
        let name = format!("Meio{i}");
        assert!(
            change(&name).abs() < 0.5,
            "{name} moved by {:.2}",
            change(&name)
        );
    }
}

/// Two Division-2 groups with a mini-league: when the fourth team from the
/// bottom of Division 1 carries the highest rating among the candidates, it
/// never relegates.
#[test]
fn liguilla_survivor_with_highest_rating_never_relegates() {
    let mut league = League::new(Sport::Futsal);
    // Division 1, ranked D1..D6 by banked points.
    league.division_team("D1", 1100.0, 1, None, 15);
    league.division_team("D2", 1050.0, 1, None, 12);
    league.division_team("D3", 2000.0, 1, None, 10); // the survivor candidate
    league.division_team("D4", 950.0, 1, None, 8);
    league.division_team("D5", 900.0, 1, None, 5);
    league.division_team("D6", 850.0, 1, None, 3);
    // Division 2, two groups of three.
    league.division_team("A1", 700.0, 2, Some("A"), 12);
    league.division_team("A2", 600.0, 2, Some("A"), 9);
    league.division_team("A3", 500.0, 2, Some("A"), 3);
    league.division_team("B1", 700.0, 2, Some("B"), 12);
    league.division_team("B2", 600.0, 2, Some("B"), 9);
    league.division_team("B3", 500.0, 2, Some("B"), 3);
    league.has_liguilla = true;

    let result = league.run(SimulationParams::with_iterations(500), None);

    let p = |team: &str| result.team(team).unwrap();
    assert_eq!(p("D3").p_relegation, 0.0, "survivor must hold its place");
    // Direct outcomes of the rule set.
    assert_eq!(p("A1").p_promotion, 1.0);
    assert_eq!(p("B1").p_promotion, 1.0);
    assert_eq!(p("D4").p_relegation, 1.0);
    assert_eq!(p("D5").p_relegation, 1.0);
    assert_eq!(p("D6").p_relegation, 1.0);
    // Runners-up lose the mini-league to the stronger Division-1 side.
    assert_eq!(p("A2").p_promotion, 0.0);
    assert_eq!(p("B2").p_promotion, 0.0);
    for team in result.teams.iter() {
        assert!(team.p_promotion + team.p_relegation <= 1.0);
    }
}

/// A promoting B team shields its primary squad from relegation. Direct
/// promotion out of a group can be earned by a B team, unlike playoff
/// qualification.
#[test]
fn promoting_b_team_protects_its_primary() {
    let mut league = League::new(Sport::Futsal);
    league.division_team("D1", 1100.0, 1, None, 15);
    league.division_team("D2", 1050.0, 1, None, 12);
    league.division_team("D3", 1000.0, 1, None, 10);
    league.division_team("D4", 950.0, 1, None, 8);
    league.division_team("D5", 900.0, 1, None, 5);
    league.division_team("Escudo", 1000.0, 1, None, 2); // bottom of division 1
    // Two Division-2 groups; group A is topped by Escudo's B team.
    league.division_team("Escudo B", 800.0, 2, Some("A"), 12);
    league.division_team("X1", 700.0, 2, Some("A"), 9);
    league.division_team("X2", 600.0, 2, Some("A"), 6);
    league.division_team("Y1", 800.0, 2, Some("B"), 12);
    league.division_team("Y2", 2200.0, 2, Some("B"), 9);
    league.division_team("Y3", 600.0, 2, Some("B"), 6);
    league.has_liguilla = true;

    let result = league.run(SimulationParams::with_iterations(200), None);

    assert_eq!(result.team("Escudo B").unwrap().p_promotion, 1.0);
    assert_eq!(
        result.team("Escudo").unwrap().p_relegation,
        0.0,
        "A-protection must lift the primary squad out of the drop zone"
    );
    // The other drop slots still apply.
    assert_eq!(result.team("D4").unwrap().p_relegation, 1.0);
    assert_eq!(result.team("D5").unwrap().p_relegation, 1.0);
    // The strongest mini-league candidate takes the remaining slot and
    // drags the Division-1 survivor down with it.
    assert_eq!(result.team("Y2").unwrap().p_promotion, 1.0);
    assert_eq!(result.team("D3").unwrap().p_relegation, 1.0);
}

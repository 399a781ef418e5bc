use std::path::Path;

use crate::error::Result;
use crate::models::{Forecast, Sport, StandingRow};
use crate::rating::{LogEntry, RatingHistory, K_INTER_GROUP};

fn pct(p: f64) -> String {
    format!("{:.4}", p * 100.0)
}

fn two(v: f64) -> String {
    format!("{v:.2}")
}

/// Per-team forecast CSV (`forecast_{sport}_{year}.csv`). Probabilities in
/// percent with four decimals, expected values with two.
pub fn write_team_forecast(path: &Path, forecast: &Forecast) -> Result<()> {
    let mut writer = csv::Writer::from_path(path)?;
    writer.write_record([
        "team",
        "p_playoffs",
        "p_meias_finais",
        "p_finais",
        "p_champion",
        "p_promocao",
        "p_descida",
        "expected_points",
        "expected_points_std",
        "expected_place",
        "expected_place_std",
        "avg_final_elo",
        "avg_final_elo_std",
    ])?;
    let mut teams = forecast.teams.clone();
    teams.sort_by(|a, b| {
        a.expected_place
            .partial_cmp(&b.expected_place)
            .unwrap_or(std::cmp::Ordering::Equal)
            .then_with(|| a.team.cmp(&b.team))
    });
    for team in &teams {
        writer.write_record([
            team.team.clone(),
            pct(team.p_playoffs),
            pct(team.p_semifinal),
            pct(team.p_final),
            pct(team.p_champion),
            pct(team.p_promotion),
            pct(team.p_relegation),
            two(team.expected_points),
            two(team.expected_points_std),
            two(team.expected_place),
            two(team.expected_place_std),
            two(team.avg_final_rating),
            two(team.avg_final_rating_std),
        ])?;
    }
    writer.flush()?;
    Ok(())
}

/// Per-fixture forecast CSV (`previsoes_{sport}_{year}.csv`). The scoreline
/// histogram is `|`-separated, most frequent first.
pub fn write_fixture_forecast(path: &Path, forecast: &Forecast) -> Result<()> {
    let mut writer = csv::Writer::from_path(path)?;
    writer.write_record([
        "jornada",
        "dia",
        "hora",
        "team_a",
        "team_b",
        "expected_elo_a",
        "expected_elo_a_std",
        "expected_elo_b",
        "expected_elo_b_std",
        "prob_vitoria_a",
        "prob_empate",
        "prob_vitoria_b",
        "distribuicao_placares",
        "divisao",
        "grupo",
    ])?;
    for fx in &forecast.fixtures {
        let distribution = fx
            .score_distribution
            .iter()
            .map(|(score, share)| format!("{score}:{share:.1}%"))
            .collect::<Vec<_>>()
            .join("|");
        writer.write_record([
            fx.fixture.round.clone(),
            fx.fixture.date.clone(),
            fx.fixture.time.clone(),
            fx.fixture.team_a.clone(),
            fx.fixture.team_b.clone(),
            two(fx.rating_a_mean),
            two(fx.rating_a_std),
            two(fx.rating_b_mean),
            two(fx.rating_b_std),
            pct(fx.p_win_a),
            pct(fx.p_draw),
            pct(fx.p_win_b),
            distribution,
            fx.fixture
                .division
                .map(|d| d.to_string())
                .unwrap_or_default(),
            fx.fixture.group.clone().unwrap_or_default(),
        ])?;
    }
    writer.flush()?;
    Ok(())
}

/// Wide rating-history CSV: one column per team ordered by descending final
/// rating, one row per history step.
pub fn write_rating_history(path: &Path, history: &RatingHistory) -> Result<()> {
    let mut writer = csv::Writer::from_path(path)?;
    let mut teams: Vec<(&String, &Vec<f64>)> = history.series().iter().collect();
    teams.sort_by(|a, b| {
        let final_a = a.1.last().copied().unwrap_or(0.0);
        let final_b = b.1.last().copied().unwrap_or(0.0);
        final_b
            .partial_cmp(&final_a)
            .unwrap_or(std::cmp::Ordering::Equal)
            .then_with(|| a.0.cmp(b.0))
    });

    writer.write_record(teams.iter().map(|(name, _)| name.as_str()))?;
    for step in 0..history.len() {
        writer.write_record(teams.iter().map(|(_, series)| {
            series
                .get(step)
                .map(|v| format!("{v}"))
                .unwrap_or_default()
        }))?;
    }
    writer.flush()?;
    Ok(())
}

/// Detailed per-match log CSV, including the synthetic cross-group
/// adjustment rows appended after the last real match.
pub fn write_match_log(path: &Path, log: &[LogEntry]) -> Result<()> {
    let mut writer = csv::Writer::from_path(path)?;
    writer.write_record([
        "jornada",
        "dia",
        "hora",
        "equipa_1",
        "golos_1",
        "golos_2",
        "equipa_2",
        "elo_antes_1",
        "elo_antes_2",
        "season_phase_1",
        "season_phase_2",
        "proportional_multiplier",
        "k_factor_1",
        "k_factor_2",
        "elo_change_1",
        "elo_change_2",
        "elo_delta_1",
        "elo_delta_2",
        "elo_depois_1",
        "elo_depois_2",
        "falta_comparencia",
    ])?;
    for entry in log {
        let record: Vec<String> = match entry {
            LogEntry::Match(row) => vec![
                row.round.clone(),
                row.date.clone(),
                row.time.clone(),
                row.team_a.clone(),
                row.score_a.to_string(),
                row.score_b.to_string(),
                row.team_b.clone(),
                two(row.rating_a_before),
                two(row.rating_b_before),
                format!("{:.4}", row.phase_a),
                format!("{:.4}", row.phase_b),
                format!("{:.4}", row.proportion),
                two(row.k_a),
                two(row.k_b),
                format!("{:.4}", row.change_a),
                format!("{:.4}", row.change_b),
                row.delta_a.to_string(),
                row.delta_b.to_string(),
                two(row.rating_a_after),
                two(row.rating_b_after),
                if row.has_absence { "sim" } else { "" }.to_string(),
            ],
            LogEntry::AdjustmentHeader => {
                let mut record = vec!["Ajustes Inter-Grupos".to_string()];
                record.resize(21, String::new());
                record
            }
            LogEntry::Adjustment {
                team,
                rating_before,
                delta,
                rating_after,
            } => vec![
                "Inter-Grupos".to_string(),
                String::new(),
                String::new(),
                team.clone(),
                String::new(),
                String::new(),
                String::new(),
                two(*rating_before),
                String::new(),
                "1.0000".to_string(),
                String::new(),
                "1.0000".to_string(),
                two(K_INTER_GROUP),
                String::new(),
                format!("{:.4}", *delta as f64 / K_INTER_GROUP),
                String::new(),
                delta.to_string(),
                String::new(),
                two(*rating_after),
                String::new(),
                String::new(),
            ],
        };
        writer.write_record(&record)?;
    }
    writer.flush()?;
    Ok(())
}

/// Computed standings CSV, one row per team; set columns only appear for
/// volleyball.
pub fn write_standings(path: &Path, rows: &[StandingRow], sport: Sport) -> Result<()> {
    let mut writer = csv::Writer::from_path(path)?;
    let with_sets = matches!(sport, Sport::Volleyball);
    let mut header = vec![
        "divisao",
        "grupo",
        "posicao",
        "equipa",
        "pontos",
        "jogos",
        "vitorias",
        "empates",
        "derrotas",
        "golos_marcados",
        "golos_sofridos",
        "diferenca_golos",
        "faltas_comparencia",
    ];
    if with_sets {
        header.extend(["sets_ganhos", "sets_perdidos", "diferenca_sets"]);
    }
    writer.write_record(&header)?;
    for row in rows {
        let mut record = vec![
            row.division.map(|d| d.to_string()).unwrap_or_default(),
            row.group.clone().unwrap_or_default(),
            row.position.to_string(),
            row.team.clone(),
            row.points.to_string(),
            row.played.to_string(),
            row.wins.to_string(),
            row.draws.to_string(),
            row.losses.to_string(),
            row.goals_for.to_string(),
            row.goals_against.to_string(),
            row.goal_difference.to_string(),
            row.forfeits.to_string(),
        ];
        if with_sets {
            record.push(row.sets_for.to_string());
            record.push(row.sets_against.to_string());
            record.push(row.set_difference.to_string());
        }
        writer.write_record(&record)?;
    }
    writer.flush()?;
    Ok(())
}

/// Writes the calibration artifact consumed by the outcome sampler.
pub fn write_calibration(
    path: &Path,
    calibration: &crate::calibration::CalibrationFile,
) -> Result<()> {
    let json = serde_json::to_string_pretty(calibration)?;
    std::fs::write(path, json)?;
    Ok(())
}

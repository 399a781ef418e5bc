use std::collections::{BTreeMap, HashMap};

use serde::{Deserialize, Serialize};
use statrs::statistics::Statistics;
use tracing::info;

use crate::models::{MatchRecord, Sport, UNRATED_DEFAULT};
use crate::rating::{expected_score, score_proportion, K_BASE};

/// Minimum sample size before a sport/division gets its own fit.
const MIN_SAMPLES: usize = 10;

/// Logistic draw model over the absolute pre-match rating difference.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct DrawModel {
    pub intercept: f64,
    pub coef_linear: f64,
    pub coef_quadratic: f64,
}

impl DrawModel {
    pub fn predict(&self, delta: f64) -> f64 {
        let d = delta.abs();
        let z = self.intercept + self.coef_linear * d + self.coef_quadratic * d * d;
        1.0 / (1.0 + (-z).exp())
    }
}

/// Per-division overrides shipped inside a sport's calibration record.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DivisionParams {
    pub base_goals: f64,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub base_goals_std: Option<f64>,
    pub dispersion_k: f64,
    pub base_draw_rate: f64,
}

/// Calibration record for one competition, as stored in the calibration
/// JSON artifact.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SportCalibration {
    pub sport_type: String,
    pub base_goals: f64,
    pub base_goals_std: f64,
    pub dispersion_k: f64,
    pub base_draw_rate: f64,
    pub draw_elo_sensitivity: f64,
    pub draw_multiplier: f64,
    pub draw_model: DrawModel,
    pub margin_elo_slope: f64,
    pub margin_elo_intercept: f64,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub status: Option<String>,
    #[serde(default, skip_serializing_if = "BTreeMap::is_empty")]
    pub division_params: BTreeMap<u32, DivisionParams>,
}

/// Calibration artifact: one record per competition name.
pub type CalibrationFile = BTreeMap<String, SportCalibration>;

/// A historical match enriched with the pre-match rating difference.
#[derive(Debug, Clone)]
pub struct ReplayedMatch {
    pub competition: String,
    pub division: u32,
    pub delta: f64,
    pub score_a: u32,
    pub score_b: u32,
    pub margin: u32,
    pub is_draw: bool,
}

/// Replays the rating engine over past matches, competition by competition,
/// recording each match's pre-match rating difference. The replay uses the
/// score-proportion multiplier only (there is no per-season game schedule
/// across a multi-season archive), starting every team at the unrated
/// default.
pub fn replay_history(competitions: &[(String, Vec<MatchRecord>)]) -> Vec<ReplayedMatch> {
    let mut replayed = Vec::new();
    for (competition, matches) in competitions {
        let mut ratings: HashMap<String, f64> = HashMap::new();
        for record in matches {
            let (Some(score_a), Some(score_b)) = (record.score_a, record.score_b) else {
                continue;
            };
            if record.has_absence() {
                continue;
            }
            let rating_a = *ratings
                .entry(record.team_a.clone())
                .or_insert(UNRATED_DEFAULT);
            let rating_b = *ratings
                .entry(record.team_b.clone())
                .or_insert(UNRATED_DEFAULT);

            replayed.push(ReplayedMatch {
                competition: competition.clone(),
                division: record.division.unwrap_or(1),
                delta: rating_a - rating_b,
                score_a,
                score_b,
                margin: score_a.abs_diff(score_b),
                is_draw: score_a == score_b,
            });

            let expected_a = expected_score(rating_a, rating_b);
            let (actual_a, actual_b) = match score_a.cmp(&score_b) {
                std::cmp::Ordering::Greater => (1.0, 0.0),
                std::cmp::Ordering::Less => (0.0, 1.0),
                std::cmp::Ordering::Equal => (0.5, 0.5),
            };
            let k = K_BASE * score_proportion(score_a, score_b);
            let delta_a = (k * (actual_a - expected_a)).round();
            let delta_b = (k * (actual_b - (1.0 - expected_a))).round();
            debug_assert_eq!(actual_a + actual_b, 1.0);
            *ratings.get_mut(&record.team_a).expect("inserted above") += delta_a;
            *ratings.get_mut(&record.team_b).expect("inserted above") += delta_b;
        }
    }
    replayed
}

/// Fits calibration records for every competition in the archive.
pub fn fit(competitions: &[(String, Vec<MatchRecord>)]) -> CalibrationFile {
    let replayed = replay_history(competitions);
    let mut by_competition: BTreeMap<&str, Vec<&ReplayedMatch>> = BTreeMap::new();
    for game in &replayed {
        by_competition
            .entry(game.competition.as_str())
            .or_default()
            .push(game);
    }

    let mut file = CalibrationFile::new();
    for (competition, games) in by_competition {
        let sport = Sport::from_competition_name(competition);
        let mut record = fit_slice(sport, &games);

        let mut divisions: Vec<u32> = {
            let mut set: Vec<u32> = games.iter().map(|g| g.division).collect();
            set.sort_unstable();
            set.dedup();
            set
        };
        divisions.retain(|&d| games.iter().filter(|g| g.division == d).count() >= MIN_SAMPLES);
        for division in divisions {
            let slice: Vec<&ReplayedMatch> = games
                .iter()
                .copied()
                .filter(|g| g.division == division)
                .collect();
            let fitted = fit_slice(sport, &slice);
            record.division_params.insert(
                division,
                DivisionParams {
                    base_goals: fitted.base_goals,
                    base_goals_std: Some(fitted.base_goals_std),
                    dispersion_k: fitted.dispersion_k,
                    base_draw_rate: fitted.base_draw_rate,
                },
            );
        }

        info!(
            competition,
            games = games.len(),
            draw_rate = record.base_draw_rate,
            base_goals = record.base_goals,
            "calibrated"
        );
        file.insert(competition.to_string(), record);
    }
    file
}

fn fit_slice(sport: Sport, games: &[&ReplayedMatch]) -> SportCalibration {
    if games.len() < MIN_SAMPLES {
        let defaults = crate::sampler::SamplerParams::defaults(sport);
        return SportCalibration {
            sport_type: sport.key().to_string(),
            base_goals: defaults.base_goals,
            base_goals_std: defaults.base_goals_std,
            dispersion_k: defaults.dispersion_k,
            base_draw_rate: if sport.has_draws() { 0.10 } else { 0.0 },
            draw_elo_sensitivity: 0.001,
            draw_multiplier: 1.0,
            draw_model: DrawModel::default(),
            margin_elo_slope: 0.0,
            margin_elo_intercept: 0.0,
            status: Some("insufficient_data".to_string()),
            division_params: BTreeMap::new(),
        };
    }

    let draw_rate = games.iter().filter(|g| g.is_draw).count() as f64 / games.len() as f64;

    let draw_model = if draw_rate == 0.0 || draw_rate == 1.0 {
        DrawModel::default()
    } else {
        let features: Vec<[f64; 2]> = games
            .iter()
            .map(|g| [g.delta.abs(), g.delta.abs().powi(2)])
            .collect();
        let labels: Vec<bool> = games.iter().map(|g| g.is_draw).collect();
        fit_logistic(&features, &labels)
    };

    let draw_multiplier = optimal_draw_multiplier(&draw_model, games, draw_rate);

    let decisive: Vec<&&ReplayedMatch> = games.iter().filter(|g| !g.is_draw).collect();
    let (margin_slope, margin_intercept) = if decisive.len() >= 2 {
        let xs: Vec<f64> = decisive.iter().map(|g| g.delta.abs()).collect();
        let ys: Vec<f64> = decisive.iter().map(|g| g.margin as f64).collect();
        linear_regression(&xs, &ys)
    } else {
        (0.0, 0.0)
    };

    let scores: Vec<f64> = games
        .iter()
        .flat_map(|g| [g.score_a as f64, g.score_b as f64])
        .collect();
    let mean = scores.iter().mean();
    let std = scores.iter().population_std_dev();
    let variance = std * std;
    // Gamma-Poisson method of moments; pure-Poisson data gets a sentinel.
    let dispersion_k = if variance > mean {
        (mean * mean / (variance - mean)).max(1.0)
    } else {
        10.0
    };

    SportCalibration {
        sport_type: sport.key().to_string(),
        base_goals: mean,
        base_goals_std: std,
        dispersion_k,
        base_draw_rate: draw_rate,
        draw_elo_sensitivity: draw_model.coef_linear.abs(),
        draw_multiplier,
        draw_model,
        margin_elo_slope: margin_slope,
        margin_elo_intercept: margin_intercept,
        status: Some("calibrated".to_string()),
        division_params: BTreeMap::new(),
    }
}

/// Grid-searches the scalar in [0.8, 2.0] that makes the amplified model
/// predictions best match the observed draw rate.
fn optimal_draw_multiplier(model: &DrawModel, games: &[&ReplayedMatch], observed: f64) -> f64 {
    if observed == 0.0 {
        return 1.0;
    }
    let predictions: Vec<f64> = games.iter().map(|g| model.predict(g.delta)).collect();
    let mut best = (1.0, f64::INFINITY);
    for step in 0..=12 {
        let multiplier = 0.8 + 0.1 * step as f64;
        let predicted_rate = predictions
            .iter()
            .map(|p| (p * multiplier).min(1.0))
            .sum::<f64>()
            / predictions.len() as f64;
        let error = (predicted_rate - observed).abs();
        if error < best.1 {
            best = (multiplier, error);
        }
    }
    (best.0 * 100.0).round() / 100.0
}

/// Unregularized logistic regression via Newton iterations on the 3x3
/// normal equations.
fn fit_logistic(features: &[[f64; 2]], labels: &[bool]) -> DrawModel {
    let n = labels.len() as f64;
    let positives = labels.iter().filter(|&&l| l).count() as f64;
    let rate = (positives / n).clamp(1e-6, 1.0 - 1e-6);
    let mut weights = [(rate / (1.0 - rate)).ln(), 0.0, 0.0];

    for _ in 0..50 {
        let mut gradient = [0.0f64; 3];
        let mut hessian = [[0.0f64; 3]; 3];
        for (x, &label) in features.iter().zip(labels) {
            let xi = [1.0, x[0], x[1]];
            let z = weights[0] + weights[1] * xi[1] + weights[2] * xi[2];
            let p = 1.0 / (1.0 + (-z).exp());
            let target = if label { 1.0 } else { 0.0 };
            let err = target - p;
            let w = (p * (1.0 - p)).max(1e-9);
            for i in 0..3 {
                gradient[i] += err * xi[i];
                for j in 0..3 {
                    hessian[i][j] += w * xi[i] * xi[j];
                }
            }
        }
        let Some(step) = solve3(hessian, gradient) else {
            break;
        };
        for i in 0..3 {
            weights[i] += step[i];
        }
        if !weights.iter().all(|w| w.is_finite()) || weights.iter().any(|w| w.abs() > 1e3) {
            // Separable data; fall back to the base-rate intercept.
            return DrawModel {
                intercept: (rate / (1.0 - rate)).ln(),
                coef_linear: 0.0,
                coef_quadratic: 0.0,
            };
        }
        if step.iter().map(|s| s.abs()).fold(0.0, f64::max) < 1e-8 {
            break;
        }
    }

    DrawModel {
        intercept: weights[0],
        coef_linear: weights[1],
        coef_quadratic: weights[2],
    }
}

fn solve3(mut a: [[f64; 3]; 3], mut b: [f64; 3]) -> Option<[f64; 3]> {
    for col in 0..3 {
        let pivot = (col..3).max_by(|&i, &j| {
            a[i][col]
                .abs()
                .partial_cmp(&a[j][col].abs())
                .unwrap_or(std::cmp::Ordering::Equal)
        })?;
        if a[pivot][col].abs() < 1e-12 {
            return None;
        }
        a.swap(col, pivot);
        b.swap(col, pivot);
        for row in (col + 1)..3 {
            let factor = a[row][col] / a[col][col];
            for k in col..3 {
                a[row][k] -= factor * a[col][k];
            }
            b[row] -= factor * b[col];
        }
    }
    let mut x = [0.0f64; 3];
    for row in (0..3).rev() {
        let mut sum = b[row];
        for k in (row + 1)..3 {
            sum -= a[row][k] * x[k];
        }
        x[row] = sum / a[row][row];
    }
    Some(x)
}

/// Ordinary least squares of y on x.
fn linear_regression(xs: &[f64], ys: &[f64]) -> (f64, f64) {
    let n = xs.len() as f64;
    let mean_x = xs.iter().sum::<f64>() / n;
    let mean_y = ys.iter().sum::<f64>() / n;
    let mut cov = 0.0;
    let mut var = 0.0;
    for (x, y) in xs.iter().zip(ys) {
        cov += (x - mean_x) * (y - mean_y);
        var += (x - mean_x) * (x - mean_x);
    }
    if var < 1e-12 {
        return (0.0, mean_y);
    }
    let slope = cov / var;
    (slope, mean_y - slope * mean_x)
}

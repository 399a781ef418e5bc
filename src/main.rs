use std::collections::BTreeMap;
use std::fs;
use std::path::PathBuf;
use std::time::Instant;

use anyhow::{bail, Context, Result};
use clap::Parser;
use tracing::{info, warn};
use tracing_subscriber::EnvFilter;

use tacaua_forecast::args::Args;
use tacaua_forecast::calibration;
use tacaua_forecast::data::{self, CourseMap, SeasonFile};
use tacaua_forecast::models::{MatchRecord, SimulationParams};
use tacaua_forecast::monte_carlo::{self, ForecastRequest};
use tacaua_forecast::{HardsetManager, OutcomeSampler, ProgressHandle, RatingEngine};

fn main() {
    let args = Args::parse();
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_new(&args.log_level).unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .init();

    if let Err(err) = run(&args) {
        eprintln!("error: {err:#}");
        std::process::exit(1);
    }
}

fn run(args: &Args) -> Result<()> {
    let courses = load_courses(args);
    fs::create_dir_all(&args.output_dir)
        .with_context(|| format!("output directory {:?} is not writable", args.output_dir))?;

    if args.calibrate {
        return run_calibration(args, &courses);
    }

    let files = data::find_season_files(&args.input_dir)
        .with_context(|| format!("normalized CSV directory {:?}", args.input_dir))?;
    let Some(latest) = data::latest_season(&files) else {
        bail!("no season files found in {:?}", args.input_dir);
    };
    info!("forecasting season {latest}");

    let season_files: Vec<&SeasonFile> = files
        .iter()
        .filter(|f| f.season == latest)
        .filter(|f| {
            args.modalidade
                .as_ref()
                .is_none_or(|wanted| f.competition.eq_ignore_ascii_case(wanted))
        })
        .collect();
    if season_files.is_empty() {
        bail!(
            "no competition matches {:?} in season {latest}",
            args.modalidade
        );
    }

    let calibration_file = match &args.calibration {
        Some(path) => match data::read_calibration(path) {
            Ok(file) => Some(file),
            Err(err) => {
                warn!("calibration file {path:?} unusable ({err}); using sport defaults");
                None
            }
        },
        None => None,
    };

    for file in season_files {
        process_competition(args, &courses, file, calibration_file.as_ref())?;
    }
    Ok(())
}

fn load_courses(args: &Args) -> CourseMap {
    let path = args
        .course_config
        .clone()
        .unwrap_or_else(|| PathBuf::from("data/config/config_cursos.json"));
    match CourseMap::load(&path) {
        Ok(map) => map,
        Err(err) => {
            warn!("course mapping {path:?} not loaded ({err}); names pass through literally");
            CourseMap::empty()
        }
    }
}

/// Fits per-sport calibration from every season in the archive and writes
/// the artifact read by the sampler.
fn run_calibration(args: &Args, courses: &CourseMap) -> Result<()> {
    let files = data::find_season_files(&args.input_dir)
        .with_context(|| format!("normalized CSV directory {:?}", args.input_dir))?;
    if files.is_empty() {
        bail!("no season files found in {:?}", args.input_dir);
    }

    // Seasons concatenate chronologically per competition.
    let mut by_competition: BTreeMap<String, Vec<MatchRecord>> = BTreeMap::new();
    for file in &files {
        let matches = data::read_match_csv(&file.path, courses)?;
        by_competition
            .entry(file.competition.clone())
            .or_default()
            .extend(matches);
    }
    let competitions: Vec<(String, Vec<MatchRecord>)> = by_competition.into_iter().collect();

    let calibration = calibration::fit(&competitions);
    let path = args.output_dir.join("calibrated_simulator_config.json");
    data::write_calibration(&path, &calibration)?;
    info!("calibration for {} competition(s) written to {path:?}", calibration.len());
    Ok(())
}

fn process_competition(
    args: &Args,
    courses: &CourseMap,
    file: &SeasonFile,
    calibration: Option<&calibration::CalibrationFile>,
) -> Result<()> {
    info!("processing {} ({})", file.competition, file.season);
    let matches = data::read_match_csv(&file.path, courses)?;

    let mut engine = RatingEngine::new();
    if let Some(previous) = data::previous_season(&file.season) {
        let snapshot = args
            .output_dir
            .join(format!("elo_{}_{previous}.csv", file.competition));
        if snapshot.exists() {
            let ratings = data::read_rating_snapshot(&snapshot, courses)?;
            info!("seeded {} ratings from {previous}", ratings.len());
            engine.load_previous_ratings(ratings);
        }
    }

    let outcome = engine.process_season(&matches, file.sport);
    let tag = format!("{}_{}", file.competition, file.season);
    data::write_rating_history(&args.output_dir.join(format!("elo_{tag}.csv")), &outcome.history)?;
    data::write_match_log(&args.output_dir.join(format!("detalhe_{tag}.csv")), &outcome.log)?;
    data::write_standings(
        &args.output_dir.join(format!("classificacao_{tag}.csv")),
        &outcome.standings,
        file.sport,
    )?;

    let fixtures = data::build_fixtures(&matches, file.sport, &file.competition, courses);
    let real_points = monte_carlo::real_points(&outcome.standings);
    let team_division = monte_carlo::team_divisions(&matches);
    let (playoff_slots, total_playoff_slots) = monte_carlo::parse_playoff_slots(&matches);
    let has_liguilla = monte_carlo::detect_liguilla(&matches);

    let sampler = calibration
        .and_then(|c| c.get(&file.competition))
        .map(|record| OutcomeSampler::from_calibration(file.sport, record))
        .unwrap_or_else(|| OutcomeSampler::new(file.sport));

    let mut hardsets = HardsetManager::with_aliases(courses.aliases());
    for (id, score_a, score_b) in args.hardset_pins()? {
        hardsets.add(&id, score_a, score_b);
    }
    if let Some(path) = &args.hardset_csv {
        let loaded = hardsets
            .load_csv(path)
            .with_context(|| format!("hardset csv {path:?}"))?;
        info!("loaded {loaded} pinned result(s) from {path:?}");
    }
    if !hardsets.is_empty() {
        info!("{}", hardsets.summary());
    }

    let params = SimulationParams {
        iterations: args.iterations(),
        base_seed: args.seed,
        ..Default::default()
    };

    let run_forecast = |pins: Option<&HardsetManager>, suffix: &str| -> Result<()> {
        let request = ForecastRequest {
            sport: file.sport,
            teams: &outcome.teams,
            fixtures: &fixtures,
            engine: &engine,
            sampler: &sampler,
            params: params.clone(),
            total_group_games: &outcome.total_group_games,
            real_points: &real_points,
            team_division: &team_division,
            playoff_slots: &playoff_slots,
            total_playoff_slots,
            has_liguilla,
            hardsets: pins,
        };
        let progress = ProgressHandle::new(params.iterations as u64);
        let started = Instant::now();
        let forecast = monte_carlo::forecast(&request, &progress);
        progress.finish();
        info!(
            "{} iterations for {tag}{suffix} in {:.2?}",
            params.iterations,
            started.elapsed()
        );
        data::write_team_forecast(
            &args.output_dir.join(format!("forecast_{tag}{suffix}.csv")),
            &forecast,
        )?;
        data::write_fixture_forecast(
            &args.output_dir.join(format!("previsoes_{tag}{suffix}.csv")),
            &forecast,
        )?;
        Ok(())
    };

    if hardsets.is_empty() {
        run_forecast(None, "")?;
    } else if args.compare {
        run_forecast(None, "")?;
        run_forecast(Some(&hardsets), "_hardset")?;
    } else {
        run_forecast(Some(&hardsets), "_hardset")?;
    }
    Ok(())
}

use std::path::PathBuf;

use clap::Parser;

/// Forecasts the remainder of the cup season for every sport from the
/// normalized match tables.
#[derive(Parser, Debug, Clone)]
#[command(
    name = "tacaua-forecast",
    about = "Multi-sport university cup Monte Carlo forecaster"
)]
pub struct Args {
    /// Directory with the normalized match CSV files, one per sport per season
    #[arg(long, default_value = "data/csv_modalidades")]
    pub input_dir: PathBuf,

    /// Directory where forecast, rating, and standings CSVs are written
    #[arg(long, default_value = "data/output")]
    pub output_dir: PathBuf,

    /// Course mapping JSON (short code -> display name)
    #[arg(long)]
    pub course_config: Option<PathBuf>,

    /// Restrict the run to one competition (e.g. FUTSAL_MASCULINO)
    #[arg(long)]
    pub modalidade: Option<String>,

    /// Pin a fixture result: MATCH_ID SCORE, where SCORE is like 5-0 (repeatable)
    #[arg(long, num_args = 2, value_names = ["MATCH_ID", "SCORE"], action = clap::ArgAction::Append)]
    pub hardset: Vec<String>,

    /// CSV of pinned results with header match_id,score_a,score_b
    #[arg(long)]
    pub hardset_csv: Option<PathBuf>,

    /// Run the baseline forecast and then the hardset scenario
    #[arg(long)]
    pub compare: bool,

    /// 100 000 Monte-Carlo iterations
    #[arg(long)]
    pub deep_simulation: bool,

    /// 1 000 000 Monte-Carlo iterations
    #[arg(long)]
    pub deeper_simulation: bool,

    /// Base seed for the per-iteration generators
    #[arg(long, default_value_t = 0)]
    pub seed: u64,

    /// Fit calibration parameters from the historical archive and exit
    #[arg(long)]
    pub calibrate: bool,

    /// Calibration JSON produced by --calibrate
    #[arg(long)]
    pub calibration: Option<PathBuf>,

    /// Log level (trace, debug, info, warn, error)
    #[arg(long, env = "RUST_LOG", default_value = "info")]
    pub log_level: String,
}

impl Args {
    pub fn iterations(&self) -> usize {
        if self.deeper_simulation {
            1_000_000
        } else if self.deep_simulation {
            100_000
        } else {
            10_000
        }
    }

    /// Parses the repeated `--hardset MATCH_ID SCORE` pairs.
    pub fn hardset_pins(&self) -> anyhow::Result<Vec<(String, u32, u32)>> {
        let mut pins = Vec::new();
        for pair in self.hardset.chunks(2) {
            let [id, score] = pair else {
                anyhow::bail!("--hardset requires MATCH_ID and SCORE");
            };
            let Some((a, b)) = score.split_once('-') else {
                anyhow::bail!("hardset score {score:?} is not of the form A-B");
            };
            let a: u32 = a
                .trim()
                .parse()
                .map_err(|_| anyhow::anyhow!("invalid hardset score {score:?}"))?;
            let b: u32 = b
                .trim()
                .parse()
                .map_err(|_| anyhow::anyhow!("invalid hardset score {score:?}"))?;
            pins.push((id.clone(), a, b));
        }
        Ok(pins)
    }
}

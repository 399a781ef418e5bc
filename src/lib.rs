pub mod args;
pub mod calibration;
pub mod data;
pub mod error;
pub mod hardset;
pub mod models;
pub mod monte_carlo;
pub mod progress;
pub mod rating;
pub mod sampler;
pub mod standings;

pub use error::{Error, Result};
pub use hardset::HardsetManager;
pub use models::*;
pub use monte_carlo::{forecast, ForecastRequest};
pub use progress::ProgressHandle;
pub use rating::{RatingEngine, RatingHistory, SeasonOutcome};
pub use sampler::OutcomeSampler;

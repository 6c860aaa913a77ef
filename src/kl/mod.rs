//! Karhunen-Loève Monte Carlo: offline fit and online sampling

pub mod interp;
pub mod model;
pub mod quantile;
pub mod sampler;
pub mod solver;

pub use model::{train_all, TrainedModel, TrainingOutcome, TrainingSettings};
pub use sampler::KlmcSampler;
pub use solver::{KarhunenLoeveSolver, KlDecomposition};

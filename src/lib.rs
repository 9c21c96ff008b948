pub mod adapters;
pub mod app;
pub mod config;
pub mod core;
pub mod domain;
pub mod utils;

#[cfg(feature = "cli")]
pub use config::Cli;

pub use adapters::{ChromeRenderer, LocalStorage, MuleRouter, Replicate};
pub use config::DeckConfig;
pub use core::{deck::DeckBuilder, runner::JobRunner};
pub use domain::model::{Card, CardCatalog, JobStatus, RunLog};
pub use utils::error::{DeckError, Result};

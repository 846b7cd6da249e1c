//! Model training utility for AppHealth.
//!
//! Trains the diabetes and hypertension forests from the cohort CSVs and
//! writes JSON artifacts plus a SHA-256 `manifest.json` that the dashboard
//! verifies at startup.
//!
//! # Usage
//!
//! ```bash
//! cargo run --bin train_models -- [--data <dir>] [--out <dir>] [--trees <n>] [--seed <n>]
//! ```
//!
//! Unset options fall back to the `APPHEALTH_*` environment configuration.

use std::env;
use std::path::PathBuf;

use anyhow::{anyhow, Context, Result};
use tracing_subscriber::EnvFilter;

use apphealth::adapters::csv::CsvCohortSource;
use apphealth::adapters::forest::RandomForest;
use apphealth::adapters::JsonModelStore;
use apphealth::application::ForestModel;
use apphealth::config::Config;
use apphealth::domain::Condition;
use apphealth::ports::CohortSource;

fn usage() -> anyhow::Error {
    anyhow!("Usage: train_models [--data <dir>] [--out <dir>] [--trees <n>] [--seed <n>]")
}

fn parse_args(mut config: Config) -> Result<Config> {
    let mut args = env::args().skip(1);

    while let Some(arg) = args.next() {
        let mut value = || args.next().ok_or_else(usage);
        match arg.as_str() {
            "--data" => config.data_dir = PathBuf::from(value()?),
            "--out" => config.model_dir = PathBuf::from(value()?),
            "--trees" => {
                let n: usize = value()?.trim().parse().context("--trees must be a positive integer")?;
                if n == 0 {
                    return Err(anyhow!("--trees must be a positive integer"));
                }
                config.forest.n_trees = n;
            }
            "--seed" => {
                config.forest.seed = value()?.trim().parse().context("--seed must be a u64")?;
            }
            _ => return Err(usage()),
        }
    }

    Ok(config)
}

fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")))
        .init();

    let config = parse_args(Config::from_env_or_default())?;
    let source = CsvCohortSource::new(&config.data_dir);
    let store = JsonModelStore::new(&config.model_dir);

    for condition in Condition::ALL {
        let cohort = source
            .load(condition)
            .with_context(|| format!("Failed to load {condition} cohort from {:?}", source.path_for(condition)))?;

        let model = ForestModel::train(
            &cohort,
            condition,
            RandomForest::new(config.forest),
            &config.training,
        )
        .with_context(|| format!("Failed to train {condition} model"))?;

        let digest = store
            .save(condition, &model)
            .with_context(|| format!("Failed to save {condition} model"))?;

        let metrics = model.metrics();
        println!(
            "{condition}: {} trees, train {} / test {} rows, accuracy {}",
            config.forest.n_trees,
            metrics.train_rows,
            metrics.test_rows,
            metrics
                .holdout_accuracy
                .map_or_else(|| "n/a".to_string(), |a| format!("{:.2}%", a * 100.0)),
        );
        println!("  {} sha256={digest}", JsonModelStore::file_name(condition));
    }

    println!("Artifacts written to {:?}", store.dir());
    Ok(())
}

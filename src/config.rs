//! Runtime settings.
//!
//! Layered the usual way: compiled defaults, then an optional
//! `shadowview.toml` next to the binary, then `SHADOWVIEW_*` environment
//! overrides. The dataset location is a probe list so a deployment can
//! prefer the full export and fall back to the smaller one.

use std::path::PathBuf;

use config::{Config, Environment, File};
use serde::Deserialize;

use crate::error::{Result, ShadowviewError};

#[derive(Debug, Clone, Deserialize)]
pub struct Settings {
    /// Candidate dataset files, probed in order; the first that exists wins.
    pub dataset_paths: Vec<PathBuf>,
    /// The access-control dimension. Must name an actual column of the
    /// dataset for filtering to activate; otherwise the scoped view is
    /// empty (fail closed).
    pub group_column: String,
    /// Per-scope memory ceiling handed to the execution engine.
    pub memory_limit: String,
    /// Extra correction rounds the agent may ask the generation backend for.
    pub max_retries: usize,
    /// HTTP listen address.
    pub listen: String,
}

impl Settings {
    pub fn load() -> Result<Self> {
        let settings = Config::builder()
            .set_default(
                "dataset_paths",
                vec![
                    "data/sales_full.parquet".to_string(),
                    "data/sales.parquet".to_string(),
                ],
            )?
            .set_default("group_column", "Brand")?
            .set_default("memory_limit", "2GB")?
            .set_default("max_retries", 2)?
            .set_default("listen", "0.0.0.0:8001")?
            .add_source(File::with_name("shadowview").required(false))
            .add_source(Environment::with_prefix("SHADOWVIEW"))
            .build()?
            .try_deserialize()?;
        Ok(settings)
    }

    /// First existing probe path, or a config error naming what was tried.
    pub fn resolve_dataset_path(&self) -> Result<PathBuf> {
        for candidate in &self.dataset_paths {
            if candidate.is_file() {
                return Ok(candidate.clone());
            }
        }
        Err(ShadowviewError::Config(format!(
            "no dataset found; probed: {}",
            self.dataset_paths
                .iter()
                .map(|p| p.display().to_string())
                .collect::<Vec<_>>()
                .join(", ")
        )))
    }
}

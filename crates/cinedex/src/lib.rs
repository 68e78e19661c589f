//! 🎬 cinedex: keeps a movie search index in step with the content database.
//!
//! Every `poll_interval_seconds` it asks Postgres what changed in `film_work`, `person`
//! and `genre` since the last checkpoint, rebuilds the affected film documents, and
//! upserts them into Elasticsearch with `_bulk`. Checkpoints only move after a page has
//! landed, so a crash means re-sending a page, never skipping one.

pub mod app_config;
mod backends;
mod checkpoint;
pub mod common;
mod composers;
mod pipeline;
pub mod progress;
pub mod retry;
pub mod supervisors;
mod transforms;

#[cfg(test)]
mod fixtures;

use anyhow::{Context, Result};

use crate::app_config::AppConfig;
use crate::progress::PassReport;
use crate::supervisors::Supervisor;

pub use crate::common::EntityType;

/// ♾️ Connect everything and sync forever, until `shutdown` fires or closes.
pub async fn run(app_config: AppConfig, shutdown: async_channel::Receiver<()>) -> Result<()> {
    let mut supervisor = Supervisor::from_config(&app_config)
        .await
        .context("💀 Could not bring the pipelines up. Nothing was synced.")?;
    supervisor.run(shutdown).await
}

/// 🔂 Connect everything and run exactly one pass. Entity failures are in the report.
pub async fn run_once(app_config: AppConfig) -> Result<PassReport> {
    let mut supervisor = Supervisor::from_config(&app_config)
        .await
        .context("💀 Could not bring the pipelines up. Nothing was synced.")?;
    Ok(supervisor.run_pass().await)
}

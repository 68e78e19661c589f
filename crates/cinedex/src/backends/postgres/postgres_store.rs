use std::time::Duration;

use anyhow::{Context, Result};
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use sqlx::postgres::PgConnectOptions;
use tracing::{debug, trace};
use uuid::Uuid;

use super::PostgresStoreConfig;
use super::connection::{PgConnector, ReconnectingConnection};
use super::queries;
use crate::backends::ContentStore;
use crate::common::{ChangedRow, EntityType, FilmCursor, RelationalRow};
use crate::retry::RetryPolicy;

/// 🐘 [`ContentStore`] backed by a single Postgres connection.
///
/// Every query: ping → (maybe reconnect) → execute, and the whole dance is wrapped in the
/// retry policy. One connection is plenty: the pipeline never asks two questions at once.
#[derive(Debug)]
pub(crate) struct PostgresStore {
    link: ReconnectingConnection<PgConnector>,
    schema: String,
    retry: RetryPolicy,
}

impl PostgresStore {
    /// 🚀 Validate config and connect right away, so broken credentials fail loudly at startup.
    pub(crate) async fn connect(config: PostgresStoreConfig, retry: RetryPolicy) -> Result<Self> {
        queries::validate_schema(&config.schema)?;

        let mut options = PgConnectOptions::new()
            .host(&config.host)
            .port(config.port)
            .username(&config.user)
            .database(&config.dbname)
            .application_name("cinedex");
        if let Some(ref password) = config.password {
            options = options.password(password);
        }

        let connector = PgConnector::new(options, Duration::from_secs(config.connect_timeout_secs));
        let mut store = Self {
            link: ReconnectingConnection::new(connector, retry),
            schema: config.schema,
            retry,
        };
        store.link.live().await.context(format!(
            "💀 Could not reach the content database '{}' at {}:{}. The movies are in there somewhere. We just can't get to them.",
            config.dbname, config.host, config.port
        ))?;
        Ok(store)
    }
}

#[async_trait]
impl ContentStore for PostgresStore {
    async fn changed_since(
        &mut self,
        entity: EntityType,
        since: DateTime<Utc>,
        limit: usize,
    ) -> Result<Vec<ChangedRow>> {
        let sql = queries::changed_since(&self.schema, entity);
        let limit = i64::try_from(limit).unwrap_or(i64::MAX);
        let retry = self.retry;
        let rows = retry
            .run(&format!("fetch changed {} rows", entity), &mut self.link, |link| {
                let sql = sql.clone();
                Box::pin(async move {
                    let connection = link.live().await?;
                    sqlx::query_as::<_, ChangedRow>(&sql)
                        .bind(since)
                        .bind(limit)
                        .fetch_all(&mut *connection)
                        .await
                        .context("💀 The change-detection query was rejected by postgres.")
                })
            })
            .await?;
        trace!("🐘 {} rows of {} changed after {}", rows.len(), entity, since);
        Ok(rows)
    }

    async fn film_works_referencing(
        &mut self,
        entity: EntityType,
        ids: &[Uuid],
        after: FilmCursor,
        limit: usize,
    ) -> Result<Vec<ChangedRow>> {
        let Some(sql) = queries::film_works_referencing(&self.schema, entity) else {
            // 🎬 films don't reference films. nothing to enrich.
            return Ok(Vec::new());
        };
        let ids = ids.to_vec();
        let limit = i64::try_from(limit).unwrap_or(i64::MAX);
        let retry = self.retry;
        let rows = retry
            .run(&format!("find films referencing changed {} rows", entity), &mut self.link, |link| {
                let sql = sql.clone();
                let ids = ids.clone();
                Box::pin(async move {
                    let connection = link.live().await?;
                    sqlx::query_as::<_, ChangedRow>(&sql)
                        .bind(after.updated_at)
                        .bind(after.id)
                        .bind(ids)
                        .bind(limit)
                        .fetch_all(&mut *connection)
                        .await
                        .context("💀 The dependency lookup query was rejected by postgres.")
                })
            })
            .await?;
        debug!(
            "🔗 {} films reference the changed {} batch (after {} / {})",
            rows.len(),
            entity,
            after.updated_at,
            after.id
        );
        Ok(rows)
    }

    async fn film_work_rows(&mut self, film_work_ids: &[Uuid]) -> Result<Vec<RelationalRow>> {
        if film_work_ids.is_empty() {
            return Ok(Vec::new());
        }
        let sql = queries::film_work_rows(&self.schema);
        let ids = film_work_ids.to_vec();
        let retry = self.retry;
        retry
            .run("merge film documents", &mut self.link, |link| {
                let sql = sql.clone();
                let ids = ids.clone();
                Box::pin(async move {
                    let connection = link.live().await?;
                    sqlx::query_as::<_, RelationalRow>(&sql)
                        .bind(ids)
                        .fetch_all(&mut *connection)
                        .await
                        .context("💀 The document merge query was rejected by postgres.")
                })
            })
            .await
    }
}

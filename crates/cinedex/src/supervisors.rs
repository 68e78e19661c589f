//! 🎬 The supervisor: builds the three entity pipelines and runs them on a schedule.
//!
//! A pass is film_work, then person, then genre, strictly one after the other. A pipeline
//! that fails is logged and reported, and the pass moves on to the next entity: a flaky
//! genre table has no business holding film updates hostage. Between passes the
//! supervisor sleeps for `poll_interval_seconds`, or until someone rings the shutdown bell.

use std::sync::Arc;
use std::time::{Duration, Instant};

use anyhow::Result;
use tokio::sync::Mutex;
use tracing::{error, info};

use crate::app_config::{AppConfig, RuntimeConfig};
use crate::backends::{IndexBackend, OffsetBackend, StoreBackend};
use crate::common::EntityType;
use crate::pipeline::{ChangeDetector, build_chain};
use crate::progress::{EntityReport, PassReport};
use crate::retry::RetryPolicy;

pub struct Supervisor {
    pipelines: Vec<ChangeDetector>,
    poll_interval: Duration,
}

impl std::fmt::Debug for Supervisor {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Supervisor")
            .field(
                "pipelines",
                &self.pipelines.iter().map(|p| p.entity()).collect::<Vec<_>>(),
            )
            .field("poll_interval", &self.poll_interval)
            .finish()
    }
}

impl Supervisor {
    /// 🔧 Connect every backend the config names. Unreachable Postgres or Elasticsearch
    /// (after the retry policy gives up) fails right here, before the first pass.
    pub async fn from_config(app_config: &AppConfig) -> Result<Self> {
        let retry = RetryPolicy::from(&app_config.runtime.retry);
        let store = StoreBackend::from_config(&app_config.store, retry).await?;
        let index =
            IndexBackend::from_config(&app_config.index, &app_config.runtime.index_name, retry)
                .await?;
        let offsets = OffsetBackend::from_config(&app_config.offsets);
        Ok(Self::new(store, index, offsets, &app_config.runtime))
    }

    pub(crate) fn new(
        store: StoreBackend,
        index: IndexBackend,
        offsets: OffsetBackend,
        runtime: &RuntimeConfig,
    ) -> Self {
        let store = Arc::new(Mutex::new(store));
        let index = Arc::new(index);
        let offsets = Arc::new(Mutex::new(offsets));

        let pipelines = EntityType::ALL
            .iter()
            .map(|&entity| {
                build_chain(entity, store.clone(), index.clone(), offsets.clone(), runtime)
            })
            .collect();

        Self {
            pipelines,
            poll_interval: Duration::from_secs(runtime.poll_interval_seconds),
        }
    }

    /// 🔄 One pass over every entity. Never fails as a whole; look at the report.
    pub async fn run_pass(&mut self) -> PassReport {
        let started = Instant::now();
        let mut report = PassReport::default();

        for pipeline in self.pipelines.iter_mut() {
            let entity = pipeline.entity();
            let entity_started = Instant::now();
            let result = pipeline.detect().await;
            if let Err(ref err) = result {
                error!("💀 The {} pipeline failed this pass: {:#}", entity, err);
            }
            report.entities.push(EntityReport::from_detection(
                entity,
                &result,
                entity_started.elapsed(),
            ));
        }

        report.elapsed = started.elapsed();
        info!(
            "🏁 Pass finished in {:?}: {} documents loaded\n{}",
            report.elapsed,
            report.documents_loaded(),
            report.render_table()
        );
        report
    }

    /// ♾️ Pass, sleep, repeat. Returns once `shutdown` receives a message or is closed.
    ///
    /// Shutdown is only noticed between passes; a pass in flight always runs to the end.
    pub async fn run(&mut self, shutdown: async_channel::Receiver<()>) -> Result<()> {
        info!(
            "🎬 Supervisor started. Polling every {:?}. Ctrl-C to stop.",
            self.poll_interval
        );
        loop {
            self.run_pass().await;

            tokio::select! {
                _ = tokio::time::sleep(self.poll_interval) => {}
                _ = shutdown.recv() => {
                    info!("🛑 Shutdown requested. The index is as fresh as the last pass left it.");
                    return Ok(());
                }
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::backends::OffsetStore;
    use crate::backends::file::JsonFileOffsets;
    use crate::backends::in_mem::{ContentTables, InMemoryIndex, InMemoryOffsets, InMemoryStore, StoreCall};
    use crate::backends::JsonFileOffsetsConfig;
    use crate::app_config::BulkItemErrorPolicy;
    use crate::common::{FilmCursor, beginning_of_time};
    use crate::fixtures::{at, cast, film, genre, id, impatient_runtime, person, short_poll, tagged};
    use crate::progress::EntityOutcome;
    use serde_json::json;

    /// 🎬 Two films sharing an actor, one genre on each, one film with a writer.
    fn catalogue() -> ContentTables {
        ContentTables {
            film_work: vec![film(1, "Heat", 10), film(2, "The Insider", 20)],
            person: vec![
                person(100, "Al Pacino", 5),
                person(101, "Michael Mann", 5),
                person(102, "Eric Roth", 5),
            ],
            genre: vec![genre(200, "Crime", 5), genre(201, "Drama", 5)],
            person_film_work: vec![
                cast(1, 100, "actor"),
                cast(1, 101, "director"),
                cast(2, 100, "actor"),
                cast(2, 101, "director"),
                cast(2, 102, "writer"),
            ],
            genre_film_work: vec![tagged(1, 200), tagged(2, 201)],
        }
    }

    fn supervisor_over(store: &InMemoryStore, index: &InMemoryIndex, runtime: &RuntimeConfig) -> Supervisor {
        Supervisor::new(
            StoreBackend::InMemory(store.clone()),
            IndexBackend::InMemory(index.clone()),
            OffsetBackend::InMemory(InMemoryOffsets::default()),
            runtime,
        )
    }

    fn synced_documents(report: &PassReport, entity: EntityType) -> Option<usize> {
        report.entities.iter().find(|entry| entry.entity == entity).and_then(|entry| {
            match entry.outcome {
                EntityOutcome::Synced { documents, .. } => Some(documents),
                EntityOutcome::Failed(_) => None,
            }
        })
    }

    #[tokio::test]
    async fn the_one_where_the_first_pass_publishes_the_whole_catalogue() -> Result<()> {
        let store = InMemoryStore::new(catalogue());
        let index = InMemoryIndex::new();
        let mut supervisor = supervisor_over(&store, &index, &impatient_runtime(100));

        let report = supervisor.run_pass().await;
        assert!(report.is_success());
        assert_eq!(synced_documents(&report, EntityType::FilmWork), Some(2));

        let docs = index.documents("movies").await;
        assert_eq!(docs.len(), 2);
        let insider = &docs[&id(2).to_string()];
        assert_eq!(insider["title"], json!("The Insider"));
        assert_eq!(insider["director"], json!(["Michael Mann"]));
        assert_eq!(insider["actors_names"], json!(["Al Pacino"]));
        assert_eq!(insider["writers"], json!([{"id": id(102).to_string(), "name": "Eric Roth"}]));
        assert_eq!(insider["genre"], json!(["Drama"]));

        // 🔎 every entity's first query starts at the dawn of time
        let calls = store.calls().await;
        for entity in EntityType::ALL {
            let first = calls.iter().find(|call| {
                matches!(call, StoreCall::ChangedSince { entity: e, .. } if *e == entity)
            });
            assert_eq!(
                first,
                Some(&StoreCall::ChangedSince { entity, since: beginning_of_time() })
            );
        }
        Ok(())
    }

    #[tokio::test]
    async fn the_one_where_a_quiet_database_means_a_quiet_pass() -> Result<()> {
        let store = InMemoryStore::new(catalogue());
        let index = InMemoryIndex::new();
        let mut supervisor = supervisor_over(&store, &index, &impatient_runtime(100));

        supervisor.run_pass().await;
        let attempts_after_first = index.attempts().await;

        let second = supervisor.run_pass().await;
        assert!(second.is_success());
        assert_eq!(second.documents_loaded(), 0);
        assert_eq!(index.attempts().await, attempts_after_first, "no bulk without changes");
        Ok(())
    }

    #[tokio::test]
    async fn the_one_where_a_renamed_actor_republishes_both_films() -> Result<()> {
        let store = InMemoryStore::new(catalogue());
        let index = InMemoryIndex::new();
        let mut supervisor = supervisor_over(&store, &index, &impatient_runtime(100));
        supervisor.run_pass().await;

        // ✏️ an editor fixes a name. the films themselves are untouched.
        store
            .edit(|tables| {
                if let Some(al) = tables.person.iter_mut().find(|p| p.id == id(100)) {
                    al.full_name = "Alfredo James Pacino".to_string();
                    al.updated_at = at(1_000);
                }
            })
            .await;

        let report = supervisor.run_pass().await;
        assert!(report.is_success());
        assert_eq!(synced_documents(&report, EntityType::FilmWork), Some(0));
        assert_eq!(synced_documents(&report, EntityType::Person), Some(2));

        let docs = index.documents("movies").await;
        for film_id in [id(1), id(2)] {
            assert_eq!(
                docs[&film_id.to_string()]["actors_names"],
                json!(["Alfredo James Pacino"])
            );
        }
        Ok(())
    }

    #[tokio::test]
    async fn the_one_where_a_double_billed_actor_does_not_hide_the_film_next_door() -> Result<()> {
        // 🎬 two films saved in the same instant; Al acts in both and also wrote the first
        let store = InMemoryStore::new(ContentTables {
            film_work: vec![film(1, "Heat", 10), film(2, "The Insider", 10)],
            person: vec![person(100, "Al Pacino", 5)],
            person_film_work: vec![
                cast(1, 100, "actor"),
                cast(1, 100, "writer"),
                cast(2, 100, "actor"),
            ],
            ..ContentTables::default()
        });
        let index = InMemoryIndex::new();
        let mut supervisor = supervisor_over(&store, &index, &impatient_runtime(2));
        supervisor.run_pass().await;

        store
            .edit(|tables| {
                if let Some(al) = tables.person.iter_mut().find(|p| p.id == id(100)) {
                    al.full_name = "Alfredo".to_string();
                    al.updated_at = at(1_000);
                }
            })
            .await;

        let report = supervisor.run_pass().await;
        assert!(report.is_success());
        assert_eq!(synced_documents(&report, EntityType::Person), Some(2));

        let docs = index.documents("movies").await;
        assert_eq!(docs[&id(1).to_string()]["actors_names"], json!(["Alfredo"]));
        assert_eq!(docs[&id(1).to_string()]["writers_names"], json!(["Alfredo"]));
        assert_eq!(docs[&id(2).to_string()]["actors_names"], json!(["Alfredo"]));
        Ok(())
    }

    #[tokio::test]
    async fn the_one_where_a_genre_change_ignores_the_film_checkpoint() -> Result<()> {
        let store = InMemoryStore::new(catalogue());
        let index = InMemoryIndex::new();
        let mut supervisor = supervisor_over(&store, &index, &impatient_runtime(100));
        supervisor.run_pass().await;

        store
            .edit(|tables| {
                if let Some(crime) = tables.genre.iter_mut().find(|g| g.id == id(200)) {
                    crime.name = "Heist".to_string();
                    crime.updated_at = at(2_000);
                }
            })
            .await;

        let report = supervisor.run_pass().await;
        assert_eq!(synced_documents(&report, EntityType::Genre), Some(1));
        assert_eq!(index.documents("movies").await[&id(1).to_string()]["genre"], json!(["Heist"]));

        // 🔗 the dependency lookup walked from the beginning of time, not from the film checkpoint
        let cursors: Vec<_> = store
            .calls()
            .await
            .into_iter()
            .filter_map(|call| match call {
                StoreCall::FilmWorksReferencing { entity: EntityType::Genre, after, .. } => Some(after),
                _ => None,
            })
            .collect();
        assert_eq!(
            cursors[cursors.len() - 2..],
            [FilmCursor::start(), FilmCursor { updated_at: at(10), id: id(1) }],
            "one page with film 1, then an empty page after it"
        );
        Ok(())
    }

    #[tokio::test]
    async fn the_one_where_one_rejected_document_is_only_a_log_line() -> Result<()> {
        let mut tables = catalogue();
        tables.film_work = (1..=10).map(|n| film(n, &format!("Film {}", n), n as i64)).collect();
        let store = InMemoryStore::new(tables);
        let index = InMemoryIndex::new();
        index.reject_id(&id(7).to_string()).await;
        let mut supervisor = supervisor_over(&store, &index, &impatient_runtime(100));

        let report = supervisor.run_pass().await;
        assert!(report.is_success());
        assert_eq!(synced_documents(&report, EntityType::FilmWork), Some(9));
        Ok(())
    }

    #[tokio::test]
    async fn the_one_where_one_rejected_document_fails_the_pass_under_the_fail_policy() -> Result<()> {
        let mut tables = catalogue();
        tables.film_work = (1..=10).map(|n| film(n, &format!("Film {}", n), n as i64)).collect();
        let store = InMemoryStore::new(tables);
        let index = InMemoryIndex::new();
        index.reject_id(&id(7).to_string()).await;
        let runtime = RuntimeConfig {
            bulk_item_errors: BulkItemErrorPolicy::Fail,
            ..impatient_runtime(100)
        };
        let mut supervisor = supervisor_over(&store, &index, &runtime);

        let report = supervisor.run_pass().await;
        assert!(!report.is_success());
        assert!(report.failed_entities().contains(&EntityType::FilmWork));
        Ok(())
    }

    #[tokio::test]
    async fn the_one_where_a_broken_entity_does_not_stop_the_others() -> Result<()> {
        let store = InMemoryStore::new(catalogue());
        let index = InMemoryIndex::new();
        let mut supervisor = supervisor_over(&store, &index, &impatient_runtime(100));

        // 💥 the very first query (film_work change detection) blows up
        store.fail_next(1).await;
        let report = supervisor.run_pass().await;

        assert_eq!(report.failed_entities(), vec![EntityType::FilmWork]);
        // person and genre still ran, and their dependents brought both films in anyway
        assert_eq!(synced_documents(&report, EntityType::Person), Some(2));
        assert_eq!(index.documents("movies").await.len(), 2);

        // 🔁 next pass: film_work catches up from the beginning of time
        let next = supervisor.run_pass().await;
        assert!(next.is_success());
        assert_eq!(synced_documents(&next, EntityType::FilmWork), Some(2));
        Ok(())
    }

    #[tokio::test]
    async fn the_one_where_a_restart_resumes_from_the_checkpoint_file() -> Result<()> {
        let dir = tempfile::tempdir()?;
        let offsets_config = JsonFileOffsetsConfig { path: dir.path().join("data_storage") };
        let store = InMemoryStore::new(catalogue());
        let index = InMemoryIndex::new();

        let mut before = Supervisor::new(
            StoreBackend::InMemory(store.clone()),
            IndexBackend::InMemory(index.clone()),
            OffsetBackend::File(JsonFileOffsets::new(offsets_config.clone())),
            &impatient_runtime(100),
        );
        assert_eq!(before.run_pass().await.documents_loaded(), 6);
        drop(before);

        let mut after = Supervisor::new(
            StoreBackend::InMemory(store.clone()),
            IndexBackend::InMemory(index.clone()),
            OffsetBackend::File(JsonFileOffsets::new(offsets_config.clone())),
            &impatient_runtime(100),
        );
        let report = after.run_pass().await;
        assert!(report.is_success());
        assert_eq!(report.documents_loaded(), 0, "everything was already checkpointed");

        let mut offsets = JsonFileOffsets::new(offsets_config);
        assert_eq!(
            offsets.get("film_work_updated_at").await?,
            Some(at(20).to_rfc3339())
        );
        assert_eq!(offsets.get("person_updated_at").await?, Some(at(5).to_rfc3339()));
        Ok(())
    }

    #[tokio::test]
    async fn the_one_where_ctrl_c_is_heard_between_passes() -> Result<()> {
        let store = InMemoryStore::new(catalogue());
        let index = InMemoryIndex::new();
        let mut supervisor = supervisor_over(&store, &index, &impatient_runtime(100));
        supervisor.poll_interval = short_poll();

        let (doorbell, shutdown) = async_channel::bounded::<()>(1);
        let handle = tokio::spawn(async move { supervisor.run(shutdown).await });

        tokio::time::sleep(short_poll() * 5).await;
        doorbell.close();

        tokio::time::timeout(Duration::from_secs(5), handle).await???;
        assert_eq!(index.documents("movies").await.len(), 2);
        Ok(())
    }
}

//! 📊 Pass reports: what each entity pipeline did during one scheduling pass.
//!
//! Rendered as a comfy-table at the end of every pass, so the logs read like a box score
//! instead of a ransom note.

use std::time::Duration;

use comfy_table::{Cell, CellAlignment, ContentArrangement, Table, presets::NOTHING};

use crate::common::EntityType;
use crate::pipeline::DetectionReport;

fn format_duration(duration: Duration) -> String {
    let millis = duration.as_millis();
    if millis < 1000 {
        format!("{} ms", millis)
    } else {
        format!("{:.2} s", duration.as_secs_f64())
    }
}

/// 🏁 How one entity pipeline ended.
#[derive(Debug)]
pub enum EntityOutcome {
    Synced {
        pages: usize,
        ids: usize,
        documents: usize,
    },
    /// The error chain, already rendered. The checkpoint did not move past the failed page.
    Failed(String),
}

#[derive(Debug)]
pub struct EntityReport {
    pub entity: EntityType,
    pub outcome: EntityOutcome,
    pub elapsed: Duration,
}

impl EntityReport {
    pub(crate) fn from_detection(
        entity: EntityType,
        result: &anyhow::Result<DetectionReport>,
        elapsed: Duration,
    ) -> Self {
        let outcome = match result {
            Ok(report) => EntityOutcome::Synced {
                pages: report.pages,
                ids: report.ids,
                documents: report.documents,
            },
            Err(err) => EntityOutcome::Failed(format!("{:#}", err)),
        };
        Self {
            entity,
            outcome,
            elapsed,
        }
    }
}

/// 📋 One full pass over film_work, person and genre.
#[derive(Debug, Default)]
pub struct PassReport {
    pub entities: Vec<EntityReport>,
    pub elapsed: Duration,
}

impl PassReport {
    pub fn is_success(&self) -> bool {
        self.entities
            .iter()
            .all(|entry| matches!(entry.outcome, EntityOutcome::Synced { .. }))
    }

    pub fn documents_loaded(&self) -> usize {
        self.entities
            .iter()
            .map(|entry| match entry.outcome {
                EntityOutcome::Synced { documents, .. } => documents,
                EntityOutcome::Failed(_) => 0,
            })
            .sum()
    }

    pub fn failed_entities(&self) -> Vec<EntityType> {
        self.entities
            .iter()
            .filter(|entry| matches!(entry.outcome, EntityOutcome::Failed(_)))
            .map(|entry| entry.entity)
            .collect()
    }

    /// 🍽️ entity | pages | ids | documents | outcome | elapsed
    pub fn render_table(&self) -> String {
        let mut table = Table::new();
        table.load_preset(NOTHING);
        table.set_content_arrangement(ContentArrangement::Dynamic);
        table.set_header(vec!["entity", "pages", "ids", "documents", "outcome", "elapsed"]);

        for entry in &self.entities {
            let (pages, ids, documents, outcome) = match entry.outcome {
                EntityOutcome::Synced { pages, ids, documents } => {
                    (pages.to_string(), ids.to_string(), documents.to_string(), "✅ synced")
                }
                EntityOutcome::Failed(_) => ("-".to_string(), "-".to_string(), "-".to_string(), "💀 failed"),
            };
            table.add_row(vec![
                Cell::new(entry.entity),
                Cell::new(pages).set_alignment(CellAlignment::Right),
                Cell::new(ids).set_alignment(CellAlignment::Right),
                Cell::new(documents).set_alignment(CellAlignment::Right),
                Cell::new(outcome),
                Cell::new(format_duration(entry.elapsed)).set_alignment(CellAlignment::Right),
            ]);
        }

        table.to_string()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn report() -> PassReport {
        PassReport {
            entities: vec![
                EntityReport {
                    entity: EntityType::FilmWork,
                    outcome: EntityOutcome::Synced { pages: 2, ids: 150, documents: 150 },
                    elapsed: Duration::from_millis(420),
                },
                EntityReport {
                    entity: EntityType::Person,
                    outcome: EntityOutcome::Failed("connection refused".to_string()),
                    elapsed: Duration::from_secs(3),
                },
                EntityReport {
                    entity: EntityType::Genre,
                    outcome: EntityOutcome::Synced { pages: 0, ids: 0, documents: 0 },
                    elapsed: Duration::from_millis(3),
                },
            ],
            elapsed: Duration::from_secs(4),
        }
    }

    #[test]
    fn the_one_where_one_failure_spoils_the_pass_but_not_the_count() {
        let report = report();
        assert!(!report.is_success());
        assert_eq!(report.documents_loaded(), 150);
        assert_eq!(report.failed_entities(), vec![EntityType::Person]);
    }

    #[test]
    fn the_one_where_the_table_has_a_row_per_entity() {
        let rendered = report().render_table();
        for needle in ["film_work", "person", "genre", "150", "💀 failed", "420 ms", "3.00 s"] {
            assert!(rendered.contains(needle), "missing '{}' in:\n{}", needle, rendered);
        }
    }

    #[test]
    fn the_one_where_an_empty_pass_is_a_successful_pass() {
        assert!(PassReport::default().is_success());
    }
}

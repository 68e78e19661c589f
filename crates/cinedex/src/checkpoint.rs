//! 🔖 Per-entity checkpoints on top of the offset store.
//!
//! A checkpoint is the highest `updated_at` whose page has been fully loaded. It is stored
//! as RFC 3339 under `<table>_updated_at` and only ever moves forward.

use anyhow::{Context, Result};
use chrono::{DateTime, NaiveDateTime, Utc};
use tracing::{debug, warn};

use crate::backends::OffsetStore;
use crate::common::{EntityType, beginning_of_time};

/// ⏳ Read the checkpoint, falling back to [`beginning_of_time`] when there is none.
///
/// A value that can't be parsed is treated as absent (with a warning): re-reading history
/// is annoying, refusing to run is worse.
pub(crate) async fn load<O>(offsets: &mut O, entity: EntityType) -> Result<DateTime<Utc>>
where
    O: OffsetStore + ?Sized,
{
    let key = entity.checkpoint_key();
    let stored = offsets
        .get(&key)
        .await
        .context(format!("💀 Could not read checkpoint '{}'.", key))?;

    Ok(match stored {
        None => {
            debug!("🔖 No checkpoint for {} yet. Starting from the beginning of time.", entity);
            beginning_of_time()
        }
        Some(raw) => match parse(&raw) {
            Some(checkpoint) => checkpoint,
            None => {
                warn!(
                    "⚠️ Checkpoint '{}' holds '{}', which is not a timestamp. Starting {} from the beginning of time.",
                    key, raw, entity
                );
                beginning_of_time()
            }
        },
    })
}

/// ⏩ Move the checkpoint to `candidate`, unless it's already further along.
///
/// Returns the value that is stored afterwards.
pub(crate) async fn advance<O>(
    offsets: &mut O,
    entity: EntityType,
    candidate: DateTime<Utc>,
) -> Result<DateTime<Utc>>
where
    O: OffsetStore + ?Sized,
{
    let current = load(offsets, entity).await?;
    if candidate <= current {
        return Ok(current);
    }

    let key = entity.checkpoint_key();
    offsets
        .set(&key, &candidate.to_rfc3339())
        .await
        .context(format!("💀 Could not persist checkpoint '{}'.", key))?;
    debug!("🔖 {} checkpoint {} → {}", entity, current, candidate);
    Ok(candidate)
}

/// RFC 3339 first; a bare ISO-8601 timestamp without an offset is read as UTC.
fn parse(raw: &str) -> Option<DateTime<Utc>> {
    if let Ok(with_offset) = DateTime::parse_from_rfc3339(raw) {
        return Some(with_offset.with_timezone(&Utc));
    }
    NaiveDateTime::parse_from_str(raw, "%Y-%m-%dT%H:%M:%S%.f")
        .or_else(|_| NaiveDateTime::parse_from_str(raw, "%Y-%m-%d %H:%M:%S%.f"))
        .ok()
        .map(|naive| naive.and_utc())
}

//! The not-diffable check.

use tracing::{debug, info};

use items::ItemDefinition;

use crate::diff::Diff;
use crate::error::{EngineError, EngineResult};

/// Bytes of target content that only the remainder can supply.
///
/// Runs on an assembled diff, so items a source copy, a target recipe or a
/// delta already resolves are not counted. What is left is exactly what the
/// remainder blob will carry.
#[must_use]
pub fn undiffable_bytes(diff: &Diff) -> u64 {
    diff.needed()
        .iter()
        .inspect(|item| debug!(target: "diffgen::pipeline", item = %item, "undiffable"))
        .map(ItemDefinition::length)
        .sum()
}

/// Fails with [`EngineError::NotDiffable`] when [`undiffable_bytes`]
/// exceeds `threshold`.
pub fn check_diffable(diff: &Diff, threshold: u64) -> EngineResult<u64> {
    let undiffable = undiffable_bytes(diff);
    info!(target: "diffgen::pipeline", undiffable, threshold, "diffability");
    if undiffable > threshold {
        return Err(EngineError::NotDiffable {
            undiffable,
            threshold,
        });
    }
    Ok(undiffable)
}

//! Running the delta builders over every plan.

use std::collections::{BTreeMap, BTreeSet};
use std::path::Path;
use std::sync::atomic::{AtomicUsize, Ordering};

use rayon::prelude::*;
use tracing::{debug, info};

use items::ItemDefinition;

use super::{DeltaBuilder, DeltaCatalog, DeltaJob, DeltaPlan};
use crate::cancel::CancellationToken;
use crate::error::EngineResult;
use crate::extract::{ItemExtractor, item_path};

/// Counters from one [`create_deltas`] run.
#[derive(Clone, Copy, Debug, Default, Eq, PartialEq)]
pub struct DeltaRunStats {
    /// Builder invocations attempted.
    pub attempted: usize,
    /// Invocations that produced a usable asset.
    pub built: usize,
    /// Targets with an accepted delta.
    pub targets: usize,
}

/// Folders the extracted items and assets go to.
#[derive(Clone, Copy, Debug)]
pub struct DeltaFolders<'a> {
    /// Extracted source items.
    pub source_items: &'a Path,
    /// Extracted target items.
    pub target_items: &'a Path,
    /// Delta assets.
    pub assets: &'a Path,
}

/// Builds deltas for `plans` and returns the catalog of winners.
///
/// Items some builder will look at are extracted first, one file per
/// identity. Plans are then grouped by target and the groups run in
/// parallel; inside a group, candidates and builders are tried in order,
/// so the earliest of equally small deltas wins deterministically.
pub fn create_deltas(
    plans: &[DeltaPlan],
    builders: &[Box<dyn DeltaBuilder>],
    source: &mut ItemExtractor,
    target: &mut ItemExtractor,
    folders: DeltaFolders<'_>,
    cancel: &CancellationToken,
) -> EngineResult<(DeltaCatalog, DeltaRunStats)> {
    let accepted: Vec<&DeltaPlan> = plans
        .iter()
        .filter(|plan| builders.iter().any(|builder| builder.accepts(plan)))
        .collect();

    let mut sources = BTreeSet::new();
    let mut targets = BTreeSet::new();
    for plan in &accepted {
        sources.insert(plan.source.clone());
        targets.insert(plan.target.clone());
    }
    for item in &sources {
        cancel.check()?;
        source.extract_to(item, folders.source_items)?;
    }
    for item in &targets {
        cancel.check()?;
        target.extract_to(item, folders.target_items)?;
    }
    debug!(
        target: "diffgen::delta",
        sources = sources.len(),
        targets = targets.len(),
        "extracted delta inputs"
    );

    let mut groups: BTreeMap<ItemDefinition, Vec<&DeltaPlan>> = BTreeMap::new();
    for plan in accepted {
        groups.entry(plan.target.clone()).or_default().push(plan);
    }
    let groups: Vec<Vec<&DeltaPlan>> = groups.into_values().collect();

    let catalog = DeltaCatalog::new();
    let attempted = AtomicUsize::new(0);
    let built = AtomicUsize::new(0);

    groups.par_iter().try_for_each(|group| -> EngineResult<()> {
        for &plan in group {
            let source_path = item_path(folders.source_items, &plan.source);
            let target_path = item_path(folders.target_items, &plan.target);
            let job = DeltaJob {
                plan,
                source_path: &source_path,
                target_path: &target_path,
                folder: folders.assets,
                cancel,
            };
            for builder in builders.iter().filter(|builder| builder.accepts(plan)) {
                cancel.check()?;
                attempted.fetch_add(1, Ordering::Relaxed);
                if let Some(entry) = builder.build(&job)? {
                    built.fetch_add(1, Ordering::Relaxed);
                    catalog.offer(entry);
                }
            }
        }
        Ok(())
    })?;

    let stats = DeltaRunStats {
        attempted: attempted.into_inner(),
        built: built.into_inner(),
        targets: catalog.len(),
    };
    info!(
        target: "diffgen::delta",
        plans = plans.len(),
        attempted = stats.attempted,
        built = stats.built,
        targets = stats.targets,
        "delta creation finished"
    );
    Ok((catalog, stats))
}

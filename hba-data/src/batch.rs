//! Parallel attribution of a batch of units.

use rayon::prelude::*;
use serde::Serialize;

use hba_core::{Record, SpatialUnit, UnitId};
use hba_utils::timing::Stopwatch;

use crate::attribution::BasinAttributor;
use crate::error::Result;
use crate::zonal::ZonalStatistics;

/// Batch-level settings.
#[derive(Debug, Clone, Default)]
pub struct AttributeConfig {
    /// Worker threads; all cores when unset.
    pub threads: Option<usize>,
}

/// A unit excluded from the output.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct UnitFailure {
    pub id: UnitId,
    pub reason: String,
}

/// Records produced by one batch plus what it takes to detect gaps.
#[derive(Debug, Default)]
pub struct BatchOutcome {
    /// One record per successful unit, in no particular order.
    pub records: Vec<Record>,
    pub failures: Vec<UnitFailure>,
    /// Number of units submitted.
    pub expected: usize,
}

impl BatchOutcome {
    /// Every submitted unit produced a record.
    pub fn complete(&self) -> bool {
        self.records.len() == self.expected
    }

    pub fn partial_count(&self) -> usize {
        self.records.iter().filter(|r| r.partial()).count()
    }

    /// Add input features that never became units, counted as expected and failed.
    pub fn add_skipped(&mut self, skipped: &[UnitFailure]) {
        self.expected += skipped.len();
        self.failures.extend_from_slice(skipped);
    }
}

pub(crate) fn thread_pool(threads: Option<usize>) -> Result<rayon::ThreadPool> {
    let mut builder = rayon::ThreadPoolBuilder::new();
    if let Some(n) = threads {
        builder = builder.num_threads(n);
    }
    Ok(builder.build()?)
}

/// Attribute every unit in parallel.
///
/// Recoverable unit errors exclude that unit and are listed in
/// [`BatchOutcome::failures`]. A fatal error aborts the batch.
pub fn attribute_batch<Z: ZonalStatistics>(
    attributor: &BasinAttributor<Z>,
    units: &[SpatialUnit],
    config: &AttributeConfig,
) -> Result<BatchOutcome> {
    let stopwatch = Stopwatch::start();
    let pool = thread_pool(config.threads)?;
    log::info!(
        "batch: attributing {} units against {} sources on {} threads",
        units.len(),
        attributor.catalogue().selected().count(),
        pool.current_num_threads()
    );

    let results: Vec<std::result::Result<Record, UnitFailure>> = pool.install(|| {
        units
            .par_iter()
            .map(|unit| match attributor.attribute(unit) {
                Ok(record) => Ok(Ok(record)),
                Err(e) if e.is_fatal() => Err(e),
                Err(e) => {
                    log::warn!("batch: excluding unit {}: {}", unit.id, e);
                    Ok(Err(UnitFailure {
                        id: unit.id.clone(),
                        reason: e.to_string(),
                    }))
                }
            })
            .collect::<hba_core::Result<Vec<_>>>()
    })?;

    let mut outcome = BatchOutcome {
        expected: units.len(),
        ..BatchOutcome::default()
    };
    for result in results {
        match result {
            Ok(record) => outcome.records.push(record),
            Err(failure) => outcome.failures.push(failure),
        }
    }

    log::info!(
        "batch: {} units processed, {} failed, {} partial in {:.1}s",
        outcome.records.len(),
        outcome.failures.len(),
        outcome.partial_count(),
        stopwatch.elapsed_seconds()
    );
    Ok(outcome)
}

//! Staged image transformation.
//!
//! Every record goes through the same ordered chain:
//!
//! ```text
//! normalize format ──► resize (optional) ──► optimize (optional)
//! ```
//!
//! Each stage records the payload size it produced in the record's lineage.
//! A stage whose result would not be smaller keeps the prior payload and
//! records an explicit no-op. The first failing stage ends the chain for that
//! record only; siblings keep going.

mod error;
mod normalize;
mod optimize;
mod resize;
pub mod settings;

pub use crate::index::Stage;
pub use error::StageError;
pub use settings::{Overrides, QualityWarning, Settings};

use std::sync::atomic::{AtomicBool, Ordering};

use rayon::prelude::*;

use crate::codec::Codec;
use crate::index::{ImageId, ImageIndex, ImageRecord, Payload, StageFailure, StageSize};
use crate::logger::ProgressLine;
use crate::report::{Reporter, StageEvent, Warning};

/// Record whose chain stopped on an error.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FailedRecord {
    pub id: ImageId,
    pub filename: String,
    pub failure: StageFailure,
}

/// What a parallel run did.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct RunOutcome {
    pub processed: usize,
    /// Records left untouched because the run was cancelled.
    pub skipped: usize,
    pub failed: Vec<FailedRecord>,
    /// Converted records that took a numbered name to avoid a collision.
    pub relocated: Vec<ImageId>,
}

impl RunOutcome {
    pub fn is_interrupted(&self) -> bool {
        self.skipped > 0
    }
}

enum Step {
    Done,
    Skipped,
    Failed(FailedRecord),
}

pub struct Pipeline<'a> {
    codec: &'a dyn Codec,
    settings: Settings,
    reporter: &'a dyn Reporter,
    cancel: &'a AtomicBool,
}

impl<'a> Pipeline<'a> {
    pub fn new(
        codec: &'a dyn Codec,
        settings: Settings,
        reporter: &'a dyn Reporter,
        cancel: &'a AtomicBool,
    ) -> Self {
        Self {
            codec,
            settings,
            reporter,
            cancel,
        }
    }

    pub fn settings(&self) -> &Settings {
        &self.settings
    }

    /// Stages enabled by the settings, in execution order.
    pub fn stages(&self) -> Vec<Stage> {
        let mut stages = vec![Stage::Normalize];
        if self.settings.resize_factor.is_some() {
            stages.push(Stage::Resize);
        }
        if self.settings.optimize {
            stages.push(Stage::Optimize);
        }
        stages
    }

    /// Run one stage on one record.
    pub fn apply(&self, stage: Stage, record: &mut ImageRecord) -> Result<StageSize, StageError> {
        match stage {
            Stage::Normalize => self.normalize_format(record),
            Stage::Resize => {
                let factor = self.settings.resize_factor.unwrap_or(settings::SAFE_RESIZE_FACTOR);
                self.resize(record, factor)
            }
            Stage::Optimize => self.optimize(record, self.settings.jpeg_quality),
        }
    }

    /// Run all enabled stages on one record, stopping at the first error.
    ///
    /// A record that already carries a failure is not touched again.
    pub fn process(&self, record: &mut ImageRecord) -> Result<(), StageFailure> {
        if let Some(failure) = &record.failure {
            return Err(failure.clone());
        }
        for stage in self.stages() {
            if let Err(err) = self.apply(stage, record) {
                let failure = StageFailure {
                    stage,
                    message: err.to_string(),
                };
                record.failure = Some(failure.clone());
                return Err(failure);
            }
        }
        Ok(())
    }

    /// Process every record of the index in parallel.
    ///
    /// Quality warnings are reported once, before any record is touched.
    /// Afterwards every converted record holds a file name of its own.
    pub fn run(&self, index: &mut ImageIndex, progress: Option<&ProgressLine>) -> RunOutcome {
        for warning in self.settings.warnings() {
            self.reporter.warning(&Warning::QualitySetting(warning));
        }

        let steps: Vec<Step> = index
            .records_mut()
            .par_iter_mut()
            .map(|record| {
                if self.cancel.load(Ordering::Relaxed) {
                    return Step::Skipped;
                }
                let step = match self.process(record) {
                    Ok(()) => Step::Done,
                    Err(failure) => Step::Failed(FailedRecord {
                        id: record.id(),
                        filename: record.filename.clone(),
                        failure,
                    }),
                };
                if let Some(p) = progress {
                    p.inc("images");
                }
                step
            })
            .collect();

        let mut outcome = RunOutcome::default();
        for step in steps {
            match step {
                Step::Done => outcome.processed += 1,
                Step::Skipped => outcome.skipped += 1,
                Step::Failed(failed) => {
                    outcome.processed += 1;
                    outcome.failed.push(failed);
                }
            }
        }
        outcome.relocated = index.claim_filenames();
        outcome
    }

    /// Store a stage result on the record and report it.
    ///
    /// `candidate` replaces the payload only when it is strictly smaller;
    /// otherwise the stage is recorded as a no-op at the current size.
    fn commit(
        &self,
        stage: Stage,
        record: &mut ImageRecord,
        candidate: Option<Payload>,
    ) -> Result<StageSize, StageError> {
        let current = record.payload.as_ref().ok_or(StageError::MissingPayload)?;
        let before = current.len();
        let current_format = current.format;

        let (size, changed) = match candidate {
            Some(next) if next.len() < before => {
                let size = StageSize::applied(next.len());
                if next.format != current_format {
                    record.rename_for(next.format);
                }
                record.payload = Some(next);
                (size, true)
            }
            // A repeated run keeps the earlier result
            _ => match record.lineage.get(stage) {
                Some(prior) if prior.bytes == before => (prior, false),
                _ => (StageSize::noop(before), false),
            },
        };
        record.lineage.set(stage, size);

        self.reporter.stage(&StageEvent {
            stage,
            id: record.id(),
            filename: record.filename.clone(),
            before,
            after: size.bytes,
            applied: changed,
        });
        Ok(size)
    }
}

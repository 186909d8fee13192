//! Reporting collaborator.
//!
//! The pipeline and the scanner emit structured events; formatting them for a
//! human happens here and nowhere else.

pub mod summary;

use std::fmt;

use crate::index::{ImageId, ReferenceKind, Stage};
use crate::metadata::ObjectPath;
use crate::pipeline::QualityWarning;
use crate::{debug, log};

/// One stage ran on one record.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StageEvent {
    pub stage: Stage,
    pub id: ImageId,
    pub filename: String,
    pub before: u64,
    pub after: u64,
    /// `false` when the stage kept the prior payload.
    pub applied: bool,
}

/// Non-fatal conditions.
#[derive(Debug, Clone, PartialEq)]
pub enum Warning {
    /// A reference names an identifier the index does not know.
    DanglingReference {
        fragment: String,
        path: ObjectPath,
        id: ImageId,
        kind: ReferenceKind,
    },
    /// A quality setting likely to degrade visible output.
    QualitySetting(QualityWarning),
}

impl fmt::Display for Warning {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::DanglingReference {
                fragment,
                path,
                id,
                kind,
            } => {
                let kind = match kind {
                    ReferenceKind::Slide => "image",
                    ReferenceKind::Style => "style fill",
                };
                write!(f, "{fragment}: {kind} at {path} refers to unknown image {id}")
            }
            Self::QualitySetting(warning) => write!(f, "{warning}"),
        }
    }
}

/// Sink for pipeline events. Shared across worker threads.
pub trait Reporter: Send + Sync {
    fn stage(&self, event: &StageEvent);

    fn warning(&self, warning: &Warning);
}

/// Reports through the terminal logger. Stage events show only in verbose mode.
#[derive(Debug, Clone, Copy, Default)]
pub struct LogReporter;

impl Reporter for LogReporter {
    fn stage(&self, event: &StageEvent) {
        if event.applied {
            debug!(
                event.stage.name();
                "{} {}: {} -> {}",
                event.id,
                event.filename,
                event.before,
                event.after
            );
        } else {
            debug!(event.stage.name(); "{} {}: unchanged", event.id, event.filename);
        }
    }

    fn warning(&self, warning: &Warning) {
        log!("warning"; "{warning}");
    }
}

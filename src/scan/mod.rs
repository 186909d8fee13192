//! Reference discovery.
//!
//! Walks every fragment depth-first (chunks, archives, objects in insertion
//! order) and attaches a [`Reference`] to the record of each image it finds:
//!
//! - placed images (`TSD.ImageArchive`) display at their geometry size;
//! - slide style fills (`KN.SlideStyleArchive`) cover the whole slide.
//!
//! Identifiers the index does not know are dangling. They are never stored.

use crate::index::{ImageId, ImageIndex, Reference, ReferenceKind};
use crate::metadata::{Fill, Fragment, Object, Size};
use crate::report::{Reporter, Warning};

/// Slide size assumed when the document does not declare one.
pub const DEFAULT_SLIDE_SIZE: Size = Size::new(1920, 1080);

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ScanOptions {
    /// Display size of style fills.
    pub slide_size: Size,
    /// Report dangling style fills too (placed images always are).
    pub warn_dangling_styles: bool,
}

impl Default for ScanOptions {
    fn default() -> Self {
        Self {
            slide_size: DEFAULT_SLIDE_SIZE,
            warn_dangling_styles: false,
        }
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct ScanStats {
    pub fragments: usize,
    pub objects: usize,
    /// References newly attached by this scan.
    pub references: usize,
    pub dangling: usize,
}

#[derive(Debug, Clone, Copy, Default)]
pub struct ReferenceScanner {
    options: ScanOptions,
}

impl ReferenceScanner {
    pub fn new(options: ScanOptions) -> Self {
        Self { options }
    }

    pub fn scan(
        &self,
        fragments: &[Fragment],
        index: &mut ImageIndex,
        reporter: &dyn Reporter,
    ) -> ScanStats {
        let mut stats = ScanStats::default();

        for fragment in fragments {
            stats.fragments += 1;
            for (path, object) in fragment.objects() {
                stats.objects += 1;
                let Some((id, kind, display)) = self.target(object) else {
                    continue;
                };

                match index.get_mut(id) {
                    Some(record) => {
                        let inserted = record.references.insert(Reference {
                            fragment: fragment.name.clone(),
                            path,
                            kind,
                            display,
                        });
                        if inserted {
                            stats.references += 1;
                        }
                    }
                    None => {
                        stats.dangling += 1;
                        if kind == ReferenceKind::Slide || self.options.warn_dangling_styles {
                            reporter.warning(&Warning::DanglingReference {
                                fragment: fragment.name.clone(),
                                path,
                                id,
                                kind,
                            });
                        }
                    }
                }
            }
        }

        stats
    }

    /// The image an object refers to, how, and at which display size.
    fn target(&self, object: &Object) -> Option<(ImageId, ReferenceKind, Option<Size>)> {
        match object {
            Object::Image {
                identifier: Some(id),
                display,
            } => Some((ImageId(*id), ReferenceKind::Slide, *display)),
            Object::SlideStyle {
                fill: Some(Fill::Image {
                    identifier: Some(id),
                }),
            } => Some((
                ImageId(*id),
                ReferenceKind::Style,
                Some(self.options.slide_size),
            )),
            _ => None,
        }
    }
}

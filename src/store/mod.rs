//! Item store and output collection boundaries.
//!
//! The pipeline only sees records through these traits; [`sdf`] is the bundled SD file implementation.

pub mod sdf;

use std::path::Path;

use crate::error::StoreError;
use crate::utils::tempfiles::{Artifact, ArtifactDir};

pub use sdf::{SdfRecord, SdfStore, SdfWriter};

/// Lazy, finite, forward-only sequence of records.
pub type RecordStream<'a, R> = Box<dyn Iterator<Item = Result<R, StoreError>> + 'a>;

/// Reads records from a collection and moves single records in and out of temporary artifacts.
pub trait ItemStore: Send + Sync + 'static {
    type Record: Send + 'static;
    /// Per-record data carried alongside the artifact and restored on the converted record.
    type Annotations: Send + 'static;

    /// Number of records in `source`, when cheap enough to know up front (progress totals).
    fn count(&self, _source: &Path) -> Option<u64> {
        None
    }

    /// Open the source. Failing here is fatal to the run; per-record errors come through the stream.
    fn open<'a>(&'a self, source: &Path) -> Result<RecordStream<'a, Self::Record>, StoreError>;

    /// Records with nothing to convert travel as `Payload::Empty`.
    fn is_empty(&self, _record: &Self::Record) -> bool {
        false
    }

    fn annotations(&self, record: &Self::Record) -> Self::Annotations;

    /// Write one record to a fresh artifact under `dir`.
    fn materialize(&self, record: &Self::Record, dir: &ArtifactDir) -> Result<Artifact, StoreError>;

    /// Read every record (conformer) from a converted artifact.
    fn load(&self, artifact: &Path) -> Result<Vec<Self::Record>, StoreError>;

    fn annotate(&self, record: &mut Self::Record, annotations: &Self::Annotations);
}

/// Appendable output collection. `finish` flushes and finalizes the container.
pub trait RecordSink<R>: Send + 'static {
    fn append(&mut self, record: &R) -> Result<(), StoreError>;
    fn finish(&mut self) -> Result<(), StoreError>;
}

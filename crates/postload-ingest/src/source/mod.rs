//! Annotation sources
//!
//! An [`AnnotationSource`] is a finite stream of [`VariantAnnotation`]s that
//! is opened once, consumed in bounded batches and closed once. Sources are
//! only driven through [`OpenSource`], which brackets the reads with the
//! source's pre/post hooks and guarantees the close on every exit path.

pub mod vep;

pub use vep::VepReader;

use postload_common::types::VariantAnnotation;
use tracing::{debug, warn};

use crate::error::SourceError;

/// Producer of annotation records
///
/// Call order is always `open`, `pre`, `read_batch`*, `post`, `close`, with
/// `post` skipped when `pre` failed and `read_batch` never called after it.
pub trait AnnotationSource: Send {
    /// Human-readable identifier, usually the file path
    fn identifier(&self) -> String;

    fn open(&mut self) -> Result<(), SourceError>;

    /// Format-specific initialization before the first read (headers, ...)
    fn pre(&mut self) -> Result<(), SourceError> {
        Ok(())
    }

    /// Return up to `max_size` records
    ///
    /// Fewer than `max_size` only for the final non-empty batch; an empty
    /// vector signals exhaustion.
    fn read_batch(&mut self, max_size: usize) -> Result<Vec<VariantAnnotation>, SourceError>;

    /// Format-specific finalization after the last read
    fn post(&mut self) -> Result<(), SourceError> {
        Ok(())
    }

    fn close(&mut self) -> Result<(), SourceError>;
}

/// An opened source whose cleanup is guaranteed
///
/// [`OpenSource::finish`] runs `post` + `close` and reports their outcome.
/// If the guard is dropped without `finish` (early return, `?`, panic), the
/// same cleanup runs in `Drop` and failures are logged. Either way the
/// source is closed exactly once.
pub struct OpenSource<'a, S: AnnotationSource + ?Sized> {
    source: &'a mut S,
    prepared: bool,
    released: bool,
}

impl<'a, S: AnnotationSource + ?Sized> OpenSource<'a, S> {
    /// Open `source`
    ///
    /// A failing `open` leaves nothing to clean up. Once this returns, the
    /// guard owns the close.
    pub fn open(source: &'a mut S) -> Result<Self, SourceError> {
        source.open()?;
        debug!(source = %source.identifier(), "Annotation source opened");

        Ok(Self {
            source,
            prepared: false,
            released: false,
        })
    }

    /// Run the source's pre-read hook
    ///
    /// When it fails, `post` is skipped at release but `close` still runs.
    pub fn prepare(&mut self) -> Result<(), SourceError> {
        self.source.pre()?;
        self.prepared = true;
        Ok(())
    }

    pub fn identifier(&self) -> String {
        self.source.identifier()
    }

    pub fn read_batch(&mut self, max_size: usize) -> Result<Vec<VariantAnnotation>, SourceError> {
        self.source.read_batch(max_size)
    }

    /// Finalize and close, surfacing any cleanup failure
    pub fn finish(mut self) -> Result<(), SourceError> {
        self.release()
    }

    fn release(&mut self) -> Result<(), SourceError> {
        if self.released {
            return Ok(());
        }
        self.released = true;

        let post = if self.prepared {
            self.source.post()
        } else {
            Ok(())
        };
        let close = self.source.close();
        debug!(source = %self.source.identifier(), "Annotation source closed");

        post.and(close)
    }
}

impl<S: AnnotationSource + ?Sized> Drop for OpenSource<'_, S> {
    fn drop(&mut self) {
        if let Err(e) = self.release() {
            warn!(
                source = %self.source.identifier(),
                error = %e,
                "Failed to close annotation source after an aborted run"
            );
        }
    }
}

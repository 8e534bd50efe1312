//! Batch optimization pipeline.
//!
//! One batch runs these stages in order:
//! - **discovery**: Find image files under the input roots
//! - **filter**: Drop jobs whose output already exists
//! - **pool**: Run the remaining jobs on a bounded set of blocking workers
//! - **processor**: Resize, trim, blur, grayscale and encode one image
//! - **aggregate**: Count results and group metadata entries by game
//! - **sidecar**: Merge the entries into `metadata.json`
//!
//! `naming` is shared by filter, processor and aggregate; `resize` holds the
//! dimension math and `backend` the image library boundary, with `avif` and
//! `svg` as its decoders for inputs the `image` crate cannot read.

pub mod aggregate;
mod avif;
pub mod backend;
pub mod batch;
pub mod discovery;
pub mod filter;
pub mod naming;
pub mod pool;
pub mod processor;
pub mod report;
pub mod resize;
pub mod sidecar;
mod svg;

// Re-exports for convenient access
pub use aggregate::Aggregate;
pub use backend::{BackendError, ImageBackend, ImageInfo, RustBackend};
pub use batch::{BatchOutcome, BatchProgress, Optimizer};
pub use discovery::JobCollector;
pub use pool::{BatchResults, JobRunner, WorkerPool};
pub use processor::ImageProcessor;
pub use resize::{Dimensions, Fit, ResizePlan};
pub use sidecar::{GameMetadata, MetadataEntry};

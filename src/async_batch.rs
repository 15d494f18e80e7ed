//! Concurrent thumbnail and pyramid jobs
//!
//! Each job opens its own raster handle and runs on tokio's blocking thread
//! pool, so independent files are processed in parallel without sharing any
//! handle between threads.
//!
//! # Example
//!
//! ```rust,ignore
//! use std::sync::Arc;
//! use rasterprep::{compose_thumbnails_concurrent, LocalRasterSource, ThumbnailJob, ThumbnailRequest};
//!
//! #[tokio::main]
//! async fn main() {
//!     let source = Arc::new(LocalRasterSource::new());
//!     let jobs = vec![
//!         ThumbnailJob::new("a.tif", "a.png", ThumbnailRequest::rgb(1, 2, 3, 0.1)),
//!         ThumbnailJob::new("b.tif", "b.jpg", ThumbnailRequest::gray(1, 0.1)),
//!     ];
//!     for result in compose_thumbnails_concurrent(source, Default::default(), &jobs).await {
//!         println!("{result:?}");
//!     }
//! }
//! ```

use std::path::{Path, PathBuf};
use std::sync::Arc;

use futures::future::join_all;

use crate::config::{GridConfig, ThumbnailConfig};
use crate::error::{RasterError, RasterResult};
use crate::pyramid::{TilePyramid, TilePyramidPlanner};
use crate::raster::RasterSource;
use crate::thumbnail::{ThumbnailComposer, ThumbnailRequest, ThumbnailSummary};

/// One thumbnail to render
#[derive(Debug, Clone)]
pub struct ThumbnailJob {
    pub input: PathBuf,
    pub output: PathBuf,
    pub request: ThumbnailRequest,
}

impl ThumbnailJob {
    #[must_use]
    pub fn new(input: impl Into<PathBuf>, output: impl Into<PathBuf>, request: ThumbnailRequest) -> Self {
        Self {
            input: input.into(),
            output: output.into(),
            request,
        }
    }
}

fn join_error(e: tokio::task::JoinError) -> RasterError {
    RasterError::Task(format!("Task join error: {e}"))
}

/// Render one thumbnail on the blocking pool
pub async fn create_thumbnail_async(
    source: Arc<dyn RasterSource>,
    config: ThumbnailConfig,
    job: ThumbnailJob,
) -> RasterResult<ThumbnailSummary> {
    tokio::task::spawn_blocking(move || {
        ThumbnailComposer::new(source.as_ref())
            .with_config(config)
            .create(&job.input, &job.output, &job.request)
    })
    .await
    .map_err(join_error)?
}

/// Render several thumbnails concurrently.
///
/// Results are in the same order as `jobs`; one failing job does not stop
/// the others.
pub async fn compose_thumbnails_concurrent(
    source: Arc<dyn RasterSource>,
    config: ThumbnailConfig,
    jobs: &[ThumbnailJob],
) -> Vec<RasterResult<ThumbnailSummary>> {
    let futures: Vec<_> = jobs
        .iter()
        .map(|job| create_thumbnail_async(Arc::clone(&source), config, job.clone()))
        .collect();

    join_all(futures).await
}

/// Plan one dataset's pyramid on the blocking pool
pub async fn plan_pyramid_async(
    source: Arc<dyn RasterSource>,
    grid: GridConfig,
    path: &Path,
) -> RasterResult<TilePyramid> {
    let path = path.to_path_buf();
    tokio::task::spawn_blocking(move || {
        TilePyramidPlanner::new(grid)?.plan_dataset(source.as_ref(), &path)
    })
    .await
    .map_err(join_error)?
}

/// Plan several datasets concurrently, results in input order
pub async fn plan_pyramids_concurrent(
    source: Arc<dyn RasterSource>,
    grid: GridConfig,
    paths: &[PathBuf],
) -> Vec<RasterResult<TilePyramid>> {
    let futures: Vec<_> = paths
        .iter()
        .map(|path| plan_pyramid_async(Arc::clone(&source), grid, path))
        .collect();

    join_all(futures).await
}

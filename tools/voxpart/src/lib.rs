//! # voxpart
//!
//! Partition a labeled 3D image into a given number of spatially contiguous,
//! load-balanced regions.
//!
//! The foreground of the image is split into face-connected components, each
//! kept component becomes a weighted voxel graph, and METIS partitions the
//! graph. Part ids are written back as labels `1..=n`, background stays `0`.
//!
//! ## Features
//!
//! - **Component planning**: parts are shared between components in
//!   proportion to their size, small components can be dropped
//! - **Weight search**: an optional (1+1) evolution strategy looks for the
//!   part weights that give the smallest edge cut
//! - **Hints**: vertex and edge weights from intensity rules, plus a cut
//!   plane that makes cuts along one slice cheaper
//! - **Graph check**: optional consistency pass over every graph
//!
//! ## Basic Usage
//!
//! ```rust,no_run
//! use std::path::Path;
//! use voxpart::SegmentOptions;
//!
//! let options = SegmentOptions {
//!     seed: Some(7),
//!     ..Default::default()
//! };
//! let summary = voxpart::segment_image(
//!     Path::new("labels.nii.gz"),
//!     Path::new("parts.nii.gz"),
//!     8,
//!     &options,
//! )?;
//! println!("{} labels written", summary.n_labels());
//! # Ok::<(), voxpart::Error>(())
//! ```

pub mod components;
pub mod graph;
pub mod hints;
pub mod objective;
pub mod optimize;
pub mod options;
pub mod partition;
pub mod segment;
pub mod verify;
pub mod volume;

pub use graph::{CutPlane, ImageGraph};
pub use options::{ProgressCallback, SegmentOptions};
pub use partition::{MetisPartitioner, PartitionSettings, Partitioner, Strategy};
pub use segment::{segment_image, segment_volume, ComponentSummary, SegmentSummary};
pub use volume::LabelVolume;
pub use voxpart_common::{Error, Result};

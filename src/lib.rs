//! Labelbox to COCO format converter
//!
//! This library converts Labelbox segmentation exports, where every object is
//! a binary instance mask or a drawn polygon, into a COCO instance
//! segmentation document with polygon outlines, bounding boxes, areas and a
//! stable category table.

pub mod cache;
pub mod coco;
pub mod config;
pub mod contour;
pub mod dataset;
pub mod error;
pub mod fetch;
pub mod geometry;
pub mod io;
pub mod labelbox;
pub mod mask;
pub mod registry;
pub mod types;
pub mod utils;

// Re-export commonly used types and functions
pub use cache::ImageCache;
pub use coco::{build_annotation, Annotation, Category, CocoFile, Image, Info};
pub use config::{Args, ConvertConfig};
pub use contour::{trace, Polygon};
pub use dataset::{convert, Conversion};
pub use error::{ConvertError, FetchError, Result};
pub use fetch::{Fetch, RetryPolicy, SourceFetcher};
pub use geometry::{reduce, Geometry};
pub use io::{read_label_export, write_coco_file};
pub use labelbox::{LabelExport, LabelPayload, LabelRecord};
pub use mask::BinaryMask;
pub use registry::CategoryRegistry;
pub use types::ProcessingStats;

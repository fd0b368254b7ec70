//! COCO format data structures and the annotation builder
//!
//! The output document follows the COCO instance-segmentation layout: one
//! `info` block, the converted images, their polygon annotations, an empty
//! license list and the category table sorted by id.

use chrono::{DateTime, Datelike, Utc};
use serde::{Deserialize, Serialize};

use crate::contour::Polygon;
use crate::error::Result;
use crate::geometry::reduce;

/// COCO dataset information
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Info {
    pub year: i32,
    pub version: Option<String>,
    pub description: Option<String>,
    pub contributor: Option<String>,
    pub url: String,
    pub date_created: String,
}

impl Info {
    pub fn new(
        description: Option<String>,
        contributor: Option<String>,
        version: Option<String>,
        created: DateTime<Utc>,
    ) -> Self {
        Self {
            year: created.year(),
            version,
            description,
            contributor,
            url: "labelbox.com".to_string(),
            date_created: created.to_rfc3339(),
        }
    }
}

/// COCO license information
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct License {
    pub id: u32,
    pub name: String,
    pub url: String,
}

/// COCO category information
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Category {
    pub id: u32,
    pub name: String,
    pub supercategory: String,
}

impl Category {
    pub fn new(id: u32, name: &str) -> Self {
        Self {
            id,
            name: name.to_string(),
            supercategory: name.to_string(),
        }
    }
}

/// COCO image information
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Image {
    pub id: u32,
    pub width: u32,
    pub height: u32,
    pub file_name: String,
    pub license: Option<u32>,
    pub flickr_url: Option<String>,
    pub coco_url: Option<String>,
    pub date_captured: Option<String>,
}

impl Image {
    pub fn new(id: u32, file_name: String, width: u32, height: u32) -> Self {
        Self {
            id,
            width,
            height,
            file_name,
            license: None,
            flickr_url: None,
            coco_url: None,
            date_captured: None,
        }
    }
}

/// COCO annotation information
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Annotation {
    pub id: u32,
    pub image_id: u32,
    pub category_id: u32,
    pub segmentation: Vec<Vec<f64>>,
    pub area: f64,
    pub bbox: [f64; 4], // [x, y, width, height]
    pub iscrowd: u32,
}

/// Complete COCO dataset structure
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CocoFile {
    pub info: Info,
    pub images: Vec<Image>,
    pub annotations: Vec<Annotation>,
    pub licenses: Vec<License>,
    pub categories: Vec<Category>,
}

/// Build the annotation for one instance from its polygons
///
/// Segmentation keeps the polygons in the order given; area and bbox cover
/// all of them. Fails with `EmptyGeometry` when `polygons` is empty.
pub fn build_annotation(
    image_id: u32,
    category_id: u32,
    polygons: &[Polygon],
    annotation_id: u32,
) -> Result<Annotation> {
    let geometry = reduce(polygons)?;
    Ok(Annotation {
        id: annotation_id,
        image_id,
        category_id,
        segmentation: polygons.iter().map(Polygon::flatten).collect(),
        area: geometry.area,
        bbox: geometry.bbox,
        iscrowd: 0,
    })
}

//! Labelbox export records
//!
//! An export is a JSON array with one record per labeled image. The `Label`
//! field comes in a few shapes, all folded into [`LabelPayload`] at parse time.

use log::warn;
use serde::de::{self, Deserializer};
use serde::Deserialize;
use serde_json::{Map, Value};

/// One record of a Labelbox export
#[derive(Debug, Clone, PartialEq, Deserialize)]
pub struct LabelRecord {
    #[serde(rename = "ID")]
    pub id: String,
    #[serde(rename = "External ID", default)]
    pub external_id: Option<String>,
    #[serde(rename = "Labeled Data")]
    pub labeled_data: String,
    #[serde(rename = "Project Name", default)]
    pub project_name: Option<String>,
    #[serde(rename = "Created By", default)]
    pub created_by: Option<String>,
    #[serde(rename = "Label", deserialize_with = "deserialize_payload")]
    pub label: LabelPayload,
}

impl LabelRecord {
    /// Key under which the image is cached; the external id when present
    pub fn cache_key(&self) -> &str {
        self.external_id
            .as_deref()
            .filter(|id| !id.is_empty())
            .unwrap_or(&self.id)
    }
}

/// Object annotations of one record
#[derive(Debug, Clone, PartialEq)]
pub enum LabelPayload {
    /// `"Skip"`, null or a label without any object instances
    Unlabeled,
    /// Group name -> raster mask instances, in document order
    CategoryMaskMap(Vec<CategoryGroup>),
    /// Instances drawn directly as polygons
    PolygonObjectList(Vec<PolygonObject>),
}

impl LabelPayload {
    pub fn is_labeled(&self) -> bool {
        !matches!(self, LabelPayload::Unlabeled)
    }

    pub fn instance_count(&self) -> usize {
        match self {
            LabelPayload::Unlabeled => 0,
            LabelPayload::CategoryMaskMap(groups) => groups.iter().map(|g| g.instances.len()).sum(),
            LabelPayload::PolygonObjectList(objects) => objects.len(),
        }
    }

    /// Category of every instance, in processing order
    pub fn category_names(&self) -> Vec<&str> {
        match self {
            LabelPayload::Unlabeled => Vec::new(),
            LabelPayload::CategoryMaskMap(groups) => groups
                .iter()
                .flat_map(|g| g.instances.iter().map(|i| i.value.as_str()))
                .collect(),
            LabelPayload::PolygonObjectList(objects) => {
                objects.iter().map(|o| o.value.as_str()).collect()
            }
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct CategoryGroup {
    pub name: String,
    pub instances: Vec<MaskInstance>,
}

/// One instance mask; its category is `value`, not the group name
#[derive(Debug, Clone, PartialEq, Deserialize)]
pub struct MaskInstance {
    pub value: String,
    #[serde(rename = "instanceURI", default)]
    pub instance_uri: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Deserialize)]
pub struct PolygonObject {
    pub value: String,
    pub polygon: Vec<Vertex>,
}

impl PolygonObject {
    pub fn points(&self) -> Vec<(f64, f64)> {
        self.polygon.iter().map(|v| (v.x, v.y)).collect()
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Deserialize)]
pub struct Vertex {
    pub x: f64,
    pub y: f64,
}

fn deserialize_payload<'de, D>(deserializer: D) -> Result<LabelPayload, D::Error>
where
    D: Deserializer<'de>,
{
    let value = Value::deserialize(deserializer)?;
    LabelPayload::from_value(value).map_err(de::Error::custom)
}

impl LabelPayload {
    pub fn from_value(value: Value) -> Result<Self, serde_json::Error> {
        let payload = match value {
            Value::Null | Value::String(_) => LabelPayload::Unlabeled,
            Value::Array(items) => LabelPayload::PolygonObjectList(polygon_objects(items)?),
            Value::Object(map) => Self::from_map(map)?,
            other => {
                return Err(de::Error::custom(format!(
                    "unexpected label value: {}",
                    other
                )))
            }
        };

        if payload.instance_count() == 0 {
            Ok(LabelPayload::Unlabeled)
        } else {
            Ok(payload)
        }
    }

    fn from_map(mut map: Map<String, Value>) -> Result<Self, serde_json::Error> {
        let drawn_as_polygons = matches!(
            map.get("objects"),
            Some(Value::Array(objects))
                if !objects.is_empty() && objects.iter().all(|o| o.get("polygon").is_some())
        );
        if drawn_as_polygons {
            if let Some(Value::Array(objects)) = map.remove("objects") {
                return Ok(LabelPayload::PolygonObjectList(polygon_objects(objects)?));
            }
        }

        let mut groups = Vec::new();
        for (name, value) in map {
            if name == "classifications" {
                continue;
            }
            match value {
                Value::Array(items) => {
                    let instances = items
                        .into_iter()
                        .map(serde_json::from_value)
                        .collect::<Result<Vec<MaskInstance>, _>>()?;
                    groups.push(CategoryGroup { name, instances });
                }
                _ => continue,
            }
        }
        Ok(LabelPayload::CategoryMaskMap(groups))
    }
}

fn polygon_objects(items: Vec<Value>) -> Result<Vec<PolygonObject>, serde_json::Error> {
    items.into_iter().map(serde_json::from_value).collect()
}

/// Parsed export; records that failed to parse are only counted
#[derive(Debug, Clone, Default)]
pub struct LabelExport {
    pub records: Vec<LabelRecord>,
    pub malformed: usize,
}

impl LabelExport {
    pub fn from_values(values: Vec<Value>) -> Self {
        let mut export = LabelExport::default();
        for (index, value) in values.into_iter().enumerate() {
            match serde_json::from_value::<LabelRecord>(value) {
                Ok(record) => export.records.push(record),
                Err(e) => {
                    warn!("Skipping malformed record #{}: {}", index + 1, e);
                    export.malformed += 1;
                }
            }
        }
        export
    }

    /// Project name and author of the first record that has them
    pub fn metadata(&self) -> (Option<String>, Option<String>) {
        let description = self.records.iter().find_map(|r| r.project_name.clone());
        let contributor = self.records.iter().find_map(|r| r.created_by.clone());
        (description, contributor)
    }
}

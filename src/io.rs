use log::info;
use std::fs::File;
use std::io::{BufReader, BufWriter, Write};
use std::path::Path;

use crate::coco::CocoFile;
use crate::error::Result;
use crate::labelbox::LabelExport;
use crate::utils::ensure_directory;

/// Read a Labelbox export; records that do not parse are counted, not fatal
pub fn read_label_export(path: &Path) -> Result<LabelExport> {
    let reader = BufReader::new(File::open(path)?);
    let values: Vec<serde_json::Value> = serde_json::from_reader(reader)?;
    let export = LabelExport::from_values(values);
    info!(
        "Read {} records from {} ({} malformed)",
        export.records.len() + export.malformed,
        path.display(),
        export.malformed
    );
    Ok(export)
}

/// Write the finished COCO document
pub fn write_coco_file(path: &Path, coco: &CocoFile) -> Result<()> {
    if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
        ensure_directory(parent)?;
    }
    let mut writer = BufWriter::new(File::create(path)?);
    serde_json::to_writer(&mut writer, coco)?;
    writer.flush()?;
    info!("Wrote {}", path.display());
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::coco::{Category, Info};
    use chrono::Utc;
    use std::fs;

    #[test]
    fn test_read_label_export() {
        let temp_dir = tempfile::tempdir().unwrap();
        let path = temp_dir.path().join("export.json");
        fs::write(
            &path,
            r#"[
                {"ID": "a", "Labeled Data": "https://x/a.jpg", "Label": "Skip"},
                {"ID": "b", "Label": {}}
            ]"#,
        )
        .unwrap();

        let export = read_label_export(&path).unwrap();
        assert_eq!(export.records.len(), 1);
        assert_eq!(export.malformed, 1);
    }

    #[test]
    fn test_read_label_export_rejects_non_array() {
        let temp_dir = tempfile::tempdir().unwrap();
        let path = temp_dir.path().join("export.json");
        fs::write(&path, r#"{"ID": "a"}"#).unwrap();
        assert!(read_label_export(&path).is_err());
    }

    #[test]
    fn test_write_coco_file() {
        let temp_dir = tempfile::tempdir().unwrap();
        let path = temp_dir.path().join("out/coco.json");
        let coco = CocoFile {
            info: Info::new(None, None, Some("1.0".into()), Utc::now()),
            images: Vec::new(),
            annotations: Vec::new(),
            licenses: Vec::new(),
            categories: vec![Category::new(1, "leaf")],
        };

        write_coco_file(&path, &coco).unwrap();

        let written: CocoFile = serde_json::from_str(&fs::read_to_string(&path).unwrap()).unwrap();
        assert_eq!(written, coco);
        let raw: serde_json::Value = serde_json::from_str(&fs::read_to_string(&path).unwrap()).unwrap();
        assert_eq!(raw["licenses"], serde_json::json!([]));
        assert_eq!(raw["categories"][0]["supercategory"], "leaf");
    }
}

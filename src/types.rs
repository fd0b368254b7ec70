use std::collections::HashSet;
use std::sync::OnceLock;

// Supported image formats
pub const IMG_FORMATS: &[&str] = &[
    "bmp", "gif", "jpeg", "jpg", "png", "tif", "tiff", "webp",
];

// Precomputed HashSet of image extensions for fast lookup
pub static IMAGE_EXTENSIONS_SET: OnceLock<HashSet<String>> = OnceLock::new();

/// Get the image extensions set
pub fn get_image_extensions_set() -> &'static HashSet<String> {
    IMAGE_EXTENSIONS_SET.get_or_init(|| IMG_FORMATS.iter().map(|ext| ext.to_lowercase()).collect())
}

// Counters for everything the conversion produced or skipped
#[derive(Debug, Default, Clone, PartialEq, Eq)]
pub struct ProcessingStats {
    pub records_total: usize,
    pub malformed_records: usize,
    pub unlabeled_images: usize,
    pub duplicate_images: usize,
    pub images_fetch_failed: usize,
    pub images_undecodable: usize,
    pub images_from_cache: usize,
    pub cache_entries_refetched: usize,
    pub images_converted: usize,
    pub instances_total: usize,
    pub instances_fetch_failed: usize,
    pub instances_invalid_mask: usize,
    pub instances_invalid_polygon: usize,
    pub instances_empty: usize,
    pub annotations_created: usize,
}

impl ProcessingStats {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn images_skipped(&self) -> usize {
        self.unlabeled_images
            + self.duplicate_images
            + self.images_fetch_failed
            + self.images_undecodable
    }

    pub fn instances_skipped(&self) -> usize {
        self.instances_fetch_failed
            + self.instances_invalid_mask
            + self.instances_invalid_polygon
            + self.instances_empty
    }

    pub fn print_summary(&self) {
        log::info!("=== Processing Summary ===");
        log::info!("Records read: {}", self.records_total);
        log::info!("Images converted: {}", self.images_converted);
        log::info!("Images served from cache: {}", self.images_from_cache);
        if self.cache_entries_refetched > 0 {
            log::info!("Unusable cache entries fetched again: {}", self.cache_entries_refetched);
        }
        log::info!("Annotations created: {}", self.annotations_created);
        log::info!("Skipped (no labels): {}", self.unlabeled_images);
        log::info!("Skipped (empty masks): {}", self.instances_empty);

        if self.malformed_records > 0 {
            log::warn!("Malformed records skipped: {}", self.malformed_records);
        }

        let failed_images = self.images_skipped() - self.unlabeled_images;
        if failed_images > 0 {
            log::warn!(
                "Total skipped images: {} (duplicate external id: {}, fetch failed: {}, undecodable: {})",
                failed_images,
                self.duplicate_images,
                self.images_fetch_failed,
                self.images_undecodable
            );
        }

        let failed_instances = self.instances_skipped() - self.instances_empty;
        if failed_instances > 0 {
            log::warn!(
                "Total skipped instances: {} (fetch failed: {}, invalid mask: {}, invalid polygon: {})",
                failed_instances,
                self.instances_fetch_failed,
                self.instances_invalid_mask,
                self.instances_invalid_polygon
            );
        }
    }
}

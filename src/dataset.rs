//! Dataset assembly
//!
//! Conversion runs in two phases. The prepare phase fetches images and masks
//! and traces polygons on a worker pool; `par_iter().collect()` keeps its
//! results in input order. The assemble phase then walks those results on a
//! single thread, handing out image ids, annotation ids and category ids, so
//! the output never depends on which fetch finished first.

use chrono::Utc;
use log::{debug, info, warn};
use rayon::prelude::*;
use std::collections::HashSet;
use std::io::Cursor;
use std::sync::atomic::{AtomicBool, Ordering::Relaxed};

use crate::cache::ImageCache;
use crate::coco::{build_annotation, Annotation, CocoFile, Image, Info};
use crate::config::ConvertConfig;
use crate::contour::{trace, Polygon};
use crate::error::{ConvertError, FetchError, Result};
use crate::fetch::Fetch;
use crate::labelbox::{LabelExport, LabelPayload, LabelRecord};
use crate::mask::BinaryMask;
use crate::registry::CategoryRegistry;
use crate::types::ProcessingStats;
use crate::utils::{create_io_thread_pool, create_progress_bar};

/// Finished document plus what happened along the way
#[derive(Debug, Clone)]
pub struct Conversion {
    pub coco: CocoFile,
    pub stats: ProcessingStats,
}

/// Image bytes are dropped once the dimensions are known
#[derive(Debug)]
struct AcquiredImage {
    file_name: String,
    width: u32,
    height: u32,
    from_cache: bool,
    /// A cached copy existed but did not decode
    refetched: bool,
}

#[derive(Debug)]
struct PreparedInstance {
    category: String,
    polygons: Result<Vec<Polygon>>,
}

#[derive(Debug)]
enum PreparedRecord {
    Cancelled,
    /// Another record earlier in the export owns the same cache slot
    Duplicate,
    ImageFailed(ConvertError),
    Unlabeled { image: AcquiredImage },
    Ready {
        image: AcquiredImage,
        instances: Vec<PreparedInstance>,
    },
}

/// Convert a parsed export into a COCO document
///
/// Per-image and per-instance failures are counted and skipped. An unknown
/// category under a fixed order, a set cancellation flag, or a worker pool
/// that cannot start abort the whole run.
pub fn convert(
    export: &LabelExport,
    config: &ConvertConfig,
    fetcher: &dyn Fetch,
    cache: &ImageCache,
    cancel: &AtomicBool,
) -> Result<Conversion> {
    let mut builder = DocumentBuilder::new(CategoryRegistry::from_order(&config.category_order)?);
    builder.stats.records_total = export.records.len() + export.malformed;
    builder.stats.malformed_records = export.malformed;

    // Schema mismatches are fatal, so surface them before any network work.
    if builder.registry.is_fixed() {
        for record in &export.records {
            for name in record.label.category_names() {
                builder.registry.check(name)?;
            }
        }
    }

    let duplicates = find_duplicates(&export.records, cache);

    info!("Fetching images and masks for {} records...", export.records.len());
    let prepared =
        prepare_records(&export.records, &duplicates, config, fetcher, cache, cancel)?;
    if cancel.load(Relaxed) {
        return Err(ConvertError::Cancelled);
    }

    info!("Assembling COCO document...");
    let total = export.records.len();
    for (index, (record, prepared)) in export.records.iter().zip(prepared).enumerate() {
        if cancel.load(Relaxed) {
            return Err(ConvertError::Cancelled);
        }
        debug!("Processing {} image, image {} of {}", record.id, index + 1, total);
        builder.add_record(record, prepared)?;
    }

    let (description, contributor) = export.metadata();
    let info = Info::new(
        description,
        contributor,
        config.dataset_version.clone(),
        Utc::now(),
    );
    let conversion = builder.finish(info);
    conversion.stats.print_summary();
    Ok(conversion)
}

/// Flag every record whose image would land on a cache file already claimed
/// by an earlier record; the first record keeps the slot
fn find_duplicates(records: &[LabelRecord], cache: &ImageCache) -> Vec<bool> {
    let mut seen = HashSet::new();
    records
        .iter()
        .map(|record| !seen.insert(cache.slot(record.cache_key())))
        .collect()
}

fn prepare_records(
    records: &[LabelRecord],
    duplicates: &[bool],
    config: &ConvertConfig,
    fetcher: &dyn Fetch,
    cache: &ImageCache,
    cancel: &AtomicBool,
) -> Result<Vec<PreparedRecord>> {
    let thread_pool = create_io_thread_pool(config.workers)?;
    let pb = create_progress_bar(records.len() as u64, "Fetch", config.verbose);

    let prepared = thread_pool.install(|| {
        records
            .par_iter()
            .zip(duplicates.par_iter())
            .map(|(record, &duplicate)| {
                let prepared = if cancel.load(Relaxed) {
                    PreparedRecord::Cancelled
                } else if duplicate {
                    PreparedRecord::Duplicate
                } else {
                    prepare_record(record, fetcher, cache)
                };
                pb.inc(1);
                prepared
            })
            .collect::<Vec<_>>()
    });

    pb.finish_with_message("Fetch complete");
    Ok(prepared)
}

fn prepare_record(record: &LabelRecord, fetcher: &dyn Fetch, cache: &ImageCache) -> PreparedRecord {
    let image = match acquire_image(record, fetcher, cache) {
        Ok(image) => image,
        Err(e) => return PreparedRecord::ImageFailed(e),
    };

    let instances = match &record.label {
        LabelPayload::Unlabeled => return PreparedRecord::Unlabeled { image },
        LabelPayload::CategoryMaskMap(groups) => groups
            .iter()
            .flat_map(|group| group.instances.iter())
            .map(|instance| PreparedInstance {
                category: instance.value.clone(),
                polygons: match &instance.instance_uri {
                    Some(uri) => trace_remote_mask(uri, fetcher),
                    None => Err(
                        FetchError::permanent(&instance.value, "instance has no instanceURI").into(),
                    ),
                },
            })
            .collect(),
        LabelPayload::PolygonObjectList(objects) => objects
            .iter()
            .map(|object| PreparedInstance {
                category: object.value.clone(),
                polygons: Polygon::from_points(object.points()).map(|p| vec![p]),
            })
            .collect(),
    };

    PreparedRecord::Ready { image, instances }
}

/// Cache hit by external id, otherwise fetch and store
///
/// Fetched bytes are only cached once they decode, so a bad download is
/// retried on the next run. A cached file that does not decode is evicted
/// and fetched again.
fn acquire_image(record: &LabelRecord, fetcher: &dyn Fetch, cache: &ImageCache) -> Result<AcquiredImage> {
    let key = record.cache_key();
    let mut refetched = false;
    if let Some(cached) = cache.load(key)? {
        match image_dimensions(&cached.bytes, &cached.file_name()) {
            Ok((width, height)) => {
                return Ok(AcquiredImage {
                    file_name: cached.file_name(),
                    width,
                    height,
                    from_cache: true,
                    refetched: false,
                })
            }
            Err(e) => {
                warn!("Fetching {} again, cached copy is unusable: {}", record.id, e);
                cache.evict(&cached)?;
                refetched = true;
            }
        }
    }

    let bytes = fetcher.fetch(&record.labeled_data)?;
    let (width, height) = image_dimensions(&bytes, &record.labeled_data)?;
    let stored = cache.store(key, bytes)?;
    Ok(AcquiredImage {
        file_name: stored.file_name(),
        width,
        height,
        from_cache: false,
        refetched,
    })
}

/// Full decode; a header alone does not prove the pixel data is intact
fn image_dimensions(bytes: &[u8], source: &str) -> Result<(u32, u32)> {
    image::ImageReader::new(Cursor::new(bytes))
        .with_guessed_format()?
        .decode()
        .map(|image| (image.width(), image.height()))
        .map_err(|e| ConvertError::InvalidImage(format!("{}: {}", source, e)))
}

fn trace_remote_mask(uri: &str, fetcher: &dyn Fetch) -> Result<Vec<Polygon>> {
    let bytes = fetcher.fetch(uri)?;
    let mask = BinaryMask::decode(&bytes)?;
    let polygons = trace(&mask)?;
    debug!("Instance consisting of {} polygon(s)", polygons.len());
    Ok(polygons)
}

/// Single writer of the output collections
struct DocumentBuilder {
    images: Vec<Image>,
    annotations: Vec<Annotation>,
    registry: CategoryRegistry,
    stats: ProcessingStats,
}

impl DocumentBuilder {
    fn new(registry: CategoryRegistry) -> Self {
        Self {
            images: Vec::new(),
            annotations: Vec::new(),
            registry,
            stats: ProcessingStats::new(),
        }
    }

    fn add_record(&mut self, record: &LabelRecord, prepared: PreparedRecord) -> Result<()> {
        match prepared {
            PreparedRecord::Cancelled => Err(ConvertError::Cancelled),
            PreparedRecord::Duplicate => {
                warn!(
                    "Skipping image {}: external id '{}' is already used by an earlier record",
                    record.id,
                    record.cache_key()
                );
                self.stats.duplicate_images += 1;
                Ok(())
            }
            PreparedRecord::ImageFailed(e) => {
                warn!("Skipping image {}: {}", record.id, e);
                match e {
                    ConvertError::InvalidImage(_) => self.stats.images_undecodable += 1,
                    _ => self.stats.images_fetch_failed += 1,
                }
                Ok(())
            }
            PreparedRecord::Unlabeled { image } => {
                debug!("Image {} has no labeled objects", record.id);
                self.count_acquired(&image);
                self.stats.unlabeled_images += 1;
                Ok(())
            }
            PreparedRecord::Ready { image, instances } => {
                self.count_acquired(&image);
                let image_id = self.images.len() as u32 + 1;
                self.images.push(Image {
                    flickr_url: Some(record.id.clone()),
                    coco_url: Some(record.labeled_data.clone()),
                    ..Image::new(image_id, image.file_name, image.width, image.height)
                });
                self.stats.images_converted += 1;

                for instance in instances {
                    self.add_instance(record, image_id, instance)?;
                }
                Ok(())
            }
        }
    }

    fn count_acquired(&mut self, image: &AcquiredImage) {
        self.stats.images_from_cache += usize::from(image.from_cache);
        self.stats.cache_entries_refetched += usize::from(image.refetched);
    }

    fn add_instance(
        &mut self,
        record: &LabelRecord,
        image_id: u32,
        instance: PreparedInstance,
    ) -> Result<()> {
        self.stats.instances_total += 1;
        let polygons = match instance.polygons {
            Ok(polygons) if polygons.is_empty() => {
                debug!("Empty '{}' mask in {}", instance.category, record.id);
                self.stats.instances_empty += 1;
                return Ok(());
            }
            Ok(polygons) => polygons,
            Err(e) => {
                warn!(
                    "Skipping '{}' instance in {}: {}",
                    instance.category, record.id, e
                );
                match e {
                    ConvertError::Fetch(_) => self.stats.instances_fetch_failed += 1,
                    ConvertError::MalformedRecord(_) => self.stats.instances_invalid_polygon += 1,
                    _ => self.stats.instances_invalid_mask += 1,
                }
                return Ok(());
            }
        };

        let category_id = self.registry.resolve(&instance.category)?;
        let annotation_id = self.annotations.len() as u32 + 1;
        let annotation = build_annotation(image_id, category_id, &polygons, annotation_id)?;
        self.annotations.push(annotation);
        self.stats.annotations_created += 1;
        Ok(())
    }

    fn finish(self, info: Info) -> Conversion {
        Conversion {
            coco: CocoFile {
                info,
                images: self.images,
                annotations: self.annotations,
                licenses: Vec::new(),
                categories: self.registry.snapshot(),
            },
            stats: self.stats,
        }
    }
}

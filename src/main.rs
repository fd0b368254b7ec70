use clap::Parser;
use log::{error, info, warn};
use std::process::ExitCode;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::thread;

use labelbox2coco::{convert, read_label_export, write_coco_file, Args, ImageCache, SourceFetcher};

fn main() -> ExitCode {
    let args = Args::parse();

    // Initialize the logger; --verbose adds per-image narration
    let default_filter = if args.verbose { "debug" } else { "info" };
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or(default_filter))
        .init();

    if !args.input.exists() {
        error!("The specified input does not exist: {}", args.input.display());
        return ExitCode::FAILURE;
    }

    info!("Starting Labelbox to COCO conversion process...");

    let export = match read_label_export(&args.input) {
        Ok(export) => export,
        Err(e) => {
            error!("Failed to read export: {}", e);
            return ExitCode::FAILURE;
        }
    };

    let cache = match ImageCache::open(&args.image_dir) {
        Ok(cache) => cache,
        Err(e) => {
            error!("Failed to set up image directory: {}", e);
            return ExitCode::FAILURE;
        }
    };

    let fetcher = SourceFetcher::new(args.timeout(), args.retry_policy());
    let cancel = Arc::new(AtomicBool::new(false));
    if let Err(e) = cancel_on_interrupt(Arc::clone(&cancel)) {
        warn!("Ctrl-C will not cancel the conversion: {}", e);
    }

    let conversion = match convert(&export, &args.to_convert_config(), &fetcher, &cache, &cancel) {
        Ok(conversion) => conversion,
        Err(e) => {
            error!("Failed to convert dataset: {}", e);
            return ExitCode::FAILURE;
        }
    };

    if let Err(e) = write_coco_file(&args.output, &conversion.coco) {
        error!("Failed to write COCO file: {}", e);
        return ExitCode::FAILURE;
    }

    info!("COCO conversion process completed successfully.");
    ExitCode::SUCCESS
}

/// Set `cancel` on the first Ctrl-C; the run stops at the next record
fn cancel_on_interrupt(cancel: Arc<AtomicBool>) -> std::io::Result<()> {
    let runtime = tokio::runtime::Builder::new_current_thread()
        .enable_io()
        .build()?;
    thread::Builder::new()
        .name("interrupt".to_string())
        .spawn(move || {
            runtime.block_on(async {
                if tokio::signal::ctrl_c().await.is_ok() {
                    warn!("Interrupt received, cancelling conversion...");
                    cancel.store(true, Ordering::Relaxed);
                }
            })
        })?;
    Ok(())
}

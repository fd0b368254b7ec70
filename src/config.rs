use clap::Parser;
use std::path::PathBuf;
use std::time::Duration;

use crate::fetch::RetryPolicy;

/// Command-line arguments parser for converting a Labelbox export to COCO format.
#[derive(Parser, Debug, Clone)]
#[command(version, long_about = None)]
pub struct Args {
    /// Labelbox JSON export to convert
    #[arg(short = 'i', long = "input")]
    pub input: PathBuf,

    /// Path of the COCO JSON file to write
    #[arg(short = 'o', long = "output", default_value = "coco.json")]
    pub output: PathBuf,

    /// Directory where downloaded images are cached
    #[arg(long = "image_dir", default_value = "images")]
    pub image_dir: PathBuf,

    /// Fixed category order; ids follow the 1-based position in this list
    #[arg(long = "category_order", use_value_delimiter = true)]
    pub category_order: Vec<String>,

    /// Show a progress bar and per-image progress messages
    #[arg(short = 'v', long = "verbose")]
    pub verbose: bool,

    /// Number of threads fetching and decoding images and masks
    #[arg(long = "workers", default_value_t = 4, value_parser = validate_workers)]
    pub workers: usize,

    /// Extra attempts for transient fetch failures
    #[arg(long = "retries", default_value_t = 3)]
    pub retries: u32,

    /// Delay between fetch attempts, in milliseconds
    #[arg(long = "retry_delay_ms", default_value_t = 500)]
    pub retry_delay_ms: u64,

    /// Timeout of a single HTTP request, in seconds
    #[arg(long = "timeout_secs", default_value_t = 30)]
    pub timeout_secs: u64,

    /// Value of info.version in the output document
    #[arg(long = "dataset_version")]
    pub dataset_version: Option<String>,
}

impl Args {
    pub fn to_convert_config(&self) -> ConvertConfig {
        ConvertConfig {
            category_order: self.category_order.clone(),
            verbose: self.verbose,
            workers: self.workers,
            dataset_version: self.dataset_version.clone(),
        }
    }

    pub fn retry_policy(&self) -> RetryPolicy {
        RetryPolicy {
            retries: self.retries,
            delay: Duration::from_millis(self.retry_delay_ms),
        }
    }

    pub fn timeout(&self) -> Duration {
        Duration::from_secs(self.timeout_secs)
    }
}

/// Settings of the conversion itself, independent of where bytes come from
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ConvertConfig {
    /// Empty for first-seen numbering
    pub category_order: Vec<String>,
    pub verbose: bool,
    pub workers: usize,
    pub dataset_version: Option<String>,
}

impl Default for ConvertConfig {
    fn default() -> Self {
        Self {
            category_order: Vec::new(),
            verbose: false,
            workers: 4,
            dataset_version: None,
        }
    }
}

// At least one worker thread
fn validate_workers(s: &str) -> Result<usize, String> {
    match s.parse::<usize>() {
        Ok(val) if val >= 1 => Ok(val),
        _ => Err("WORKERS must be a positive integer".to_string()),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_validate_workers() {
        assert!(validate_workers("1").is_ok());
        assert!(validate_workers("16").is_ok());
        assert!(validate_workers("0").is_err());
        assert!(validate_workers("-2").is_err());
        assert!(validate_workers("abc").is_err());
    }

    #[test]
    fn test_parse_category_order() {
        let args = Args::parse_from([
            "labelbox2coco",
            "-i",
            "export.json",
            "--category_order",
            "dog,cat",
            "--retries",
            "1",
        ]);
        assert_eq!(args.category_order, vec!["dog", "cat"]);
        assert_eq!(args.output, PathBuf::from("coco.json"));

        let config = args.to_convert_config();
        assert_eq!(config.category_order, vec!["dog", "cat"]);
        assert_eq!(config.workers, 4);
        assert_eq!(args.retry_policy().retries, 1);
        assert_eq!(args.retry_policy().delay, Duration::from_millis(500));
    }

    #[test]
    fn test_defaults_are_dynamic_numbering() {
        let args = Args::parse_from(["labelbox2coco", "--input", "export.json", "-v"]);
        assert!(args.category_order.is_empty());
        assert!(args.verbose);
        assert_eq!(args.image_dir, PathBuf::from("images"));
    }
}

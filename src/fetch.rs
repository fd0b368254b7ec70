//! Fetching image and mask bytes
//!
//! Locators are either `http(s)://` URLs or local files (`file://` or a plain
//! path). Failures are classified so that only transient ones are retried.

use log::debug;
use std::fs;
use std::io::{ErrorKind, Read};
use std::path::Path;
use std::thread;
use std::time::Duration;

use crate::error::FetchError;

/// Source of raw bytes for a locator
pub trait Fetch: Sync {
    fn fetch(&self, locator: &str) -> Result<Vec<u8>, FetchError>;
}

/// Bounded retry for transient failures
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RetryPolicy {
    /// Extra attempts after the first one
    pub retries: u32,
    pub delay: Duration,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            retries: 3,
            delay: Duration::from_millis(500),
        }
    }
}

impl RetryPolicy {
    /// Run `attempt` until it succeeds, fails permanently, or retries run out
    pub fn run<T, F>(&self, locator: &str, mut attempt: F) -> Result<T, FetchError>
    where
        F: FnMut() -> Result<T, FetchError>,
    {
        let mut tries = 0;
        loop {
            match attempt() {
                Err(e) if e.is_transient() && tries < self.retries => {
                    tries += 1;
                    debug!(
                        "Retrying {} ({}/{}) after: {}",
                        locator, tries, self.retries, e
                    );
                    if !self.delay.is_zero() {
                        thread::sleep(self.delay);
                    }
                }
                result => return result,
            }
        }
    }
}

/// HTTP and filesystem fetcher
pub struct SourceFetcher {
    agent: ureq::Agent,
    policy: RetryPolicy,
}

impl SourceFetcher {
    pub fn new(timeout: Duration, policy: RetryPolicy) -> Self {
        let agent = ureq::AgentBuilder::new().timeout(timeout).build();
        Self { agent, policy }
    }

    fn fetch_http(&self, url: &str) -> Result<Vec<u8>, FetchError> {
        let response = match self.agent.get(url).call() {
            Ok(response) => response,
            Err(ureq::Error::Status(code, _)) if code == 429 || code >= 500 => {
                return Err(FetchError::transient(url, format!("HTTP status {}", code)))
            }
            Err(ureq::Error::Status(code, _)) => {
                return Err(FetchError::permanent(url, format!("HTTP status {}", code)))
            }
            Err(ureq::Error::Transport(transport)) => {
                return Err(match transport.kind() {
                    ureq::ErrorKind::InvalidUrl | ureq::ErrorKind::UnknownScheme => {
                        FetchError::permanent(url, transport)
                    }
                    _ => FetchError::transient(url, transport),
                })
            }
        };

        let mut bytes = Vec::new();
        response
            .into_reader()
            .read_to_end(&mut bytes)
            .map_err(|e| FetchError::transient(url, e))?;
        Ok(bytes)
    }
}

impl Fetch for SourceFetcher {
    fn fetch(&self, locator: &str) -> Result<Vec<u8>, FetchError> {
        match classify_locator(locator)? {
            Locator::Http(url) => self.policy.run(url, || self.fetch_http(url)),
            Locator::File(path) => self.policy.run(locator, || read_local(locator, path)),
        }
    }
}

#[derive(Debug, PartialEq, Eq)]
enum Locator<'a> {
    Http(&'a str),
    File(&'a Path),
}

fn classify_locator(locator: &str) -> Result<Locator<'_>, FetchError> {
    let trimmed = locator.trim();
    if trimmed.is_empty() {
        return Err(FetchError::permanent(locator, "empty locator"));
    }
    if trimmed.starts_with("http://") || trimmed.starts_with("https://") {
        return Ok(Locator::Http(trimmed));
    }
    if let Some(path) = trimmed.strip_prefix("file://") {
        return Ok(Locator::File(Path::new(path)));
    }
    if let Some((scheme, _)) = trimmed.split_once("://") {
        return Err(FetchError::permanent(
            locator,
            format!("unsupported scheme '{}'", scheme),
        ));
    }
    Ok(Locator::File(Path::new(trimmed)))
}

fn read_local(locator: &str, path: &Path) -> Result<Vec<u8>, FetchError> {
    fs::read(path).map_err(|e| match e.kind() {
        ErrorKind::Interrupted | ErrorKind::TimedOut | ErrorKind::WouldBlock => {
            FetchError::transient(locator, e)
        }
        _ => FetchError::permanent(locator, format!("{}: {}", path.display(), e)),
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::cell::Cell;

    fn quick_policy(retries: u32) -> RetryPolicy {
        RetryPolicy {
            retries,
            delay: Duration::ZERO,
        }
    }

    #[test]
    fn test_transient_failures_are_retried() {
        let calls = Cell::new(0);
        let result = quick_policy(3).run("mask", || {
            calls.set(calls.get() + 1);
            if calls.get() < 3 {
                Err(FetchError::transient("mask", "connection reset"))
            } else {
                Ok(vec![1u8])
            }
        });
        assert_eq!(result.unwrap(), vec![1u8]);
        assert_eq!(calls.get(), 3);
    }

    #[test]
    fn test_retries_are_bounded() {
        let calls = Cell::new(0);
        let result: Result<(), _> = quick_policy(2).run("mask", || {
            calls.set(calls.get() + 1);
            Err(FetchError::transient("mask", "timeout"))
        });
        assert!(matches!(result, Err(FetchError::Transient { .. })));
        assert_eq!(calls.get(), 3);
    }

    #[test]
    fn test_permanent_failures_are_not_retried() {
        let calls = Cell::new(0);
        let result: Result<(), _> = quick_policy(5).run("mask", || {
            calls.set(calls.get() + 1);
            Err(FetchError::permanent("mask", "HTTP status 404"))
        });
        assert!(matches!(result, Err(FetchError::Permanent { .. })));
        assert_eq!(calls.get(), 1);
    }

    #[test]
    fn test_classify_locator() {
        assert_eq!(
            classify_locator("https://storage/mask.png").unwrap(),
            Locator::Http("https://storage/mask.png")
        );
        assert_eq!(
            classify_locator("file:///tmp/mask.png").unwrap(),
            Locator::File(Path::new("/tmp/mask.png"))
        );
        assert_eq!(
            classify_locator("masks/1.png").unwrap(),
            Locator::File(Path::new("masks/1.png"))
        );
        assert!(matches!(
            classify_locator("ftp://host/mask.png"),
            Err(FetchError::Permanent { .. })
        ));
        assert!(matches!(
            classify_locator("  "),
            Err(FetchError::Permanent { .. })
        ));
    }

    #[test]
    fn test_local_file_fetch() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("mask.bin");
        fs::write(&path, [7u8, 8, 9]).unwrap();

        let fetcher = SourceFetcher::new(Duration::from_secs(1), quick_policy(0));
        let locator = format!("file://{}", path.display());
        assert_eq!(fetcher.fetch(&locator).unwrap(), vec![7u8, 8, 9]);
        assert_eq!(
            fetcher.fetch(path.to_str().unwrap()).unwrap(),
            vec![7u8, 8, 9]
        );
    }

    #[test]
    fn test_missing_local_file_is_permanent() {
        let dir = tempfile::tempdir().unwrap();
        let fetcher = SourceFetcher::new(Duration::from_secs(1), quick_policy(3));
        let missing = dir.path().join("nope.png");
        assert!(matches!(
            fetcher.fetch(missing.to_str().unwrap()),
            Err(FetchError::Permanent { .. })
        ));
    }
}

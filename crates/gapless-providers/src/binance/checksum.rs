//! SHA-256 sidecar verification for bulk CDN downloads
//!
//! Every Vision download has a companion `.CHECKSUM` file
//! (`<64-char-hex>  <filename>`). A hash mismatch means the downloaded
//! archive is corrupt and must not be ingested; a missing or unreachable
//! sidecar only downgrades to an unverified download, since older data was
//! published without checksums and network flakiness should not block a
//! month load.
//!
//! | Scenario | Behavior |
//! |----------|----------|
//! | Hash matches | `Verification::Passed` |
//! | Hash mismatch | hard error |
//! | Sidecar HTTP 404 | `Verification::Skipped` |
//! | Sidecar fetch/timeout failure | `Verification::Skipped` |
//! | Sidecar malformed | hard error (indicates a CDN format change) |

use sha2::{Digest, Sha256};
use std::time::Duration;
use thiserror::Error;
use tracing::{debug, warn};

const SIDECAR_TIMEOUT: Duration = Duration::from_secs(10);

/// Checksum verification errors
#[derive(Debug, Error)]
pub enum ChecksumError {
    /// Downloaded bytes do not match the published hash
    #[error("checksum mismatch: expected {expected}, got {actual}")]
    Mismatch { expected: String, actual: String },

    /// Sidecar content is not a valid checksum line
    #[error("malformed checksum sidecar: {0}")]
    MalformedSidecar(String),
}

/// Outcome of a verification attempt
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Verification {
    /// Hash computed and matched the sidecar
    Passed { hash: String },
    /// Sidecar unavailable, download accepted unverified
    Skipped { reason: &'static str },
}

/// Lowercase hex SHA-256 of a byte buffer
pub fn sha256_hex(data: &[u8]) -> String {
    format!("{:x}", Sha256::digest(data))
}

/// Extract the hash from a sidecar line (`<hex>  <filename>`)
pub fn parse_sidecar(content: &str) -> Result<String, ChecksumError> {
    let hash = content
        .split_whitespace()
        .next()
        .ok_or_else(|| ChecksumError::MalformedSidecar("empty sidecar".to_string()))?;
    if hash.len() != 64 || !hash.chars().all(|c| c.is_ascii_hexdigit()) {
        return Err(ChecksumError::MalformedSidecar(format!(
            "expected 64 hex chars, got {:?}",
            hash
        )));
    }
    Ok(hash.to_lowercase())
}

/// Fetch the `.CHECKSUM` sidecar for `data_url` and verify `data` against it
pub async fn verify_download(
    client: &reqwest::Client,
    data_url: &str,
    data: &[u8],
) -> Result<Verification, ChecksumError> {
    let sidecar_url = format!("{data_url}.CHECKSUM");

    let response = match client
        .get(&sidecar_url)
        .timeout(SIDECAR_TIMEOUT)
        .send()
        .await
    {
        Ok(response) => response,
        Err(e) => {
            warn!(
                event_type = "checksum_sidecar_unreachable",
                url = %sidecar_url,
                error = %e,
                "Checksum sidecar fetch failed, accepting download unverified"
            );
            return Ok(Verification::Skipped {
                reason: "sidecar fetch failed",
            });
        }
    };

    if response.status().as_u16() == 404 {
        warn!(
            event_type = "checksum_sidecar_missing",
            url = %sidecar_url,
            "No checksum sidecar published, accepting download unverified"
        );
        return Ok(Verification::Skipped {
            reason: "sidecar not published",
        });
    }
    if !response.status().is_success() {
        warn!(
            event_type = "checksum_sidecar_error",
            url = %sidecar_url,
            http_status = response.status().as_u16(),
            "Checksum sidecar returned an error, accepting download unverified"
        );
        return Ok(Verification::Skipped {
            reason: "sidecar fetch failed",
        });
    }

    let content = match response.text().await {
        Ok(content) => content,
        Err(e) => {
            warn!(
                event_type = "checksum_sidecar_unreadable",
                url = %sidecar_url,
                error = %e,
                "Checksum sidecar body unreadable, accepting download unverified"
            );
            return Ok(Verification::Skipped {
                reason: "sidecar fetch failed",
            });
        }
    };

    let expected = parse_sidecar(&content)?;
    let actual = sha256_hex(data);
    if actual != expected {
        return Err(ChecksumError::Mismatch { expected, actual });
    }

    debug!(
        event_type = "checksum_verified",
        url = %data_url,
        hash = %actual,
        "Download checksum verified"
    );
    Ok(Verification::Passed { hash: actual })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn computes_known_digest() {
        assert_eq!(
            sha256_hex(b"hello world"),
            "b94d27b9934d3e08a52e52d7da7dabfac484efe37a5380ee9088f7ace2efcde9",
        );
    }

    #[test]
    fn parses_sidecar_line() {
        let line =
            "d7a8fbb307d7809469ca9abcb0082e4f8d5651e46d3cdb762d02d0bf37c9e592  BTCUSDT-1m-2024-01.zip\n";
        assert_eq!(
            parse_sidecar(line).unwrap(),
            "d7a8fbb307d7809469ca9abcb0082e4f8d5651e46d3cdb762d02d0bf37c9e592",
        );
    }

    #[test]
    fn normalizes_uppercase_hashes() {
        let line =
            "D7A8FBB307D7809469CA9ABCB0082E4F8D5651E46D3CDB762D02D0BF37C9E592  file.zip";
        assert_eq!(
            parse_sidecar(line).unwrap(),
            "d7a8fbb307d7809469ca9abcb0082e4f8d5651e46d3cdb762d02d0bf37c9e592",
        );
    }

    #[test]
    fn rejects_malformed_sidecars() {
        assert!(parse_sidecar("").is_err());
        assert!(parse_sidecar("   \n").is_err());
        assert!(parse_sidecar("abc123  file.zip").is_err());
        assert!(parse_sidecar(
            "g7a8fbb307d7809469ca9abcb0082e4f8d5651e46d3cdb762d02d0bf37c9e592  file.zip"
        )
        .is_err());
    }
}

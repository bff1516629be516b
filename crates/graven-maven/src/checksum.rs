//! Checksum verification of downloaded descriptors against repository sidecars.

use graven_util::errors::GravenError;
use graven_util::hash::ChecksumAlgorithm;
use crate::download::Downloader;
use crate::repository::MavenRepository;

/// Verify downloaded data against the strongest sidecar the repository has.
///
/// Tries SHA-256, then SHA-1, then MD5. Logs a warning if no sidecar exists.
pub async fn verify(
    downloader: &Downloader,
    repo: &MavenRepository,
    file_url: &str,
    data: &[u8],
) -> miette::Result<()> {
    for algo in ChecksumAlgorithm::PREFERENCE {
        let sidecar = format!("{file_url}.{}", algo.extension());
        if let Some(expected) = downloader.fetch_text(repo, &sidecar).await? {
            return check(&algo.hex(data), &extract_hash(&expected), algo, file_url);
        }
    }

    tracing::warn!("No checksum sidecar found for {file_url}");
    Ok(())
}

fn check(actual: &str, expected: &str, algo: ChecksumAlgorithm, url: &str) -> miette::Result<()> {
    if actual.eq_ignore_ascii_case(expected) {
        tracing::debug!("{} ok for {url}", algo.label());
        Ok(())
    } else {
        Err(GravenError::Network {
            message: format!(
                "{} mismatch for {url}: expected {expected}, got {actual}",
                algo.label()
            ),
        }
        .into())
    }
}

/// Extract the hex hash from a checksum file.
///
/// Maven checksum files may contain just the hash, or `hash  filename`.
fn extract_hash(content: &str) -> String {
    content.split_whitespace().next().unwrap_or("").to_string()
}

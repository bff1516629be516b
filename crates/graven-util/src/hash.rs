use md5::Md5;
use sha1::Sha1;
use sha2::{Digest, Sha256};

/// Checksum algorithms published as sidecar files in Maven repositories,
/// strongest first.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ChecksumAlgorithm {
    Sha256,
    Sha1,
    Md5,
}

impl ChecksumAlgorithm {
    /// All algorithms in the order they should be tried.
    pub const PREFERENCE: [ChecksumAlgorithm; 3] = [Self::Sha256, Self::Sha1, Self::Md5];

    /// File extension of the sidecar, e.g. `sha1` for `lib-1.0.pom.sha1`.
    pub fn extension(self) -> &'static str {
        match self {
            Self::Sha256 => "sha256",
            Self::Sha1 => "sha1",
            Self::Md5 => "md5",
        }
    }

    /// Human-readable algorithm name.
    pub fn label(self) -> &'static str {
        match self {
            Self::Sha256 => "SHA-256",
            Self::Sha1 => "SHA-1",
            Self::Md5 => "MD5",
        }
    }

    /// Hash `data`, returning a lowercase hex string.
    pub fn hex(self, data: &[u8]) -> String {
        match self {
            Self::Sha256 => sha256_bytes(data),
            Self::Sha1 => sha1_bytes(data),
            Self::Md5 => md5_bytes(data),
        }
    }
}

/// Compute the SHA-256 hash of a byte slice, returning a lowercase hex string.
pub fn sha256_bytes(data: &[u8]) -> String {
    let mut hasher = Sha256::new();
    hasher.update(data);
    format!("{:x}", hasher.finalize())
}

/// Compute the SHA-1 hash of a byte slice, returning a lowercase hex string.
pub fn sha1_bytes(data: &[u8]) -> String {
    let mut hasher = Sha1::new();
    hasher.update(data);
    format!("{:x}", hasher.finalize())
}

/// Compute the MD5 hash of a byte slice, returning a lowercase hex string.
pub fn md5_bytes(data: &[u8]) -> String {
    let mut hasher = Md5::new();
    hasher.update(data);
    format!("{:x}", hasher.finalize())
}

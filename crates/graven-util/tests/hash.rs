use graven_util::hash::{md5_bytes, sha1_bytes, sha256_bytes, ChecksumAlgorithm};

#[test]
fn test_sha256_bytes_empty() {
    let hash = sha256_bytes(b"");
    assert_eq!(
        hash,
        "e3b0c44298fc1c149afbf4c8996fb92427ae41e4649b934ca495991b7852b855"
    );
}

#[test]
fn test_sha256_bytes_hello_world() {
    assert_eq!(
        sha256_bytes(b"hello world"),
        "b94d27b9934d3e08a52e52d7da7dabfac484efe37a5380ee9088f7ace2efcde9"
    );
}

#[test]
fn test_sha1_bytes_hello_world() {
    assert_eq!(
        sha1_bytes(b"hello world"),
        "2aae6c35c94fcfb415dbe95f408b9ce91ee846ed"
    );
}

#[test]
fn test_md5_bytes_hello_world() {
    assert_eq!(md5_bytes(b"hello world"), "5eb63bbbe01eeed093cb22bb8f5acdc3");
}

#[test]
fn test_algorithm_dispatch_matches_free_functions() {
    assert_eq!(ChecksumAlgorithm::Sha1.hex(b"graven"), sha1_bytes(b"graven"));
    assert_eq!(ChecksumAlgorithm::Md5.extension(), "md5");
    assert_eq!(ChecksumAlgorithm::PREFERENCE[0], ChecksumAlgorithm::Sha256);
}

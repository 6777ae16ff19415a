use repocache_util::hash::{sha256_bytes, url_key};

#[test]
fn test_sha256_bytes_known_vector() {
    assert_eq!(
        sha256_bytes(b"abc"),
        "ba7816bf8f01cfea414140de5dae2223b00361a396177a9cb410ff61f20015ad"
    );
}

#[test]
fn test_url_key_is_stable_and_distinct() {
    let a = url_key("https://github.com/a/b");
    assert_eq!(a, url_key("https://github.com/a/b"));
    assert_ne!(a, url_key("https://github.com/a/c"));
    assert_eq!(a.len(), 64);
}

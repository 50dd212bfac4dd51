mod common;

use chrono::Duration;
use common::{at, date, TestEnv};
use proptest::prelude::*;
use std::fs;
use tether_crypto::CacheKey;
use tether_license::{CacheRead, LocalCache, LocalLicenseSnapshot};

fn snapshot() -> LocalLicenseSnapshot {
    LocalLicenseSnapshot::new("ABC123", date(2099, 1, 1), at("2026-05-01T08:30:00Z"))
}

#[test]
fn missing_file_is_absent() {
    let env = TestEnv::new(at("2026-05-01T08:30:00Z"));
    assert_eq!(env.cache().load(), CacheRead::Absent);
}

#[test]
fn save_then_load() {
    let env = TestEnv::new(at("2026-05-01T08:30:00Z"));
    let cache = env.cache();
    cache.save(&snapshot()).unwrap();
    assert_eq!(cache.load(), CacheRead::Found(snapshot()));
}

#[test]
fn save_creates_parent_directories() {
    let env = TestEnv::new(at("2026-05-01T08:30:00Z"));
    let nested = env.dir.path().join("a").join("b").join("license.dat");
    let cache = LocalCache::new(nested.clone(), env.key.clone());
    cache.save(&snapshot()).unwrap();
    assert!(nested.is_file());
}

#[test]
fn file_is_not_plaintext() {
    let env = TestEnv::new(at("2026-05-01T08:30:00Z"));
    env.cache().save(&snapshot()).unwrap();
    let raw = fs::read_to_string(env.cache_path()).unwrap();
    assert!(!raw.contains("ABC123"));
    assert!(!raw.contains("2099"));
}

#[test]
fn every_save_uses_a_fresh_nonce() {
    let env = TestEnv::new(at("2026-05-01T08:30:00Z"));
    let cache = env.cache();
    cache.save(&snapshot()).unwrap();
    let first = fs::read(env.cache_path()).unwrap();
    cache.save(&snapshot()).unwrap();
    let second = fs::read(env.cache_path()).unwrap();
    assert_ne!(first, second);
}

#[test]
fn overwrite_replaces_snapshot() {
    let env = TestEnv::new(at("2026-05-01T08:30:00Z"));
    let cache = env.cache();
    cache.save(&snapshot()).unwrap();

    let later = LocalLicenseSnapshot::new(
        "ABC123",
        date(2100, 6, 1),
        at("2026-05-01T08:30:00Z") + Duration::days(3),
    );
    cache.save(&later).unwrap();
    assert_eq!(cache.load(), CacheRead::Found(later));
}

#[test]
fn random_bytes_are_corrupt() {
    let env = TestEnv::new(at("2026-05-01T08:30:00Z"));
    fs::create_dir_all(env.cache_path().parent().unwrap()).unwrap();
    fs::write(env.cache_path(), [0xde, 0xad, 0xbe, 0xef, 0x00, 0xff]).unwrap();
    assert!(matches!(env.cache().load(), CacheRead::Corrupt(_)));
}

#[test]
fn empty_file_is_corrupt() {
    let env = TestEnv::new(at("2026-05-01T08:30:00Z"));
    fs::create_dir_all(env.cache_path().parent().unwrap()).unwrap();
    fs::write(env.cache_path(), b"").unwrap();
    assert!(matches!(env.cache().load(), CacheRead::Corrupt(_)));
}

#[test]
fn wrong_key_is_corrupt() {
    let env = TestEnv::new(at("2026-05-01T08:30:00Z"));
    env.cache().save(&snapshot()).unwrap();

    let other = LocalCache::new(env.cache_path(), CacheKey::random());
    assert!(matches!(other.load(), CacheRead::Corrupt(_)));
}

#[test]
fn tampered_ciphertext_is_corrupt() {
    let env = TestEnv::new(at("2026-05-01T08:30:00Z"));
    env.cache().save(&snapshot()).unwrap();

    let text = fs::read_to_string(env.cache_path()).unwrap();
    let mut blob = tether_crypto::SealedBlob::from_text(&text).unwrap();
    let last = blob.ciphertext.len() - 1;
    blob.ciphertext[last] ^= 0x01;
    fs::write(env.cache_path(), blob.to_text()).unwrap();

    assert!(matches!(env.cache().load(), CacheRead::Corrupt(_)));
}

#[test]
fn sealed_garbage_json_is_corrupt() {
    let env = TestEnv::new(at("2026-05-01T08:30:00Z"));
    fs::create_dir_all(env.cache_path().parent().unwrap()).unwrap();
    let text = tether_crypto::seal_text(&env.key, br#"{"code":"ABC123"}"#).unwrap();
    fs::write(env.cache_path(), text).unwrap();
    assert!(matches!(env.cache().load(), CacheRead::Corrupt(_)));
}

#[test]
fn no_temp_files_left_behind() {
    let env = TestEnv::new(at("2026-05-01T08:30:00Z"));
    let cache = env.cache();
    for _ in 0..3 {
        cache.save(&snapshot()).unwrap();
    }
    let mut names: Vec<String> = fs::read_dir(env.cache_path().parent().unwrap())
        .unwrap()
        .map(|e| e.unwrap().file_name().to_string_lossy().into_owned())
        .collect();
    names.sort();
    assert_eq!(names, vec!["license.dat", "license.dat.lock"]);
}

proptest! {
    #![proptest_config(ProptestConfig::with_cases(16))]

    #[test]
    fn any_snapshot_survives_the_cache(
        code in "[A-Za-z0-9 _-]{1,40}",
        days in 0i64..50_000,
        secs in 0i64..4_000_000_000,
    ) {
        let env = TestEnv::new(at("2026-05-01T08:30:00Z"));
        let expire = date(1970, 1, 1) + Duration::days(days);
        let checked = chrono::DateTime::from_timestamp(secs, 0).unwrap();
        let snap = LocalLicenseSnapshot::new(code, expire, checked);

        let cache = env.cache();
        cache.save(&snap).unwrap();
        prop_assert_eq!(cache.load(), CacheRead::Found(snap));
    }
}

#[test]
fn lock_is_released_after_save() {
    use fs2::FileExt;

    let env = TestEnv::new(at("2026-05-01T08:30:00Z"));
    env.cache().save(&snapshot()).unwrap();

    let lock = fs::OpenOptions::new()
        .write(true)
        .open(env.cache_path().with_file_name("license.dat.lock"))
        .unwrap();
    lock.try_lock_exclusive().unwrap();
    lock.unlock().unwrap();

    env.cache().save(&snapshot()).unwrap();
    assert_eq!(env.cache().load(), CacheRead::Found(snapshot()));
}

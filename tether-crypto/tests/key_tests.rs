use tether_crypto::{derive_key, CacheKey, KdfParams, Salt, KEY_SIZE};

#[test]
fn derive_key_is_deterministic() {
    let salt = Salt::for_label("Tether");
    let params = KdfParams::fast();
    let k1 = derive_key("cache-secret", &salt, &params).unwrap();
    let k2 = derive_key("cache-secret", &salt, &params).unwrap();
    assert_eq!(k1.as_bytes(), k2.as_bytes());
}

#[test]
fn different_secrets_produce_different_keys() {
    let salt = Salt::for_label("Tether");
    let params = KdfParams::fast();
    let k1 = derive_key("secret-a", &salt, &params).unwrap();
    let k2 = derive_key("secret-b", &salt, &params).unwrap();
    assert_ne!(k1.as_bytes(), k2.as_bytes());
}

#[test]
fn different_app_labels_produce_different_keys() {
    let params = KdfParams::fast();
    let k1 = derive_key("secret", &Salt::for_label("PlayerA"), &params).unwrap();
    let k2 = derive_key("secret", &Salt::for_label("PlayerB"), &params).unwrap();
    assert_ne!(k1.as_bytes(), k2.as_bytes());
}

#[test]
fn salt_for_label_is_stable() {
    assert_eq!(Salt::for_label("Tether"), Salt::for_label("Tether"));
    assert_ne!(Salt::for_label("Tether"), Salt::for_label("tether"));
}

#[test]
fn zero_memory_cost_is_rejected() {
    let params = KdfParams {
        memory_cost: 0,
        time_cost: 1,
        parallelism: 1,
    };
    assert!(derive_key("secret", &Salt::from_bytes([7; 16]), &params).is_err());
}

#[test]
fn random_keys_are_unique_and_full_length() {
    let k1 = CacheKey::random();
    let k2 = CacheKey::random();
    assert_eq!(k1.as_bytes().len(), KEY_SIZE);
    assert_ne!(k1.as_bytes(), k2.as_bytes());
}

#[test]
fn key_debug_is_redacted() {
    let key = CacheKey::from_bytes([42; KEY_SIZE]);
    let debug = format!("{key:?}");
    assert!(debug.contains("REDACTED"));
    assert!(!debug.contains("42"));
}

#[test]
fn kdf_params_deserialize_with_defaults() {
    let params: KdfParams = serde_json::from_str(r#"{"time_cost":3}"#).unwrap();
    assert_eq!(params.time_cost, 3);
    assert_eq!(params.memory_cost, KdfParams::default().memory_cost);
}

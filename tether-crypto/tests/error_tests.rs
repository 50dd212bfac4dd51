use tether_crypto::{open_text, CacheKey, CryptoError};

#[test]
fn error_display_key_derivation() {
    let err = CryptoError::KeyDerivation("bad params".into());
    assert!(format!("{err}").contains("key derivation failed"));
    assert!(format!("{err}").contains("bad params"));
}

#[test]
fn error_display_decryption() {
    let err = CryptoError::Decryption("tampered".into());
    assert!(format!("{err}").contains("decryption failed"));
}

#[test]
fn error_display_framing() {
    let err = CryptoError::Framing("too short".into());
    assert!(format!("{err}").contains("invalid framing"));
}

#[test]
fn garbage_text_is_a_framing_error() {
    let key = CacheKey::random();
    assert!(matches!(
        open_text(&key, "not base64 at all!"),
        Err(CryptoError::Framing(_))
    ));
    assert!(matches!(open_text(&key, "AAAA"), Err(CryptoError::Framing(_))));
}

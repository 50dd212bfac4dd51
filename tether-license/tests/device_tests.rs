use tether_license::{HardwareFingerprint, UNKNOWN_DEVICE};

#[test]
fn collection_is_stable() {
    let fp1 = HardwareFingerprint::collect();
    let fp2 = HardwareFingerprint::collect();
    assert_eq!(fp1, fp2);
    assert!(!fp1.id().is_empty());
}

#[test]
fn collected_fingerprint_is_normalized_or_unknown() {
    let fp = HardwareFingerprint::collect();
    if !fp.is_unknown() {
        assert_eq!(fp.id(), fp.id().to_ascii_lowercase());
        assert!(!fp.id().contains('-'));
    }
}

#[test]
fn fingerprint_serializes_as_a_bare_string() {
    let fp = HardwareFingerprint::from_raw("aa:bb:cc:dd:ee:ff");
    let json = serde_json::to_string(&fp).unwrap();
    assert_eq!(json, "\"aa:bb:cc:dd:ee:ff\"");
    let parsed: HardwareFingerprint = serde_json::from_str(&json).unwrap();
    assert_eq!(parsed, fp);
}

#[test]
fn display_is_the_id() {
    let fp = HardwareFingerprint::from_raw("aa:bb:cc:dd:ee:ff");
    assert_eq!(fp.to_string(), "aa:bb:cc:dd:ee:ff");
}

#[test]
fn unknown_sentinel() {
    assert!(HardwareFingerprint::unknown().is_unknown());
    assert_eq!(HardwareFingerprint::unknown().id(), UNKNOWN_DEVICE);
    assert!(HardwareFingerprint::from_raw("").is_unknown());
    assert!(!HardwareFingerprint::from_raw("aa:bb:cc:dd:ee:ff").is_unknown());
}

#[test]
fn no_addresses_is_unknown() {
    let fp = HardwareFingerprint::from_addresses(Vec::<String>::new());
    assert!(fp.is_unknown());
}

#[test]
fn duplicates_collapse() {
    let fp = HardwareFingerprint::from_addresses([
        "3C:22:FB:01:02:03",
        "3c-22-fb-01-02-03",
        "f0:18:98:00:00:01",
    ]);
    assert_eq!(fp.id(), "3c:22:fb:01:02:03");
}

#[test]
fn virtual_interfaces_do_not_move_the_fingerprint() {
    let physical = HardwareFingerprint::from_addresses(["3c:22:fb:01:02:03"]);
    let with_bridge =
        HardwareFingerprint::from_addresses(["3c:22:fb:01:02:03", "02:42:ac:11:00:02"]);
    let with_more = HardwareFingerprint::from_addresses([
        "02:42:ac:11:00:02",
        "3c:22:fb:01:02:03",
        "06:5e:7a:00:00:01",
        "fe:ff:ff:ff:ff:ff",
    ]);
    assert_eq!(with_bridge, physical);
    assert_eq!(with_more, physical);
}

#[test]
fn locally_administered_only_is_still_usable() {
    let fp = HardwareFingerprint::from_addresses(["0a:00:27:00:00:05", "02:42:ac:11:00:02"]);
    assert_eq!(fp.id(), "02:42:ac:11:00:02");
    assert!(!fp.is_unknown());
}

//! Hardware fingerprinting for device binding.
//!
//! The fingerprint is the hardware address of an active physical network
//! interface. Addresses are normalized to lowercase `aa:bb:cc:dd:ee:ff` and
//! the lowest universally administered one is used, so enumeration order
//! and virtual interfaces appearing or disappearing do not change the
//! result across restarts. The store compares fingerprints for equality only.

use serde::{Deserialize, Serialize};
use std::fmt;

/// Fingerprint reported when no hardware address can be read.
pub const UNKNOWN_DEVICE: &str = "unknown_device";

/// Opaque identity of the running machine.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct HardwareFingerprint {
    id: String,
}

impl HardwareFingerprint {
    /// Fingerprints the current machine.
    #[must_use]
    pub fn collect() -> Self {
        Self::from_addresses(collect_hardware_addresses())
    }

    /// Wraps an already-derived fingerprint.
    #[must_use]
    pub fn from_raw(id: impl Into<String>) -> Self {
        Self { id: id.into() }
    }

    /// The sentinel used when the machine cannot be identified.
    #[must_use]
    pub fn unknown() -> Self {
        Self::from_raw(UNKNOWN_DEVICE)
    }

    /// Picks the fingerprint from a set of raw interface addresses.
    #[must_use]
    pub fn from_addresses<I, S>(addresses: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        let (universal, local): (Vec<String>, Vec<String>) = addresses
            .into_iter()
            .filter_map(|a| normalize_address(a.as_ref()))
            .partition(|a| is_universally_administered(a));

        // Locally administered addresses (containers, VMs, bridges) come
        // and go; they only count when nothing else is present.
        let pool = if universal.is_empty() { local } else { universal };
        match pool.into_iter().min() {
            Some(id) => Self { id },
            None => Self::unknown(),
        }
    }

    /// Returns the fingerprint string.
    #[must_use]
    pub fn id(&self) -> &str {
        &self.id
    }

    /// Returns true for the `unknown_device` sentinel or an empty id.
    #[must_use]
    pub fn is_unknown(&self) -> bool {
        self.id.is_empty() || self.id == UNKNOWN_DEVICE
    }
}

impl fmt::Display for HardwareFingerprint {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.id)
    }
}

/// Lowercases, converts `-` separators to `:`, and drops empty or
/// all-zero addresses.
fn normalize_address(raw: &str) -> Option<String> {
    let addr = raw.trim().replace('-', ":").to_ascii_lowercase();
    if addr.is_empty() {
        return None;
    }
    if addr.chars().all(|c| c == '0' || c == ':') {
        return None;
    }
    Some(addr)
}

/// True when the U/L bit of the first octet is clear. Unparseable
/// addresses are treated as locally administered.
fn is_universally_administered(addr: &str) -> bool {
    addr.get(..2)
        .and_then(|octet| u8::from_str_radix(octet, 16).ok())
        .is_some_and(|octet| octet & 0x02 == 0)
}

/// Collects hardware addresses of interfaces that are up and not loopback.
fn collect_hardware_addresses() -> Vec<String> {
    #[cfg(target_os = "linux")]
    {
        linux_addresses()
    }

    #[cfg(target_os = "macos")]
    {
        std::process::Command::new("ifconfig")
            .output()
            .ok()
            .and_then(|o| String::from_utf8(o.stdout).ok())
            .map(|out| parse_ifconfig(&out))
            .unwrap_or_default()
    }

    #[cfg(target_os = "windows")]
    {
        std::process::Command::new("getmac")
            .args(["/fo", "csv", "/nh"])
            .output()
            .ok()
            .and_then(|o| String::from_utf8(o.stdout).ok())
            .map(|out| parse_getmac(&out))
            .unwrap_or_default()
    }

    #[cfg(not(any(target_os = "macos", target_os = "windows", target_os = "linux")))]
    {
        Vec::new()
    }
}

#[cfg(target_os = "linux")]
fn linux_addresses() -> Vec<String> {
    const IFF_UP: u32 = 0x1;
    const IFF_LOOPBACK: u32 = 0x8;

    let Ok(entries) = std::fs::read_dir("/sys/class/net") else {
        return Vec::new();
    };

    entries
        .flatten()
        .filter_map(|entry| {
            let dir = entry.path();
            // Virtual interfaces (bridges, veth, tun) have no backing device.
            if !dir.join("device").exists() {
                return None;
            }
            let flags = std::fs::read_to_string(dir.join("flags")).ok()?;
            let flags = u32::from_str_radix(flags.trim().trim_start_matches("0x"), 16).ok()?;
            if flags & IFF_UP == 0 || flags & IFF_LOOPBACK != 0 {
                return None;
            }
            std::fs::read_to_string(dir.join("address"))
                .ok()
                .map(|s| s.trim().to_string())
        })
        .collect()
}

/// Extracts `ether` addresses of `UP` interfaces from `ifconfig` output.
#[cfg_attr(not(target_os = "macos"), allow(dead_code))]
fn parse_ifconfig(output: &str) -> Vec<String> {
    let mut addresses = Vec::new();
    let mut current_up = false;

    for line in output.lines() {
        if !line.starts_with(char::is_whitespace) {
            current_up = line.contains("<UP") && !line.contains("LOOPBACK");
            continue;
        }
        let line = line.trim();
        if current_up {
            if let Some(addr) = line.strip_prefix("ether ") {
                if let Some(addr) = addr.split_whitespace().next() {
                    addresses.push(addr.to_string());
                }
            }
        }
    }
    addresses
}

/// Extracts connected adapters from `getmac /fo csv /nh` output.
#[cfg_attr(not(target_os = "windows"), allow(dead_code))]
fn parse_getmac(output: &str) -> Vec<String> {
    output
        .lines()
        .filter_map(|line| {
            let mut fields = line.split(',').map(|f| f.trim().trim_matches('"'));
            let addr = fields.next()?;
            let transport = fields.next().unwrap_or_default();
            if addr.is_empty() || addr.eq_ignore_ascii_case("N/A") {
                return None;
            }
            // Disconnected media reports a status text instead of a device path.
            if !transport.starts_with("\\Device\\") {
                return None;
            }
            Some(addr.to_string())
        })
        .collect()
}

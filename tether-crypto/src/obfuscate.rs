//! Repeating-key XOR.
//!
//! The same call both hides and reveals: `xor_cycle(xor_cycle(x, k), k) == x`.
//! The key is applied cyclically when it is shorter than the data. An empty
//! key leaves the data unchanged.

/// XORs every byte of `data` with `key[i % key.len()]`.
#[must_use]
pub fn xor_cycle(data: &[u8], key: &[u8]) -> Vec<u8> {
    if key.is_empty() {
        return data.to_vec();
    }
    data.iter()
        .zip(key.iter().cycle())
        .map(|(b, k)| b ^ k)
        .collect()
}

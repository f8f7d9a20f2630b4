/// Additive frame checksum: sum of all bytes, truncated to 8 bits.
pub fn checksum(data: &[u8]) -> u8 {
    data.iter().fold(0u8, |acc, &b| acc.wrapping_add(b))
}

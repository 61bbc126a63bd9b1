//! FNV-1a fingerprints used as wire-level element identifiers.

const FNV_OFFSET_BASIS: u32 = 0x811c_9dc5;
const FNV_PRIME: u32 = 0x0100_0193;

/// 32-bit FNV-1a over raw bytes.
pub fn fnv1a_32(bytes: &[u8]) -> u32 {
    bytes.iter().fold(FNV_OFFSET_BASIS, |hash, byte| {
        (hash ^ u32::from(*byte)).wrapping_mul(FNV_PRIME)
    })
}

/// Lowercase hex FNV-1a of `"tag:content"`, without zero padding.
pub fn fingerprint(tag: &str, content: &str) -> String {
    format!("{:x}", fnv1a_32(format!("{tag}:{content}").as_bytes()))
}

//! Common utilities

use xxhash_rust::xxh3::xxh3_128;

const BYTES_PER_MB: f64 = 1024.0 * 1024.0;

/// Fixed-width (32 hex chars) XXH3-128 digest of the input
pub fn hash_hex(data: &[u8]) -> String {
    format!("{:032x}", xxh3_128(data))
}

/// Convert a byte count to fractional megabytes
pub fn bytes_to_mb(bytes: u64) -> f64 {
    bytes as f64 / BYTES_PER_MB
}

/// Round to two decimals for reporting
pub fn round2(value: f64) -> f64 {
    (value * 100.0).round() / 100.0
}

/// Check if a command is available in PATH
pub fn command_exists(cmd: &str) -> bool {
    std::process::Command::new("which")
        .arg(cmd)
        .output()
        .map(|output| output.status.success())
        .unwrap_or(false)
}

//! # Common Utilities

const BINARY_UNITS: [&str; 5] = ["KiB", "MiB", "GiB", "TiB", "PiB"];

/// On-disk size with binary units and one decimal, e.g. `1.5 KiB`.
/// Sizes under 1 KiB are printed as exact byte counts.
pub fn format_bytes(bytes: u64) -> String {
    if bytes < 1024 {
        return format!("{} B", bytes);
    }

    let mut size = bytes as f64;
    let mut unit = "B";
    for next in BINARY_UNITS {
        if size < 1024.0 {
            break;
        }
        size /= 1024.0;
        unit = next;
    }
    format!("{:.1} {}", size, unit)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_small_sizes_are_exact() {
        assert_eq!(format_bytes(0), "0 B");
        assert_eq!(format_bytes(32), "32 B");
        assert_eq!(format_bytes(1023), "1023 B");
    }

    #[test]
    fn test_binary_units() {
        assert_eq!(format_bytes(1024), "1.0 KiB");
        assert_eq!(format_bytes(1536), "1.5 KiB");
        assert_eq!(format_bytes(10 * 1024 * 1024), "10.0 MiB");
        assert_eq!(format_bytes(3 << 30), "3.0 GiB");
    }
}

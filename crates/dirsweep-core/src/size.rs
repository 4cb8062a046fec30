/// Byte-count formatting and unit conversions (binary units, 1 KB = 1024 B).

const UNIT: f64 = 1024.0;

/// Human-readable size, e.g. `"312.4 MB"`.
///
/// Below 1 GB one decimal is shown, from GB upwards two, since a tenth of a
/// gigabyte is still a lot of `node_modules`.
pub fn format_size(bytes: u64) -> String {
    const UNITS: [&str; 4] = ["KB", "MB", "GB", "TB"];

    if (bytes as f64) < UNIT {
        return format!("{bytes} B");
    }

    let mut value = bytes as f64 / UNIT;
    let mut unit = 0;
    while value >= UNIT && unit < UNITS.len() - 1 {
        value /= UNIT;
        unit += 1;
    }

    if unit < 2 {
        format!("{value:.1} {}", UNITS[unit])
    } else {
        format!("{value:.2} {}", UNITS[unit])
    }
}

pub fn bytes_to_kb(bytes: u64) -> f64 {
    bytes as f64 / UNIT
}

pub fn bytes_to_gb(bytes: u64) -> f64 {
    bytes as f64 / UNIT.powi(3)
}

pub fn gb_to_mb(gb: f64) -> f64 {
    gb * UNIT
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_format_size_small() {
        assert_eq!(format_size(0), "0 B");
        assert_eq!(format_size(1023), "1023 B");
    }

    #[test]
    fn test_format_size_units() {
        assert_eq!(format_size(1024), "1.0 KB");
        assert_eq!(format_size(1536), "1.5 KB");
        assert_eq!(format_size(350 * 1024 * 1024), "350.0 MB");
        assert_eq!(format_size(1_073_741_824), "1.00 GB");
        assert_eq!(format_size(1_099_511_627_776), "1.00 TB");
        // Beyond TB stays in TB.
        assert_eq!(format_size(2048 * 1_099_511_627_776), "2048.00 TB");
    }

    #[test]
    fn test_conversions() {
        assert_eq!(bytes_to_kb(2048), 2.0);
        assert_eq!(bytes_to_gb(3 * 1_073_741_824), 3.0);
        assert_eq!(gb_to_mb(1.5), 1536.0);
    }
}

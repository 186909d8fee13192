//! Human-readable byte sizes.

const UNITS: [&str; 5] = ["kB", "MB", "GB", "TB", "PB"];

/// Format `bytes` with decimal units, e.g. `1.2 MB`.
#[allow(clippy::cast_precision_loss)]
pub fn natural_size(bytes: u64) -> String {
    if bytes < 1000 {
        return format!("{bytes} Bytes");
    }
    let mut value = bytes as f64 / 1000.0;
    let mut unit = UNITS[0];
    for next in &UNITS[1..] {
        if value < 1000.0 {
            break;
        }
        value /= 1000.0;
        unit = next;
    }
    format!("{value:.1} {unit}")
}

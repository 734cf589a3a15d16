//! Kubernetes resource quantity parsing
//!
//! The metrics API reports usage as quantity strings (`"250m"`, `"12345n"`,
//! `"128Mi"`). These helpers turn them into millicores and bytes.

/// Parse a CPU quantity into millicores, rounding up fractional millicores.
pub fn parse_cpu_millicores(quantity: &str) -> Option<u64> {
    let (number, suffix) = split_quantity(quantity)?;

    let millicores = match suffix {
        "n" => number / 1_000_000.0,
        "u" => number / 1_000.0,
        "m" => number,
        "" => number * 1_000.0,
        "k" => number * 1_000_000.0,
        _ => return None,
    };

    Some(millicores.ceil() as u64)
}

/// Parse a memory quantity into bytes, rounding up fractional bytes.
pub fn parse_memory_bytes(quantity: &str) -> Option<u64> {
    let (number, suffix) = split_quantity(quantity)?;

    let multiplier: f64 = match suffix {
        "" => 1.0,
        "m" => 0.001,
        "k" => 1e3,
        "M" => 1e6,
        "G" => 1e9,
        "T" => 1e12,
        "P" => 1e15,
        "E" => 1e18,
        "Ki" => 1024.0,
        "Mi" => 1024.0 * 1024.0,
        "Gi" => 1024.0 * 1024.0 * 1024.0,
        "Ti" => 1024.0 * 1024.0 * 1024.0 * 1024.0,
        "Pi" => 1024.0 * 1024.0 * 1024.0 * 1024.0 * 1024.0,
        "Ei" => 1024.0 * 1024.0 * 1024.0 * 1024.0 * 1024.0 * 1024.0,
        _ => return None,
    };

    Some((number * multiplier).ceil() as u64)
}

fn split_quantity(quantity: &str) -> Option<(f64, &str)> {
    let quantity = quantity.trim();
    let split = quantity
        .find(|c: char| !(c.is_ascii_digit() || c == '.' || c == '+' || c == '-'))
        .unwrap_or(quantity.len());
    let (number, suffix) = quantity.split_at(split);

    // Decimal exponent form, e.g. "1e3"
    if let Some(exp) = suffix.strip_prefix(|c: char| c == 'e' || c == 'E') {
        if let Ok(exp) = exp.parse::<i32>() {
            let base: f64 = number.parse().ok()?;
            return Some((base * 10f64.powi(exp), ""));
        }
    }

    let number: f64 = number.parse().ok()?;
    if number < 0.0 {
        return None;
    }
    Some((number, suffix))
}

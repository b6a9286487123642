// SPDX-License-Identifier: GPL-3.0-only

//! Geometry and size helpers shared by the engine and its front ends
//!
//! Sizes are whole megabytes everywhere in the model. Proportional layout
//! (the disk bar) is expressed in percent of the disk.

use anyhow::Result;
use num_format::{Locale, ToFormattedString};

/// Megabytes per gigabyte, as used by the size text helpers.
pub const MB_PER_GB: u64 = 1024;

/// Share of the disk taken by `size_mb`, in percent.
pub fn percent_of_disk(size_mb: u64, total_mb: u64) -> f64 {
    if total_mb == 0 {
        return 0.0;
    }
    size_mb as f64 * 100.0 / total_mb as f64
}

/// Size in megabytes covered by `percent` of a disk of `total_mb`.
pub fn size_for_percent(percent: f64, total_mb: u64) -> u64 {
    if !percent.is_finite() || percent <= 0.0 {
        return 0;
    }
    (percent * total_mb as f64 / 100.0).round() as u64
}

/// Convert a pointer displacement on the bar into percent of the bar width.
pub fn pixels_to_percent(delta_px: f64, bar_width_px: f64) -> f64 {
    if bar_width_px <= 0.0 || !delta_px.is_finite() {
        return 0.0;
    }
    delta_px * 100.0 / bar_width_px
}

/// Clamp a percentage into `[min, max]`.
///
/// Bounds given in the wrong order are swapped instead of panicking.
pub fn clamp_percent(value: f64, min: f64, max: f64) -> f64 {
    let (low, high) = if min <= max { (min, max) } else { (max, min) };
    if value.is_nan() {
        return low;
    }
    value.clamp(low, high)
}

/// Convert megabytes to human-readable text ("120 GB", "1.5 GB", "500 MB").
pub fn format_size(size_mb: u64) -> String {
    if size_mb < MB_PER_GB {
        return format!("{size_mb} MB");
    }

    let gb = size_mb as f64 / MB_PER_GB as f64;
    let text = format!("{gb:.2}");
    let text = text.trim_end_matches('0').trim_end_matches('.');
    format!("{text} GB")
}

/// Human-readable size followed by the exact megabyte count
/// (e.g. "50 GB (51,200 MB)").
pub fn format_size_detailed(size_mb: u64) -> String {
    let exact = size_mb.to_formatted_string(&Locale::en);
    if size_mb < MB_PER_GB {
        return format!("{exact} MB");
    }
    format!("{} ({exact} MB)", format_size(size_mb))
}

/// Parse size text into megabytes ("100 GB", "1.5GB", "500 MB").
///
/// A bare number is read as megabytes.
pub fn parse_size(text: &str) -> Result<u64> {
    let trimmed = text.trim();
    if trimmed.is_empty() {
        return Err(anyhow::anyhow!("Invalid size: empty input"));
    }

    let split_at = trimmed
        .find(|c: char| !(c.is_ascii_digit() || c == '.'))
        .unwrap_or(trimmed.len());
    let (number, unit) = trimmed.split_at(split_at);

    let value: f64 = number
        .parse()
        .map_err(|_| anyhow::anyhow!("Invalid size: {}", text))?;
    if !value.is_finite() || value < 0.0 {
        return Err(anyhow::anyhow!("Invalid size: {}", text));
    }

    let multiplier = match unit.trim().to_ascii_uppercase().as_str() {
        "" | "MB" | "M" => 1.0,
        "GB" | "G" => MB_PER_GB as f64,
        other => return Err(anyhow::anyhow!("Invalid unit: {}", other)),
    };

    Ok((value * multiplier).round() as u64)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn format_size_trims_trailing_zeros() {
        assert_eq!(format_size(120 * 1024), "120 GB");
        assert_eq!(format_size(1536), "1.5 GB");
        assert_eq!(format_size(1024), "1 GB");
        assert_eq!(format_size(500), "500 MB");
        assert_eq!(format_size(0), "0 MB");
    }

    #[test]
    fn format_size_detailed_includes_exact_megabytes() {
        assert_eq!(format_size_detailed(51200), "50 GB (51,200 MB)");
        assert_eq!(format_size_detailed(512), "512 MB");
    }

    #[test]
    fn parse_size_accepts_units_and_spacing() {
        assert_eq!(parse_size("100 GB").unwrap(), 102_400);
        assert_eq!(parse_size("1.5gb").unwrap(), 1536);
        assert_eq!(parse_size(" 500 MB ").unwrap(), 500);
        assert_eq!(parse_size("20480").unwrap(), 20480);
    }

    #[test]
    fn parse_size_rejects_garbage() {
        assert!(parse_size("").is_err());
        assert!(parse_size("GB").is_err());
        assert!(parse_size("10 parsecs").is_err());
        assert!(parse_size("1.2.3 GB").is_err());
    }

    #[test]
    fn percent_roundtrip_is_stable() {
        let total = 500 * 1024;
        let percent = percent_of_disk(120 * 1024, total);
        assert!((percent - 24.0).abs() < 1e-9);
        assert_eq!(size_for_percent(percent, total), 120 * 1024);
    }

    #[test]
    fn percent_helpers_handle_degenerate_input() {
        assert_eq!(percent_of_disk(10, 0), 0.0);
        assert_eq!(size_for_percent(-3.0, 1000), 0);
        assert_eq!(size_for_percent(f64::NAN, 1000), 0);
        assert_eq!(pixels_to_percent(50.0, 0.0), 0.0);
        assert_eq!(pixels_to_percent(50.0, 1000.0), 5.0);
    }

    #[test]
    fn clamp_percent_swaps_reversed_bounds() {
        assert_eq!(clamp_percent(120.0, 5.0, 95.0), 95.0);
        assert_eq!(clamp_percent(1.0, 95.0, 5.0), 5.0);
        assert_eq!(clamp_percent(f64::NAN, 5.0, 95.0), 5.0);
    }
}

use crate::models::Segment;

/// Format an integer count with thousands separators.
///
/// # Examples
///
/// ```
/// use cohort_core::formatting::format_count;
///
/// assert_eq!(format_count(5), "5");
/// assert_eq!(format_count(1234), "1,234");
/// assert_eq!(format_count(1_234_567), "1,234,567");
/// ```
pub fn format_count(value: u64) -> String {
    group_thousands(&value.to_string())
}

/// Join segments as `low-high` ranges (single ids printed alone).
///
/// # Examples
///
/// ```
/// use cohort_core::formatting::format_segments;
/// use cohort_core::models::Segment;
///
/// let segments = [Segment::new(10, 14), Segment::single(20)];
/// assert_eq!(format_segments(&segments), "10-14, 20");
/// assert_eq!(format_segments(&[]), "-");
/// ```
pub fn format_segments(segments: &[Segment]) -> String {
    if segments.is_empty() {
        return "-".to_string();
    }
    segments
        .iter()
        .map(Segment::to_string)
        .collect::<Vec<_>>()
        .join(", ")
}

/// Format an elapsed wall-clock duration given in seconds.
///
/// * `< 1` second → milliseconds with one decimal (`"12.5ms"`)
/// * otherwise → seconds with two decimals (`"1.25s"`)
pub fn format_elapsed(seconds: f64) -> String {
    if seconds < 1.0 {
        format!("{:.1}ms", seconds * 1000.0)
    } else {
        format!("{:.2}s", seconds)
    }
}

/// Calculate `(part / whole) * 100`, rounded to `decimal_places`.
///
/// Returns `0.0` if `whole` is zero to avoid division by zero.
///
/// # Examples
///
/// ```
/// use cohort_core::formatting::percentage;
///
/// assert!((percentage(50.0, 200.0, 1) - 25.0).abs() < 1e-9);
/// assert_eq!(percentage(0.0, 0.0, 2), 0.0);
/// ```
pub fn percentage(part: f64, whole: f64, decimal_places: u32) -> f64 {
    if whole == 0.0 {
        return 0.0;
    }
    let raw = (part / whole) * 100.0;
    let factor = 10_f64.powi(decimal_places as i32);
    (raw * factor).round() / factor
}

// ── Internal helpers ──────────────────────────────────────────────────────────

/// Insert commas every three digits from the right of an integer string.
fn group_thousands(s: &str) -> String {
    if s.len() <= 3 {
        return s.to_string();
    }
    let chars: Vec<char> = s.chars().collect();
    let mut result = String::with_capacity(s.len() + s.len() / 3);
    let remainder = chars.len() % 3;
    for (i, &c) in chars.iter().enumerate() {
        if i != 0 && (i % 3 == remainder) {
            result.push(',');
        }
        result.push(c);
    }
    result
}

// ── Tests ──────────────────────────────────────────────────────────────────────

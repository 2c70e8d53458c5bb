use std::fmt::Write;

use pose_core::{LANDMARK_COUNT, LANDMARK_FIELDS, PoseResult};

/// Leading per-result columns; the landmark columns follow.
pub const BASE_COLUMNS: [&str; 4] = ["frame_id", "timestamp", "confidence", "source_file"];

/// Full header: the base columns, then `landmark_<i>_<field>` for every
/// landmark in anatomical order.
pub fn header() -> Vec<String> {
    let mut columns: Vec<String> = BASE_COLUMNS.iter().map(|c| c.to_string()).collect();
    for index in 0..LANDMARK_COUNT {
        for field in LANDMARK_FIELDS {
            columns.push(format!("landmark_{index}_{field}"));
        }
    }
    columns
}

pub(crate) fn render(results: &[PoseResult]) -> Vec<u8> {
    let mut out = header().join(",");
    out.push('\n');

    for result in results {
        // Writing into a String cannot fail.
        let _ = write!(
            out,
            "{},{},{},{}",
            result.frame_id(),
            format_float(result.timestamp()),
            format_f32(result.confidence()),
            escape_csv(result.source_file())
        );
        for landmark in result.landmarks() {
            for value in landmark.values() {
                out.push(',');
                out.push_str(&format_f32(value));
            }
        }
        out.push('\n');
    }

    out.into_bytes()
}

/// Shortest representation that round-trips, always with a decimal point.
fn format_float(value: f64) -> String {
    let text = value.to_string();
    if text.contains(['.', 'e', 'E']) || !value.is_finite() {
        text
    } else {
        format!("{text}.0")
    }
}

fn format_f32(value: f32) -> String {
    let text = value.to_string();
    if text.contains(['.', 'e', 'E']) || !value.is_finite() {
        text
    } else {
        format!("{text}.0")
    }
}

fn escape_csv(s: &str) -> String {
    if s.contains([',', '"', '\n', '\r']) {
        format!("\"{}\"", s.replace('"', "\"\""))
    } else {
        s.to_string()
    }
}

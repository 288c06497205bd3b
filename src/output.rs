//! CLI output formatting.
//!
//! # Output Format
//!
//! ## Process
//!
//! ```text
//! sepia 10,20,30,40
//!     Source: photo.png (48213 bytes)
//!     Status: 200 OK
//!     Output: out.png (15872 bytes)
//! ```
//!
//! A request that produces no image names the reason instead:
//!
//! ```text
//! sepia 1000,0,10,10
//!     Source: photo.png (48213 bytes)
//!     Status: 204 No Content
//!     Output: none (crop rectangle misses the image)
//! ```
//!
//! # Architecture
//!
//! Each command has a `format_*` function (returns `Vec<String>`) for
//! testability and a `print_*` wrapper that writes to stdout. Format functions
//! are pure: no I/O, no side effects.

use crate::request::{Response, Status};
use std::path::Path;

/// Return indentation string: 4 spaces per depth level.
fn indent(depth: usize) -> String {
    "    ".repeat(depth)
}

fn file_line(label: &str, path: &Path, bytes: usize) -> String {
    format!("{}{}: {} ({} bytes)", indent(1), label, path.display(), bytes)
}

fn missing_output_reason(status: Status) -> &'static str {
    match status {
        Status::Ok => "encoding failed",
        Status::NoContent => "crop rectangle misses the image",
        Status::BadRequest => "request rejected",
        Status::InternalServerError => "processing failed",
    }
}

// ============================================================================
// process command
// ============================================================================

/// Format the outcome of one `process` run.
///
/// `written` is the output path when the response body was saved.
pub fn format_process_result(
    filter: &str,
    rect: &str,
    input: &Path,
    input_bytes: usize,
    response: &Response,
    written: Option<&Path>,
) -> Vec<String> {
    let mut lines = vec![
        format!("{filter} {rect}"),
        file_line("Source", input, input_bytes),
        format!(
            "{}Status: {} {}",
            indent(1),
            response.status,
            response.status.reason()
        ),
    ];
    match written {
        Some(path) if !response.body.is_empty() => {
            lines.push(file_line("Output", path, response.body.len()));
        }
        _ => lines.push(format!(
            "{}Output: none ({})",
            indent(1),
            missing_output_reason(response.status)
        )),
    }
    lines
}

pub fn print_process_result(
    filter: &str,
    rect: &str,
    input: &Path,
    input_bytes: usize,
    response: &Response,
    written: Option<&Path>,
) {
    for line in format_process_result(filter, rect, input, input_bytes, response, written) {
        println!("{}", line);
    }
}

//! Progress display for a running job

use indicatif::{ProgressBar, ProgressStyle};

const JOB_TEMPLATE: &str =
    "{spinner:.green} [{elapsed_precise}] [{wide_bar:.cyan/blue}] {pos}/{len} {msg}";

/// Progress bar whose length follows the active stage's max progress
pub fn create_job_progress(message: &str) -> ProgressBar {
    let pb = ProgressBar::new(1);
    let style = ProgressStyle::with_template(JOB_TEMPLATE)
        .unwrap_or_else(|_| ProgressStyle::default_bar())
        .progress_chars("#>-");
    pb.set_style(style);
    pb.set_message(message.to_string());
    pb
}

/// Format bytes into human-readable string
pub fn format_bytes(bytes: u64) -> String {
    const UNITS: &[&str] = &["B", "KB", "MB", "GB", "TB"];
    let mut size = bytes as f64;
    let mut unit = UNITS[0];

    for next in &UNITS[1..] {
        if size < 1024.0 {
            break;
        }
        size /= 1024.0;
        unit = next;
    }

    if unit == UNITS[0] {
        format!("{} {}", bytes, unit)
    } else {
        format!("{:.2} {}", size, unit)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_format_bytes() {
        assert_eq!(format_bytes(0), "0 B");
        assert_eq!(format_bytes(512), "512 B");
        assert_eq!(format_bytes(1536), "1.50 KB");
        assert_eq!(format_bytes(5 * 1024 * 1024), "5.00 MB");
    }

    #[test]
    fn test_create_job_progress() {
        let pb = create_job_progress("uploading_slice");
        assert_eq!(pb.length(), Some(1));
        assert_eq!(pb.message(), "uploading_slice");
    }
}

//! Elapsed-time formatting

use std::time::Duration;

/// Format a duration as `"<ms>ms (<s.sss> seconds)"`
pub fn format_elapsed(elapsed: Duration) -> String {
    format!(
        "{}ms ({:.3} seconds)",
        elapsed.as_millis(),
        elapsed.as_secs_f64()
    )
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_format_elapsed() {
        assert_eq!(
            format_elapsed(Duration::from_millis(1234)),
            "1234ms (1.234 seconds)"
        );
        assert_eq!(format_elapsed(Duration::ZERO), "0ms (0.000 seconds)");
    }
}

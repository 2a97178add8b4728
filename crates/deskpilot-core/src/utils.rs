//! Utility functions for text truncation and transport retries.

use anyhow::Result;
use std::time::Duration;
use tokio_retry::strategy::{jitter, ExponentialBackoff};
use tokio_retry::Retry;
use tracing::warn;

/// Marker appended (or prepended) when diagnostic text is cut.
pub const TRUNCATION_MARKER: &str = "...(truncated)";

/// Initial delay between transport retries.
pub const TRANSPORT_INITIAL_BACKOFF_MS: u64 = 500;
/// Upper bound for a single retry delay.
pub const TRANSPORT_MAX_BACKOFF_MS: u64 = 4000;
/// Retry attempts after the first failure.
pub const TRANSPORT_MAX_RETRIES: usize = 3;

/// Keep at most `max_chars` characters of `s` (Unicode-safe).
///
/// # Examples
///
/// ```
/// use deskpilot_core::utils::truncate_str;
/// assert_eq!(truncate_str("Привет, мир!", 6), "Привет");
/// ```
pub fn truncate_str(s: impl AsRef<str>, max_chars: usize) -> String {
    let s = s.as_ref();
    if s.chars().count() <= max_chars {
        return s.to_string();
    }
    s.char_indices()
        .nth(max_chars)
        .map_or_else(|| s.to_string(), |(pos, _)| s[..pos].to_string())
}

/// Keep the head of a diagnostic, marking the cut explicitly.
///
/// Text within `budget` characters is returned unchanged.
#[must_use]
pub fn truncate_diagnostic(text: &str, budget: usize) -> String {
    if text.chars().count() <= budget {
        return text.to_string();
    }
    format!("{}\n{TRUNCATION_MARKER}", truncate_str(text, budget))
}

/// Keep the tail of a diagnostic (where build tools print the error).
#[must_use]
pub fn tail_diagnostic(text: &str, budget: usize) -> String {
    let total = text.chars().count();
    if total <= budget {
        return text.to_string();
    }
    let tail: String = text.chars().skip(total - budget).collect();
    format!("{TRUNCATION_MARKER}\n{tail}")
}

/// Render a duration as `Hh Mm Ss`.
#[must_use]
pub fn format_uptime(uptime: Duration) -> String {
    let total = uptime.as_secs();
    let (h, rem) = (total / 3600, total % 3600);
    let (m, s) = (rem / 60, rem % 60);
    format!("{h}h {m}m {s}s")
}

/// Retry a transport operation with exponential backoff.
///
/// Delays start at [`TRANSPORT_INITIAL_BACKOFF_MS`], are capped at
/// [`TRANSPORT_MAX_BACKOFF_MS`] and carry jitter; at most
/// [`TRANSPORT_MAX_RETRIES`] retries follow the first attempt.
///
/// # Errors
///
/// Returns the last error once all attempts fail.
pub async fn retry_transport_operation<F, Fut, T>(operation: F) -> Result<T>
where
    F: FnMut() -> Fut,
    Fut: std::future::Future<Output = Result<T>>,
{
    let retry_strategy = ExponentialBackoff::from_millis(TRANSPORT_INITIAL_BACKOFF_MS)
        .max_delay(Duration::from_millis(TRANSPORT_MAX_BACKOFF_MS))
        .map(jitter)
        .take(TRANSPORT_MAX_RETRIES);

    Retry::spawn(retry_strategy, operation).await.map_err(|e| {
        warn!(
            "Transport operation failed after {} retries: {}",
            TRANSPORT_MAX_RETRIES, e
        );
        e
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicUsize, Ordering};

    #[test]
    fn test_truncate_str_unicode() {
        let s = "Привет, мир!";
        assert_eq!(truncate_str(s, 6), "Привет");
        assert_eq!(truncate_str(s, 50), "Привет, мир!");
    }

    #[test]
    fn test_truncate_diagnostic_marks_cut() {
        assert_eq!(truncate_diagnostic("short", 10), "short");
        assert_eq!(
            truncate_diagnostic("abcdefghij", 4),
            format!("abcd\n{TRUNCATION_MARKER}")
        );
    }

    #[test]
    fn test_tail_diagnostic_keeps_end() {
        assert_eq!(tail_diagnostic("abc", 3), "abc");
        assert_eq!(
            tail_diagnostic("line1\nBUILD FAILED", 12),
            format!("{TRUNCATION_MARKER}\nBUILD FAILED")
        );
    }

    #[test]
    fn test_format_uptime() {
        assert_eq!(format_uptime(Duration::from_secs(3725)), "1h 2m 5s");
        assert_eq!(format_uptime(Duration::ZERO), "0h 0m 0s");
    }

    #[tokio::test(start_paused = true)]
    async fn test_retry_succeeds_after_transient_failures() {
        let calls = AtomicUsize::new(0);
        let result = retry_transport_operation(|| {
            let attempt = calls.fetch_add(1, Ordering::SeqCst);
            async move {
                if attempt < 2 {
                    Err(anyhow::anyhow!("network down"))
                } else {
                    Ok(attempt)
                }
            }
        })
        .await;

        assert_eq!(result.ok(), Some(2));
        assert_eq!(calls.load(Ordering::SeqCst), 3);
    }
}

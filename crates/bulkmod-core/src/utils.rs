use std::{fmt::Display, future::Future};

use chrono::Utc;

// ============== Timestamp Helpers ==============

/// RFC3339 timestamp in UTC (for logs).
pub fn iso_timestamp_utc() -> String {
    Utc::now().to_rfc3339()
}

// ============== Text Helpers ==============

pub fn truncate_text(s: &str, max_len: usize) -> String {
    if s.chars().count() <= max_len {
        return s.to_string();
    }
    let mut out = s.chars().take(max_len).collect::<String>();
    out.push_str("...");
    out
}

// ============== Best-effort Steps ==============

/// Run a step whose failure must never propagate (departure, message purge).
///
/// Errors are logged and discarded; returns whether the step succeeded.
pub async fn best_effort<T, E, F>(label: &str, fut: F) -> bool
where
    F: Future<Output = std::result::Result<T, E>>,
    E: Display,
{
    match fut.await {
        Ok(_) => true,
        Err(e) => {
            tracing::warn!(step = label, error = %e, "best-effort step failed");
            false
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::Error;

    #[test]
    fn truncate_text_adds_ellipsis() {
        let s = "a".repeat(60);
        let t = truncate_text(&s, 50);
        assert!(t.ends_with("..."));
        assert_eq!(t.chars().count(), 53);
        assert_eq!(truncate_text("short", 50), "short");
    }

    #[tokio::test]
    async fn best_effort_swallows_errors() {
        let ok = best_effort("ok", async { Ok::<_, Error>(1) }).await;
        let failed = best_effort("fail", async {
            Err::<(), _>(Error::External("gone".to_string()))
        })
        .await;
        assert!(ok);
        assert!(!failed);
    }
}

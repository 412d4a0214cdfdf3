// Blocking-pool parse worker with inline fallback
use std::sync::Arc;

/// Runs `parse` over `text` on tokio's blocking pool so large tables do not
/// stall the runtime. When the worker is disabled or the task fails, the same
/// parse runs inline.
pub async fn parse_in_worker<T>(enabled: bool, text: Arc<str>, parse: fn(&str) -> T) -> T
where
    T: Send + 'static,
{
    if enabled {
        let worker_text = Arc::clone(&text);
        match tokio::task::spawn_blocking(move || parse(&worker_text)).await {
            Ok(parsed) => return parsed,
            Err(e) => tracing::warn!("Parse worker failed, parsing inline: {}", e),
        }
    }
    parse(&text)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::infrastructure::csv_parser::{parse_delimited, ParsedRow};

    fn rows(text: &str) -> Vec<ParsedRow> {
        parse_delimited(text)
    }

    #[tokio::test]
    async fn test_worker_and_inline_agree() {
        let text: Arc<str> = Arc::from("caseid,opname\n1,a\n2,b\n");
        let worker = parse_in_worker(true, Arc::clone(&text), rows).await;
        let inline = parse_in_worker(false, text, rows).await;
        assert_eq!(worker, inline);
        assert_eq!(worker.len(), 2);
    }

    #[tokio::test]
    async fn test_panicking_worker_falls_back_inline() {
        use std::sync::atomic::{AtomicUsize, Ordering};
        static CALLS: AtomicUsize = AtomicUsize::new(0);

        fn flaky(text: &str) -> usize {
            if CALLS.fetch_add(1, Ordering::SeqCst) == 0 {
                panic!("worker crashed");
            }
            text.len()
        }

        let len = parse_in_worker(true, Arc::from("abc"), flaky).await;
        assert_eq!(len, 3);
        assert_eq!(CALLS.load(Ordering::SeqCst), 2);
    }
}

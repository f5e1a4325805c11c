use std::future::Future;
use std::time::{Duration, Instant};
use tracing::info;

/// Logs the elapsed wall-clock time of a labelled operation when dropped,
/// so the timing line is emitted on early returns and unwinds as well.
pub struct Stopwatch<'a> {
    label: &'a str,
    started: Instant,
}

impl<'a> Stopwatch<'a> {
    pub fn start(label: &'a str) -> Self {
        Self {
            label,
            started: Instant::now(),
        }
    }

    pub fn elapsed(&self) -> Duration {
        self.started.elapsed()
    }
}

impl Drop for Stopwatch<'_> {
    fn drop(&mut self) {
        info!("{} took {} ms", self.label, self.elapsed().as_millis());
    }
}

/// Runs an async operation and logs how long it took
pub async fn profile<F, Fut, T>(label: &str, op: F) -> T
where
    F: FnOnce() -> Fut,
    Fut: Future<Output = T>,
{
    let _watch = Stopwatch::start(label);
    op().await
}

/// Synchronous counterpart of [`profile`]
pub fn profile_blocking<F, T>(label: &str, op: F) -> T
where
    F: FnOnce() -> T,
{
    let _watch = Stopwatch::start(label);
    op()
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io;
    use std::sync::{Arc, Mutex};

    /// Shared in-memory sink for formatted log lines
    #[derive(Clone, Default)]
    struct CapturedLogs(Arc<Mutex<Vec<u8>>>);

    impl CapturedLogs {
        fn subscriber(&self) -> impl tracing::Subscriber + Send + Sync + 'static {
            let sink = self.clone();
            tracing_subscriber::fmt()
                .with_writer(move || sink.clone())
                .with_ansi(false)
                .finish()
        }

        fn contents(&self) -> String {
            let buf = self.0.lock().unwrap_or_else(|e| e.into_inner());
            String::from_utf8_lossy(&buf).to_string()
        }
    }

    impl io::Write for CapturedLogs {
        fn write(&mut self, data: &[u8]) -> io::Result<usize> {
            self.0
                .lock()
                .unwrap_or_else(|e| e.into_inner())
                .extend_from_slice(data);
            Ok(data.len())
        }

        fn flush(&mut self) -> io::Result<()> {
            Ok(())
        }
    }

    #[test]
    fn test_profile_blocking_returns_result() {
        let value = profile_blocking("adding", || 2 + 2);
        assert_eq!(value, 4);

        let failed: Result<(), String> = profile_blocking("failing", || Err("boom".to_string()));
        assert_eq!(failed, Err("boom".to_string()));
    }

    #[tokio::test]
    async fn test_profile_async_returns_result() {
        let value = profile("fetching", || async { "done" }).await;
        assert_eq!(value, "done");
    }

    #[test]
    fn test_timing_logged_on_error_result() {
        let logs = CapturedLogs::default();
        let failed: Result<(), String> = tracing::subscriber::with_default(logs.subscriber(), || {
            profile_blocking("failing", || Err("boom".to_string()))
        });

        assert!(failed.is_err());
        let output = logs.contents();
        assert!(output.contains("failing took "), "{}", output);
        assert!(output.contains(" ms"));
    }

    #[tokio::test]
    async fn test_timing_logged_on_async_error() {
        let logs = CapturedLogs::default();
        let _guard = tracing::subscriber::set_default(logs.subscriber());

        let failed: Result<u32, String> =
            profile("fetching ring", || async { Err("connection refused".to_string()) }).await;

        assert!(failed.is_err());
        assert!(logs.contents().contains("fetching ring took "));
    }

    #[test]
    fn test_timing_logged_on_panic() {
        let logs = CapturedLogs::default();
        let result = tracing::subscriber::with_default(logs.subscriber(), || {
            std::panic::catch_unwind(|| {
                profile_blocking("panicking", || -> u32 { panic!("operation failed") })
            })
        });

        assert!(result.is_err());
        assert!(logs.contents().contains("panicking took "));
    }
}

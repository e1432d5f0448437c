use tracing::error;

/// Sink for user-facing failure messages.
///
/// The store never surfaces raw errors to callers; it hands a short static
/// message here and logs the cause.
pub trait ErrorReporter: Send + Sync {
    fn report(&self, message: &str);
}

impl<F> ErrorReporter for F
where
    F: Fn(&str) + Send + Sync,
{
    fn report(&self, message: &str) {
        self(message)
    }
}

/// Reporter that writes through `tracing`.
#[derive(Debug, Default, Clone, Copy)]
pub struct LogReporter;

impl ErrorReporter for LogReporter {
    fn report(&self, message: &str) {
        error!("{message}");
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::{Arc, Mutex};

    #[test]
    fn test_closure_reporter_receives_message() {
        let seen = Arc::new(Mutex::new(Vec::new()));
        let sink = Arc::clone(&seen);
        let reporter = move |m: &str| sink.lock().unwrap().push(m.to_string());
        reporter.report("Failed to add task");
        assert_eq!(*seen.lock().unwrap(), vec!["Failed to add task".to_string()]);
    }

    #[test]
    fn test_log_reporter_is_object_safe() {
        let reporter: Box<dyn ErrorReporter> = Box::new(LogReporter);
        reporter.report("Failed to fetch tasks");
    }
}

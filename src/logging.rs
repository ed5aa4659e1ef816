//! Progress sink for text snippets emitted by a running chain.
//!
//! Snippets are human-readable and never parsed by the engine.

use tracing::info;

/// Receiver of progress snippets.
pub trait LoggingCallback: Send {
    /// Handle one snippet.
    fn log(&mut self, message: &str);
}

impl<F> LoggingCallback for F
where
    F: FnMut(&str) + Send,
{
    fn log(&mut self, message: &str) {
        self(message)
    }
}

/// Discards every snippet.
#[derive(Debug, Clone, Copy, Default)]
pub struct NoopLogger;

impl LoggingCallback for NoopLogger {
    fn log(&mut self, _message: &str) {}
}

/// Forwards snippets to `tracing` at info level, tagged with the block.
#[derive(Debug, Clone, Copy)]
pub struct TracingLogger {
    /// Block number attached to every event.
    pub block: usize,
}

impl LoggingCallback for TracingLogger {
    fn log(&mut self, message: &str) {
        info!(block = self.block, "{message}");
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_closure_collects_snippets() {
        let mut lines = Vec::new();
        {
            let mut sink = |s: &str| lines.push(s.to_string());
            sink.log("first");
            sink.log("second");
        }
        assert_eq!(lines, vec!["first", "second"]);
    }
}

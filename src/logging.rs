// Four-level logger sink, forwarded through the `log` facade so the CLI
// can install flexi_logger as the process-wide subscriber for -v/--verbose.

// No structured schema is mandated; every state transition and external
// request emits at least one event.
pub trait LoggerSink: Send + Sync {
    fn debug(&self, message: &str);
    fn info(&self, message: &str);
    fn notice(&self, message: &str);
    fn critical(&self, message: &str);
}

/// Forwards to the `log` facade. `notice` has no direct `log::Level`
/// counterpart, so it's mapped to `Warn`; `critical` maps to `Error`.
pub struct DefaultLoggerSink;

impl LoggerSink for DefaultLoggerSink {
    fn debug(&self, message: &str) {
        log::debug!("{message}");
    }

    fn info(&self, message: &str) {
        log::info!("{message}");
    }

    fn notice(&self, message: &str) {
        log::warn!("{message}");
    }

    fn critical(&self, message: &str) {
        log::error!("{message}");
    }
}

/// Discards every event. Useful as a default when a caller doesn't care
/// about log output (e.g. library embedding, or tests).
pub struct NullLoggerSink;

impl LoggerSink for NullLoggerSink {
    fn debug(&self, _message: &str) {}
    fn info(&self, _message: &str) {}
    fn notice(&self, _message: &str) {}
    fn critical(&self, _message: &str) {}
}

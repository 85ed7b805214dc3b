use std::fmt;

/// Logger bound to one request context.
///
/// Every event carries the context's `request_id` and `action` fields so a
/// request can be followed through the logs, including its sub-requests.
///
/// All log messages go through `tracing`; installing a subscriber is up to
/// the host.
#[derive(Debug, Clone, Copy)]
pub struct ContextLog<'a> {
    request_id: &'a str,
    action: &'a str,
}

impl<'a> ContextLog<'a> {
    /// Creates a logger for a context.
    ///
    /// This is `pub(crate)` - only contexts create it.
    pub(crate) fn new(request_id: &'a str, action: &'a str) -> Self {
        Self { request_id, action }
    }

    /// Returns the request ID stamped on every event.
    pub fn request_id(&self) -> &str {
        self.request_id
    }

    /// Logs a debug-level message.
    ///
    /// Use with `format_args!`:
    /// ```no_run
    /// # use request_scope::ContextLog;
    /// # fn example(log: ContextLog<'_>) {
    /// log.debug(format_args!("found {} subrequests", 3));
    /// # }
    /// ```
    pub fn debug(&self, args: fmt::Arguments<'_>) {
        tracing::debug!(request_id = %self.request_id, action = %self.action, "{}", args);
    }

    /// Logs an info-level message.
    pub fn info(&self, args: fmt::Arguments<'_>) {
        tracing::info!(request_id = %self.request_id, action = %self.action, "{}", args);
    }

    /// Logs a warning-level message.
    pub fn warn(&self, args: fmt::Arguments<'_>) {
        tracing::warn!(request_id = %self.request_id, action = %self.action, "{}", args);
    }

    /// Logs an error-level message.
    pub fn error(&self, args: fmt::Arguments<'_>) {
        tracing::error!(request_id = %self.request_id, action = %self.action, "{}", args);
    }
}

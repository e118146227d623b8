//! Client construction options.

use rust_decimal::Decimal;
use std::time::Duration;

/// Options for a [`crate::client::PaymentClient`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PaymentClientConfig {
    /// Maximum amount the client may spend per wall-clock hour, in the
    /// paid asset's decimal units. `None` disables enforcement.
    pub hourly_limit: Option<Decimal>,
    /// Timeout applied to every HTTP request the client sends.
    pub http_timeout: Duration,
}

impl Default for PaymentClientConfig {
    fn default() -> Self {
        Self {
            hourly_limit: None,
            http_timeout: Duration::from_secs(30),
        }
    }
}

impl PaymentClientConfig {
    /// Sets the hourly spending limit.
    #[must_use]
    pub const fn with_hourly_limit(mut self, limit: Decimal) -> Self {
        self.hourly_limit = Some(limit);
        self
    }

    /// Sets the HTTP request timeout.
    #[must_use]
    pub const fn with_http_timeout(mut self, timeout: Duration) -> Self {
        self.http_timeout = timeout;
        self
    }
}

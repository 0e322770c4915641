// Connection tuning read from environment variables
// BTSERIAL_READ_BUFFER_SIZE: Receive buffer size in bytes (default: 1024)
// BTSERIAL_CLOSE_GRACE_MS: Pause before closing the socket on disconnect (default: 111)
// BTSERIAL_THREAD_NAME: Name prefix of the receive thread (default: btserial-rx)
use std::env;
use std::time::Duration;

pub const DEFAULT_READ_BUFFER_SIZE: usize = 1024;
pub const DEFAULT_CLOSE_GRACE: Duration = Duration::from_millis(111);
pub const DEFAULT_THREAD_NAME: &str = "btserial-rx";

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ConnectionConfig {
    /// Size of the buffer each blocking read fills; bounds the chunk size.
    pub read_buffer_size: usize,
    /// Lets in-flight frames drain before the socket is torn down on cancel.
    pub close_grace: Duration,
    pub thread_name: String,
}

impl Default for ConnectionConfig {
    fn default() -> Self {
        ConnectionConfig {
            read_buffer_size: DEFAULT_READ_BUFFER_SIZE,
            close_grace: DEFAULT_CLOSE_GRACE,
            thread_name: DEFAULT_THREAD_NAME.to_string(),
        }
    }
}

impl ConnectionConfig {
    pub fn from_env() -> Self {
        Self::from_lookup(|key| env::var(key).ok())
    }

    fn from_lookup<F>(lookup: F) -> Self
    where
        F: Fn(&str) -> Option<String>,
    {
        let defaults = ConnectionConfig::default();

        let read_buffer_size = lookup("BTSERIAL_READ_BUFFER_SIZE")
            .and_then(|s| s.parse().ok())
            .filter(|&size: &usize| size > 0)
            .unwrap_or(defaults.read_buffer_size);

        let close_grace = lookup("BTSERIAL_CLOSE_GRACE_MS")
            .and_then(|s| s.parse().ok())
            .map(Duration::from_millis)
            .unwrap_or(defaults.close_grace);

        let thread_name = lookup("BTSERIAL_THREAD_NAME")
            .filter(|s| !s.is_empty())
            .unwrap_or(defaults.thread_name);

        ConnectionConfig {
            read_buffer_size,
            close_grace,
            thread_name,
        }
    }

    pub fn with_read_buffer_size(mut self, size: usize) -> Self {
        self.read_buffer_size = size.max(1);
        self
    }

    pub fn with_close_grace(mut self, grace: Duration) -> Self {
        self.close_grace = grace;
        self
    }

    pub fn with_thread_name(mut self, name: impl Into<String>) -> Self {
        self.thread_name = name.into();
        self
    }
}

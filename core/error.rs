// Error types shared by transport providers

use std::io;

/// Result type alias for transport provider operations.
pub type TransportResult<T> = std::result::Result<T, TransportError>;

/// Failures a transport provider can report while producing a stream.
#[derive(Debug, thiserror::Error)]
pub enum TransportError {
    /// The address did not resolve to a reachable device.
    #[error("device not found: {0}")]
    DeviceNotFound(String),

    /// The address string is not in a form the provider understands.
    #[error("invalid address: {0}")]
    InvalidAddress(String),

    /// The platform has no way to address a channel directly.
    #[error("channel addressing not supported by this transport")]
    UnsupportedChannelAddressing,

    /// Socket creation or the connect handshake failed.
    #[error("connect failure")]
    ConnectFailure(#[from] io::Error),
}

impl TransportError {
    /// Create a ConnectFailure from a message.
    pub fn connect_failure(msg: impl Into<String>) -> Self {
        TransportError::ConnectFailure(io::Error::new(io::ErrorKind::Other, msg.into()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_display() {
        let err = TransportError::DeviceNotFound("AA:BB".to_string());
        assert_eq!(err.to_string(), "device not found: AA:BB");

        // The io error is the source, not part of the message
        let err = TransportError::connect_failure("refused");
        assert_eq!(err.to_string(), "connect failure");
        assert_eq!(std::error::Error::source(&err).unwrap().to_string(), "refused");
    }

    #[test]
    fn test_io_error_converts() {
        let err: TransportError = io::Error::new(io::ErrorKind::ConnectionRefused, "nope").into();
        assert!(matches!(err, TransportError::ConnectFailure(_)));
    }
}

// Error types for connection operations

use btserial_core::TransportError;
use std::io;

/// Result type alias for btserial.
pub type Result<T> = std::result::Result<T, Error>;

/// Errors raised synchronously by [`Connection`](crate::Connection).
///
/// I/O failures that happen after the worker is running are never returned
/// here; they end the connection through `on_disconnected(true)` instead.
#[derive(Debug, thiserror::Error)]
pub enum Error {
    /// A worker is already active; disconnect first.
    #[error("already connected")]
    AlreadyConnected,

    /// The provider could not resolve the address, or it was malformed.
    #[error("device not found: {0}")]
    DeviceNotFound(String),

    /// The provider could not produce a connected stream.
    #[error("transport unavailable")]
    TransportUnavailable(#[source] TransportError),

    /// No active worker.
    #[error("not connected")]
    NotConnected,

    /// The receive thread could not be started.
    #[error("failed to spawn receive thread")]
    WorkerSpawn(#[source] io::Error),
}

impl From<TransportError> for Error {
    fn from(e: TransportError) -> Self {
        match e {
            TransportError::DeviceNotFound(address) | TransportError::InvalidAddress(address) => {
                Error::DeviceNotFound(address)
            }
            other => Error::TransportUnavailable(other),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_transport_error_mapping() {
        let err: Error = TransportError::DeviceNotFound("AA".to_string()).into();
        assert!(matches!(err, Error::DeviceNotFound(ref a) if a == "AA"));

        let err: Error = TransportError::UnsupportedChannelAddressing.into();
        assert!(matches!(
            err,
            Error::TransportUnavailable(TransportError::UnsupportedChannelAddressing)
        ));

        let err: Error = TransportError::InvalidAddress("zz".to_string()).into();
        assert!(matches!(err, Error::DeviceNotFound(ref a) if a == "zz"));

        let err: Error = TransportError::connect_failure("refused").into();
        assert!(matches!(
            err,
            Error::TransportUnavailable(TransportError::ConnectFailure(_))
        ));
    }

    #[test]
    fn test_error_display() {
        assert_eq!(Error::AlreadyConnected.to_string(), "already connected");
        assert_eq!(Error::NotConnected.to_string(), "not connected");

        let err = Error::TransportUnavailable(TransportError::UnsupportedChannelAddressing);
        assert_eq!(err.to_string(), "transport unavailable");
        assert_eq!(
            std::error::Error::source(&err).unwrap().to_string(),
            "channel addressing not supported by this transport"
        );
    }
}

// Transport abstraction - allows pluggable connection backends
use btserial_core::{Channel, ServiceId, TransportError, TransportResult};
use std::io::{Read, Result, Write};
use std::net::{Shutdown, TcpStream};

/// A connected, ordered, reliable byte stream with independent halves.
///
/// Halves are independent handles onto the same connection, so the receive
/// thread can block in a read while another thread writes or shuts the
/// stream down. `shutdown` must make a pending read on the input half return.
pub trait DuplexStream: Send + Sync + 'static {
    fn input_half(&self) -> Result<Box<dyn Read + Send>>;
    fn output_half(&self) -> Result<Box<dyn Write + Send>>;
    fn shutdown(&self, how: Shutdown) -> Result<()>;
}

/// Platform glue that turns an address into a connected [`DuplexStream`].
///
/// Connecting happens in two steps, mirroring how platform sockets work:
/// a socket is created for a service or channel, then the handshake runs in
/// [`TransportProvider::connect`]. Discovery can be cancelled in between.
pub trait TransportProvider: Send + Sync {
    type Device;
    type Socket;
    type Stream: DuplexStream;

    fn resolve(&self, address: &str) -> TransportResult<Self::Device>;

    fn socket_for_service(
        &self,
        device: &Self::Device,
        service: &ServiceId,
    ) -> TransportResult<Self::Socket>;

    fn socket_for_channel(
        &self,
        _device: &Self::Device,
        _channel: Channel,
    ) -> TransportResult<Self::Socket> {
        Err(TransportError::UnsupportedChannelAddressing)
    }

    fn connect(&self, socket: Self::Socket) -> TransportResult<Self::Stream>;

    /// Best-effort; an ongoing inquiry can stall the handshake.
    fn cancel_discovery(&self) {}
}

impl DuplexStream for TcpStream {
    fn input_half(&self) -> Result<Box<dyn Read + Send>> {
        Ok(Box::new(self.try_clone()?))
    }

    fn output_half(&self) -> Result<Box<dyn Write + Send>> {
        Ok(Box::new(self.try_clone()?))
    }

    fn shutdown(&self, how: Shutdown) -> Result<()> {
        TcpStream::shutdown(self, how)
    }
}

#[cfg(unix)]
impl DuplexStream for std::os::unix::net::UnixStream {
    fn input_half(&self) -> Result<Box<dyn Read + Send>> {
        Ok(Box::new(self.try_clone()?))
    }

    fn output_half(&self) -> Result<Box<dyn Write + Send>> {
        Ok(Box::new(self.try_clone()?))
    }

    fn shutdown(&self, how: Shutdown) -> Result<()> {
        std::os::unix::net::UnixStream::shutdown(self, how)
    }
}

#[cfg(all(test, unix))]
mod tests {
    use super::*;
    use std::os::unix::net::UnixStream;
    use std::thread;

    #[test]
    fn test_halves_share_connection() {
        let (local, mut peer) = UnixStream::pair().unwrap();
        let mut output = local.output_half().unwrap();
        let mut input = local.input_half().unwrap();

        output.write_all(b"ping").unwrap();
        let mut buf = [0u8; 4];
        peer.read_exact(&mut buf).unwrap();
        assert_eq!(&buf, b"ping");

        peer.write_all(b"pong").unwrap();
        input.read_exact(&mut buf).unwrap();
        assert_eq!(&buf, b"pong");
    }

    #[test]
    fn test_shutdown_unblocks_pending_read() {
        let (local, _peer) = UnixStream::pair().unwrap();
        let mut input = local.input_half().unwrap();

        let reader = thread::spawn(move || {
            let mut buf = [0u8; 16];
            input.read(&mut buf)
        });

        thread::sleep(std::time::Duration::from_millis(50));
        DuplexStream::shutdown(&local, Shutdown::Both).unwrap();

        // EOF or error, either way the read returned
        match reader.join().unwrap() {
            Ok(n) => assert_eq!(n, 0),
            Err(_) => {}
        }
    }
}

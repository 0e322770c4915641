// TCP provider: serial-over-IP bridges and loopback testing
use crate::traits::TransportProvider;
use btserial_core::{Channel, ServiceId, TransportError, TransportResult};
use std::io;
use std::net::{SocketAddr, TcpStream, ToSocketAddrs};
use std::time::Duration;
use tracing::debug;

/// Connects to `host:port` addresses.
///
/// TCP has no service discovery, so a service connect goes to the resolved
/// port as given. A channel connect keeps the host and uses the channel
/// number as the port.
#[derive(Debug, Clone, Default)]
pub struct TcpProvider {
    connect_timeout: Option<Duration>,
}

/// Resolved candidates for one address.
#[derive(Debug, Clone)]
pub struct TcpTarget {
    address: String,
    addrs: Vec<SocketAddr>,
}

impl TcpTarget {
    pub fn addrs(&self) -> &[SocketAddr] {
        &self.addrs
    }
}

impl TcpProvider {
    pub fn new() -> Self {
        TcpProvider::default()
    }

    pub fn with_connect_timeout(mut self, timeout: Duration) -> Self {
        self.connect_timeout = Some(timeout);
        self
    }

    fn connect_one(&self, addr: &SocketAddr) -> io::Result<TcpStream> {
        match self.connect_timeout {
            Some(timeout) => TcpStream::connect_timeout(addr, timeout),
            None => TcpStream::connect(addr),
        }
    }
}

impl TransportProvider for TcpProvider {
    type Device = TcpTarget;
    type Socket = TcpTarget;
    type Stream = TcpStream;

    fn resolve(&self, address: &str) -> TransportResult<TcpTarget> {
        let addrs: Vec<SocketAddr> = address
            .to_socket_addrs()
            .map_err(|_| TransportError::DeviceNotFound(address.to_string()))?
            .collect();

        if addrs.is_empty() {
            return Err(TransportError::DeviceNotFound(address.to_string()));
        }

        Ok(TcpTarget {
            address: address.to_string(),
            addrs,
        })
    }

    fn socket_for_service(
        &self,
        device: &TcpTarget,
        service: &ServiceId,
    ) -> TransportResult<TcpTarget> {
        debug!(address = %device.address, %service, "tcp has no service lookup, using address port");
        Ok(device.clone())
    }

    fn socket_for_channel(&self, device: &TcpTarget, channel: Channel) -> TransportResult<TcpTarget> {
        let addrs = device
            .addrs
            .iter()
            .map(|addr| {
                let mut addr = *addr;
                addr.set_port(u16::from(channel));
                addr
            })
            .collect();

        Ok(TcpTarget {
            address: device.address.clone(),
            addrs,
        })
    }

    fn connect(&self, socket: TcpTarget) -> TransportResult<TcpStream> {
        let mut last_err = None;
        for addr in &socket.addrs {
            match self.connect_one(addr) {
                Ok(stream) => {
                    let _ = stream.set_nodelay(true);
                    return Ok(stream);
                }
                Err(e) => {
                    debug!(%addr, error = %e, "tcp connect attempt failed");
                    last_err = Some(e);
                }
            }
        }

        Err(match last_err {
            Some(e) => TransportError::ConnectFailure(e),
            None => TransportError::DeviceNotFound(socket.address),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::net::TcpListener;

    #[test]
    fn test_resolve_rejects_unparseable() {
        let provider = TcpProvider::new();
        assert!(matches!(
            provider.resolve("not an address"),
            Err(TransportError::DeviceNotFound(_))
        ));
    }

    #[test]
    fn test_channel_replaces_port() {
        let provider = TcpProvider::new();
        let target = provider.resolve("127.0.0.1:1").unwrap();
        let socket = provider.socket_for_channel(&target, 7).unwrap();
        assert_eq!(socket.addrs()[0].port(), 7);
        assert_eq!(target.addrs()[0].port(), 1);
    }

    #[test]
    fn test_connect_to_listener() {
        let listener = TcpListener::bind("127.0.0.1:0").unwrap();
        let addr = listener.local_addr().unwrap().to_string();

        let provider = TcpProvider::new().with_connect_timeout(Duration::from_secs(2));
        let target = provider.resolve(&addr).unwrap();
        let socket = provider
            .socket_for_service(&target, &ServiceId::SERIAL_PORT)
            .unwrap();
        let stream = provider.connect(socket).unwrap();
        let (_accepted, peer) = listener.accept().unwrap();
        assert_eq!(stream.local_addr().unwrap(), peer);
    }

    #[test]
    fn test_connect_refused() {
        // Bind then drop to get a port nobody listens on
        let port = TcpListener::bind("127.0.0.1:0")
            .unwrap()
            .local_addr()
            .unwrap()
            .port();

        let provider = TcpProvider::new();
        let target = provider.resolve(&format!("127.0.0.1:{}", port)).unwrap();
        let socket = provider
            .socket_for_service(&target, &ServiceId::SERIAL_PORT)
            .unwrap();
        assert!(matches!(
            provider.connect(socket),
            Err(TransportError::ConnectFailure(_))
        ));
    }
}

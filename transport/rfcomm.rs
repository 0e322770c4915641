// RFCOMM provider for Linux: raw AF_BLUETOOTH stream sockets via libc
use crate::traits::{DuplexStream, TransportProvider};
use btserial_core::{Channel, DeviceAddress, ServiceId, TransportError, TransportResult};
use std::collections::HashMap;
use std::fs::File;
use std::io::{self, Read, Result, Write};
use std::mem;
use std::net::Shutdown;
use std::os::fd::{AsRawFd, FromRawFd, OwnedFd};
use tracing::debug;

const BTPROTO_RFCOMM: libc::c_int = 3;

// Valid RFCOMM server channels
const MIN_CHANNEL: Channel = 1;
const MAX_CHANNEL: Channel = 30;

// struct sockaddr_rc from <bluetooth/rfcomm.h>
#[repr(C)]
struct SockaddrRc {
    rc_family: libc::sa_family_t,
    rc_bdaddr: [u8; 6],
    rc_channel: u8,
}

/// Connects to RFCOMM channels on Linux through BlueZ kernel sockets.
///
/// SDP lookups are not performed. A service connect only works for services
/// registered up front with [`RfcommProvider::with_service_channel`].
#[derive(Debug, Clone, Default)]
pub struct RfcommProvider {
    service_channels: HashMap<ServiceId, Channel>,
}

/// An RFCOMM socket that has been created but not yet connected.
#[derive(Debug)]
pub struct RfcommSocket {
    fd: OwnedFd,
    address: DeviceAddress,
    channel: Channel,
}

/// A connected RFCOMM stream.
#[derive(Debug)]
pub struct RfcommStream {
    fd: OwnedFd,
}

impl RfcommProvider {
    pub fn new() -> Self {
        RfcommProvider::default()
    }

    /// Map a service to a known channel, skipping SDP for it.
    pub fn with_service_channel(mut self, service: ServiceId, channel: Channel) -> Self {
        self.service_channels.insert(service, channel);
        self
    }

    /// Channel registered for `service`, if any.
    pub fn service_channel(&self, service: &ServiceId) -> Option<Channel> {
        self.service_channels.get(service).copied()
    }

    fn open_socket(address: DeviceAddress, channel: Channel) -> TransportResult<RfcommSocket> {
        if !(MIN_CHANNEL..=MAX_CHANNEL).contains(&channel) {
            return Err(TransportError::connect_failure(format!(
                "rfcomm channel {} out of range {}..={}",
                channel, MIN_CHANNEL, MAX_CHANNEL
            )));
        }

        let fd = unsafe {
            libc::socket(
                libc::AF_BLUETOOTH,
                libc::SOCK_STREAM | libc::SOCK_CLOEXEC,
                BTPROTO_RFCOMM,
            )
        };
        if fd < 0 {
            return Err(TransportError::ConnectFailure(io::Error::last_os_error()));
        }

        Ok(RfcommSocket {
            fd: unsafe { OwnedFd::from_raw_fd(fd) },
            address,
            channel,
        })
    }
}

impl TransportProvider for RfcommProvider {
    type Device = DeviceAddress;
    type Socket = RfcommSocket;
    type Stream = RfcommStream;

    fn resolve(&self, address: &str) -> TransportResult<DeviceAddress> {
        DeviceAddress::parse(address)
            .map_err(|_| TransportError::DeviceNotFound(address.to_string()))
    }

    fn socket_for_service(
        &self,
        device: &DeviceAddress,
        service: &ServiceId,
    ) -> TransportResult<RfcommSocket> {
        match self.service_channel(service) {
            Some(channel) => Self::open_socket(*device, channel),
            None => Err(TransportError::connect_failure(format!(
                "no channel known for service {} (sdp lookup unavailable)",
                service
            ))),
        }
    }

    fn socket_for_channel(
        &self,
        device: &DeviceAddress,
        channel: Channel,
    ) -> TransportResult<RfcommSocket> {
        Self::open_socket(*device, channel)
    }

    fn connect(&self, socket: RfcommSocket) -> TransportResult<RfcommStream> {
        let addr = SockaddrRc {
            rc_family: libc::AF_BLUETOOTH as libc::sa_family_t,
            rc_bdaddr: socket.address.to_le_bytes(),
            rc_channel: socket.channel,
        };

        debug!(address = %socket.address, channel = socket.channel, "rfcomm connect");
        loop {
            let ret = unsafe {
                libc::connect(
                    socket.fd.as_raw_fd(),
                    &addr as *const SockaddrRc as *const libc::sockaddr,
                    mem::size_of::<SockaddrRc>() as libc::socklen_t,
                )
            };
            if ret == 0 {
                break;
            }
            let err = io::Error::last_os_error();
            if err.kind() != io::ErrorKind::Interrupted {
                return Err(TransportError::ConnectFailure(err));
            }
        }

        Ok(RfcommStream { fd: socket.fd })
    }
}

impl DuplexStream for RfcommStream {
    fn input_half(&self) -> Result<Box<dyn Read + Send>> {
        Ok(Box::new(File::from(self.fd.try_clone()?)))
    }

    fn output_half(&self) -> Result<Box<dyn Write + Send>> {
        Ok(Box::new(File::from(self.fd.try_clone()?)))
    }

    fn shutdown(&self, how: Shutdown) -> Result<()> {
        let how = match how {
            Shutdown::Read => nix::sys::socket::Shutdown::Read,
            Shutdown::Write => nix::sys::socket::Shutdown::Write,
            Shutdown::Both => nix::sys::socket::Shutdown::Both,
        };
        nix::sys::socket::shutdown(self.fd.as_raw_fd(), how).map_err(io::Error::from)
    }
}

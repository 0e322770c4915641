// lib: serial-style streaming connection to a remote device
// One blocking receive worker per connection, owner notified through an observer

// Re-export core types and transport abstractions
pub use btserial_core::{
    Channel, ConnectionConfig, DeviceAddress, ServiceId, TransportError, TransportResult,
    DEFAULT_CLOSE_GRACE, DEFAULT_READ_BUFFER_SIZE, DEFAULT_THREAD_NAME,
};
pub use btserial_transport::*;

mod connection;
mod error;
mod observer;
mod worker;

pub use connection::Connection;
pub use error::{Error, Result};
pub use observer::{event_channel, ChannelObserver, ConnectionEvent, ConnectionObserver};

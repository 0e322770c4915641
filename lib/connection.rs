// Connection: orchestrates provider, worker lifecycle and observer notification
use crate::error::{Error, Result};
use crate::observer::ConnectionObserver;
use crate::worker::Worker;
use btserial_core::{Channel, ConnectionConfig, ServiceId, TransportResult};
use btserial_transport::{DuplexStream, TransportProvider};
use parking_lot::Mutex;
use std::net::Shutdown;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Weak};
use tracing::{debug, info};

type WorkerSlot = Arc<Mutex<Option<Worker>>>;

/// A single serial-style connection to a remote device.
///
/// At most one worker is active at a time. Inbound chunks and the final
/// disconnect notification reach the observer on the worker's thread.
///
/// ```no_run
/// use btserial::{event_channel, Connection, ConnectionEvent};
/// use btserial_transport::TcpProvider;
/// use std::sync::Arc;
///
/// let (observer, events) = event_channel();
/// let conn = Connection::new(Arc::new(TcpProvider::new()), Arc::new(observer));
/// conn.connect("127.0.0.1:5000")?;
/// conn.write(b"AT\r\n")?;
/// if let Ok(ConnectionEvent::Data(reply)) = events.recv() {
///     println!("{:?}", reply);
/// }
/// conn.disconnect();
/// # Ok::<(), btserial::Error>(())
/// ```
pub struct Connection<P: TransportProvider> {
    provider: Arc<P>,
    observer: Arc<dyn ConnectionObserver>,
    config: ConnectionConfig,
    worker: WorkerSlot,
    next_worker_id: AtomicU64,
}

impl<P: TransportProvider> Connection<P> {
    pub fn new(provider: Arc<P>, observer: Arc<dyn ConnectionObserver>) -> Self {
        Self::with_config(provider, observer, ConnectionConfig::default())
    }

    pub fn with_config(
        provider: Arc<P>,
        observer: Arc<dyn ConnectionObserver>,
        config: ConnectionConfig,
    ) -> Self {
        Connection {
            provider,
            observer,
            config,
            worker: Arc::new(Mutex::new(None)),
            next_worker_id: AtomicU64::new(1),
        }
    }

    /// True while a worker is running and nobody asked it to close.
    pub fn is_connected(&self) -> bool {
        self.worker
            .lock()
            .as_ref()
            .is_some_and(|worker| !worker.is_closing())
    }

    /// Id of the active worker. Each successful connect gets a new one.
    pub fn worker_id(&self) -> Option<u64> {
        self.worker
            .lock()
            .as_ref()
            .filter(|worker| !worker.is_closing())
            .map(Worker::id)
    }

    /// Connect to the Serial Port Profile service of `address`.
    pub fn connect(&self, address: &str) -> Result<()> {
        self.connect_to_service(address, &ServiceId::SERIAL_PORT)
    }

    pub fn connect_to_service(&self, address: &str, service: &ServiceId) -> Result<()> {
        self.connect_with(address, |provider, device| {
            provider.socket_for_service(device, service)
        })
    }

    /// Connect straight to a channel, bypassing service discovery.
    pub fn connect_to_channel(&self, address: &str, channel: Channel) -> Result<()> {
        self.connect_with(address, |provider, device| {
            provider.socket_for_channel(device, channel)
        })
    }

    fn connect_with<F>(&self, address: &str, open_socket: F) -> Result<()>
    where
        F: FnOnce(&P, &P::Device) -> TransportResult<P::Socket>,
    {
        if self.is_connected() {
            return Err(Error::AlreadyConnected);
        }

        let device = self.provider.resolve(address)?;
        let socket = open_socket(&self.provider, &device)?;

        // Ongoing discovery slows the handshake down
        self.provider.cancel_discovery();

        let stream = self.provider.connect(socket)?;
        self.start_worker(Box::new(stream))?;

        info!(address, "connected");
        Ok(())
    }

    fn start_worker(&self, stream: Box<dyn DuplexStream>) -> Result<()> {
        let mut slot = self.worker.lock();

        // Another connect may have won while the handshake ran
        if slot.as_ref().is_some_and(|worker| !worker.is_closing()) {
            let _ = stream.shutdown(Shutdown::Both);
            return Err(Error::AlreadyConnected);
        }

        let id = self.next_worker_id.fetch_add(1, Ordering::Relaxed);
        let weak_slot = Arc::downgrade(&self.worker);
        let worker = Worker::spawn(
            id,
            stream,
            &self.config,
            Arc::clone(&self.observer),
            Box::new(move |id| release_worker(&weak_slot, id)),
        )
        .map_err(Error::WorkerSpawn)?;

        *slot = Some(worker);
        Ok(())
    }

    /// Request the worker to stop.
    ///
    /// `is_connected` turns false at once. Pending output is flushed, then the
    /// call blocks for `close_grace` before the stream is shut down. It does not
    /// wait for the worker thread, so `on_disconnected` may still be pending.
    pub fn disconnect(&self) {
        let worker = self.worker.lock().take();
        if let Some(worker) = worker {
            if !worker.is_closing() {
                info!(worker = worker.id(), "disconnecting");
            }
            worker.cancel();
        }
    }

    /// Send `data` to the device. Transport failures are logged, not returned.
    pub fn write(&self, data: &[u8]) -> Result<()> {
        let worker = self
            .worker
            .lock()
            .as_ref()
            .filter(|worker| !worker.is_closing())
            .cloned()
            .ok_or(Error::NotConnected)?;

        worker.write(data);
        Ok(())
    }
}

// Runs on the worker thread once it has stopped
fn release_worker(slot: &Weak<Mutex<Option<Worker>>>, id: u64) {
    let Some(slot) = slot.upgrade() else {
        return;
    };
    let mut slot = slot.lock();
    if slot.as_ref().is_some_and(|worker| worker.id() == id) {
        *slot = None;
        debug!(worker = id, "worker released");
    }
}

impl<P: TransportProvider> Drop for Connection<P> {
    fn drop(&mut self) {
        self.disconnect();
    }
}

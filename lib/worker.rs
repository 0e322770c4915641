// Worker: owns the duplex stream and runs the blocking receive loop on its own thread
use crate::observer::ConnectionObserver;
use btserial_core::ConnectionConfig;
use btserial_transport::DuplexStream;
use bytes::Bytes;
use parking_lot::Mutex;
use std::io::{self, ErrorKind, Read, Write};
use std::net::Shutdown;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::thread;
use std::time::Duration;
use tracing::{debug, warn};

pub(crate) type ExitHook = Box<dyn FnOnce(u64) + Send>;

type Input = Box<dyn Read + Send>;
type Output = Box<dyn Write + Send>;

// State shared between the owning Connection and the receive thread
struct WorkerShared {
    id: u64,
    // Only flips false -> true
    closing_requested: AtomicBool,
    stream: Mutex<Option<Box<dyn DuplexStream>>>,
    output: Mutex<Option<Output>>,
    close_grace: Duration,
}

/// Handle to a running receive worker.
#[derive(Clone)]
pub(crate) struct Worker {
    shared: Arc<WorkerShared>,
}

impl Worker {
    /// Take ownership of a connected stream and start the receive thread.
    ///
    /// A half that cannot be obtained is logged and left unusable. `on_exit`
    /// runs on the receive thread after cleanup, right before the observer
    /// hears `on_disconnected`.
    pub(crate) fn spawn(
        id: u64,
        stream: Box<dyn DuplexStream>,
        config: &ConnectionConfig,
        observer: Arc<dyn ConnectionObserver>,
        on_exit: ExitHook,
    ) -> io::Result<Worker> {
        let input = match stream.input_half() {
            Ok(input) => Some(input),
            Err(e) => {
                warn!(worker = id, error = %e, "input half unavailable");
                None
            }
        };
        let output = match stream.output_half() {
            Ok(output) => Some(output),
            Err(e) => {
                warn!(worker = id, error = %e, "output half unavailable");
                None
            }
        };

        let shared = Arc::new(WorkerShared {
            id,
            closing_requested: AtomicBool::new(false),
            stream: Mutex::new(Some(stream)),
            output: Mutex::new(output),
            close_grace: config.close_grace,
        });

        let thread_shared = Arc::clone(&shared);
        let buffer_size = config.read_buffer_size.max(1);
        let spawned = thread::Builder::new()
            .name(format!("{}-{}", config.thread_name, id))
            .spawn(move || {
                Self::worker_thread(thread_shared, input, buffer_size, observer, on_exit);
            });

        if let Err(e) = spawned {
            shared.closing_requested.store(true, Ordering::SeqCst);
            if let Some(stream) = shared.stream.lock().take() {
                let _ = stream.shutdown(Shutdown::Both);
            }
            return Err(e);
        }

        debug!(worker = id, buffer_size, "worker started");
        Ok(Worker { shared })
    }

    pub(crate) fn id(&self) -> u64 {
        self.shared.id
    }

    pub(crate) fn is_closing(&self) -> bool {
        self.shared.closing_requested.load(Ordering::SeqCst)
    }

    /// Best-effort send. Failures are logged, never returned.
    pub(crate) fn write(&self, data: &[u8]) {
        let mut output = self.shared.output.lock();
        match output.as_mut() {
            Some(out) => {
                if let Err(e) = out.write_all(data).and_then(|_| out.flush()) {
                    warn!(worker = self.shared.id, error = %e, len = data.len(), "write failed");
                }
            }
            None => {
                warn!(worker = self.shared.id, len = data.len(), "output half unavailable, dropping write");
            }
        }
    }

    /// Ask the worker to stop. Idempotent.
    ///
    /// Shutting the stream down is what makes the pending blocking read
    /// return; the flag alone is only seen between reads.
    pub(crate) fn cancel(&self) {
        let shared = &self.shared;
        if shared.closing_requested.swap(true, Ordering::SeqCst) {
            return;
        }
        debug!(worker = shared.id, "cancel requested");

        // A writer blocked on a full send buffer holds the lock; skip the flush then
        if let Some(mut output) = shared.output.try_lock() {
            if let Some(out) = output.as_mut() {
                let _ = out.flush();
            }
        }

        if !shared.close_grace.is_zero() {
            thread::sleep(shared.close_grace);
        }

        if let Some(stream) = shared.stream.lock().as_ref() {
            let _ = stream.shutdown(Shutdown::Both);
        }
    }

    // Background receive thread - one blocking read per iteration, then cleanup exactly once
    fn worker_thread(
        shared: Arc<WorkerShared>,
        input: Option<Input>,
        buffer_size: usize,
        observer: Arc<dyn ConnectionObserver>,
        on_exit: ExitHook,
    ) {
        let input = match input {
            Some(mut input) => {
                Self::receive_loop(&shared, &mut input, buffer_size, observer.as_ref());
                Some(input)
            }
            None => None,
        };

        // Close output half
        drop(shared.output.lock().take());
        if let Some(stream) = shared.stream.lock().as_ref() {
            let _ = stream.shutdown(Shutdown::Write);
        }

        // Close input half
        drop(input);
        if let Some(stream) = shared.stream.lock().take() {
            let _ = stream.shutdown(Shutdown::Read);
        }

        // Also guards a late cancel() into a no-op
        let by_remote = !shared.closing_requested.swap(true, Ordering::SeqCst);
        debug!(worker = shared.id, by_remote, "worker stopped");

        on_exit(shared.id);
        observer.on_disconnected(by_remote);
    }

    fn receive_loop(
        shared: &WorkerShared,
        input: &mut Input,
        buffer_size: usize,
        observer: &dyn ConnectionObserver,
    ) {
        let mut buffer = vec![0u8; buffer_size];

        while !shared.closing_requested.load(Ordering::SeqCst) {
            match input.read(&mut buffer) {
                Ok(0) => {
                    debug!(worker = shared.id, "end of stream");
                    break;
                }
                Ok(n) => observer.on_read(Bytes::copy_from_slice(&buffer[..n])),
                Err(e) if e.kind() == ErrorKind::Interrupted => continue,
                Err(e) => {
                    debug!(worker = shared.id, error = %e, "read failed");
                    break;
                }
            }
        }
    }
}

#[cfg(all(test, unix))]
mod tests {
    use super::*;
    use crate::observer::{event_channel, ConnectionEvent};
    use std::os::unix::net::UnixStream;
    use std::sync::atomic::AtomicU64;

    const WAIT: Duration = Duration::from_secs(5);

    fn config() -> ConnectionConfig {
        ConnectionConfig::default().with_close_grace(Duration::ZERO)
    }

    #[test]
    fn test_cancel_is_idempotent() {
        let (local, _peer) = UnixStream::pair().unwrap();
        let (observer, rx) = event_channel();
        let exited = Arc::new(AtomicU64::new(0));
        let exited_hook = Arc::clone(&exited);

        let worker = Worker::spawn(
            9,
            Box::new(local),
            &config(),
            Arc::new(observer),
            Box::new(move |id| exited_hook.store(id, Ordering::SeqCst)),
        )
        .unwrap();

        assert!(!worker.is_closing());
        worker.cancel();
        worker.cancel();
        assert!(worker.is_closing());

        assert_eq!(
            rx.recv_timeout(WAIT).unwrap(),
            ConnectionEvent::Disconnected { by_remote: false }
        );
        assert!(rx.recv_timeout(Duration::from_millis(100)).is_err());
        assert_eq!(exited.load(Ordering::SeqCst), 9);

        // After self-termination cancel stays a no-op
        worker.cancel();
    }

    #[test]
    fn test_chunk_is_a_copy() {
        let (local, mut peer) = UnixStream::pair().unwrap();
        let (observer, rx) = event_channel();
        let _worker = Worker::spawn(
            1,
            Box::new(local),
            &config().with_read_buffer_size(4),
            Arc::new(observer),
            Box::new(|_| {}),
        )
        .unwrap();

        peer.write_all(b"abcd").unwrap();
        let first = rx.recv_timeout(WAIT).unwrap();
        peer.write_all(b"wxyz").unwrap();
        let mut rest = Vec::new();
        while rest.len() < 4 {
            match rx.recv_timeout(WAIT).unwrap() {
                ConnectionEvent::Data(chunk) => rest.extend_from_slice(&chunk),
                other => panic!("unexpected event {:?}", other),
            }
        }

        // The first chunk did not see the buffer being reused
        assert_eq!(first, ConnectionEvent::Data(Bytes::from_static(b"abcd")));
        assert_eq!(rest, b"wxyz");
    }

    #[test]
    fn test_thread_is_named() {
        let (local, _peer) = UnixStream::pair().unwrap();
        let (name_tx, name_rx) = crossbeam::channel::bounded(1);
        let worker = Worker::spawn(
            3,
            Box::new(local),
            &config().with_thread_name("rx-test"),
            Arc::new(crate::observer::event_channel().0),
            Box::new(move |_| {
                let _ = name_tx.send(thread::current().name().map(str::to_string));
            }),
        )
        .unwrap();

        worker.cancel();
        assert_eq!(name_rx.recv_timeout(WAIT).unwrap().as_deref(), Some("rx-test-3"));
    }
}

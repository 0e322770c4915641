// btserial-term: interactive terminal over a btserial connection
use std::io::{self, BufRead};
use std::sync::Arc;
use std::thread;
use std::time::Duration;

use anyhow::{bail, Context, Result};
use btserial::{
    event_channel, Channel, Connection, ConnectionConfig, ConnectionEvent, ServiceId, TcpProvider,
    TransportProvider,
};
use btserial_client::{format_chunk, line_to_frame, parse_service_channel, ChunkFormat};
use clap::Parser;
use crossbeam::channel::{select, unbounded, Receiver};
use tracing::{debug, info};
use tracing_subscriber::EnvFilter;

// How long to wait for the worker to report after a local hang-up
const DISCONNECT_WAIT: Duration = Duration::from_secs(2);

#[derive(Parser, Debug)]
#[command(name = "btserial-term", about = "Serial terminal over RFCOMM or TCP")]
struct Args {
    /// Connect over TCP to host:port
    #[arg(long, conflicts_with = "rfcomm", required_unless_present = "rfcomm")]
    tcp: Option<String>,

    /// Connect over RFCOMM to a device address (AA:BB:CC:DD:EE:FF)
    #[arg(long)]
    rfcomm: Option<String>,

    /// Channel to connect to directly, skipping service lookup
    #[arg(long, conflicts_with = "service")]
    channel: Option<Channel>,

    /// Service UUID (default: Serial Port Profile)
    #[arg(long)]
    service: Option<ServiceId>,

    /// RFCOMM channel of a service, as <uuid>=<channel> (repeatable)
    #[arg(long = "service-channel", value_parser = parse_service_channel, requires = "rfcomm")]
    service_channels: Vec<(ServiceId, Channel)>,

    /// Print inbound data as hex
    #[arg(long)]
    hex: bool,

    /// Send lines without appending CR LF
    #[arg(long)]
    raw: bool,
}

fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::from_default_env())
        .with_writer(io::stderr)
        .init();

    let args = Args::parse();

    if let Some(address) = args.tcp.clone() {
        return run(TcpProvider::new(), &address, &args);
    }

    match args.rfcomm.clone() {
        Some(address) => run_rfcomm(&address, &args),
        None => bail!("either --tcp or --rfcomm is required"),
    }
}

#[cfg(target_os = "linux")]
fn run_rfcomm(address: &str, args: &Args) -> Result<()> {
    let provider = args
        .service_channels
        .iter()
        .fold(btserial::RfcommProvider::new(), |provider, &(service, channel)| {
            provider.with_service_channel(service, channel)
        });

    // Without SDP a service connect needs a registered channel
    if args.channel.is_none() {
        let service = args.service.unwrap_or_default();
        if provider.service_channel(&service).is_none() {
            bail!(
                "no channel for service {}; pass --channel or --service-channel {}=<n>",
                service,
                service
            );
        }
    }

    run(provider, address, args)
}

#[cfg(not(target_os = "linux"))]
fn run_rfcomm(_address: &str, _args: &Args) -> Result<()> {
    bail!("rfcomm is only supported on linux")
}

fn run<P: TransportProvider + 'static>(provider: P, address: &str, args: &Args) -> Result<()> {
    let (observer, events) = event_channel();
    let conn = Connection::with_config(
        Arc::new(provider),
        Arc::new(observer),
        ConnectionConfig::from_env(),
    );

    match (args.channel, args.service) {
        (Some(channel), _) => conn.connect_to_channel(address, channel),
        (None, Some(service)) => conn.connect_to_service(address, &service),
        (None, None) => conn.connect(address),
    }
    .with_context(|| format!("failed to connect to {}", address))?;

    eprintln!("Connected to {}. Type to send, Ctrl-D to quit.", address);

    let lines = spawn_stdin_reader();
    let format = if args.hex {
        ChunkFormat::Hex
    } else {
        ChunkFormat::Text
    };

    loop {
        select! {
            recv(events) -> event => match event {
                Ok(ConnectionEvent::Data(data)) => {
                    println!("{}", format_chunk(&data, format, chrono::Local::now()));
                }
                Ok(ConnectionEvent::Disconnected { by_remote }) => {
                    eprintln!("Disconnected ({})", if by_remote { "remote" } else { "local" });
                    return Ok(());
                }
                Err(_) => return Ok(()),
            },
            recv(lines) -> line => match line {
                Ok(line) => conn.write(&line_to_frame(&line, args.raw))?,
                Err(_) => {
                    info!("stdin closed, disconnecting");
                    conn.disconnect();
                    wait_for_disconnect(&events);
                    return Ok(());
                }
            },
        }
    }
}

fn spawn_stdin_reader() -> Receiver<String> {
    let (tx, rx) = unbounded();
    thread::spawn(move || {
        for line in io::stdin().lock().lines() {
            let Ok(line) = line else { break };
            if tx.send(line).is_err() {
                break;
            }
        }
        // Dropping tx tells the main loop stdin is done
    });
    rx
}

fn wait_for_disconnect(events: &Receiver<ConnectionEvent>) {
    while let Ok(event) = events.recv_timeout(DISCONNECT_WAIT) {
        if let ConnectionEvent::Disconnected { by_remote } = event {
            debug!(by_remote, "worker finished");
            return;
        }
    }
}

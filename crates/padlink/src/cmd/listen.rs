use std::io::{self, Read};
use std::num::NonZeroUsize;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::thread;
use std::time::Duration;

use padlink_frame::{FrameConfig, FrameError, FrameReader, Verified};
use padlink_transport::TcpTransport;
use tracing::{error, info, warn};

use crate::cmd::ListenArgs;
use crate::exit::{transport_error, CliError, CliResult, SUCCESS};
use crate::output::{print_sample, Direction, OutputFormat};
use crate::sample::ControllerState;

/// How often an idle listener or a quiet connection re-checks for Ctrl-C.
const POLL_INTERVAL: Duration = Duration::from_millis(100);

/// Per-listener counters, kept across connections.
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq)]
struct Tally {
    received: usize,
    corrupt: usize,
    undecodable: usize,
}

/// Why a connection's receive loop returned without a fault.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum SessionEnd {
    Closed,
    CountReached,
    Stopped,
}

pub fn run(args: ListenArgs, format: OutputFormat) -> CliResult<i32> {
    let listener =
        TcpTransport::bind(&args.addr).map_err(|err| transport_error("bind failed", err))?;
    listener
        .set_nonblocking(true)
        .map_err(|err| transport_error("listener setup failed", err))?;

    let running = Arc::new(AtomicBool::new(true));
    install_ctrlc_handler(running.clone())?;

    let config = FrameConfig {
        max_packet_size: args.max_packet_size,
        read_timeout: Some(POLL_INTERVAL),
        ..FrameConfig::default()
    };
    let mut tally = Tally::default();

    while running.load(Ordering::SeqCst) {
        let stream = match listener.try_accept() {
            Ok(Some(stream)) => stream,
            Ok(None) => {
                thread::sleep(POLL_INTERVAL);
                continue;
            }
            Err(err) if err.is_transient() => {
                warn!(%err, "accept failed; still listening");
                continue;
            }
            Err(err) => return Err(transport_error("accept failed", err)),
        };
        let peer = stream
            .peer_addr()
            .map(|addr| addr.to_string())
            .unwrap_or_else(|_| "unknown".to_string());
        info!(%peer, "producer connected");

        let mut reader = match FrameReader::with_config_link(stream, config.clone()) {
            Ok(reader) => reader,
            Err(err) => {
                error!(%peer, %err, "stream setup failed");
                continue;
            }
        };

        match receive_samples(
            &mut reader,
            &peer,
            &mut tally,
            args.count.map(NonZeroUsize::get),
            format,
            &running,
        ) {
            Ok(SessionEnd::CountReached) => {
                info!(?tally, "sample count reached");
                return Ok(SUCCESS);
            }
            Ok(SessionEnd::Closed) => info!(%peer, ?tally, "producer disconnected"),
            Ok(SessionEnd::Stopped) => break,
            // Connection-level fault: drop this producer, keep listening.
            Err(err) => error!(%peer, %err, "connection aborted"),
        }
    }

    info!(?tally, "listener stopped");
    Ok(SUCCESS)
}

fn receive_samples<R: Read>(
    reader: &mut FrameReader<R>,
    peer: &str,
    tally: &mut Tally,
    limit: Option<usize>,
    format: OutputFormat,
    running: &AtomicBool,
) -> Result<SessionEnd, FrameError> {
    while running.load(Ordering::SeqCst) {
        let payload = match reader.read_frame() {
            Ok(Verified::Intact(payload)) => payload,
            Ok(Verified::Corrupt { payload, reason }) => {
                warn!(peer, %reason, len = payload.len(), "dropping corrupt packet");
                tally.corrupt += 1;
                continue;
            }
            Err(FrameError::ConnectionClosed) => return Ok(SessionEnd::Closed),
            // Quiet producer: partial frames stay buffered in the reader.
            Err(FrameError::Io(err)) if is_poll_timeout(&err) => continue,
            Err(err) => return Err(err),
        };

        let sample: ControllerState = match serde_json::from_slice(&payload) {
            Ok(sample) => sample,
            Err(err) => {
                warn!(peer, %err, len = payload.len(), "dropping undecodable sample");
                tally.undecodable += 1;
                continue;
            }
        };

        print_sample(&sample, Direction::Received, Some(peer), payload.len(), format);
        tally.received = tally.received.saturating_add(1);

        if limit.is_some_and(|count| tally.received >= count) {
            return Ok(SessionEnd::CountReached);
        }
    }

    Ok(SessionEnd::Stopped)
}

fn is_poll_timeout(err: &io::Error) -> bool {
    matches!(
        err.kind(),
        io::ErrorKind::WouldBlock | io::ErrorKind::TimedOut
    )
}

fn install_ctrlc_handler(running: Arc<AtomicBool>) -> CliResult<()> {
    ctrlc::set_handler(move || {
        running.store(false, Ordering::SeqCst);
    })
    .map_err(|err| {
        CliError::new(
            crate::exit::INTERNAL,
            format!("signal handler setup failed: {err}"),
        )
    })
}

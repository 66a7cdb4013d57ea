use std::io::Write;
use std::time::{Duration, Instant};

use padlink_frame::{FrameConfig, FrameError, FrameWriter};
use padlink_transport::TcpTransport;
use tracing::{info, warn};

use crate::cmd::{parse_duration, SendArgs};
use crate::exit::{frame_error, transport_error, CliError, CliResult, SUCCESS, USAGE};
use crate::output::{print_sample, Direction, OutputFormat};
use crate::sample::{ControllerState, SampleSource};

pub fn run(args: SendArgs, format: OutputFormat) -> CliResult<i32> {
    let interval = sample_interval(args.hz)?;
    let connect_timeout = parse_duration(&args.connect_timeout)?;

    let stream = TcpTransport::connect_timeout(&args.addr, connect_timeout)
        .map_err(|err| transport_error("connect failed", err))?;
    info!(addr = %args.addr, hz = args.hz, mode = ?args.mode(), "connected");

    let config = FrameConfig {
        max_packet_size: args.max_packet_size,
        ..FrameConfig::default()
    };
    let mut writer = FrameWriter::with_config_link(stream, config)
        .map_err(|err| frame_error("stream setup failed", err))?;

    let source = SampleSource::new(args.mode());
    let mut produced = 0usize;
    let mut next_tick = Instant::now() + interval;

    loop {
        if let Some(wait) = next_tick.checked_duration_since(Instant::now()) {
            std::thread::sleep(wait);
        }
        next_tick += interval;

        let sample = source.next_sample();
        if let Some(size) = send_sample(&mut writer, &sample)? {
            print_sample(&sample, Direction::Sent, None, size, format);
        }

        produced = produced.saturating_add(1);
        if args.count.is_some_and(|count| produced >= count.get()) {
            return Ok(SUCCESS);
        }
    }
}

fn sample_interval(hz: f64) -> CliResult<Duration> {
    if !hz.is_finite() || hz <= 0.0 {
        return Err(CliError::new(
            USAGE,
            format!("--hz must be a positive number, got {hz}"),
        ));
    }
    Duration::try_from_secs_f64(1.0 / hz)
        .map_err(|err| CliError::new(USAGE, format!("--hz out of range: {err}")))
}

/// Serialize and send one sample.
///
/// Returns the payload size when a frame went out, `None` when the sample was
/// skipped. Only connection-level failures are errors.
fn send_sample<W: Write>(
    writer: &mut FrameWriter<W>,
    sample: &ControllerState,
) -> CliResult<Option<usize>> {
    let payload = match serde_json::to_vec(sample) {
        Ok(payload) => payload,
        Err(err) => {
            warn!(%err, "failed to serialize sample; skipping");
            return Ok(None);
        }
    };

    match writer.send(&payload) {
        Ok(()) => Ok(Some(payload.len())),
        Err(FrameError::OversizedPayload { size, max }) => {
            warn!(size, max, "payload too large; skipping");
            Ok(None)
        }
        Err(err) => Err(frame_error("send failed", err)),
    }
}

#[cfg(test)]
mod tests {
    use std::io::Cursor;

    use padlink_frame::FrameReader;

    use super::*;
    use crate::exit::TRANSPORT_ERROR;

    fn sample() -> ControllerState {
        ControllerState {
            left_x: 64,
            timestamp: 1,
            ..ControllerState::default()
        }
    }

    #[test]
    fn sample_is_framed_as_json() {
        let mut writer = FrameWriter::new(Cursor::new(Vec::<u8>::new()));

        let size = send_sample(&mut writer, &sample()).unwrap().unwrap();

        let mut reader = FrameReader::new(Cursor::new(writer.into_inner().into_inner()));
        let (payload, ok) = reader.read_frame().unwrap().into_parts();
        assert!(ok);
        assert_eq!(payload.len(), size);
        let decoded: ControllerState = serde_json::from_slice(&payload).unwrap();
        assert_eq!(decoded, sample());
    }

    #[test]
    fn oversized_sample_is_skipped_without_writing() {
        let config = FrameConfig {
            max_packet_size: 16,
            ..FrameConfig::default()
        };
        let mut writer = FrameWriter::with_config(Cursor::new(Vec::<u8>::new()), config);

        assert_eq!(send_sample(&mut writer, &sample()).unwrap(), None);
        assert!(writer.get_ref().get_ref().is_empty());
    }

    #[test]
    fn write_failure_is_fatal() {
        let mut writer = FrameWriter::new(ClosedPeer);
        let err = send_sample(&mut writer, &sample()).unwrap_err();
        assert_eq!(err.code, TRANSPORT_ERROR);

        let mut writer = FrameWriter::new(ZeroWriter);
        let err = send_sample(&mut writer, &sample()).unwrap_err();
        assert_eq!(err.code, TRANSPORT_ERROR);
    }

    #[test]
    fn sample_interval_from_hz() {
        assert_eq!(sample_interval(4.0).unwrap(), Duration::from_millis(250));
        assert!(sample_interval(0.0).is_err());
        assert!(sample_interval(-3.0).is_err());
        assert!(sample_interval(f64::NAN).is_err());
    }

    struct ClosedPeer;

    impl Write for ClosedPeer {
        fn write(&mut self, _buf: &[u8]) -> std::io::Result<usize> {
            Err(std::io::Error::from(std::io::ErrorKind::BrokenPipe))
        }

        fn flush(&mut self) -> std::io::Result<()> {
            Ok(())
        }
    }

    struct ZeroWriter;

    impl Write for ZeroWriter {
        fn write(&mut self, _buf: &[u8]) -> std::io::Result<usize> {
            Ok(0)
        }

        fn flush(&mut self) -> std::io::Result<()> {
            Ok(())
        }
    }
}

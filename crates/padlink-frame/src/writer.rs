use std::io::{ErrorKind, Write};

use bytes::BytesMut;
use padlink_transport::LinkStream;

use crate::checksum::CHECKSUM_SIZE;
use crate::codec::{encode_frame, max_wire_unit, FrameConfig};
use crate::error::{FrameError, Result};
use crate::reader::transport_to_frame_error;

const INITIAL_BUFFER_CAPACITY: usize = 8 * 1024;

/// Writes complete frames to any `Write` stream.
///
/// Prefix and wire unit go out from a single buffer, so frames sent through
/// one writer never interleave. To share a connection between threads, share
/// the writer (e.g. behind a `Mutex`), not the stream.
pub struct FrameWriter<T> {
    inner: T,
    buf: BytesMut,
    config: FrameConfig,
}

impl<T: Write> FrameWriter<T> {
    /// Create a new frame writer with default configuration.
    pub fn new(inner: T) -> Self {
        Self::with_config(inner, FrameConfig::default())
    }

    /// Create a new frame writer with explicit configuration.
    pub fn with_config(inner: T, config: FrameConfig) -> Self {
        Self {
            inner,
            buf: BytesMut::with_capacity(INITIAL_BUFFER_CAPACITY),
            config,
        }
    }

    /// Checksum, frame and send a payload (blocking).
    ///
    /// Payloads over `max_packet_size` fail with
    /// [`FrameError::OversizedPayload`] before anything is written; the writer
    /// remains usable.
    pub fn send(&mut self, payload: &[u8]) -> Result<()> {
        self.buf.clear();
        self.config.framer().seal_into(payload, &mut self.buf)?;
        self.write_buffered()
    }

    /// Frame and send an already-checksummed wire unit (blocking).
    pub fn write_wire_unit(&mut self, wire_unit: &[u8]) -> Result<()> {
        if wire_unit.len() > max_wire_unit(self.config.max_packet_size) {
            return Err(FrameError::OversizedPayload {
                size: wire_unit.len().saturating_sub(CHECKSUM_SIZE),
                max: self.config.max_packet_size,
            });
        }

        self.buf.clear();
        encode_frame(wire_unit, &mut self.buf)?;
        self.write_buffered()
    }

    // An expired write timeout surfaces as `Io` (`WouldBlock` or `TimedOut`).
    // Part of the frame may already be on the wire, so the stream must be
    // dropped afterwards.
    fn write_buffered(&mut self) -> Result<()> {
        let mut offset = 0usize;
        while offset < self.buf.len() {
            match self.inner.write(&self.buf[offset..]) {
                Ok(0) => return Err(FrameError::ConnectionClosed),
                Ok(n) => offset += n,
                Err(err) if err.kind() == ErrorKind::Interrupted => continue,
                Err(err) => return Err(FrameError::Io(err)),
            }
        }

        self.flush()
    }

    /// Flush the underlying stream.
    pub fn flush(&mut self) -> Result<()> {
        loop {
            match self.inner.flush() {
                Ok(()) => return Ok(()),
                Err(err) if err.kind() == ErrorKind::Interrupted => continue,
                Err(err) => return Err(FrameError::Io(err)),
            }
        }
    }

    /// Borrow the underlying stream.
    pub fn get_ref(&self) -> &T {
        &self.inner
    }

    /// Mutably borrow the underlying stream.
    pub fn get_mut(&mut self) -> &mut T {
        &mut self.inner
    }

    /// Consume the writer and return the inner stream.
    pub fn into_inner(self) -> T {
        self.inner
    }

    /// Update maximum payload size for subsequent sends.
    pub fn set_max_packet_size(&mut self, max_packet_size: usize) {
        self.config.max_packet_size = max_packet_size;
    }

    /// Current frame writer configuration.
    pub fn config(&self) -> &FrameConfig {
        &self.config
    }
}

impl FrameWriter<LinkStream> {
    /// Create a frame writer for `LinkStream` and apply write timeout from config.
    pub fn with_config_link(inner: LinkStream, config: FrameConfig) -> Result<Self> {
        inner
            .set_write_timeout(config.write_timeout)
            .map_err(transport_to_frame_error)?;
        Ok(Self::with_config(inner, config))
    }
}

#[cfg(test)]
mod tests {
    use std::io::Cursor;
    use std::sync::atomic::{AtomicBool, Ordering};
    use std::sync::{Arc, Mutex};

    use bytes::{Bytes, BytesMut};
    use padlink_transport::TcpTransport;

    use super::*;
    use crate::checksum::{append_crc, compute_crc, verify_packet, Verified};
    use crate::codec::{decode_frame, DEFAULT_MAX_PACKET_SIZE};
    use crate::reader::FrameReader;

    fn written(writer: FrameWriter<Cursor<Vec<u8>>>) -> BytesMut {
        BytesMut::from(writer.into_inner().into_inner().as_slice())
    }

    #[test]
    fn write_single_frame_bytes() {
        let mut writer = FrameWriter::new(Cursor::new(Vec::<u8>::new()));

        writer.send(&[0x01, 0x02, 0x03]).unwrap();

        let wire = written(writer);
        let crc = compute_crc(&[0x01, 0x02, 0x03]).to_be_bytes();
        let mut expected = vec![0x00, 0x00, 0x00, 0x07, 0x01, 0x02, 0x03];
        expected.extend_from_slice(&crc);
        assert_eq!(wire.as_ref(), expected.as_slice());
    }

    #[test]
    fn write_multiple_frames() {
        let mut writer = FrameWriter::new(Cursor::new(Vec::<u8>::new()));

        writer.send(b"one").unwrap();
        writer.send(b"two").unwrap();
        writer.send(b"three").unwrap();

        let mut wire = written(writer);
        for expected in ["one", "two", "three"] {
            let wire_unit = decode_frame(&mut wire, usize::MAX).unwrap().unwrap();
            assert_eq!(
                verify_packet(&wire_unit),
                Verified::Intact(Bytes::copy_from_slice(expected.as_bytes()))
            );
        }
        assert!(wire.is_empty());
    }

    #[test]
    fn oversized_payload_rejected_and_nothing_written() {
        let cfg = FrameConfig {
            max_packet_size: 4,
            ..FrameConfig::default()
        };
        let mut writer = FrameWriter::with_config(Cursor::new(Vec::<u8>::new()), cfg);

        let err = writer.send(b"oversized").unwrap_err();
        assert!(matches!(err, FrameError::OversizedPayload { size: 9, max: 4 }));
        assert!(err.is_recoverable());
        assert!(writer.get_ref().get_ref().is_empty());

        writer.send(b"fits").unwrap();
        let mut wire = written(writer);
        let wire_unit = decode_frame(&mut wire, usize::MAX).unwrap().unwrap();
        assert_eq!(verify_packet(&wire_unit).payload(), b"fits");
    }

    #[test]
    fn default_limit_is_inclusive() {
        let mut writer = FrameWriter::new(Cursor::new(Vec::<u8>::new()));

        writer.send(&vec![0u8; DEFAULT_MAX_PACKET_SIZE]).unwrap();
        let err = writer
            .send(&vec![0u8; DEFAULT_MAX_PACKET_SIZE + 1])
            .unwrap_err();
        assert!(matches!(err, FrameError::OversizedPayload { .. }));

        let wire = written(writer);
        assert_eq!(wire.len(), 4 + DEFAULT_MAX_PACKET_SIZE + 4);
    }

    #[test]
    fn write_wire_unit_method() {
        let mut writer = FrameWriter::new(Cursor::new(Vec::<u8>::new()));
        let wire_unit = append_crc(b"abc");

        writer.write_wire_unit(&wire_unit).unwrap();

        let mut wire = written(writer);
        let decoded = decode_frame(&mut wire, usize::MAX).unwrap().unwrap();
        assert_eq!(decoded, wire_unit);
    }

    #[test]
    fn write_wire_unit_respects_limit() {
        let cfg = FrameConfig {
            max_packet_size: 2,
            ..FrameConfig::default()
        };
        let mut writer = FrameWriter::with_config(Cursor::new(Vec::<u8>::new()), cfg);

        let err = writer.write_wire_unit(&append_crc(b"abc")).unwrap_err();
        assert!(matches!(err, FrameError::OversizedPayload { size: 3, max: 2 }));
    }

    #[test]
    fn flush_propagates() {
        let sink = FlushTrackingWriter::default();
        let flag = Arc::clone(&sink.flushed);
        let mut writer = FrameWriter::new(sink);

        writer.send(b"x").unwrap();

        assert!(flag.load(Ordering::SeqCst));
    }

    #[test]
    fn accessors_and_into_inner() {
        let cursor = Cursor::new(Vec::<u8>::new());
        let mut writer = FrameWriter::new(cursor);

        writer.set_max_packet_size(10);
        assert_eq!(writer.config().max_packet_size, 10);
        let _ = writer.get_ref();
        let _ = writer.get_mut();
        let _inner = writer.into_inner();
    }

    #[test]
    fn handles_interrupted_write_and_flush() {
        let writer_impl = InterruptedWriteThenFlush {
            wrote_once: false,
            flush_interrupted: false,
            data: Vec::new(),
        };

        let mut writer = FrameWriter::new(writer_impl);
        writer.send(b"retry").unwrap();

        let inner = writer.into_inner();
        assert_eq!(inner.data.len(), 4 + 5 + 4);
    }

    #[test]
    fn would_block_write_is_reported() {
        let mut writer = FrameWriter::new(WouldBlockWriter { flushed: false });
        let err = writer.send(b"stalled").unwrap_err();
        assert!(matches!(err, FrameError::Io(e) if e.kind() == ErrorKind::WouldBlock));
        assert!(!writer.get_ref().flushed);
    }

    #[test]
    fn short_writes_are_completed() {
        let mut writer = FrameWriter::new(OneBytePerWrite { data: Vec::new() });
        writer.send(b"dribble").unwrap();

        let mut wire = BytesMut::from(writer.into_inner().data.as_slice());
        let wire_unit = decode_frame(&mut wire, usize::MAX).unwrap().unwrap();
        assert!(verify_packet(&wire_unit).is_intact());
    }

    #[test]
    fn connection_closed_when_write_returns_zero() {
        let mut writer = FrameWriter::new(ZeroWriter);
        let err = writer.send(b"x").unwrap_err();
        assert!(matches!(err, FrameError::ConnectionClosed));
    }

    #[test]
    fn write_error_propagates() {
        let mut writer = FrameWriter::new(BrokenPipeWriter);
        let err = writer.send(b"x").unwrap_err();
        assert!(matches!(err, FrameError::Io(e) if e.kind() == ErrorKind::BrokenPipe));
    }

    #[test]
    fn write_timeout_fires_when_peer_stops_reading() {
        let listener = TcpTransport::bind("127.0.0.1:0").unwrap();
        let addr = listener.local_addr().to_string();
        let stream = TcpTransport::connect(&addr).unwrap();
        let _idle_peer = listener.accept().unwrap();

        let cfg = FrameConfig {
            max_packet_size: 1 << 20,
            write_timeout: Some(std::time::Duration::from_millis(50)),
            ..FrameConfig::default()
        };
        let mut writer = FrameWriter::with_config_link(stream, cfg).unwrap();
        let payload = vec![0x5A; 1 << 20];

        let started = std::time::Instant::now();
        let err = (0..64)
            .find_map(|_| writer.send(&payload).err())
            .expect("socket buffers should fill before 64 MiB");

        assert!(matches!(
            err,
            FrameError::Io(e) if matches!(e.kind(), ErrorKind::WouldBlock | ErrorKind::TimedOut)
        ));
        assert!(started.elapsed() < std::time::Duration::from_secs(5));
    }

    #[test]
    fn shared_writer_keeps_frames_whole() {
        let listener = TcpTransport::bind("127.0.0.1:0").unwrap();
        let addr = listener.local_addr().to_string();
        let stream = TcpTransport::connect(&addr).unwrap();
        let server = listener.accept().unwrap();

        let writer = Arc::new(Mutex::new(FrameWriter::new(stream)));
        let mut handles = Vec::new();
        for t in 0..4u8 {
            let writer = Arc::clone(&writer);
            handles.push(std::thread::spawn(move || {
                for i in 0..32u8 {
                    let payload = vec![t; 100 + i as usize];
                    writer.lock().unwrap().send(&payload).unwrap();
                }
            }));
        }

        let mut reader = FrameReader::new(server);
        let mut counts = [0usize; 4];
        for _ in 0..128 {
            let verified = reader.read_frame().unwrap();
            assert!(verified.is_intact());
            let payload = verified.payload();
            let tag = payload[0];
            assert!(payload.iter().all(|b| *b == tag));
            counts[tag as usize] += 1;
        }

        for handle in handles {
            handle.join().unwrap();
        }
        assert_eq!(counts, [32; 4]);
    }

    #[derive(Default)]
    struct FlushTrackingWriter {
        flushed: Arc<AtomicBool>,
        data: Vec<u8>,
    }

    impl Write for FlushTrackingWriter {
        fn write(&mut self, buf: &[u8]) -> std::io::Result<usize> {
            self.data.extend_from_slice(buf);
            Ok(buf.len())
        }

        fn flush(&mut self) -> std::io::Result<()> {
            self.flushed.store(true, Ordering::SeqCst);
            Ok(())
        }
    }

    struct InterruptedWriteThenFlush {
        wrote_once: bool,
        flush_interrupted: bool,
        data: Vec<u8>,
    }

    impl Write for InterruptedWriteThenFlush {
        fn write(&mut self, buf: &[u8]) -> std::io::Result<usize> {
            if !self.wrote_once {
                self.wrote_once = true;
                return Err(std::io::Error::from(ErrorKind::Interrupted));
            }
            self.data.extend_from_slice(buf);
            Ok(buf.len())
        }

        fn flush(&mut self) -> std::io::Result<()> {
            if !self.flush_interrupted {
                self.flush_interrupted = true;
                return Err(std::io::Error::from(ErrorKind::Interrupted));
            }
            Ok(())
        }
    }

    struct WouldBlockWriter {
        flushed: bool,
    }

    impl Write for WouldBlockWriter {
        fn write(&mut self, _buf: &[u8]) -> std::io::Result<usize> {
            Err(std::io::Error::from(ErrorKind::WouldBlock))
        }

        fn flush(&mut self) -> std::io::Result<()> {
            self.flushed = true;
            Ok(())
        }
    }

    struct OneBytePerWrite {
        data: Vec<u8>,
    }

    impl Write for OneBytePerWrite {
        fn write(&mut self, buf: &[u8]) -> std::io::Result<usize> {
            match buf.first() {
                Some(byte) => {
                    self.data.push(*byte);
                    Ok(1)
                }
                None => Ok(0),
            }
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

    struct BrokenPipeWriter;

    impl Write for BrokenPipeWriter {
        fn write(&mut self, _buf: &[u8]) -> std::io::Result<usize> {
            Err(std::io::Error::from(ErrorKind::BrokenPipe))
        }

        fn flush(&mut self) -> std::io::Result<()> {
            Ok(())
        }
    }

    #[test]
    fn written_bytes_decode() {
        let mut writer = FrameWriter::new(Cursor::new(Vec::<u8>::new()));

        writer.send(b"z").unwrap();

        let wire = writer.into_inner().into_inner();
        let mut framed = FrameReader::new(Cursor::new(wire));
        let verified = framed.read_frame().unwrap();
        assert_eq!(verified, Verified::Intact(Bytes::from_static(b"z")));
    }
}

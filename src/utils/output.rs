/// Bounded draining of worker output streams
/// Readers always run to EOF so the worker never blocks on a full pipe;
/// bytes past the capture limit are discarded and the stream is marked.
use crate::config::types::OutputIntegrity;
use std::io::{ErrorKind, Read};

const CHUNK_SIZE: usize = 8192;

/// Which worker stream a capture came from
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum StreamKind {
    Stdout,
    Stderr,
}

impl StreamKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            StreamKind::Stdout => "stdout",
            StreamKind::Stderr => "stderr",
        }
    }
}

/// Captured contents of one stream
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct CapturedStream {
    /// Retained bytes, at most the capture limit
    pub bytes: Vec<u8>,
    /// Total bytes read from the stream, retained or not
    pub total_read: usize,
    pub integrity: OutputIntegrity,
}

impl CapturedStream {
    pub fn is_empty(&self) -> bool {
        self.total_read == 0
    }

    /// Retained bytes as text, invalid UTF-8 replaced
    pub fn text(&self) -> String {
        String::from_utf8_lossy(&self.bytes).into_owned()
    }
}

/// Read `stream` to EOF, retaining at most `limit` bytes
pub fn drain_stream<R: Read>(mut stream: R, limit: usize) -> CapturedStream {
    let mut captured = CapturedStream::default();
    let mut chunk = [0u8; CHUNK_SIZE];

    loop {
        match stream.read(&mut chunk) {
            Ok(0) => break,
            Ok(n) => {
                captured.total_read += n;
                let room = limit.saturating_sub(captured.bytes.len());
                if n > room {
                    captured.bytes.extend_from_slice(&chunk[..room]);
                    captured.integrity = OutputIntegrity::TruncatedByLimit;
                } else {
                    captured.bytes.extend_from_slice(&chunk[..n]);
                }
            }
            Err(e) if e.kind() == ErrorKind::Interrupted => continue,
            Err(e) => {
                log::warn!("Worker output read failed: {}", e);
                captured.integrity = OutputIntegrity::ReadError;
                break;
            }
        }
    }

    captured
}

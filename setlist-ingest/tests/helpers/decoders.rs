//! Instrumented decoders

use setlist_ingest::models::ParsedDocument;
use setlist_ingest::services::{DecodeError, GzipXmlDecoder, ProjectDecoder};
use std::path::Path;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::time::Duration;

/// Real decoder that counts calls and tracks peak concurrency
#[derive(Debug, Default)]
pub struct CountingDecoder {
    calls: AtomicUsize,
    in_flight: AtomicUsize,
    peak: AtomicUsize,
    delay: Duration,
}

impl CountingDecoder {
    pub fn new() -> Self {
        Self::default()
    }

    /// Hold each decode for `delay` so overlapping calls are observable
    pub fn with_delay(delay: Duration) -> Self {
        Self {
            delay,
            ..Self::default()
        }
    }

    pub fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }

    pub fn peak_concurrency(&self) -> usize {
        self.peak.load(Ordering::SeqCst)
    }
}

impl ProjectDecoder for CountingDecoder {
    fn decode(&self, path: &Path) -> Result<ParsedDocument, DecodeError> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        let current = self.in_flight.fetch_add(1, Ordering::SeqCst) + 1;
        self.peak.fetch_max(current, Ordering::SeqCst);

        if !self.delay.is_zero() {
            std::thread::sleep(self.delay);
        }
        let result = GzipXmlDecoder::new().decode(path);

        self.in_flight.fetch_sub(1, Ordering::SeqCst);
        result
    }
}

/// Decoder that never finishes within a short timeout
#[derive(Debug)]
pub struct SlowDecoder(pub Duration);

impl ProjectDecoder for SlowDecoder {
    fn decode(&self, path: &Path) -> Result<ParsedDocument, DecodeError> {
        std::thread::sleep(self.0);
        GzipXmlDecoder::new().decode(path)
    }
}

//! Raw SC16Q11 file backend.
//!
//! The container is headerless little-endian interleaved I/Q, 4 bytes per
//! sample. The file is opened read/write without truncation or creation,
//! and RX and TX share one cursor: a write lands wherever the last read or
//! write left off.
//!
//! RX timestamps are the running count of samples delivered. TX timestamps
//! are accepted but gaps are not zero-filled.

use std::fs::{File, OpenOptions};
use std::io::{self, Read, Write};
use std::path::{Path, PathBuf};

use sdrdev_core::io::{complexf_to_sc16q11, decode_le, encode_le, sc16q11_to_complexf};
use sdrdev_core::types::{IQSample, NATIVE_VALUES_PER_SAMPLE};
use sdrdev_core::{NativeFormat, StreamConfig};
use tracing::{debug, info};

use super::bladerf::alloc_native;
use crate::device::{DeviceBackend, SdrError, SdrResult};

/// Samples moved per read/write call.
pub const BUF_LEN_SAMPLES: usize = 1024;

const BYTES_PER_SAMPLE: usize = NativeFormat::Sc16Q11.bytes_per_sample();

#[derive(Debug)]
struct FileChannel {
    native: Vec<i16>,
    bytes: Vec<u8>,
    /// RX: samples delivered so far. TX: next expected timestamp.
    timestamp: u64,
}

impl FileChannel {
    fn allocate(chunk_len: usize) -> SdrResult<Self> {
        let mut bytes = Vec::new();
        bytes
            .try_reserve_exact(chunk_len * BYTES_PER_SAMPLE)
            .map_err(|e| SdrError::Allocation(format!("{} byte file buffer: {}", chunk_len, e)))?;
        Ok(Self {
            native: alloc_native(chunk_len)?,
            bytes,
            timestamp: 0,
        })
    }
}

/// File variant of the device front.
#[derive(Debug)]
pub struct FileDevice {
    file: Option<File>,
    path: PathBuf,
    chunk_len: usize,
    rx: FileChannel,
    tx: FileChannel,
}

impl FileDevice {
    /// Open the file named by `config.device_specifier`.
    pub fn open(config: &StreamConfig) -> SdrResult<Self> {
        let path = config
            .device_specifier
            .as_deref()
            .ok_or_else(|| SdrError::Open("file device requires a path".to_string()))?;
        Self::open_path(path, BUF_LEN_SAMPLES)
    }

    /// Open `path` with a custom per-call chunk length.
    pub fn open_path(path: impl AsRef<Path>, chunk_len: usize) -> SdrResult<Self> {
        let path = path.as_ref();
        if chunk_len == 0 {
            return Err(SdrError::InvalidArgument("chunk length must be nonzero".to_string()));
        }

        let rx = FileChannel::allocate(chunk_len)?;
        let tx = FileChannel::allocate(chunk_len)?;

        let file = OpenOptions::new()
            .read(true)
            .write(true)
            .open(path)
            .map_err(|e| SdrError::Open(format!("{}: {}", path.display(), e)))?;

        info!("Opened SC16Q11 file {}", path.display());

        Ok(Self {
            file: Some(file),
            path: path.to_path_buf(),
            chunk_len,
            rx,
            tx,
        })
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    pub fn chunk_len(&self) -> usize {
        self.chunk_len
    }

    /// Samples delivered by RX so far; the timestamp of the next RX sample.
    pub fn rx_timestamp(&self) -> u64 {
        self.rx.timestamp
    }

    /// Timestamp a contiguous next TX call would carry.
    pub fn tx_timestamp(&self) -> u64 {
        self.tx.timestamp
    }
}

/// Read until `buf` is full or the file ends. Returns bytes read.
fn read_full(file: &mut File, buf: &mut [u8]) -> io::Result<usize> {
    let mut filled = 0;
    while filled < buf.len() {
        match file.read(&mut buf[filled..]) {
            Ok(0) => break,
            Ok(n) => filled += n,
            Err(e) if e.kind() == io::ErrorKind::Interrupted => continue,
            Err(e) => return Err(e),
        }
    }
    Ok(filled)
}

impl DeviceBackend for FileDevice {
    fn rx(&mut self, samples: &mut [IQSample]) -> SdrResult<u64> {
        let file = self.file.as_mut().ok_or(SdrError::Closed)?;
        let count = samples.len();
        let start = self.rx.timestamp;
        let mut total = 0;

        while total < count {
            let to_read = self.chunk_len.min(count - total);
            let want = to_read * BYTES_PER_SAMPLE;

            self.rx.bytes.resize(want, 0);
            let got = read_full(file, &mut self.rx.bytes[..want])?;
            let whole = got / BYTES_PER_SAMPLE;

            let native = &mut self.rx.native[..NATIVE_VALUES_PER_SAMPLE * whole];
            decode_le(&self.rx.bytes[..whole * BYTES_PER_SAMPLE], native);
            sc16q11_to_complexf(native, &mut samples[total..total + whole]);
            total += whole;

            if got < want {
                self.rx.timestamp += total as u64;
                debug!(
                    "EOF in {} after {} of {} samples",
                    self.path.display(),
                    total,
                    count
                );
                return Err(SdrError::EndOfStream { delivered: total });
            }
        }

        self.rx.timestamp += count as u64;
        Ok(start)
    }

    fn tx(&mut self, timestamp: u64, samples: &[IQSample]) -> SdrResult<()> {
        let file = self.file.as_mut().ok_or(SdrError::Closed)?;
        if samples.is_empty() {
            return Ok(());
        }

        if timestamp != self.tx.timestamp {
            debug!(
                "TX timestamp {} does not follow {}; writing contiguously",
                timestamp, self.tx.timestamp
            );
        }

        for chunk in samples.chunks(self.chunk_len) {
            let native = &mut self.tx.native[..NATIVE_VALUES_PER_SAMPLE * chunk.len()];
            complexf_to_sc16q11(chunk, native);
            self.tx.bytes.clear();
            encode_le(native, &mut self.tx.bytes);
            file.write_all(&self.tx.bytes)?;
        }

        self.tx.timestamp = timestamp.wrapping_add(samples.len() as u64);
        Ok(())
    }

    fn deinit(&mut self) {
        if let Some(mut file) = self.file.take() {
            if let Err(e) = file.flush() {
                debug!("Flush of {} failed: {}", self.path.display(), e);
            }
            info!("Closed SC16Q11 file {}", self.path.display());
        }
        self.rx.native = Vec::new();
        self.tx.native = Vec::new();
    }
}

impl Drop for FileDevice {
    fn drop(&mut self) {
        self.deinit();
    }
}

//! File-backed shared memory block.
//!
//! Layout: a little-endian `u32` payload length followed by the JSON payload,
//! zero-padded to the block size. A zero length means the block is empty.
//! Point the path at `/dev/shm` to share through tmpfs.

use async_trait::async_trait;
use serde::de::DeserializeOwned;
use serde::Serialize;
use std::fs::{self, OpenOptions};
use std::io::{Read, Seek, SeekFrom, Write};
use std::path::{Path, PathBuf};
use tokio::io::AsyncWriteExt;
use tracing::{debug, info};

use super::sink::SignalSink;
use crate::domain::Signal;
use crate::error::{QTraderError, Result};

/// Bytes reserved for the length prefix
pub const HEADER_LEN: usize = 4;

/// Default block size
pub const DEFAULT_BLOCK_SIZE: usize = 4096;

#[derive(Debug, Clone)]
pub struct SharedMemoryBlock {
    path: PathBuf,
    size: usize,
}

impl SharedMemoryBlock {
    /// Attach to the block at `path`, creating it zero-filled when missing or
    /// shorter than `size`.
    pub fn open_or_create<P: AsRef<Path>>(path: P, size: usize) -> Result<Self> {
        if size <= HEADER_LEN || size - HEADER_LEN > u32::MAX as usize {
            return Err(QTraderError::Validation(format!(
                "shared memory size must be in ({HEADER_LEN}, {}], got {size}",
                u32::MAX as usize + HEADER_LEN
            )));
        }

        let path = path.as_ref().to_path_buf();
        if let Some(parent) = path.parent() {
            if !parent.as_os_str().is_empty() {
                fs::create_dir_all(parent)?;
            }
        }
        let file = OpenOptions::new()
            .read(true)
            .write(true)
            .create(true)
            .truncate(false)
            .open(&path)?;
        if (file.metadata()?.len() as usize) < size {
            file.set_len(size as u64)?;
            info!("Created shared memory block {:?} ({} bytes)", path, size);
        }

        Ok(Self { path, size })
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Largest payload that fits
    pub fn capacity(&self) -> usize {
        self.size - HEADER_LEN
    }

    /// Full block image holding `message` as JSON
    fn encode<T: Serialize>(&self, message: &T) -> Result<Vec<u8>> {
        let payload = serde_json::to_vec(message)?;
        if payload.len() > self.capacity() {
            return Err(QTraderError::MessageTooLarge {
                size: payload.len(),
                capacity: self.capacity(),
            });
        }

        let mut block = vec![0u8; self.size];
        block[..HEADER_LEN].copy_from_slice(&(payload.len() as u32).to_le_bytes());
        block[HEADER_LEN..HEADER_LEN + payload.len()].copy_from_slice(&payload);
        Ok(block)
    }

    /// Serialize `message` as JSON into the block, replacing its contents
    pub fn write_message<T: Serialize>(&self, message: &T) -> Result<()> {
        let block = self.encode(message)?;
        let mut file = OpenOptions::new().write(true).open(&self.path)?;
        file.seek(SeekFrom::Start(0))?;
        file.write_all(&block)?;
        file.flush()?;
        debug!("Wrote message to {:?}", self.path);
        Ok(())
    }

    /// Current message, or `None` when the block is empty
    pub fn read_message<T: DeserializeOwned>(&self) -> Result<Option<T>> {
        let mut block = vec![0u8; self.size];
        let mut file = OpenOptions::new().read(true).open(&self.path)?;
        file.read_exact(&mut block)?;

        let mut header = [0u8; HEADER_LEN];
        header.copy_from_slice(&block[..HEADER_LEN]);
        let len = u32::from_le_bytes(header) as usize;
        if len == 0 {
            return Ok(None);
        }
        if len > self.capacity() {
            return Err(QTraderError::Validation(format!(
                "corrupt shared memory header: length {len} exceeds capacity {}",
                self.capacity()
            )));
        }

        Ok(Some(serde_json::from_slice(
            &block[HEADER_LEN..HEADER_LEN + len],
        )?))
    }

    /// Zero the whole block
    pub fn clear(&self) -> Result<()> {
        let mut file = OpenOptions::new().write(true).open(&self.path)?;
        file.write_all(&vec![0u8; self.size])?;
        Ok(())
    }

    /// Remove the backing file
    pub fn unlink(self) -> Result<()> {
        fs::remove_file(&self.path)?;
        Ok(())
    }
}

#[async_trait]
impl SignalSink for SharedMemoryBlock {
    async fn send(&self, signal: &Signal) -> Result<()> {
        let block = self.encode(signal)?;
        let mut file = tokio::fs::OpenOptions::new()
            .write(true)
            .open(&self.path)
            .await?;
        file.write_all(&block).await?;
        file.flush().await?;
        debug!("Wrote signal to {:?}", self.path);
        Ok(())
    }

    fn name(&self) -> &str {
        "shared_memory"
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::rl::core::Action;
    use std::env::temp_dir;

    #[test]
    fn test_write_then_read() {
        let path = temp_dir().join("qtrader_shm_roundtrip");
        let _ = fs::remove_file(&path);
        let block = SharedMemoryBlock::open_or_create(&path, DEFAULT_BLOCK_SIZE).unwrap();
        assert!(block.read_message::<Signal>().unwrap().is_none());

        let long = Signal::new(Action::Buy, "BTCUSDT-PERPETUAL-LONG-NAME", 0.25);
        block.write_message(&long).unwrap();
        // shorter message must not leave trailing bytes behind
        let short = Signal::new(Action::Sell, "BTC", 1.0);
        block.write_message(&short).unwrap();
        assert_eq!(block.read_message::<Signal>().unwrap(), Some(short));

        block.clear().unwrap();
        assert!(block.read_message::<Signal>().unwrap().is_none());
        block.unlink().unwrap();
    }

    #[test]
    fn test_rejects_oversize_message() {
        let path = temp_dir().join("qtrader_shm_small");
        let _ = fs::remove_file(&path);
        let block = SharedMemoryBlock::open_or_create(&path, 16).unwrap();
        let err = block
            .write_message(&Signal::new(Action::Buy, "BTCUSDT", 0.25))
            .unwrap_err();
        assert!(matches!(err, QTraderError::MessageTooLarge { capacity: 12, .. }));
        block.unlink().unwrap();
    }

    #[tokio::test]
    async fn test_sink_send_writes_block() {
        let path = temp_dir().join("qtrader_shm_sink");
        let _ = fs::remove_file(&path);
        let block = SharedMemoryBlock::open_or_create(&path, DEFAULT_BLOCK_SIZE).unwrap();
        let signal = Signal::new(Action::Sell, "BTCUSDT", 0.5);

        block.send(&signal).await.unwrap();
        assert_eq!(block.read_message::<Signal>().unwrap(), Some(signal));

        let small = SharedMemoryBlock::open_or_create(temp_dir().join("qtrader_shm_sink_small"), 8)
            .unwrap();
        let err = small
            .send(&Signal::new(Action::Buy, "BTCUSDT", 1.0))
            .await
            .unwrap_err();
        assert!(matches!(err, QTraderError::MessageTooLarge { .. }));
        small.unlink().unwrap();
        block.unlink().unwrap();
    }

    #[test]
    fn test_rejects_tiny_block() {
        let path = temp_dir().join("qtrader_shm_tiny");
        assert!(SharedMemoryBlock::open_or_create(&path, HEADER_LEN).is_err());
    }
}

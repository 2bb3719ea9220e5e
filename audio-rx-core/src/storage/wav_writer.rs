use std::fs::{self, File};
use std::io::{self, BufWriter, Seek, SeekFrom, Write};
use std::path::{Path, PathBuf};

use sha2::{Digest, Sha256};

use crate::models::config::PcmFormat;
use crate::models::error::CaptureError;
use crate::models::recording_result::RecordingSummary;
use crate::processing::wav_format::{self, MAX_DATA_SIZE, WAV_HEADER_SIZE};

/// Streaming WAV file writer.
///
/// ## File Format
///
/// ```text
/// [44-byte WAV header, sizes zero until finalize]
/// [raw PCM data...]
/// ```
///
/// Appends go through a `BufWriter`, so the consumer thread never waits on a
/// per-frame flush. The header is rewritten with the real sizes by
/// [`finalize`](Self::finalize). A writer dropped without being finalized
/// (early return, panic unwind) patches its header in `Drop`, so the file on
/// disk is always playable.
pub struct WavFileWriter {
    file_path: PathBuf,
    format: PcmFormat,
    writer: Option<BufWriter<File>>,
    data_bytes: u64,
}

impl WavFileWriter {
    /// Create the file (and missing parent directories) and write a
    /// provisional header.
    pub fn create(file_path: PathBuf, format: PcmFormat) -> Result<Self, CaptureError> {
        if let Some(parent) = file_path.parent().filter(|p| !p.as_os_str().is_empty()) {
            fs::create_dir_all(parent).map_err(|e| {
                CaptureError::FileOpenError(format!("failed to create {}: {}", parent.display(), e))
            })?;
        }

        let file = File::create(&file_path)
            .map_err(|e| CaptureError::FileOpenError(format!("failed to create {}: {}", file_path.display(), e)))?;
        let mut writer = BufWriter::new(file);

        let header = wav_format::generate_wav_header(format.sample_rate, format.bits_per_sample(), format.channels, 0);
        writer
            .write_all(&header)
            .map_err(|e| CaptureError::FileOpenError(format!("failed to write header: {}", e)))?;

        log::debug!("opened {} for {:?}", file_path.display(), format);

        Ok(Self {
            file_path,
            format,
            writer: Some(writer),
            data_bytes: 0,
        })
    }

    /// Append raw PCM bytes.
    pub fn append(&mut self, data: &[u8]) -> Result<(), CaptureError> {
        if self.data_bytes + data.len() as u64 > MAX_DATA_SIZE {
            return Err(CaptureError::StorageError("WAV data chunk size limit reached".into()));
        }
        let writer = self
            .writer
            .as_mut()
            .ok_or_else(|| CaptureError::StorageError("file is not open".into()))?;
        writer
            .write_all(data)
            .map_err(|e| CaptureError::StorageError(format!("write failed: {}", e)))?;
        self.data_bytes += data.len() as u64;
        Ok(())
    }

    /// Flush, patch the header with the final sizes and format, and close.
    pub fn finalize(mut self) -> Result<RecordingSummary, CaptureError> {
        self.finish()?;
        let checksum = sha256_file(&self.file_path)?;
        log::debug!("finalized {} ({} data bytes)", self.file_path.display(), self.data_bytes);

        Ok(RecordingSummary {
            file_path: self.file_path.clone(),
            format: self.format,
            data_bytes: self.data_bytes,
            checksum,
        })
    }

    /// PCM bytes appended so far (excluding the header).
    pub fn data_bytes(&self) -> u64 {
        self.data_bytes
    }

    pub fn file_path(&self) -> &Path {
        &self.file_path
    }

    fn finish(&mut self) -> Result<(), CaptureError> {
        let Some(writer) = self.writer.take() else {
            return Ok(());
        };
        let mut file = writer
            .into_inner()
            .map_err(|e| CaptureError::StorageError(format!("flush failed: {}", e.error())))?;

        let mut header = wav_format::generate_wav_header(
            self.format.sample_rate,
            self.format.bits_per_sample(),
            self.format.channels,
            0,
        );
        wav_format::patch_data_size(&mut header, self.data_bytes);
        wav_format::patch_file_size(&mut header, WAV_HEADER_SIZE as u64 + self.data_bytes);

        file.seek(SeekFrom::Start(0))
            .and_then(|_| file.write_all(&header))
            .and_then(|_| file.sync_all())
            .map_err(|e| CaptureError::StorageError(format!("failed to patch header: {}", e)))
    }
}

impl Drop for WavFileWriter {
    fn drop(&mut self) {
        if self.writer.is_some() {
            if let Err(e) = self.finish() {
                log::error!("failed to finalize {}: {}", self.file_path.display(), e);
            }
        }
    }
}

/// Compute SHA-256 hex digest of a file.
fn sha256_file(path: &Path) -> Result<String, CaptureError> {
    let mut file = File::open(path)
        .map_err(|e| CaptureError::StorageError(format!("failed to open file for checksum: {}", e)))?;
    let mut hasher = Sha256::new();
    io::copy(&mut file, &mut hasher)
        .map_err(|e| CaptureError::StorageError(format!("failed to read file for checksum: {}", e)))?;
    Ok(hex_encode(&hasher.finalize()))
}

fn hex_encode(bytes: &[u8]) -> String {
    bytes.iter().map(|b| format!("{:02x}", b)).collect()
}

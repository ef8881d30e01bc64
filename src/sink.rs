//! Serialization sink
//!
//! The aggregate lands in two places: a gzip-compressed JSON file at
//! `<output_path>.json.gz`, always; and the tracking service, as a base64
//! encoding of that compressed file, unless the uncompressed body exceeds
//! the upload limit. Exceeding the limit is a policy decision, not an
//! error: the local file is still written and retained.

use std::fs::File;
use std::io::{Read, Write};
use std::path::{Path, PathBuf};

use flate2::read::GzDecoder;
use flate2::write::GzEncoder;
use flate2::Compression;

use crate::aggregate::AggregateResult;
use crate::Result;

/// Uncompressed payloads above this size are not uploaded (1 GiB).
pub const MAX_UPLOAD_BYTES: u64 = 1 << 30;

/// Extension appended to the caller-supplied output path.
const SINK_EXTENSION: &str = ".json.gz";

/// Gzip JSON file sink for one sweep's aggregate.
#[derive(Debug, Clone)]
pub struct LocalSink {
    path: PathBuf,
}

impl LocalSink {
    /// Create a sink at `<output_path>.json.gz`.
    #[must_use]
    pub fn new(output_path: impl AsRef<Path>) -> Self {
        let mut raw = output_path.as_ref().as_os_str().to_os_string();
        raw.push(SINK_EXTENSION);
        Self { path: PathBuf::from(raw) }
    }

    /// Full path of the sink file.
    #[must_use]
    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Serialize and write the aggregate, returning the **uncompressed**
    /// body size in bytes (the size the upload policy is judged against).
    ///
    /// # Errors
    ///
    /// Fails on serialization or file IO errors.
    pub fn write(&self, aggregate: &AggregateResult) -> Result<u64> {
        let body = serde_json::to_vec(aggregate)?;
        let file = File::create(&self.path)?;
        let mut encoder = GzEncoder::new(file, Compression::default());
        encoder.write_all(&body)?;
        encoder.finish()?;
        tracing::debug!(path = %self.path.display(), bytes = body.len(), "aggregate written");
        Ok(body.len() as u64)
    }

    /// Read the aggregate back from the sink file.
    ///
    /// # Errors
    ///
    /// Fails on file IO or if the body is not a valid aggregate.
    pub fn read(&self) -> Result<AggregateResult> {
        let mut decoder = GzDecoder::new(File::open(&self.path)?);
        let mut body = Vec::new();
        decoder.read_to_end(&mut body)?;
        Ok(serde_json::from_slice(&body)?)
    }

    /// Raw compressed bytes of the sink file, as written.
    ///
    /// # Errors
    ///
    /// Fails on file IO errors.
    pub fn compressed_bytes(&self) -> Result<Vec<u8>> {
        let mut bytes = Vec::new();
        File::open(&self.path)?.read_to_end(&mut bytes)?;
        Ok(bytes)
    }
}

/// Outcome of preparing the remote upload for a written sink.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum UploadPayload {
    /// Base64 of the compressed sink file, ready to post.
    Ready(String),
    /// Uncompressed body exceeded the limit; upload is skipped and the
    /// local file retained.
    TooLarge {
        /// Uncompressed body size that tripped the policy
        uncompressed: u64,
    },
}

impl UploadPayload {
    /// Apply the size policy and encode the sink file when it passes.
    ///
    /// # Errors
    ///
    /// Fails on file IO errors reading the sink back.
    pub fn prepare(sink: &LocalSink, uncompressed: u64, limit: u64) -> Result<Self> {
        if uncompressed > limit {
            return Ok(Self::TooLarge { uncompressed });
        }
        Ok(Self::Ready(base64_encode(&sink.compressed_bytes()?)))
    }
}

/// Base64 (standard alphabet, padded) used for the upload body.
#[must_use]
pub fn base64_encode(data: &[u8]) -> String {
    const ALPHABET: &[u8] = b"ABCDEFGHIJKLMNOPQRSTUVWXYZabcdefghijklmnopqrstuvwxyz0123456789+/";

    let mut out = String::with_capacity(data.len().div_ceil(3) * 4);
    for chunk in data.chunks(3) {
        let mut buf = [0u8; 3];
        buf[..chunk.len()].copy_from_slice(chunk);
        let n = (u32::from(buf[0]) << 16) | (u32::from(buf[1]) << 8) | u32::from(buf[2]);

        out.push(ALPHABET[(n >> 18) as usize & 0x3F] as char);
        out.push(ALPHABET[(n >> 12) as usize & 0x3F] as char);
        out.push(if chunk.len() > 1 {
            ALPHABET[(n >> 6) as usize & 0x3F] as char
        } else {
            '='
        });
        out.push(if chunk.len() > 2 {
            ALPHABET[n as usize & 0x3F] as char
        } else {
            '='
        });
    }
    out
}

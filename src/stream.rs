use std::{
    fs::{File, OpenOptions},
    io::{BufReader, BufWriter, Read, Seek, SeekFrom, Write},
    path::Path,
};

use anyhow::{ensure, Context, Result};
use bytes::Bytes;

/// Block size for source -> sink copies
const COPY_CHUNK_SIZE: u64 = 8 * 1024;

enum SinkBackend<'a> {
    /// Caller-owned region with a fixed capacity
    Region { buf: &'a mut [u8], offset: usize },
    /// Owned buffer, grown to fit on every write
    Buffer { buf: Vec<u8> },
    File { file: BufWriter<File> },
}

/// Write side of the bundle stream abstraction. The same pack routine runs
/// against any backend.
pub struct Sink<'a> {
    backend: SinkBackend<'a>,
    // Monotonic counter, distinct from the write position
    total_written: u64,
}

impl<'a> Sink<'a> {
    /// Sink over a caller-owned memory region. Writes beyond the region's
    /// capacity fail; pre-size with [`crate::pack::packed_size`].
    pub fn from_region(buf: &'a mut [u8]) -> Sink<'a> {
        Sink {
            backend: SinkBackend::Region { buf, offset: 0 },
            total_written: 0,
        }
    }

    /// Sink over an owned growable buffer, retrieved with [`Sink::into_bytes`]
    pub fn growable() -> Sink<'static> {
        Sink {
            backend: SinkBackend::Buffer { buf: Vec::new() },
            total_written: 0,
        }
    }

    /// Sink over a file opened for binary append
    pub fn create(path: &Path) -> Result<Sink<'static>> {
        let file = OpenOptions::new()
            .create(true)
            .append(true)
            .open(path)
            .with_context(|| format!("Failed to open output file: {:?}", path))?;

        Ok(Sink {
            backend: SinkBackend::File {
                file: BufWriter::new(file),
            },
            total_written: 0,
        })
    }

    /// Append the bytes at the current write position
    pub fn write(&mut self, data: &[u8]) -> Result<()> {
        match &mut self.backend {
            SinkBackend::Region { buf, offset } => {
                ensure!(
                    *offset + data.len() <= buf.len(),
                    "Sink region overflow: {} bytes written to a region of {} bytes",
                    *offset + data.len(),
                    buf.len()
                );

                buf[*offset..*offset + data.len()].copy_from_slice(data);
                *offset += data.len();
            }
            SinkBackend::Buffer { buf } => buf.extend_from_slice(data),
            SinkBackend::File { file } => file
                .write_all(data)
                .context("Failed to write to output file")?,
        }

        self.total_written += data.len() as u64;
        Ok(())
    }

    /// Total bytes ever written through this sink
    pub fn total_written(&self) -> u64 {
        self.total_written
    }

    /// Flush buffered writes. A no-op for the memory backends.
    pub fn flush(&mut self) -> Result<()> {
        match &mut self.backend {
            SinkBackend::File { file } => file.flush().context("Failed to flush output file"),
            _ => Ok(()),
        }
    }

    /// The accumulated bytes of a growable sink, `None` for other backends
    pub fn into_bytes(self) -> Option<Bytes> {
        match self.backend {
            SinkBackend::Buffer { buf } => Some(buf.into()),
            _ => None,
        }
    }
}

enum SourceBackend<'a> {
    Memory { buf: &'a [u8], offset: usize },
    File { file: BufReader<File> },
}

/// Read side of the bundle stream abstraction
pub struct Source<'a> {
    backend: SourceBackend<'a>,
}

impl<'a> Source<'a> {
    /// Source over a borrowed memory buffer
    pub fn from_bytes(buf: &'a [u8]) -> Source<'a> {
        Source {
            backend: SourceBackend::Memory { buf, offset: 0 },
        }
    }

    /// Source over a file opened for binary read
    pub fn open(path: &Path) -> Result<Source<'static>> {
        let file =
            File::open(path).with_context(|| format!("Failed to open input file: {:?}", path))?;

        Ok(Source {
            backend: SourceBackend::File {
                file: BufReader::new(file),
            },
        })
    }

    /// Read the next `count` bytes and advance the read position.
    /// Running out of data is an error, not a short read.
    pub fn read(&mut self, count: usize) -> Result<Bytes> {
        match &mut self.backend {
            SourceBackend::Memory { buf, offset } => {
                ensure!(
                    *offset + count <= buf.len(),
                    "Unexpected end of data: {} bytes wanted at offset {}, {} available",
                    count,
                    *offset,
                    buf.len() - *offset
                );

                let data = Bytes::copy_from_slice(&buf[*offset..*offset + count]);
                *offset += count;
                Ok(data)
            }
            SourceBackend::File { file } => {
                let mut data = vec![0; count];
                file.read_exact(&mut data)
                    .context("Unexpected end of data in input file")?;
                Ok(data.into())
            }
        }
    }

    /// Reposition reads to an absolute byte offset
    pub fn seek(&mut self, position: u64) -> Result<()> {
        match &mut self.backend {
            SourceBackend::Memory { buf, offset } => {
                ensure!(
                    position <= buf.len() as u64,
                    "Seek past end of data: offset {} of {} bytes",
                    position,
                    buf.len()
                );

                *offset = position as usize;
                Ok(())
            }
            SourceBackend::File { file } => {
                file.seek(SeekFrom::Start(position))
                    .context("Failed to seek in input file")?;
                Ok(())
            }
        }
    }

    /// Copy exactly `count` bytes from this source into the sink, in blocks
    pub fn copy_to(&mut self, sink: &mut Sink, count: u64) -> Result<()> {
        let mut remaining = count;
        while remaining > 0 {
            let block = self.read(remaining.min(COPY_CHUNK_SIZE) as usize)?;
            sink.write(&block)?;
            remaining -= block.len() as u64;
        }

        Ok(())
    }
}

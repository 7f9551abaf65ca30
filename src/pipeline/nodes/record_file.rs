//! Record file I/O.
//!
//! A record file is a plain concatenation of length-prefixed records, the
//! same layout as a batch block:
//!
//! ```text
//! [size u32 LE][body ...][size u32 LE][body ...] ...
//!  └── size counts its own 4 bytes
//! ```

use crate::config::{ReadMode, SourceConfig};
use crate::pipeline::codec;
use crate::pipeline::error::{PipelineError, PipelineResult};
use crate::pipeline::message::{Message, MessageType};
use crate::pipeline::record::{DataDescriptor, RawItem, LENGTH_PREFIX_SIZE};
use crate::pipeline::sink::DataSink;
use crate::pipeline::source::DataSource;
use bytes::Bytes;
use std::fs::File;
use std::io::{self, BufReader, BufWriter, ErrorKind, Read, Write};
use std::path::Path;

// ── Reading ──

/// Reads records from any byte stream, one record or one block per item.
pub struct RecordFileSource<R> {
    reader: R,
    mode: ReadMode,
    block_records: usize,
    records_read: u64,
    bytes_read: u64,
    finished: bool,
}

impl RecordFileSource<BufReader<File>> {
    pub fn open(path: impl AsRef<Path>, config: &SourceConfig) -> PipelineResult<Self> {
        let file = File::open(path.as_ref())?;
        Ok(Self::new(BufReader::new(file), config))
    }
}

impl<R: Read + Send> RecordFileSource<R> {
    pub fn new(reader: R, config: &SourceConfig) -> Self {
        Self {
            reader,
            mode: config.mode,
            block_records: config.block_records.max(1),
            records_read: 0,
            bytes_read: 0,
            finished: false,
        }
    }

    pub fn records_read(&self) -> u64 {
        self.records_read
    }

    pub fn bytes_read(&self) -> u64 {
        self.bytes_read
    }

    /// Fill `buf` as far as the stream allows; returns the bytes read.
    fn read_up_to(&mut self, buf: &mut [u8]) -> io::Result<usize> {
        let mut filled = 0;
        while filled < buf.len() {
            match self.reader.read(&mut buf[filled..]) {
                Ok(0) => break,
                Ok(n) => filled += n,
                Err(e) if e.kind() == ErrorKind::Interrupted => {}
                Err(e) => return Err(e),
            }
        }
        Ok(filled)
    }

    /// Next whole record, or `None` at a clean end of stream.
    pub fn read_record(&mut self) -> PipelineResult<Option<Bytes>> {
        let mut header = [0u8; LENGTH_PREFIX_SIZE];
        match self.read_up_to(&mut header)? {
            0 => return Ok(None),
            LENGTH_PREFIX_SIZE => {}
            n => {
                return Err(PipelineError::protocol(format!(
                    "truncated record header after record {}: {} of {} bytes",
                    self.records_read, n, LENGTH_PREFIX_SIZE
                )))
            }
        }

        let size = u32::from_le_bytes(header) as usize;
        if size < LENGTH_PREFIX_SIZE {
            return Err(PipelineError::protocol(format!(
                "record {} declares size {}, below the {}-byte prefix",
                self.records_read, size, LENGTH_PREFIX_SIZE
            )));
        }

        let mut record = Vec::new();
        record.try_reserve_exact(size).map_err(|e| {
            PipelineError::AllocationFailure(format!("record of {} bytes: {}", size, e))
        })?;
        record.extend_from_slice(&header);
        let body_len = size - LENGTH_PREFIX_SIZE;
        let body = (&mut self.reader)
            .take(body_len as u64)
            .read_to_end(&mut record)?;
        if body < body_len {
            return Err(PipelineError::protocol(format!(
                "truncated record {}: {} of {} body bytes",
                self.records_read, body, body_len
            )));
        }

        self.records_read += 1;
        self.bytes_read += size as u64;
        Ok(Some(Bytes::from(record)))
    }

    fn read_block(&mut self) -> PipelineResult<Option<Bytes>> {
        let mut records = Vec::with_capacity(self.block_records);
        while records.len() < self.block_records {
            match self.read_record()? {
                Some(record) => records.push(record),
                None => break,
            }
        }
        if records.is_empty() {
            return Ok(None);
        }
        Ok(Some(DataDescriptor::pack(&records)?.data))
    }
}

impl<R: Read + Send> DataSource for RecordFileSource<R> {
    fn connect(&mut self) -> PipelineResult<()> {
        tracing::debug!("Reading records in {:?} mode", self.mode);
        Ok(())
    }

    fn disconnect(&mut self) -> PipelineResult<()> {
        tracing::info!(
            "Record source read {} records ({} bytes)",
            self.records_read,
            self.bytes_read
        );
        Ok(())
    }

    fn read(&mut self) -> PipelineResult<RawItem> {
        if self.finished {
            return Ok(RawItem::end());
        }
        let next = match self.mode {
            ReadMode::Single => self.read_record()?,
            ReadMode::Block => self.read_block()?,
        };
        match next {
            Some(bytes) => Ok(RawItem::new(bytes)),
            None => {
                self.finished = true;
                Ok(RawItem::end())
            }
        }
    }
}

// ── Writing ──

/// Writes every record of each `Process` message to a byte stream.
pub struct RecordWriterSink<W: Write + Send> {
    writer: W,
    records_written: u64,
    bytes_written: u64,
}

impl RecordWriterSink<BufWriter<File>> {
    pub fn create(path: impl AsRef<Path>) -> PipelineResult<Self> {
        let file = File::create(path.as_ref())?;
        Ok(Self::new(BufWriter::new(file)))
    }
}

impl<W: Write + Send> RecordWriterSink<W> {
    pub fn new(writer: W) -> Self {
        Self {
            writer,
            records_written: 0,
            bytes_written: 0,
        }
    }

    pub fn records_written(&self) -> u64 {
        self.records_written
    }

    pub fn bytes_written(&self) -> u64 {
        self.bytes_written
    }

    pub fn into_inner(self) -> W {
        self.writer
    }
}

impl<W: Write + Send> DataSink for RecordWriterSink<W> {
    fn connect(&mut self) -> PipelineResult<()> {
        Ok(())
    }

    fn disconnect(&mut self) -> PipelineResult<()> {
        self.writer.flush()?;
        tracing::info!(
            "Record sink wrote {} records ({} bytes)",
            self.records_written,
            self.bytes_written
        );
        Ok(())
    }

    fn send(&mut self, msg: Message) -> PipelineResult<()> {
        match msg.kind {
            MessageType::Process => {
                for record in codec::records(&msg)? {
                    self.writer.write_all(&record)?;
                    self.records_written += 1;
                    self.bytes_written += record.len() as u64;
                }
            }
            MessageType::End => self.writer.flush()?,
            other => tracing::debug!("Record sink skips {:?}", other),
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Cursor;

    fn record(body: &[u8]) -> Vec<u8> {
        let mut raw = ((body.len() + 4) as u32).to_le_bytes().to_vec();
        raw.extend_from_slice(body);
        raw
    }

    fn file_of(bodies: &[&str]) -> Vec<u8> {
        bodies.iter().flat_map(|body| record(body.as_bytes())).collect()
    }

    fn single() -> SourceConfig {
        SourceConfig::default()
    }

    fn block(n: usize) -> SourceConfig {
        SourceConfig {
            mode: ReadMode::Block,
            block_records: n,
        }
    }

    #[test]
    fn test_single_mode_reads_each_record() {
        let data = file_of(&["first", "", "third"]);
        let mut source = RecordFileSource::new(Cursor::new(data), &single());

        assert_eq!(source.read().unwrap().as_bytes().as_ref(), record(b"first").as_slice());
        assert_eq!(source.read().unwrap().len(), 4);
        assert_eq!(source.read().unwrap().len(), 9);
        assert!(source.read().unwrap().is_end());
        assert!(source.read().unwrap().is_end());
        assert_eq!(source.records_read(), 3);
        assert_eq!(source.bytes_read(), 22);
    }

    #[test]
    fn test_block_mode_groups_records() {
        let data = file_of(&["a", "b", "c", "d", "e"]);
        let mut source = RecordFileSource::new(Cursor::new(data), &block(2));

        let sizes: Vec<usize> = std::iter::from_fn(|| {
            let item = source.read().unwrap();
            (!item.is_end()).then(|| item.len())
        })
        .collect();
        assert_eq!(sizes, vec![10, 10, 5]);
    }

    #[test]
    fn test_truncated_header() {
        let mut data = file_of(&["ok"]);
        data.extend_from_slice(&[9, 0]);
        let mut source = RecordFileSource::new(Cursor::new(data), &single());
        assert!(!source.read().unwrap().is_end());
        assert!(matches!(source.read(), Err(PipelineError::ProtocolViolation(_))));
    }

    #[test]
    fn test_truncated_body() {
        let mut data = record(b"complete body");
        data.truncate(data.len() - 3);
        let mut source = RecordFileSource::new(Cursor::new(data), &single());
        let err = source.read().unwrap_err();
        assert!(err.to_string().contains("truncated record 0"));
    }

    #[test]
    fn test_undersized_prefix() {
        let mut source = RecordFileSource::new(Cursor::new(vec![2, 0, 0, 0]), &single());
        assert!(matches!(source.read(), Err(PipelineError::ProtocolViolation(_))));
    }

    #[test]
    fn test_huge_prefix_fails_cleanly() {
        let data = u32::MAX.to_le_bytes().to_vec();
        let mut source = RecordFileSource::new(Cursor::new(data), &single());
        // Either the reservation or the short body must fail; never a panic.
        assert!(source.read().is_err());
    }

    #[test]
    fn test_writer_accepts_both_shapes() {
        let mut sink = RecordWriterSink::new(Vec::new());
        let parts = vec![Bytes::from(record(b"x")), Bytes::from(record(b"yz"))];
        sink.send(Message::process(parts.clone())).unwrap();
        sink.send(codec::batch(&parts).unwrap()).unwrap();
        sink.send(Message::barrier(Vec::new())).unwrap();
        sink.send(Message::end()).unwrap();
        sink.disconnect().unwrap();

        assert_eq!(sink.records_written(), 4);
        assert_eq!(sink.bytes_written(), 22);
        let expected = file_of(&["x", "yz", "x", "yz"]);
        assert_eq!(sink.into_inner(), expected);
    }

    #[test]
    fn test_file_round_trip() {
        let dir = tempfile::tempdir().unwrap();
        let input = dir.path().join("in.rec");
        std::fs::write(&input, file_of(&["one", "two"])).unwrap();

        let mut source = RecordFileSource::open(&input, &single()).unwrap();
        let output = dir.path().join("out.rec");
        let mut sink = RecordWriterSink::create(&output).unwrap();
        loop {
            let item = source.read().unwrap();
            if item.is_end() {
                break;
            }
            sink.send(Message::process(vec![item.into_bytes()])).unwrap();
        }
        sink.disconnect().unwrap();

        assert_eq!(std::fs::read(&output).unwrap(), std::fs::read(&input).unwrap());
    }

    #[test]
    fn test_open_missing_file() {
        let err = RecordFileSource::open("/no/such/records.bin", &single()).err().unwrap();
        assert!(matches!(err, PipelineError::Io(_)));
    }
}

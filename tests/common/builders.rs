//! Test data builders for records and record files

use bytes::Bytes;

/// Encode one record around `body`.
pub fn record(body: &[u8]) -> Bytes {
    let mut raw = ((body.len() + 4) as u32).to_le_bytes().to_vec();
    raw.extend_from_slice(body);
    Bytes::from(raw)
}

/// Record whose body is `index` as 8 little-endian bytes.
pub fn numbered(index: u64) -> Bytes {
    record(&index.to_le_bytes())
}

/// Read back the index of a [`numbered`] record.
pub fn number_of(record: &[u8]) -> u64 {
    let body: [u8; 8] = record[4..12].try_into().expect("numbered record");
    u64::from_le_bytes(body)
}

/// Builder for the bytes of a record file
#[derive(Default)]
pub struct RecordFileBuilder {
    data: Vec<u8>,
    count: usize,
}

impl RecordFileBuilder {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn record(mut self, body: &[u8]) -> Self {
        self.data.extend_from_slice(&record(body));
        self.count += 1;
        self
    }

    /// Append records `0..n` built by [`numbered`].
    pub fn numbered(mut self, n: u64) -> Self {
        for index in 0..n {
            self.data.extend_from_slice(&numbered(index));
            self.count += 1;
        }
        self
    }

    /// Append raw bytes, e.g. a truncated record.
    pub fn raw(mut self, bytes: &[u8]) -> Self {
        self.data.extend_from_slice(bytes);
        self
    }

    pub fn count(&self) -> usize {
        self.count
    }

    pub fn build(self) -> Vec<u8> {
        self.data
    }
}

/// Split a record file's bytes back into records.
pub fn split_file(mut data: &[u8]) -> Vec<Vec<u8>> {
    let mut records = Vec::new();
    while data.len() >= 4 {
        let size = u32::from_le_bytes(data[..4].try_into().expect("prefix")) as usize;
        records.push(data[..size].to_vec());
        data = &data[size..];
    }
    assert!(data.is_empty(), "trailing bytes in record file");
    records
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_record_file_builder() {
        let builder = RecordFileBuilder::new().record(b"ab").numbered(2);
        assert_eq!(builder.count(), 3);
        let records = split_file(&builder.build());
        assert_eq!(records.len(), 3);
        assert_eq!(records[0], record(b"ab").to_vec());
        assert_eq!(number_of(&records[2]), 1);
    }
}

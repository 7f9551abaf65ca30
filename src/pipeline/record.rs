//! Length-prefixed records and record blocks.
//!
//! A record is an opaque blob whose first 4 bytes (little-endian `u32`)
//! hold its total size, prefix included. Nothing else about a record is
//! interpreted here.

use crate::pipeline::error::{PipelineError, PipelineResult};
use bytes::Bytes;

/// Size of the record length prefix.
pub const LENGTH_PREFIX_SIZE: usize = 4;

/// Total size of the record starting at `bytes`, or `None` if fewer than
/// four bytes are available.
#[inline]
pub fn record_size(bytes: &[u8]) -> Option<usize> {
    let prefix: [u8; LENGTH_PREFIX_SIZE] = bytes.get(..LENGTH_PREFIX_SIZE)?.try_into().ok()?;
    Some(u32::from_le_bytes(prefix) as usize)
}

/// True when `bytes` holds exactly one record.
#[inline]
pub fn is_whole_record(bytes: &[u8]) -> bool {
    record_size(bytes) == Some(bytes.len())
}

/// Split a block of back-to-back records into zero-copy slices.
///
/// The block must contain exactly `count` records and nothing else.
pub fn split_records(block: &Bytes, count: u32) -> PipelineResult<Vec<Bytes>> {
    // A count read off the wire is not trusted for the allocation size.
    let mut records = Vec::with_capacity((count as usize).min(block.len() / LENGTH_PREFIX_SIZE));
    let mut offset = 0;
    for index in 0..count {
        let size = next_record_size(&block[offset..]).map_err(|reason| {
            PipelineError::protocol(format!("record {} of {}: {}", index, count, reason))
        })?;
        records.push(block.slice(offset..offset + size));
        offset += size;
    }
    if offset != block.len() {
        return Err(PipelineError::protocol(format!(
            "block holds {} trailing bytes after {} records",
            block.len() - offset,
            count
        )));
    }
    Ok(records)
}

/// Number of whole records in `block`. Fails on a truncated tail.
pub fn count_records(block: &[u8]) -> PipelineResult<u32> {
    let mut offset = 0;
    let mut count = 0u32;
    while offset < block.len() {
        let size = next_record_size(&block[offset..]).map_err(|reason| {
            PipelineError::protocol(format!("record {} in block: {}", count, reason))
        })?;
        offset += size;
        count += 1;
    }
    Ok(count)
}

fn next_record_size(rest: &[u8]) -> Result<usize, String> {
    let size = record_size(rest).ok_or_else(|| format!("only {} bytes left", rest.len()))?;
    if size < LENGTH_PREFIX_SIZE {
        return Err(format!("size {} is smaller than the length prefix", size));
    }
    if size > rest.len() {
        return Err(format!("size {} exceeds the {} bytes left", size, rest.len()));
    }
    Ok(size)
}

/// One raw record as read from a data source. The empty item marks the end
/// of the stream.
#[derive(Clone, PartialEq, Eq, Debug, Default)]
pub struct RawItem(Bytes);

impl RawItem {
    pub fn new(bytes: Bytes) -> Self {
        Self(bytes)
    }

    /// The end-of-stream sentinel.
    pub fn end() -> Self {
        Self(Bytes::new())
    }

    #[inline]
    pub fn is_end(&self) -> bool {
        self.0.is_empty()
    }

    #[inline]
    pub fn len(&self) -> usize {
        self.0.len()
    }

    #[inline]
    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    pub fn as_bytes(&self) -> &Bytes {
        &self.0
    }

    pub fn into_bytes(self) -> Bytes {
        self.0
    }
}

/// A batch of records: `item_count` records in `byte_count` bytes of `data`.
#[derive(Clone, PartialEq, Eq, Debug, Default)]
pub struct DataDescriptor {
    pub item_count: u32,
    pub byte_count: u32,
    pub data: Bytes,
}

impl DataDescriptor {
    /// Validate `data` as exactly `item_count` records.
    pub fn from_block(item_count: u32, data: Bytes) -> PipelineResult<Self> {
        split_records(&data, item_count)?;
        Self::sized(item_count, data)
    }

    /// Concatenate records into a single block.
    pub fn pack(records: &[Bytes]) -> PipelineResult<Self> {
        let total: usize = records.iter().map(Bytes::len).sum();
        let mut block: Vec<u8> = Vec::new();
        block.try_reserve_exact(total).map_err(|e| {
            PipelineError::AllocationFailure(format!("{} byte record block: {}", total, e))
        })?;
        for record in records {
            block.extend_from_slice(record);
        }
        Self::sized(records.len() as u32, Bytes::from(block))
    }

    fn sized(item_count: u32, data: Bytes) -> PipelineResult<Self> {
        let byte_count = u32::try_from(data.len()).map_err(|_| {
            PipelineError::protocol(format!("record block of {} bytes is too large", data.len()))
        })?;
        Ok(Self {
            item_count,
            byte_count,
            data,
        })
    }

    /// Per-record views into the block. No bytes are copied.
    pub fn records(&self) -> PipelineResult<Vec<Bytes>> {
        split_records(&self.data, self.item_count)
    }

    /// The 4-byte little-endian item count frame.
    pub fn count_bytes(&self) -> Bytes {
        Bytes::copy_from_slice(&self.item_count.to_le_bytes())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use bytes::{BufMut, BytesMut};

    fn record(body: &[u8]) -> Bytes {
        let mut buf = BytesMut::with_capacity(body.len() + LENGTH_PREFIX_SIZE);
        buf.put_u32_le((body.len() + LENGTH_PREFIX_SIZE) as u32);
        buf.put_slice(body);
        buf.freeze()
    }

    #[test]
    fn test_record_size() {
        assert_eq!(record_size(&record(b"abc")), Some(7));
        assert_eq!(record_size(&[1, 2]), None);
        assert!(is_whole_record(&record(b"")));
        assert!(!is_whole_record(&[9, 0, 0, 0, 1]));
    }

    #[test]
    fn test_pack_and_split() {
        let records = vec![record(b"one"), record(b"three"), record(b"")];
        let desc = DataDescriptor::pack(&records).unwrap();
        assert_eq!(desc.item_count, 3);
        assert_eq!(desc.byte_count as usize, 7 + 9 + 4);
        assert_eq!(desc.records().unwrap(), records);
    }

    #[test]
    fn test_split_rejects_trailing_bytes() {
        let mut block = BytesMut::new();
        block.put_slice(&record(b"x"));
        block.put_u8(0xAA);
        let err = split_records(&block.freeze(), 1).unwrap_err();
        assert!(matches!(err, PipelineError::ProtocolViolation(_)));
    }

    #[test]
    fn test_split_rejects_short_block() {
        let block = record(b"abc");
        assert!(split_records(&block, 2).is_err());
    }

    #[test]
    fn test_split_rejects_zero_sized_record() {
        let block = Bytes::from_static(&[0, 0, 0, 0]);
        assert!(split_records(&block, 1).is_err());
    }

    #[test]
    fn test_count_records() {
        let desc = DataDescriptor::pack(&[record(b"a"), record(b"bb")]).unwrap();
        assert_eq!(count_records(&desc.data).unwrap(), 2);
        assert!(count_records(&desc.data[..desc.data.len() - 1]).is_err());
        assert_eq!(count_records(&[]).unwrap(), 0);
    }

    #[test]
    fn test_raw_item_end() {
        assert!(RawItem::end().is_end());
        assert!(!RawItem::new(record(b"z")).is_end());
    }

    use proptest::prelude::*;

    proptest! {
        #[test]
        fn test_unpack_yields_every_record_in_order(
            bodies in prop::collection::vec(prop::collection::vec(any::<u8>(), 0..64), 0..40)
        ) {
            let records: Vec<Bytes> = bodies.iter().map(|b| record(b)).collect();
            let desc = DataDescriptor::pack(&records).unwrap();
            let unpacked = desc.records().unwrap();

            // Property: exactly K records, original order, sizes sum to the byte count
            prop_assert_eq!(unpacked.len(), records.len());
            prop_assert_eq!(&unpacked, &records);
            let total: usize = unpacked.iter().map(|r| r.len()).sum();
            prop_assert_eq!(total, desc.byte_count as usize);
        }
    }
}

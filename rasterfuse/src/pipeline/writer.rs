//! Destination packet sink.
//!
//! The packet file format lives outside this crate; the pipeline only needs
//! an append-with-checksum call. [`MemoryPacketWriter`] keeps records in
//! memory for tests and embedding.

use flate2::Crc;

use crate::coord::TileAddress;
use crate::error::WriteError;

/// Append-only record sink driven by the write stage.
pub trait PacketWriter: Send {
    /// Append `buf` for `addr` followed by its CRC-32 and return the offset
    /// the record starts at.
    fn write_append_crc(
        &mut self,
        addr: TileAddress,
        buf: &[u8],
        attribution_id: u32,
    ) -> Result<u64, WriteError>;
}

/// One appended record.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PacketRecord {
    pub addr: TileAddress,
    pub offset: u64,
    pub crc: u32,
    pub attribution_id: u32,
    pub data: Vec<u8>,
}

/// [`PacketWriter`] that keeps every record in memory.
#[derive(Debug, Default)]
pub struct MemoryPacketWriter {
    records: Vec<PacketRecord>,
    next_offset: u64,
}

impl MemoryPacketWriter {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn records(&self) -> &[PacketRecord] {
        &self.records
    }

    pub fn into_records(self) -> Vec<PacketRecord> {
        self.records
    }

    pub fn len(&self) -> usize {
        self.records.len()
    }

    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }

    /// Total bytes appended, checksums included.
    pub fn bytes_written(&self) -> u64 {
        self.next_offset
    }
}

/// Size of the trailing checksum.
const CRC_LEN: u64 = 4;

impl PacketWriter for MemoryPacketWriter {
    fn write_append_crc(
        &mut self,
        addr: TileAddress,
        buf: &[u8],
        attribution_id: u32,
    ) -> Result<u64, WriteError> {
        let mut crc = Crc::new();
        crc.update(buf);
        let offset = self.next_offset;
        self.records.push(PacketRecord {
            addr,
            offset,
            crc: crc.sum(),
            attribution_id,
            data: buf.to_vec(),
        });
        self.next_offset += buf.len() as u64 + CRC_LEN;
        Ok(offset)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_offsets_accumulate_with_crc() {
        let mut writer = MemoryPacketWriter::new();
        let a = writer
            .write_append_crc(TileAddress::new(1, 0, 0), &[1, 2, 3], 7)
            .unwrap();
        let b = writer
            .write_append_crc(TileAddress::new(1, 0, 1), &[4], 0)
            .unwrap();
        assert_eq!(a, 0);
        assert_eq!(b, 7);
        assert_eq!(writer.bytes_written(), 12);
        assert_eq!(writer.records()[0].attribution_id, 7);
    }

    #[test]
    fn test_crc_matches_known_value() {
        let mut writer = MemoryPacketWriter::new();
        writer
            .write_append_crc(TileAddress::new(0, 0, 0), b"123456789", 0)
            .unwrap();
        assert_eq!(writer.records()[0].crc, 0xCBF4_3926);
    }
}

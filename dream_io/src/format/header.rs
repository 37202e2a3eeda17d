//! State-dict file header definition.

/// Magic bytes for state-dict files.
pub const STATE_DICT_MAGIC: [u8; 4] = *b"DRSD";

/// Current format version.
pub const STATE_DICT_VERSION: u16 = 1;

/// Header size in bytes.
pub const HEADER_SIZE: usize = 16;

/// State-dict file header.
///
/// Layout (16 bytes total):
/// - Bytes 0-3: Magic "DRSD"
/// - Bytes 4-5: version (u16 LE)
/// - Bytes 6-7: flags (u16 LE)
/// - Bytes 8-11: num_entries (u32 LE)
/// - Bytes 12-15: reserved
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct StateDictHeader {
    /// Magic bytes "DRSD".
    pub magic: [u8; 4],
    /// Format version.
    pub version: u16,
    /// Flags (reserved for future use).
    pub flags: u16,
    /// Number of tensor entries that follow.
    pub num_entries: u32,
    /// Reserved bytes.
    pub reserved: [u8; 4],
}

impl StateDictHeader {
    /// Create a header for `num_entries` tensors.
    pub fn new(num_entries: u32) -> Self {
        Self {
            magic: STATE_DICT_MAGIC,
            version: STATE_DICT_VERSION,
            flags: 0,
            num_entries,
            reserved: [0; 4],
        }
    }

    /// Validate the header magic bytes.
    pub fn is_valid(&self) -> bool {
        self.magic == STATE_DICT_MAGIC
    }

    /// Serialize the header to a byte array.
    pub fn to_bytes(&self) -> [u8; HEADER_SIZE] {
        let mut bytes = [0u8; HEADER_SIZE];
        bytes[0..4].copy_from_slice(&self.magic);
        bytes[4..6].copy_from_slice(&self.version.to_le_bytes());
        bytes[6..8].copy_from_slice(&self.flags.to_le_bytes());
        bytes[8..12].copy_from_slice(&self.num_entries.to_le_bytes());
        bytes[12..16].copy_from_slice(&self.reserved);
        bytes
    }

    /// Deserialize a header from a byte array.
    pub fn from_bytes(bytes: &[u8; HEADER_SIZE]) -> Self {
        let mut magic = [0u8; 4];
        magic.copy_from_slice(&bytes[0..4]);
        let mut reserved = [0u8; 4];
        reserved.copy_from_slice(&bytes[12..16]);

        Self {
            magic,
            version: u16::from_le_bytes([bytes[4], bytes[5]]),
            flags: u16::from_le_bytes([bytes[6], bytes[7]]),
            num_entries: u32::from_le_bytes([bytes[8], bytes[9], bytes[10], bytes[11]]),
            reserved,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_header_layout() {
        let bytes = StateDictHeader::new(3).to_bytes();
        assert_eq!(&bytes[0..4], b"DRSD");
        assert_eq!(u16::from_le_bytes([bytes[4], bytes[5]]), STATE_DICT_VERSION);
        assert_eq!(u32::from_le_bytes([bytes[8], bytes[9], bytes[10], bytes[11]]), 3);
        assert_eq!(StateDictHeader::from_bytes(&bytes), StateDictHeader::new(3));
    }

    #[test]
    fn test_header_magic() {
        let mut header = StateDictHeader::new(1);
        assert!(header.is_valid());
        header.magic = *b"ASHG";
        assert!(!header.is_valid());
    }
}

//! Binary container header

/// Magic bytes opening a binary container
pub const CONTAINER_MAGIC: &[u8; 4] = b"ANPK";

/// Current container format version
pub const CONTAINER_VERSION: u16 = 1;

/// Binary container header (8 bytes)
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ContainerHeader {
    pub version: u16,
    /// Reserved, must be 0
    pub reserved: u16,
}

impl ContainerHeader {
    pub const SIZE: usize = 8;

    pub fn new() -> Self {
        Self {
            version: CONTAINER_VERSION,
            reserved: 0,
        }
    }

    /// Write header to bytes
    pub fn to_bytes(&self) -> [u8; Self::SIZE] {
        let mut bytes = [0u8; Self::SIZE];
        bytes[0..4].copy_from_slice(CONTAINER_MAGIC);
        bytes[4..6].copy_from_slice(&self.version.to_le_bytes());
        bytes[6..8].copy_from_slice(&self.reserved.to_le_bytes());
        bytes
    }

    /// Read header from bytes, `None` if they do not start with the magic
    pub fn from_bytes(bytes: &[u8]) -> Option<Self> {
        if bytes.len() < Self::SIZE || !is_binary(bytes) {
            return None;
        }
        Some(Self {
            version: u16::from_le_bytes([bytes[4], bytes[5]]),
            reserved: u16::from_le_bytes([bytes[6], bytes[7]]),
        })
    }
}

impl Default for ContainerHeader {
    fn default() -> Self {
        Self::new()
    }
}

/// Do these bytes start like a binary container?
pub fn is_binary(bytes: &[u8]) -> bool {
    bytes.starts_with(CONTAINER_MAGIC)
}

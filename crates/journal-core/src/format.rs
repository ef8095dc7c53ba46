//! On-device layout: header, entry slots, and the payload record they carry.
//!
//! Everything here is little-endian and hand-serialized field by field —
//! no struct punning, no `#[repr(C)]` reinterpretation of raw bytes. The
//! layout is a durability contract; a different byte order or field order
//! makes an on-disk journal unreadable by any other implementation.

use thiserror::Error;

/// Total size of the backing device, in bytes.
pub const DEVICE_SIZE: u64 = 8 * 1024 * 1024;
/// Bytes at the front of the device reserved for the header.
pub const RESERVED: u64 = 4096;
/// Size of one entry slot, in bytes.
pub const ENTRY_SIZE: u64 = 4096;
/// Number of entry slots the device holds.
pub const NUM_ENTRIES: u64 = (DEVICE_SIZE - RESERVED) / ENTRY_SIZE;
/// Header/entry magic: ASCII "JNL0".
pub const MAGIC: u32 = 0x4A4E_4C30;
/// On-disk format version understood by this implementation.
pub const VERSION: u32 = 1;
/// Maximum length, including the NUL terminator, of a textual field.
pub const MAX_FIELD_LEN: usize = 256;

/// Wire size of the header: 4 + 4 + 8 + 8 + 4 bytes of fields, padded to 32.
pub const HEADER_WIRE_SIZE: usize = 32;

const ENTRY_PREFIX_SIZE: usize = 8; // magic + version
const ENTRY_CRC_SIZE: usize = 4;
const PAYLOAD_WIRE_SIZE: usize = 1624;
const ENTRY_PADDING_SIZE: usize =
    ENTRY_SIZE as usize - ENTRY_PREFIX_SIZE - PAYLOAD_WIRE_SIZE - ENTRY_CRC_SIZE;

const _: () = assert!(ENTRY_PREFIX_SIZE + PAYLOAD_WIRE_SIZE + ENTRY_PADDING_SIZE + ENTRY_CRC_SIZE
    == ENTRY_SIZE as usize);

/// Errors raised while decoding bytes read off the device.
///
/// These never reach a filesystem caller directly (see the crate's
/// `Error` type for the boundary contract); they are consumed internally
/// by the raw writer and the replayer to decide empty-but-recoverable vs.
/// hard-fail vs. abort-the-scan.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum FormatError {
    #[error("buffer too short: expected {expected}, got {actual}")]
    ShortBuffer { expected: usize, actual: usize },
    #[error("bad magic: {0:#x}")]
    BadMagic(u32),
    #[error("unsupported version: {0}")]
    BadVersion(u32),
    #[error("crc mismatch: stored {stored:#x}, computed {computed:#x}")]
    CrcMismatch { stored: u32, computed: u32 },
    #[error("index out of range: {0} >= {NUM_ENTRIES}")]
    IndexOutOfRange(u64),
}

/// The 32-byte record at device offset 0.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Header {
    pub magic: u32,
    pub version: u32,
    pub start_index: u64,
    pub end_index: u64,
    pub crc32: u32,
}

impl Header {
    /// Builds a header for the given indices with its CRC freshly computed.
    pub fn new(start_index: u64, end_index: u64) -> Self {
        let mut header = Self {
            magic: MAGIC,
            version: VERSION,
            start_index,
            end_index,
            crc32: 0,
        };
        header.crc32 = crc32(&header.bytes_for_crc());
        header
    }

    /// An empty header with both indices at zero, as used after a reset.
    pub fn empty() -> Self {
        Self::new(0, 0)
    }

    fn bytes_for_crc(&self) -> [u8; HEADER_WIRE_SIZE] {
        let mut zeroed = *self;
        zeroed.crc32 = 0;
        zeroed.to_bytes()
    }

    pub fn to_bytes(self) -> [u8; HEADER_WIRE_SIZE] {
        let mut buf = [0u8; HEADER_WIRE_SIZE];
        buf[0..4].copy_from_slice(&self.magic.to_le_bytes());
        buf[4..8].copy_from_slice(&self.version.to_le_bytes());
        buf[8..16].copy_from_slice(&self.start_index.to_le_bytes());
        buf[16..24].copy_from_slice(&self.end_index.to_le_bytes());
        buf[24..28].copy_from_slice(&self.crc32.to_le_bytes());
        // buf[28..32] stays zero padding.
        buf
    }

    pub fn from_bytes(buf: &[u8]) -> Result<Self, FormatError> {
        if buf.len() < HEADER_WIRE_SIZE {
            return Err(FormatError::ShortBuffer {
                expected: HEADER_WIRE_SIZE,
                actual: buf.len(),
            });
        }
        let magic = u32::from_le_bytes(buf[0..4].try_into().unwrap());
        let version = u32::from_le_bytes(buf[4..8].try_into().unwrap());
        let start_index = u64::from_le_bytes(buf[8..16].try_into().unwrap());
        let end_index = u64::from_le_bytes(buf[16..24].try_into().unwrap());
        let crc32 = u32::from_le_bytes(buf[24..28].try_into().unwrap());
        Ok(Self {
            magic,
            version,
            start_index,
            end_index,
            crc32,
        })
    }

    /// Validates magic, version, index range and CRC in that order.
    pub fn validate(&self) -> Result<(), FormatError> {
        if self.magic != MAGIC {
            return Err(FormatError::BadMagic(self.magic));
        }
        if self.version != VERSION {
            return Err(FormatError::BadVersion(self.version));
        }
        if self.start_index >= NUM_ENTRIES {
            return Err(FormatError::IndexOutOfRange(self.start_index));
        }
        if self.end_index >= NUM_ENTRIES {
            return Err(FormatError::IndexOutOfRange(self.end_index));
        }
        let computed = crc32(&self.bytes_for_crc());
        if computed != self.crc32 {
            return Err(FormatError::CrcMismatch {
                stored: self.crc32,
                computed,
            });
        }
        Ok(())
    }
}

/// One metadata-mutation event, fixed size on the wire.
///
/// Text fields are owned `String`s in memory; they are only truncated and
/// NUL-padded at the wire boundary (`to_bytes`/`from_bytes`), never in
/// between, so in-process callers keep normal `String` ergonomics.
#[derive(Debug, Clone, PartialEq, serde::Serialize, serde::Deserialize)]
pub struct Payload {
    pub tx_id: u64,
    pub timestamp_ms: u64,
    pub parent_ino: u32,
    pub src_parent_ino: u32,
    pub dst_parent_ino: u32,
    pub ino: u32,
    pub st_mode: u32,
    pub st_size: u64,
    pub st_nlink: u64,
    pub st_blocks: u64,
    pub mtime: i64,
    pub ctime: i64,
    pub uid: u32,
    pub gid: u32,
    pub has_mode: bool,
    pub has_size: bool,
    pub has_uid: bool,
    pub has_gid: bool,
    pub action: String,
    pub name: String,
    pub old_name: String,
    pub new_name: String,
    pub target: String,
    pub extra: String,
}

impl Default for Payload {
    fn default() -> Self {
        Self {
            tx_id: 0,
            timestamp_ms: 0,
            parent_ino: 0,
            src_parent_ino: 0,
            dst_parent_ino: 0,
            ino: 0,
            st_mode: 0,
            st_size: 0,
            st_nlink: 0,
            st_blocks: 0,
            mtime: -1,
            ctime: -1,
            uid: 0,
            gid: 0,
            has_mode: false,
            has_size: false,
            has_uid: false,
            has_gid: false,
            action: String::new(),
            name: String::new(),
            old_name: String::new(),
            new_name: String::new(),
            target: String::new(),
            extra: String::new(),
        }
    }
}

impl Payload {
    pub fn to_bytes(&self) -> [u8; PAYLOAD_WIRE_SIZE] {
        let mut buf = [0u8; PAYLOAD_WIRE_SIZE];
        let mut at = 0;
        macro_rules! put {
            ($v:expr) => {{
                let bytes = $v.to_le_bytes();
                buf[at..at + bytes.len()].copy_from_slice(&bytes);
                at += bytes.len();
            }};
        }
        put!(self.tx_id);
        put!(self.timestamp_ms);
        put!(self.parent_ino);
        put!(self.src_parent_ino);
        put!(self.dst_parent_ino);
        put!(self.ino);
        put!(self.st_mode);
        put!(self.st_size);
        put!(self.st_nlink);
        put!(self.st_blocks);
        put!(self.mtime);
        put!(self.ctime);
        put!(self.uid);
        put!(self.gid);
        buf[at] = u8::from(self.has_mode);
        at += 1;
        buf[at] = u8::from(self.has_size);
        at += 1;
        buf[at] = u8::from(self.has_uid);
        at += 1;
        buf[at] = u8::from(self.has_gid);
        at += 1;
        write_field(&mut buf[at..at + MAX_FIELD_LEN], &self.action);
        at += MAX_FIELD_LEN;
        write_field(&mut buf[at..at + MAX_FIELD_LEN], &self.name);
        at += MAX_FIELD_LEN;
        write_field(&mut buf[at..at + MAX_FIELD_LEN], &self.old_name);
        at += MAX_FIELD_LEN;
        write_field(&mut buf[at..at + MAX_FIELD_LEN], &self.new_name);
        at += MAX_FIELD_LEN;
        write_field(&mut buf[at..at + MAX_FIELD_LEN], &self.target);
        at += MAX_FIELD_LEN;
        write_field(&mut buf[at..at + MAX_FIELD_LEN], &self.extra);
        at += MAX_FIELD_LEN;
        debug_assert_eq!(at, PAYLOAD_WIRE_SIZE);
        buf
    }

    pub fn from_bytes(buf: &[u8]) -> Result<Self, FormatError> {
        if buf.len() != PAYLOAD_WIRE_SIZE {
            return Err(FormatError::ShortBuffer {
                expected: PAYLOAD_WIRE_SIZE,
                actual: buf.len(),
            });
        }
        let mut at = 0;
        macro_rules! take {
            ($ty:ty) => {{
                let size = std::mem::size_of::<$ty>();
                let value = <$ty>::from_le_bytes(buf[at..at + size].try_into().unwrap());
                at += size;
                value
            }};
        }
        let tx_id = take!(u64);
        let timestamp_ms = take!(u64);
        let parent_ino = take!(u32);
        let src_parent_ino = take!(u32);
        let dst_parent_ino = take!(u32);
        let ino = take!(u32);
        let st_mode = take!(u32);
        let st_size = take!(u64);
        let st_nlink = take!(u64);
        let st_blocks = take!(u64);
        let mtime = take!(i64);
        let ctime = take!(i64);
        let uid = take!(u32);
        let gid = take!(u32);
        let has_mode = buf[at] != 0;
        at += 1;
        let has_size = buf[at] != 0;
        at += 1;
        let has_uid = buf[at] != 0;
        at += 1;
        let has_gid = buf[at] != 0;
        at += 1;
        let action = read_field(&buf[at..at + MAX_FIELD_LEN]);
        at += MAX_FIELD_LEN;
        let name = read_field(&buf[at..at + MAX_FIELD_LEN]);
        at += MAX_FIELD_LEN;
        let old_name = read_field(&buf[at..at + MAX_FIELD_LEN]);
        at += MAX_FIELD_LEN;
        let new_name = read_field(&buf[at..at + MAX_FIELD_LEN]);
        at += MAX_FIELD_LEN;
        let target = read_field(&buf[at..at + MAX_FIELD_LEN]);
        at += MAX_FIELD_LEN;
        let extra = read_field(&buf[at..at + MAX_FIELD_LEN]);
        at += MAX_FIELD_LEN;
        debug_assert_eq!(at, PAYLOAD_WIRE_SIZE);
        Ok(Self {
            tx_id,
            timestamp_ms,
            parent_ino,
            src_parent_ino,
            dst_parent_ino,
            ino,
            st_mode,
            st_size,
            st_nlink,
            st_blocks,
            mtime,
            ctime,
            uid,
            gid,
            has_mode,
            has_size,
            has_uid,
            has_gid,
            action,
            name,
            old_name,
            new_name,
            target,
            extra,
        })
    }
}

/// Truncates `s` to `buf.len() - 1` bytes and NUL-pads the rest.
fn write_field(buf: &mut [u8], s: &str) {
    for b in buf.iter_mut() {
        *b = 0;
    }
    let max = buf.len() - 1;
    let bytes = s.as_bytes();
    let take = bytes.len().min(max);
    buf[..take].copy_from_slice(&bytes[..take]);
    // buf[take] and beyond stay zero: the NUL terminator, plus padding.
}

/// Reads a NUL-terminated, NUL-padded field back into an owned `String`,
/// lossily substituting any non-UTF-8 bytes (the wire format makes no
/// UTF-8 guarantee, but every writer in this crate only ever stores UTF-8).
fn read_field(buf: &[u8]) -> String {
    let len = buf.iter().position(|&b| b == 0).unwrap_or(buf.len());
    String::from_utf8_lossy(&buf[..len]).into_owned()
}

/// An encoded, on-device entry slot.
pub struct EncodedEntry(pub [u8; ENTRY_SIZE as usize]);

/// Encodes a payload into a full `ENTRY_SIZE` slot: magic, version, the
/// payload bytes, zero padding, then a CRC32 over the payload region only.
pub fn encode_entry(payload: &Payload) -> EncodedEntry {
    let mut buf = [0u8; ENTRY_SIZE as usize];
    buf[0..4].copy_from_slice(&MAGIC.to_le_bytes());
    buf[4..8].copy_from_slice(&VERSION.to_le_bytes());
    let payload_bytes = payload.to_bytes();
    let payload_region = ENTRY_PREFIX_SIZE..ENTRY_PREFIX_SIZE + PAYLOAD_WIRE_SIZE;
    buf[payload_region.clone()].copy_from_slice(&payload_bytes);
    // buf[payload_region.end .. ENTRY_SIZE - 4] stays zero padding.
    let crc = crc32(&buf[payload_region]);
    let crc_at = ENTRY_SIZE as usize - ENTRY_CRC_SIZE;
    buf[crc_at..].copy_from_slice(&crc.to_le_bytes());
    EncodedEntry(buf)
}

/// Decodes and fully validates one on-device entry slot.
pub fn decode_entry(buf: &[u8]) -> Result<Payload, FormatError> {
    if buf.len() != ENTRY_SIZE as usize {
        return Err(FormatError::ShortBuffer {
            expected: ENTRY_SIZE as usize,
            actual: buf.len(),
        });
    }
    let magic = u32::from_le_bytes(buf[0..4].try_into().unwrap());
    if magic != MAGIC {
        return Err(FormatError::BadMagic(magic));
    }
    let version = u32::from_le_bytes(buf[4..8].try_into().unwrap());
    if version != VERSION {
        return Err(FormatError::BadVersion(version));
    }
    let payload_region = ENTRY_PREFIX_SIZE..ENTRY_PREFIX_SIZE + PAYLOAD_WIRE_SIZE;
    let crc_at = ENTRY_SIZE as usize - ENTRY_CRC_SIZE;
    let stored_crc = u32::from_le_bytes(buf[crc_at..].try_into().unwrap());
    let computed_crc = crc32(&buf[payload_region.clone()]);
    if stored_crc != computed_crc {
        return Err(FormatError::CrcMismatch {
            stored: stored_crc,
            computed: computed_crc,
        });
    }
    Payload::from_bytes(&buf[payload_region])
}

const fn crc32_table() -> [u32; 256] {
    let mut table = [0u32; 256];
    let mut n = 0;
    while n < 256 {
        let mut c = n as u32;
        let mut k = 0;
        while k < 8 {
            c = if c & 1 != 0 {
                0xEDB8_8320 ^ (c >> 1)
            } else {
                c >> 1
            };
            k += 1;
        }
        table[n] = c;
        n += 1;
    }
    table
}

static CRC32_TABLE: [u32; 256] = crc32_table();

/// CRC32 (IEEE 802.3 polynomial, reflected) over `data`.
pub(crate) fn crc32(data: &[u8]) -> u32 {
    let mut crc = 0xFFFF_FFFFu32;
    for &byte in data {
        let idx = ((crc ^ u32::from(byte)) & 0xFF) as usize;
        crc = CRC32_TABLE[idx] ^ (crc >> 8);
    }
    !crc
}

#[cfg(test)]
mod format_tests;

// directory.rs - ABIF header and directory table

use serde::Serialize;

use crate::error::ParseError;

/// Magic bytes at the start of every ABIF file
pub const SIGNATURE: &[u8; 4] = b"ABIF";

/// Fixed header length; the root directory entry lives inside it
pub const HEADER_SIZE: usize = 128;

/// Size of one directory entry
pub const DIR_ENTRY_SIZE: usize = 28;

/// Offset of the root directory entry inside the header
const ROOT_ENTRY_OFFSET: usize = 6;

/// Offset of the data/inline field inside a directory entry
const DATA_FIELD_OFFSET: usize = 20;

pub(crate) fn be_u16(bytes: &[u8], offset: usize) -> Option<u16> {
    let raw = bytes.get(offset..offset.checked_add(2)?)?;
    Some(u16::from_be_bytes([raw[0], raw[1]]))
}

pub(crate) fn be_i16(bytes: &[u8], offset: usize) -> Option<i16> {
    be_u16(bytes, offset).map(|v| v as i16)
}

pub(crate) fn be_i32(bytes: &[u8], offset: usize) -> Option<i32> {
    let raw = bytes.get(offset..offset.checked_add(4)?)?;
    Some(i32::from_be_bytes([raw[0], raw[1], raw[2], raw[3]]))
}

/// ABIF element type codes
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum ElementType {
    Byte,
    Char,
    Word,
    Short,
    Long,
    Float,
    Double,
    Date,
    Time,
    Bool,
    PString,
    CString,
    Other(i16),
}

impl ElementType {
    pub fn from_code(code: i16) -> Self {
        match code {
            1 => ElementType::Byte,
            2 => ElementType::Char,
            3 => ElementType::Word,
            4 => ElementType::Short,
            5 => ElementType::Long,
            7 => ElementType::Float,
            8 => ElementType::Double,
            10 => ElementType::Date,
            11 => ElementType::Time,
            13 => ElementType::Bool,
            18 => ElementType::PString,
            19 => ElementType::CString,
            other => ElementType::Other(other),
        }
    }

    pub fn name(&self) -> String {
        match self {
            ElementType::Byte => "byte".to_string(),
            ElementType::Char => "char".to_string(),
            ElementType::Word => "word".to_string(),
            ElementType::Short => "short".to_string(),
            ElementType::Long => "long".to_string(),
            ElementType::Float => "float".to_string(),
            ElementType::Double => "double".to_string(),
            ElementType::Date => "date".to_string(),
            ElementType::Time => "time".to_string(),
            ElementType::Bool => "bool".to_string(),
            ElementType::PString => "pString".to_string(),
            ElementType::CString => "cString".to_string(),
            ElementType::Other(code) => format!("type{}", code),
        }
    }
}

/// One 28-byte directory record
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct DirEntry {
    pub name: String,
    pub number: i32,
    pub element_type: i16,
    pub element_size: i16,
    pub num_elements: i32,
    pub data_size: i32,
    pub data_offset: i32,
    pub handle: i32,
    /// Position of this record in the file
    pub entry_offset: usize,
}

impl DirEntry {
    /// Parse a record at `offset`; `None` if it does not fit in `bytes`
    pub fn parse(bytes: &[u8], offset: usize) -> Option<Self> {
        let raw = bytes.get(offset..offset.checked_add(DIR_ENTRY_SIZE)?)?;
        let name = raw[0..4]
            .iter()
            .map(|&b| if b.is_ascii_graphic() { b as char } else { '?' })
            .collect();

        Some(Self {
            name,
            number: be_i32(raw, 4)?,
            element_type: be_i16(raw, 8)?,
            element_size: be_i16(raw, 10)?,
            num_elements: be_i32(raw, 12)?,
            data_size: be_i32(raw, 16)?,
            data_offset: be_i32(raw, 20)?,
            handle: be_i32(raw, 24)?,
            entry_offset: offset,
        })
    }

    /// Tag name plus number, e.g. `DATA105`
    pub fn tag(&self) -> String {
        format!("{}{}", self.name, self.number)
    }

    pub fn kind(&self) -> ElementType {
        ElementType::from_code(self.element_type)
    }

    /// Payloads of 4 bytes or less are stored in the offset field itself
    pub fn is_inline(&self) -> bool {
        (0..=4).contains(&self.data_size)
    }

    /// Borrow this entry's payload, refusing anything outside `file`
    pub fn data<'a>(&self, file: &'a [u8]) -> Result<&'a [u8], ParseError> {
        let out_of_bounds = |offset: usize, size: usize| ParseError::TagOutOfBounds {
            tag: self.tag(),
            offset,
            size,
            file_len: file.len(),
        };

        let size = usize::try_from(self.data_size)
            .map_err(|_| out_of_bounds(self.data_offset.max(0) as usize, 0))?;

        let start = if self.is_inline() {
            self.entry_offset + DATA_FIELD_OFFSET
        } else {
            usize::try_from(self.data_offset).map_err(|_| out_of_bounds(0, size))?
        };

        let end = start
            .checked_add(size)
            .ok_or_else(|| out_of_bounds(start, size))?;
        file.get(start..end).ok_or_else(|| out_of_bounds(start, size))
    }

    /// Whether the payload lies inside a file of `file_len` bytes
    pub fn in_bounds(&self, file: &[u8]) -> bool {
        self.data(file).is_ok()
    }
}

/// Decoded fixed header
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct AbifHeader {
    pub version: u16,
    pub directory_count: i32,
    pub directory_offset: i32,
    pub directory_size: i32,
}

/// Validate the signature and read the root directory entry
pub fn read_header(bytes: &[u8]) -> Result<AbifHeader, ParseError> {
    if bytes.len() < HEADER_SIZE {
        return Err(ParseError::invalid_signature(format!(
            "file is {} bytes, shorter than the {}-byte ABIF header",
            bytes.len(),
            HEADER_SIZE
        )));
    }
    if &bytes[0..4] != SIGNATURE {
        return Err(ParseError::invalid_signature(format!(
            "expected 'ABIF', found {:?}",
            String::from_utf8_lossy(&bytes[0..4])
        )));
    }

    let root = DirEntry::parse(bytes, ROOT_ENTRY_OFFSET)
        .ok_or_else(|| ParseError::invalid_signature("unreadable root directory entry"))?;
    let version = be_u16(bytes, 4)
        .ok_or_else(|| ParseError::invalid_signature("unreadable version field"))?;

    Ok(AbifHeader {
        version,
        directory_count: root.num_elements,
        directory_offset: root.data_offset,
        directory_size: root.data_size,
    })
}

/// Read every directory record that fits in the buffer.
///
/// Stops at the first record extending past the end of `bytes` and reports
/// the shortfall as a `TruncatedDirectory` warning.
pub fn read_directory(bytes: &[u8], header: &AbifHeader) -> (Vec<DirEntry>, Option<ParseError>) {
    let declared = header.directory_count.max(0) as usize;
    let mut entries = Vec::new();

    let base = match usize::try_from(header.directory_offset) {
        Ok(base) => base,
        Err(_) => {
            return (
                entries,
                (declared > 0).then_some(ParseError::TruncatedDirectory {
                    declared,
                    readable: 0,
                }),
            )
        }
    };

    for index in 0..declared {
        let entry = index
            .checked_mul(DIR_ENTRY_SIZE)
            .and_then(|rel| base.checked_add(rel))
            .and_then(|offset| DirEntry::parse(bytes, offset));
        match entry {
            Some(entry) => entries.push(entry),
            None => break,
        }
    }

    let warning = (entries.len() < declared).then(|| ParseError::TruncatedDirectory {
        declared,
        readable: entries.len(),
    });
    (entries, warning)
}

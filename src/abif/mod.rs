// mod.rs - ABIF (Applied Biosystems) container decoding

pub mod decoder;
pub mod directory;

pub use decoder::{decode, DecodedFile, FileKind, RunMetadata};
pub use directory::{
    read_directory, read_header, AbifHeader, DirEntry, ElementType, DIR_ENTRY_SIZE, HEADER_SIZE,
};

use thiserror::Error;

use crate::{
    constant_pool::{self, Tag},
    references::TagConstraint,
};

#[derive(Error, Debug)]
pub enum ClassFileError {
    #[error(transparent)]
    IOError(#[from] std::io::Error),
    #[error("Expected {0}, found {1:?}")]
    UnexpectedConstantPoolEntry(&'static str, constant_pool::CpInfo),
    #[error("Constant pool index {index} out of bounds (size {size})")]
    ConstantPoolIndexOutOfBounds { index: u16, size: usize },
    #[error("Invalid cp info tag: {0}")]
    InvalidCpInfoTag(u8),
    #[error("Invalid modified UTF-8 constant: {0}")]
    InvalidModifiedUtf8(#[from] cesu8::Cesu8DecodingError),
    #[error("Invalid magic identifier: 0x{0:X}")]
    InvalidMagicIdentifier(u32),
    #[error("Invalid element value tag: {0:?}")]
    InvalidElementValueTag(char),
    #[error("Invalid type annotation target type: 0x{0:X}")]
    InvalidTargetType(u8),
    #[error("Length {0} does not fit its length field")]
    LengthOverflow(usize),
    #[error("Attribute nesting exceeds {0} levels")]
    NestingTooDeep(usize),
}

/// Reason an attribute failed constant pool integrity checks.
#[derive(Error, Debug, Clone, PartialEq)]
pub enum ValidationError {
    #[error("Attribute name index {index} out of CP bounds (size {size})")]
    NameOutOfBounds { index: u16, size: usize },
    #[error("Attribute name index {index} does not point to a Utf8 entry")]
    NameNotUtf8 { index: u16 },
    #[error("Invalid '{name}' attribute, carries a {payload} payload")]
    PayloadMismatch {
        name: &'static str,
        payload: &'static str,
    },
    #[error("Invalid '{name}' attribute, contains CP reference {index} out of CP bounds (size {size})")]
    OutOfBounds {
        name: &'static str,
        index: u16,
        size: usize,
    },
    #[error(
        "Invalid '{}' attribute, CP reference {} expected {}, found {}",
        .name,
        .index,
        .expected,
        describe_found(.found)
    )]
    WrongTag {
        name: &'static str,
        index: u16,
        expected: TagConstraint,
        found: Option<Tag>,
    },
}

fn describe_found(found: &Option<Tag>) -> String {
    match found {
        Some(tag) => tag.to_string(),
        None => "an unusable slot".to_owned(),
    }
}

// https://docs.oracle.com/javase/specs/jvms/se19/html/jvms-4.html

mod access_flags;
pub mod attributes;
mod class_file;
#[macro_use]
pub mod constant_pool;
mod error;
mod parser;
pub mod references;
pub mod validator;
mod writer;

pub use self::class_file::{AttributeLocation, ClassFile, FieldInfo, MethodInfo};
pub use access_flags::AccessFlags;
pub use attributes::{Attribute, AttributeInfo, AttributeName};
pub use constant_pool::{ConstantPool, CpInfo, Tag};
pub use error::{ClassFileError, ValidationError};
pub use parser::{Parser, MAX_NESTING_DEPTH};
pub use references::{CpReferences, ReferencedSlot, TagConstraint};
pub use validator::{is_valid, validate};
pub use writer::Writer;

pub type Result<T, E = ClassFileError> = std::result::Result<T, E>;

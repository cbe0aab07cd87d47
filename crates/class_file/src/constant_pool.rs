use std::{collections::BTreeSet, convert::TryFrom, fmt};

use crate::{ClassFileError, Result};

#[macro_export]
macro_rules! matches_cp_info {
    ($cp:expr, $index:expr, $i:ident) => {
        match $cp.get($index)? {
            $crate::constant_pool::CpInfo::$i(ref n) => Ok(n),
            c => Err($crate::ClassFileError::UnexpectedConstantPoolEntry(
                stringify!($i),
                c.clone(),
            )),
        }
    };
}

/// The constant pool of a class file.
///
/// Entries are addressed with the 1-based indices used on disk. Long and Double entries take two
/// slots, the second of which holds [`CpInfo::Unusable`].
#[derive(Debug, Default, Clone, PartialEq)]
pub struct ConstantPool {
    cp_infos: Vec<CpInfo>,
}
impl ConstantPool {
    pub fn new(cp_infos: Vec<CpInfo>) -> Self {
        Self { cp_infos }
    }

    /// One past the highest valid index, i.e. the `constant_pool_count` stored on disk.
    pub fn size(&self) -> usize {
        self.cp_infos.len() + 1
    }

    pub fn get(&self, index: u16) -> Result<&CpInfo> {
        match index {
            0 => None,
            i => self.cp_infos.get(i as usize - 1),
        }
        .ok_or(ClassFileError::ConstantPoolIndexOutOfBounds {
            index,
            size: self.size(),
        })
    }

    pub fn get_utf8(&self, index: u16) -> Result<&str> {
        matches_cp_info!(self, index, Utf8).map(String::as_str)
    }

    /// `None` when the index addresses the second slot of a Long or Double.
    pub fn tag(&self, index: u16) -> Result<Option<Tag>> {
        Ok(self.get(index)?.tag())
    }

    /// Appends an entry and returns its index.
    ///
    /// Fails with [`ClassFileError::LengthOverflow`] once `constant_pool_count` would no longer
    /// fit in a `u16`.
    pub fn push(&mut self, cp_info: CpInfo) -> Result<u16> {
        let wide = cp_info.is_wide();
        let size = self.size() + if wide { 2 } else { 1 };
        if size > u16::MAX as usize {
            return Err(ClassFileError::LengthOverflow(size));
        }

        let index = self.size() as u16;
        self.cp_infos.push(cp_info);
        if wide {
            self.cp_infos.push(CpInfo::Unusable);
        }
        Ok(index)
    }

    pub fn iter(&self) -> std::slice::Iter<'_, CpInfo> {
        self.cp_infos.iter()
    }

    /// Expands `roots` with every index reachable through entry-to-entry references.
    ///
    /// Indices that do not resolve are kept in the result but not expanded further.
    pub fn transitive_closure(&self, roots: impl IntoIterator<Item = u16>) -> BTreeSet<u16> {
        let mut seen = BTreeSet::new();
        let mut pending: Vec<u16> = roots.into_iter().collect();

        while let Some(index) = pending.pop() {
            if index == 0 || !seen.insert(index) {
                continue;
            }
            if let Ok(cp_info) = self.get(index) {
                pending.extend(cp_info.references());
            }
        }

        seen
    }
}
impl<'a> IntoIterator for &'a ConstantPool {
    type Item = &'a CpInfo;
    type IntoIter = std::slice::Iter<'a, CpInfo>;

    fn into_iter(self) -> Self::IntoIter {
        self.cp_infos.iter()
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
#[repr(u8)]
pub enum Tag {
    Utf8 = 1,
    Integer = 3,
    Float = 4,
    Long = 5,
    Double = 6,
    Class = 7,
    String = 8,
    FieldRef = 9,
    MethodRef = 10,
    InterfaceMethodRef = 11,
    NameAndType = 12,
    MethodHandle = 15,
    MethodType = 16,
    Dynamic = 17,
    InvokeDynamic = 18,
    Module = 19,
    Package = 20,
}
impl TryFrom<u8> for Tag {
    type Error = u8;

    fn try_from(value: u8) -> std::result::Result<Self, Self::Error> {
        match value {
            1 => Ok(Tag::Utf8),
            3 => Ok(Tag::Integer),
            4 => Ok(Tag::Float),
            5 => Ok(Tag::Long),
            6 => Ok(Tag::Double),
            7 => Ok(Tag::Class),
            8 => Ok(Tag::String),
            9 => Ok(Tag::FieldRef),
            10 => Ok(Tag::MethodRef),
            11 => Ok(Tag::InterfaceMethodRef),
            12 => Ok(Tag::NameAndType),
            15 => Ok(Tag::MethodHandle),
            16 => Ok(Tag::MethodType),
            17 => Ok(Tag::Dynamic),
            18 => Ok(Tag::InvokeDynamic),
            19 => Ok(Tag::Module),
            20 => Ok(Tag::Package),
            _ => Err(value),
        }
    }
}
impl fmt::Display for Tag {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        fmt::Debug::fmt(self, f)
    }
}

#[derive(Debug, PartialEq, Clone)]
pub enum CpInfo {
    MethodRef(RefInfo),
    FieldRef(RefInfo),
    Float(f32),
    InterfaceMethodRef(RefInfo),
    Class(ClassInfo),
    NameAndType(NameAndTypeInfo),
    Utf8(String),
    String { string_index: u16 },
    Dynamic(DynamicInfo),
    InvokeDynamic(DynamicInfo),
    Integer(i32),
    MethodHandle(MethodHandleInfo),
    MethodType(MethodTypeInfo),
    Long(i64),
    Double(f64),
    Module { name_index: u16 },
    Package { name_index: u16 },
    Unusable,
}
impl CpInfo {
    pub fn tag(&self) -> Option<Tag> {
        Some(match self {
            CpInfo::Utf8(_) => Tag::Utf8,
            CpInfo::Integer(_) => Tag::Integer,
            CpInfo::Float(_) => Tag::Float,
            CpInfo::Long(_) => Tag::Long,
            CpInfo::Double(_) => Tag::Double,
            CpInfo::Class(_) => Tag::Class,
            CpInfo::String { .. } => Tag::String,
            CpInfo::FieldRef(_) => Tag::FieldRef,
            CpInfo::MethodRef(_) => Tag::MethodRef,
            CpInfo::InterfaceMethodRef(_) => Tag::InterfaceMethodRef,
            CpInfo::NameAndType(_) => Tag::NameAndType,
            CpInfo::MethodHandle(_) => Tag::MethodHandle,
            CpInfo::MethodType(_) => Tag::MethodType,
            CpInfo::Dynamic(_) => Tag::Dynamic,
            CpInfo::InvokeDynamic(_) => Tag::InvokeDynamic,
            CpInfo::Module { .. } => Tag::Module,
            CpInfo::Package { .. } => Tag::Package,
            CpInfo::Unusable => return None,
        })
    }

    /// Whether the entry occupies two slots of the pool.
    pub fn is_wide(&self) -> bool {
        matches!(self, CpInfo::Long(_) | CpInfo::Double(_))
    }

    /// Pool indices this entry refers to.
    pub fn references(&self) -> Vec<u16> {
        match self {
            CpInfo::MethodRef(r) | CpInfo::FieldRef(r) | CpInfo::InterfaceMethodRef(r) => {
                vec![r.class_index, r.name_and_type_index]
            }
            CpInfo::Class(ClassInfo { name_index }) => vec![*name_index],
            CpInfo::NameAndType(n) => vec![n.name_index, n.descriptor_index],
            CpInfo::String { string_index } => vec![*string_index],
            // bootstrap_method_attr_index addresses the BootstrapMethods attribute
            CpInfo::Dynamic(d) | CpInfo::InvokeDynamic(d) => vec![d.name_and_type_index],
            CpInfo::MethodHandle(h) => vec![h.reference_index],
            CpInfo::MethodType(m) => vec![m.descriptor_index],
            CpInfo::Module { name_index } | CpInfo::Package { name_index } => vec![*name_index],
            CpInfo::Utf8(_)
            | CpInfo::Integer(_)
            | CpInfo::Float(_)
            | CpInfo::Long(_)
            | CpInfo::Double(_)
            | CpInfo::Unusable => Vec::new(),
        }
    }
}

#[derive(Debug, PartialEq, Clone)]
pub struct RefInfo {
    pub class_index: u16,
    pub name_and_type_index: u16,
}

#[derive(Debug, PartialEq, Clone)]
pub struct ClassInfo {
    // The value of the name_index item must be a valid index into the constant_pool table.
    // The constant_pool entry at that index must be a CONSTANT_Utf8_info structure (§4.4.7)
    // representing a valid binary class or interface name encoded in internal form (§4.2.1).
    pub name_index: u16,
}

#[derive(Debug, PartialEq, Clone)]
pub struct NameAndTypeInfo {
    pub name_index: u16,
    pub descriptor_index: u16,
}

#[derive(Debug, PartialEq, Clone)]
pub struct DynamicInfo {
    pub bootstrap_method_attr_index: u16,
    pub name_and_type_index: u16,
}

#[derive(Debug, PartialEq, Clone)]
pub struct MethodHandleInfo {
    pub reference_kind: u8,
    pub reference_index: u16,
}

#[derive(Debug, PartialEq, Clone)]
pub struct MethodTypeInfo {
    pub descriptor_index: u16,
}

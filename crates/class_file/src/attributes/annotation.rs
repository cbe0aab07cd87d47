// https://docs.oracle.com/javase/specs/jvms/se19/html/jvms-4.html#jvms-4.7.16

#[derive(Debug, Clone, PartialEq)]
pub struct Annotation {
    /// Utf8 entry holding the field descriptor of the annotation interface.
    pub type_index: u16,
    pub element_value_pairs: Vec<ElementValuePair>,
}
impl Annotation {
    pub fn compute_length(&self) -> u32 {
        4 + self
            .element_value_pairs
            .iter()
            .map(|pair| 2 + pair.value.compute_length())
            .sum::<u32>()
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct ElementValuePair {
    pub name_index: u16,
    pub value: ElementValue,
}

#[derive(Debug, Clone, PartialEq)]
pub enum ElementValue {
    /// One of `B C D F I J S Z`, pointing at an Integer, Float, Long or Double entry.
    Primitive { tag: u8, const_value_index: u16 },
    Utf8 { utf8_index: u16 },
    Enum {
        type_name_index: u16,
        const_name_index: u16,
    },
    Class { class_info_index: u16 },
    Annotation(Annotation),
    Array(Vec<ElementValue>),
}
impl ElementValue {
    pub fn tag(&self) -> u8 {
        match self {
            ElementValue::Primitive { tag, .. } => *tag,
            ElementValue::Utf8 { .. } => b's',
            ElementValue::Enum { .. } => b'e',
            ElementValue::Class { .. } => b'c',
            ElementValue::Annotation(_) => b'@',
            ElementValue::Array(_) => b'[',
        }
    }

    pub fn compute_length(&self) -> u32 {
        1 + match self {
            ElementValue::Primitive { .. }
            | ElementValue::Utf8 { .. }
            | ElementValue::Class { .. } => 2,
            ElementValue::Enum { .. } => 4,
            ElementValue::Annotation(annotation) => annotation.compute_length(),
            ElementValue::Array(values) => {
                2 + values.iter().map(ElementValue::compute_length).sum::<u32>()
            }
        }
    }
}

// https://docs.oracle.com/javase/specs/jvms/se19/html/jvms-4.html#jvms-4.7.20
#[derive(Debug, Clone, PartialEq)]
pub struct TypeAnnotation {
    pub target_type: u8,
    pub target_info: TargetInfo,
    pub type_path: Vec<TypePathEntry>,
    pub annotation: Annotation,
}
impl TypeAnnotation {
    pub fn compute_length(&self) -> u32 {
        1 + self.target_info.compute_length()
            + 1
            + 2 * self.type_path.len() as u32
            + self.annotation.compute_length()
    }
}

#[derive(Debug, Clone, PartialEq)]
pub enum TargetInfo {
    TypeParameter {
        type_parameter_index: u8,
    },
    Supertype {
        supertype_index: u16,
    },
    TypeParameterBound {
        type_parameter_index: u8,
        bound_index: u8,
    },
    Empty,
    FormalParameter {
        formal_parameter_index: u8,
    },
    Throws {
        throws_type_index: u16,
    },
    LocalVar(Vec<LocalVarTargetEntry>),
    Catch {
        exception_table_index: u16,
    },
    Offset {
        offset: u16,
    },
    TypeArgument {
        offset: u16,
        type_argument_index: u8,
    },
}
impl TargetInfo {
    pub fn compute_length(&self) -> u32 {
        match self {
            TargetInfo::Empty => 0,
            TargetInfo::TypeParameter { .. } | TargetInfo::FormalParameter { .. } => 1,
            TargetInfo::Supertype { .. }
            | TargetInfo::TypeParameterBound { .. }
            | TargetInfo::Throws { .. }
            | TargetInfo::Catch { .. }
            | TargetInfo::Offset { .. } => 2,
            TargetInfo::TypeArgument { .. } => 3,
            TargetInfo::LocalVar(table) => 2 + 6 * table.len() as u32,
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct LocalVarTargetEntry {
    pub start_pc: u16,
    pub length: u16,
    pub index: u16,
}

#[derive(Debug, Clone, PartialEq)]
pub struct TypePathEntry {
    pub type_path_kind: u8,
    pub type_argument_index: u8,
}

mod annotation;

pub use annotation::{
    Annotation, ElementValue, ElementValuePair, LocalVarTargetEntry, TargetInfo, TypeAnnotation,
    TypePathEntry,
};

use crate::{AccessFlags, ConstantPool};

#[derive(Debug, Clone, PartialEq)]
pub struct Attribute {
    pub name_index: u16,
    pub info: AttributeInfo,
}
impl Attribute {
    pub fn new(name_index: u16, info: AttributeInfo) -> Self {
        Self { name_index, info }
    }

    /// Size of the payload in bytes, not counting the 6 byte name and length header.
    ///
    /// Payloads longer than `u32::MAX` bytes do not fit and are rejected by the writer.
    pub fn compute_internal_length(&self) -> u32 {
        self.info.compute_internal_length()
    }
}

#[derive(Debug, Clone, PartialEq)]
pub enum AttributeInfo {
    ConstantValue { constant_value_index: u16 },
    /// Runtime(In)VisibleAnnotations
    Annotations(Vec<Annotation>),
    /// Runtime(In)VisibleTypeAnnotations
    TypeAnnotations(Vec<TypeAnnotation>),
    /// Runtime(In)VisibleParameterAnnotations, one list per parameter.
    ParameterAnnotations(Vec<Vec<Annotation>>),
    AnnotationDefault(ElementValue),
    NestHost { host_class_index: u16 },
    NestMembers(Vec<u16>),
    /// `method_index` is 0 when the class is enclosed by an initializer rather than a method.
    EnclosingMethod { class_index: u16, method_index: u16 },
    Exceptions(Vec<u16>),
    InnerClasses(Vec<InnerClass>),
    Code(CodeAttribute),
    /// Payload of an attribute without dedicated support, kept byte for byte.
    Raw(Vec<u8>),
}
impl AttributeInfo {
    pub fn compute_internal_length(&self) -> u32 {
        match self {
            AttributeInfo::ConstantValue { .. } | AttributeInfo::NestHost { .. } => 2,
            AttributeInfo::EnclosingMethod { .. } => 4,
            AttributeInfo::Annotations(annotations) => {
                2 + annotations
                    .iter()
                    .map(Annotation::compute_length)
                    .sum::<u32>()
            }
            AttributeInfo::TypeAnnotations(annotations) => {
                2 + annotations
                    .iter()
                    .map(TypeAnnotation::compute_length)
                    .sum::<u32>()
            }
            AttributeInfo::ParameterAnnotations(parameters) => {
                1 + parameters
                    .iter()
                    .map(|annotations| {
                        2 + annotations
                            .iter()
                            .map(Annotation::compute_length)
                            .sum::<u32>()
                    })
                    .sum::<u32>()
            }
            AttributeInfo::AnnotationDefault(value) => value.compute_length(),
            AttributeInfo::NestMembers(classes) => 2 + 2 * classes.len() as u32,
            AttributeInfo::Exceptions(exceptions) => 2 + 2 * exceptions.len() as u32,
            AttributeInfo::InnerClasses(classes) => 2 + 8 * classes.len() as u32,
            AttributeInfo::Code(code) => code.compute_length(),
            AttributeInfo::Raw(info) => info.len() as u32,
        }
    }

    pub fn kind(&self) -> &'static str {
        match self {
            AttributeInfo::ConstantValue { .. } => "ConstantValue",
            AttributeInfo::Annotations(_) => "Annotations",
            AttributeInfo::TypeAnnotations(_) => "TypeAnnotations",
            AttributeInfo::ParameterAnnotations(_) => "ParameterAnnotations",
            AttributeInfo::AnnotationDefault(_) => "AnnotationDefault",
            AttributeInfo::NestHost { .. } => "NestHost",
            AttributeInfo::NestMembers(_) => "NestMembers",
            AttributeInfo::EnclosingMethod { .. } => "EnclosingMethod",
            AttributeInfo::Exceptions(_) => "Exceptions",
            AttributeInfo::InnerClasses(_) => "InnerClasses",
            AttributeInfo::Code(_) => "Code",
            AttributeInfo::Raw(_) => "Raw",
        }
    }

    /// Whether this payload is the one an attribute called `name` carries.
    pub fn belongs_to(&self, name: AttributeName) -> bool {
        use AttributeName::*;

        match self {
            AttributeInfo::ConstantValue { .. } => name == ConstantValue,
            AttributeInfo::Annotations(_) => {
                matches!(name, RuntimeVisibleAnnotations | RuntimeInvisibleAnnotations)
            }
            AttributeInfo::TypeAnnotations(_) => matches!(
                name,
                RuntimeVisibleTypeAnnotations | RuntimeInvisibleTypeAnnotations
            ),
            AttributeInfo::ParameterAnnotations(_) => matches!(
                name,
                RuntimeVisibleParameterAnnotations | RuntimeInvisibleParameterAnnotations
            ),
            AttributeInfo::AnnotationDefault(_) => name == AnnotationDefault,
            AttributeInfo::NestHost { .. } => name == NestHost,
            AttributeInfo::NestMembers(_) => name == NestMembers,
            AttributeInfo::EnclosingMethod { .. } => name == EnclosingMethod,
            AttributeInfo::Exceptions(_) => name == Exceptions,
            AttributeInfo::InnerClasses(_) => name == InnerClasses,
            AttributeInfo::Code(_) => name == Code,
            AttributeInfo::Raw(_) => true,
        }
    }
}

macro_rules! attribute_names {
    ($($name:ident),* $(,)?) => {
        #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
        pub enum AttributeName {
            $($name,)*
        }
        impl AttributeName {
            pub fn parse(name: &str) -> Option<Self> {
                match name {
                    $(stringify!($name) => Some(AttributeName::$name),)*
                    _ => None,
                }
            }

            pub fn as_str(&self) -> &'static str {
                match self {
                    $(AttributeName::$name => stringify!($name),)*
                }
            }
        }
    };
}

attribute_names! {
    AnnotationDefault,
    BootstrapMethods,
    CharacterRangeTable,
    Code,
    CompilationID,
    ConstantValue,
    Deprecated,
    EnclosingMethod,
    Exceptions,
    InnerClasses,
    LineNumberTable,
    LocalVariableTable,
    LocalVariableTypeTable,
    MethodParameters,
    Module,
    ModuleHashes,
    ModuleMainClass,
    ModulePackages,
    ModuleResolution,
    ModuleTarget,
    NestHost,
    NestMembers,
    PermittedSubclasses,
    Record,
    RuntimeInvisibleAnnotations,
    RuntimeInvisibleParameterAnnotations,
    RuntimeInvisibleTypeAnnotations,
    RuntimeVisibleAnnotations,
    RuntimeVisibleParameterAnnotations,
    RuntimeVisibleTypeAnnotations,
    Signature,
    SourceDebugExtension,
    SourceFile,
    SourceID,
    StackMapTable,
    Synthetic,
}
impl AttributeName {
    /// Whether constant pool references of this attribute kind are checked by the validator.
    pub fn has_reference_rules(&self) -> bool {
        use AttributeName::*;

        matches!(
            self,
            ConstantValue
                | RuntimeVisibleAnnotations
                | RuntimeInvisibleAnnotations
                | RuntimeVisibleTypeAnnotations
                | RuntimeInvisibleTypeAnnotations
                | RuntimeVisibleParameterAnnotations
                | RuntimeInvisibleParameterAnnotations
                | AnnotationDefault
                | NestHost
                | NestMembers
                | EnclosingMethod
                | Exceptions
                | InnerClasses
        )
    }

    /// Whether any constant pool reference of this attribute kind may be 0.
    pub fn allows_zero_index(&self) -> bool {
        matches!(self, AttributeName::EnclosingMethod | AttributeName::InnerClasses)
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct InnerClass {
    pub inner_class_info_index: u16,
    /// 0 for top-level, local and anonymous classes.
    pub outer_class_info_index: u16,
    /// 0 for anonymous classes.
    pub inner_name_index: u16,
    pub inner_class_access_flags: AccessFlags,
}

#[derive(Debug, Clone, PartialEq)]
pub struct Attributes(pub Vec<Attribute>);
impl Attributes {
    pub fn find_by_name(&self, name: &str, constant_pool: &ConstantPool) -> Option<&Attribute> {
        self.0.iter().find(|a| {
            constant_pool
                .get_utf8(a.name_index)
                .map_or(false, |s| s == name)
        })
    }

    pub fn code_attribute(&self, constant_pool: &ConstantPool) -> Option<&CodeAttribute> {
        match &self.find_by_name("Code", constant_pool)?.info {
            AttributeInfo::Code(code) => Some(code),
            _ => None,
        }
    }

    pub fn iter(&self) -> std::slice::Iter<'_, Attribute> {
        self.0.iter()
    }

    pub fn compute_length(&self) -> u32 {
        2 + self
            .0
            .iter()
            .map(|a| 6 + a.compute_internal_length())
            .sum::<u32>()
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct ExceptionTableEntry {
    pub start_pc: u16,
    pub end_pc: u16,
    pub handler_pc: u16,
    /// 0 for handlers that catch everything, e.g. `finally` blocks.
    pub catch_type: u16,
}

#[derive(Debug, Clone, PartialEq)]
pub struct CodeAttribute {
    pub max_stack: u16,
    pub max_locals: u16,
    pub code: Vec<u8>,
    pub exception_table: Vec<ExceptionTableEntry>,
    pub attributes: Attributes,
}
impl CodeAttribute {
    pub fn compute_length(&self) -> u32 {
        2 + 2
            + 4
            + self.code.len() as u32
            + 2
            + 8 * self.exception_table.len() as u32
            + self.attributes.compute_length()
    }
}

use std::io::{BufRead, BufReader, Cursor, Read, Seek};

use byteorder::{BigEndian, ReadBytesExt};

use crate::{
    attributes::{
        Annotation, AttributeInfo, AttributeName, Attributes, CodeAttribute, ElementValue,
        ElementValuePair, ExceptionTableEntry, InnerClass, LocalVarTargetEntry, TargetInfo,
        TypeAnnotation, TypePathEntry,
    },
    class_file::{FieldInfo, MethodInfo},
};

use super::{constant_pool::CpInfo, *};

type Endian = BigEndian;

/// How deeply element values, annotations and Code attributes may nest.
pub const MAX_NESTING_DEPTH: usize = 64;

pub struct Parser<R> {
    r: BufReader<R>,
    depth: usize,
}
impl<R: Read + Seek> Parser<R> {
    pub fn new(r: R) -> Self {
        Self::nested(r, 0)
    }

    fn nested(r: R, depth: usize) -> Self {
        Self {
            r: BufReader::new(r),
            depth,
        }
    }

    pub fn parse(&mut self) -> Result<ClassFile> {
        let _ = self.parse_magic_identifier()?;
        let (major_version, minor_version) = self.parse_version()?;

        let constant_pool = self.parse_constant_pool()?;
        let access_flags = AccessFlags::from_bits_truncate(self.read_u16()?);
        let this_class = self.read_u16()?;
        let super_class = self.read_u16()?;
        let interfaces_count = self.read_u16()?;

        let mut interfaces = vec![0u16; interfaces_count as usize];
        self.r.read_u16_into::<Endian>(&mut interfaces)?;

        let fields_count = self.read_u16()?;
        let fields = (0..fields_count)
            .map(|_| self.parse_field_info(&constant_pool))
            .collect::<Result<Vec<_>>>()?;

        let methods_count = self.read_u16()?;
        let methods = (0..methods_count)
            .map(|_| self.parse_method_info(&constant_pool))
            .collect::<Result<Vec<_>>>()?;

        let attributes = self.parse_attributes(&constant_pool)?;

        Ok(ClassFile {
            minor_version,
            major_version,
            constant_pool,
            access_flags,
            this_class,
            super_class,
            interfaces,
            fields,
            methods,
            attributes,
        })
    }

    fn parse_field_info(&mut self, constant_pool: &ConstantPool) -> Result<FieldInfo> {
        let access_flags = AccessFlags::from_bits_truncate(self.read_u16()?);
        let name_index = self.read_u16()?;
        let descriptor_index = self.read_u16()?;
        let attributes = self.parse_attributes(constant_pool)?;

        Ok(FieldInfo {
            access_flags,
            name_index,
            descriptor_index,
            attributes,
        })
    }

    fn parse_method_info(&mut self, constant_pool: &ConstantPool) -> Result<MethodInfo> {
        let access_flags = AccessFlags::from_bits_truncate(self.read_u16()?);
        let name_index = self.read_u16()?;
        let descriptor_index = self.read_u16()?;
        let attributes = self.parse_attributes(constant_pool)?;

        Ok(MethodInfo {
            access_flags,
            name_index,
            descriptor_index,
            attributes,
        })
    }

    fn parse_magic_identifier(&mut self) -> Result<()> {
        match self.read_u32()? {
            0xCAFEBABE => Ok(()),
            magic_identifier => Err(ClassFileError::InvalidMagicIdentifier(magic_identifier)),
        }
    }

    fn parse_version(&mut self) -> Result<(u16, u16)> {
        let minor = self.read_u16()?;
        let major = self.read_u16()?;
        Ok((major, minor))
    }

    pub fn parse_constant_pool(&mut self) -> Result<ConstantPool> {
        let constant_pool_count = self.read_u16()?;

        let mut count = (constant_pool_count as usize).saturating_sub(1);
        let mut res = Vec::with_capacity(count);
        while count > 0 {
            let (cp_info, slot_size) = self.parse_cp_info()?;
            res.push(cp_info);
            (0..slot_size - 1).for_each(|_| res.push(CpInfo::Unusable));

            count = count.saturating_sub(slot_size);
        }
        Ok(ConstantPool::new(res))
    }

    fn parse_cp_info(&mut self) -> Result<(CpInfo, usize)> {
        let tag = self.read_u8()?;
        let (cp_info, additional_cp_info) = match tag {
            1 => (self.parse_utf8()?, 1),
            3 => (CpInfo::Integer(self.read_i32()?), 1),
            4 => (CpInfo::Float(f32::from_bits(self.read_u32()?)), 1),
            5 => (CpInfo::Long(self.r.read_i64::<Endian>()?), 2),
            6 => (CpInfo::Double(f64::from_bits(self.r.read_u64::<Endian>()?)), 2),
            7 => (self.parse_class_info()?, 1),
            8 => (self.parse_string()?, 1),
            9 => (CpInfo::FieldRef(self.parse_ref_info()?), 1),
            10 => (CpInfo::MethodRef(self.parse_ref_info()?), 1),
            11 => (CpInfo::InterfaceMethodRef(self.parse_ref_info()?), 1),
            12 => (self.parse_name_and_type_info()?, 1),
            15 => (self.parse_method_handle()?, 1),
            16 => (self.parse_method_type_info()?, 1),
            17 => (CpInfo::Dynamic(self.parse_dynamic_info()?), 1),
            18 => (CpInfo::InvokeDynamic(self.parse_dynamic_info()?), 1),
            19 => (CpInfo::Module { name_index: self.read_u16()? }, 1),
            20 => (CpInfo::Package { name_index: self.read_u16()? }, 1),
            _ => return Err(ClassFileError::InvalidCpInfoTag(tag)),
        };

        Ok((cp_info, additional_cp_info))
    }

    // Class files store strings as modified UTF-8.
    fn parse_utf8(&mut self) -> Result<CpInfo> {
        let length = self.read_u16()?;
        let mut bytes = vec![0u8; length as usize];
        self.r.read_exact(&mut bytes)?;

        Ok(CpInfo::Utf8(cesu8::from_java_cesu8(&bytes)?.into_owned()))
    }

    fn parse_class_info(&mut self) -> Result<CpInfo> {
        let name_index = self.read_u16()?;

        Ok(CpInfo::Class(constant_pool::ClassInfo { name_index }))
    }

    fn parse_string(&mut self) -> Result<CpInfo> {
        let string_index = self.read_u16()?;

        Ok(CpInfo::String { string_index })
    }

    fn parse_name_and_type_info(&mut self) -> Result<CpInfo> {
        let name_index = self.read_u16()?;
        let descriptor_index = self.read_u16()?;

        Ok(CpInfo::NameAndType(constant_pool::NameAndTypeInfo {
            name_index,
            descriptor_index,
        }))
    }

    fn parse_method_handle(&mut self) -> Result<CpInfo> {
        let reference_kind = self.read_u8()?;
        let reference_index = self.read_u16()?;

        Ok(CpInfo::MethodHandle(constant_pool::MethodHandleInfo {
            reference_kind,
            reference_index,
        }))
    }

    fn parse_method_type_info(&mut self) -> Result<CpInfo> {
        let descriptor_index = self.read_u16()?;

        Ok(CpInfo::MethodType(constant_pool::MethodTypeInfo {
            descriptor_index,
        }))
    }

    fn parse_dynamic_info(&mut self) -> Result<constant_pool::DynamicInfo> {
        let bootstrap_method_attr_index = self.read_u16()?;
        let name_and_type_index = self.read_u16()?;

        Ok(constant_pool::DynamicInfo {
            bootstrap_method_attr_index,
            name_and_type_index,
        })
    }

    fn parse_ref_info(&mut self) -> Result<constant_pool::RefInfo> {
        let class_index = self.read_u16()?;
        let name_and_type_index = self.read_u16()?;

        Ok(constant_pool::RefInfo {
            class_index,
            name_and_type_index,
        })
    }

    pub fn parse_attribute(&mut self, constant_pool: &ConstantPool) -> Result<Attribute> {
        let name_index = self.read_u16()?;
        let attribute_length = self.read_u32()?;
        let mut info = vec![0u8; attribute_length as usize];
        self.r.read_exact(&mut info)?;

        let Some(name) = constant_pool
            .get_utf8(name_index)
            .ok()
            .and_then(AttributeName::parse)
        else {
            return Ok(Attribute::new(name_index, AttributeInfo::Raw(info)));
        };

        let parsed = {
            let mut parser = Parser::nested(Cursor::new(info.as_slice()), self.depth);
            match parser.parse_attribute_info(name, constant_pool) {
                Ok(Some(parsed)) if parser.at_end()? => Some(parsed),
                Ok(Some(_)) => {
                    log::debug!(
                        "'{}' attribute has trailing bytes, keeping it raw",
                        name.as_str()
                    );
                    None
                }
                Ok(None) => None,
                Err(e) => {
                    log::debug!(
                        "Malformed '{}' attribute, keeping it raw: {}",
                        name.as_str(),
                        e
                    );
                    None
                }
            }
        };

        let info = parsed.unwrap_or(AttributeInfo::Raw(info));
        Ok(Attribute::new(name_index, info))
    }

    /// `None` for attribute kinds that are kept as raw bytes.
    fn parse_attribute_info(
        &mut self,
        name: AttributeName,
        constant_pool: &ConstantPool,
    ) -> Result<Option<AttributeInfo>> {
        use AttributeName::*;

        let info = match name {
            ConstantValue => AttributeInfo::ConstantValue {
                constant_value_index: self.read_u16()?,
            },
            RuntimeVisibleAnnotations | RuntimeInvisibleAnnotations => {
                AttributeInfo::Annotations(self.parse_annotations()?)
            }
            RuntimeVisibleTypeAnnotations | RuntimeInvisibleTypeAnnotations => {
                let count = self.read_u16()?;
                AttributeInfo::TypeAnnotations(
                    (0..count)
                        .map(|_| self.parse_type_annotation())
                        .collect::<Result<Vec<_>>>()?,
                )
            }
            RuntimeVisibleParameterAnnotations | RuntimeInvisibleParameterAnnotations => {
                let num_parameters = self.read_u8()?;
                AttributeInfo::ParameterAnnotations(
                    (0..num_parameters)
                        .map(|_| self.parse_annotations())
                        .collect::<Result<Vec<_>>>()?,
                )
            }
            AnnotationDefault => AttributeInfo::AnnotationDefault(self.parse_element_value()?),
            NestHost => AttributeInfo::NestHost {
                host_class_index: self.read_u16()?,
            },
            NestMembers => AttributeInfo::NestMembers(self.parse_u16_table()?),
            EnclosingMethod => AttributeInfo::EnclosingMethod {
                class_index: self.read_u16()?,
                method_index: self.read_u16()?,
            },
            Exceptions => AttributeInfo::Exceptions(self.parse_u16_table()?),
            InnerClasses => {
                let count = self.read_u16()?;
                AttributeInfo::InnerClasses(
                    (0..count)
                        .map(|_| self.parse_inner_class())
                        .collect::<Result<Vec<_>>>()?,
                )
            }
            Code => AttributeInfo::Code(
                self.descend(|parser| parser.parse_code_attribute(constant_pool))?,
            ),
            _ => return Ok(None),
        };

        Ok(Some(info))
    }

    fn parse_u16_table(&mut self) -> Result<Vec<u16>> {
        let count = self.read_u16()?;
        let mut table = vec![0u16; count as usize];
        self.r.read_u16_into::<Endian>(&mut table)?;
        Ok(table)
    }

    fn parse_inner_class(&mut self) -> Result<InnerClass> {
        Ok(InnerClass {
            inner_class_info_index: self.read_u16()?,
            outer_class_info_index: self.read_u16()?,
            inner_name_index: self.read_u16()?,
            inner_class_access_flags: AccessFlags::from_bits_truncate(self.read_u16()?),
        })
    }

    fn parse_annotations(&mut self) -> Result<Vec<Annotation>> {
        let count = self.read_u16()?;
        (0..count)
            .map(|_| self.parse_annotation())
            .collect::<Result<Vec<_>>>()
    }

    fn parse_annotation(&mut self) -> Result<Annotation> {
        let type_index = self.read_u16()?;
        let num_element_value_pairs = self.read_u16()?;
        let element_value_pairs = (0..num_element_value_pairs)
            .map(|_| {
                Ok(ElementValuePair {
                    name_index: self.read_u16()?,
                    value: self.parse_element_value()?,
                })
            })
            .collect::<Result<Vec<_>>>()?;

        Ok(Annotation {
            type_index,
            element_value_pairs,
        })
    }

    fn parse_element_value(&mut self) -> Result<ElementValue> {
        let tag = self.read_u8()?;
        let value = match tag {
            b'B' | b'C' | b'D' | b'F' | b'I' | b'J' | b'S' | b'Z' => ElementValue::Primitive {
                tag,
                const_value_index: self.read_u16()?,
            },
            b's' => ElementValue::Utf8 {
                utf8_index: self.read_u16()?,
            },
            b'e' => ElementValue::Enum {
                type_name_index: self.read_u16()?,
                const_name_index: self.read_u16()?,
            },
            b'c' => ElementValue::Class {
                class_info_index: self.read_u16()?,
            },
            b'@' => ElementValue::Annotation(self.descend(Self::parse_annotation)?),
            b'[' => ElementValue::Array(self.descend(|parser| {
                let num_values = parser.read_u16()?;
                (0..num_values)
                    .map(|_| parser.parse_element_value())
                    .collect::<Result<Vec<_>>>()
            })?),
            _ => return Err(ClassFileError::InvalidElementValueTag(tag as char)),
        };

        Ok(value)
    }

    fn parse_type_annotation(&mut self) -> Result<TypeAnnotation> {
        let target_type = self.read_u8()?;
        let target_info = self.parse_target_info(target_type)?;
        let path_length = self.read_u8()?;
        let type_path = (0..path_length)
            .map(|_| {
                Ok(TypePathEntry {
                    type_path_kind: self.read_u8()?,
                    type_argument_index: self.read_u8()?,
                })
            })
            .collect::<Result<Vec<_>>>()?;
        let annotation = self.parse_annotation()?;

        Ok(TypeAnnotation {
            target_type,
            target_info,
            type_path,
            annotation,
        })
    }

    // https://docs.oracle.com/javase/specs/jvms/se19/html/jvms-4.html#jvms-4.7.20.1
    fn parse_target_info(&mut self, target_type: u8) -> Result<TargetInfo> {
        let target_info = match target_type {
            0x00 | 0x01 => TargetInfo::TypeParameter {
                type_parameter_index: self.read_u8()?,
            },
            0x10 => TargetInfo::Supertype {
                supertype_index: self.read_u16()?,
            },
            0x11 | 0x12 => TargetInfo::TypeParameterBound {
                type_parameter_index: self.read_u8()?,
                bound_index: self.read_u8()?,
            },
            0x13..=0x15 => TargetInfo::Empty,
            0x16 => TargetInfo::FormalParameter {
                formal_parameter_index: self.read_u8()?,
            },
            0x17 => TargetInfo::Throws {
                throws_type_index: self.read_u16()?,
            },
            0x40 | 0x41 => {
                let table_length = self.read_u16()?;
                TargetInfo::LocalVar(
                    (0..table_length)
                        .map(|_| {
                            Ok(LocalVarTargetEntry {
                                start_pc: self.read_u16()?,
                                length: self.read_u16()?,
                                index: self.read_u16()?,
                            })
                        })
                        .collect::<Result<Vec<_>>>()?,
                )
            }
            0x42 => TargetInfo::Catch {
                exception_table_index: self.read_u16()?,
            },
            0x43..=0x46 => TargetInfo::Offset {
                offset: self.read_u16()?,
            },
            0x47..=0x4B => TargetInfo::TypeArgument {
                offset: self.read_u16()?,
                type_argument_index: self.read_u8()?,
            },
            _ => return Err(ClassFileError::InvalidTargetType(target_type)),
        };

        Ok(target_info)
    }

    pub fn parse_code_attribute(&mut self, constant_pool: &ConstantPool) -> Result<CodeAttribute> {
        let max_stack = self.read_u16()?;
        let max_locals = self.read_u16()?;
        let code_length = self.read_u32()?;
        let mut code = vec![0u8; code_length as usize];
        self.r.read_exact(&mut code)?;
        let exception_table_length = self.read_u16()?;
        let exception_table = (0..exception_table_length)
            .map(|_| self.parse_exception_table_entry())
            .collect::<Result<Vec<_>>>()?;
        let attributes = self.parse_attributes(constant_pool)?;

        Ok(CodeAttribute {
            max_stack,
            max_locals,
            code,
            exception_table,
            attributes,
        })
    }

    fn parse_exception_table_entry(&mut self) -> Result<ExceptionTableEntry> {
        let start_pc = self.read_u16()?;
        let end_pc = self.read_u16()?;
        let handler_pc = self.read_u16()?;
        let catch_type = self.read_u16()?;

        Ok(ExceptionTableEntry {
            start_pc,
            end_pc,
            handler_pc,
            catch_type,
        })
    }

    fn parse_attributes(&mut self, constant_pool: &ConstantPool) -> Result<Attributes> {
        let attributes_count = self.read_u16()?;
        (0..attributes_count)
            .map(|_| self.parse_attribute(constant_pool))
            .collect::<Result<Vec<_>>>()
            .map(Attributes)
    }

    fn descend<T>(&mut self, f: impl FnOnce(&mut Self) -> Result<T>) -> Result<T> {
        if self.depth >= MAX_NESTING_DEPTH {
            return Err(ClassFileError::NestingTooDeep(MAX_NESTING_DEPTH));
        }

        self.depth += 1;
        let result = f(self);
        self.depth -= 1;
        result
    }

    fn at_end(&mut self) -> Result<bool> {
        Ok(self.r.fill_buf()?.is_empty())
    }

    fn read_u32(&mut self) -> Result<u32> {
        Ok(self.r.read_u32::<Endian>()?)
    }

    fn read_u16(&mut self) -> Result<u16> {
        Ok(self.r.read_u16::<Endian>()?)
    }

    fn read_u8(&mut self) -> Result<u8> {
        Ok(self.r.read_u8()?)
    }

    fn read_i32(&mut self) -> Result<i32> {
        Ok(self.r.read_i32::<Endian>()?)
    }
}

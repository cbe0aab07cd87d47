use std::{convert::TryFrom, io::Write};

use byteorder::{BigEndian, WriteBytesExt};

use crate::{
    attributes::{
        Annotation, AttributeInfo, Attributes, CodeAttribute, ElementValue, TargetInfo,
        TypeAnnotation,
    },
    class_file::{FieldInfo, MethodInfo},
};

use super::{constant_pool::CpInfo, *};

type Endian = BigEndian;

/// Serializes the class file model. Attribute length fields come from
/// [`Attribute::compute_internal_length`], so the model is written in a single pass.
pub struct Writer<W> {
    w: W,
}
impl<W: Write> Writer<W> {
    pub fn new(w: W) -> Self {
        Self { w }
    }

    pub fn into_inner(self) -> W {
        self.w
    }

    pub fn write(&mut self, class_file: &ClassFile) -> Result<()> {
        self.write_u32(0xCAFEBABE)?;
        self.write_u16(class_file.minor_version)?;
        self.write_u16(class_file.major_version)?;

        self.write_constant_pool(&class_file.constant_pool)?;
        self.write_u16(class_file.access_flags.bits())?;
        self.write_u16(class_file.this_class)?;
        self.write_u16(class_file.super_class)?;

        self.write_count(class_file.interfaces.len())?;
        for interface in &class_file.interfaces {
            self.write_u16(*interface)?;
        }

        self.write_count(class_file.fields.len())?;
        for field in &class_file.fields {
            self.write_field_info(field)?;
        }

        self.write_count(class_file.methods.len())?;
        for method in &class_file.methods {
            self.write_method_info(method)?;
        }

        self.write_attributes(&class_file.attributes)
    }

    fn write_field_info(&mut self, field: &FieldInfo) -> Result<()> {
        self.write_u16(field.access_flags.bits())?;
        self.write_u16(field.name_index)?;
        self.write_u16(field.descriptor_index)?;
        self.write_attributes(&field.attributes)
    }

    fn write_method_info(&mut self, method: &MethodInfo) -> Result<()> {
        self.write_u16(method.access_flags.bits())?;
        self.write_u16(method.name_index)?;
        self.write_u16(method.descriptor_index)?;
        self.write_attributes(&method.attributes)
    }

    pub fn write_constant_pool(&mut self, constant_pool: &ConstantPool) -> Result<()> {
        self.write_count(constant_pool.size())?;
        constant_pool
            .iter()
            .try_for_each(|cp_info| self.write_cp_info(cp_info))
    }

    fn write_cp_info(&mut self, cp_info: &CpInfo) -> Result<()> {
        // Unusable slots are implied by the preceding Long or Double.
        let Some(tag) = cp_info.tag() else {
            return Ok(());
        };
        self.write_u8(tag as u8)?;

        match cp_info {
            CpInfo::Utf8(s) => {
                let bytes = cesu8::to_java_cesu8(s);
                self.write_count(bytes.len())?;
                self.w.write_all(&bytes)?;
            }
            CpInfo::Integer(i) => self.w.write_i32::<Endian>(*i)?,
            CpInfo::Float(f) => self.write_u32(f.to_bits())?,
            CpInfo::Long(l) => self.w.write_i64::<Endian>(*l)?,
            CpInfo::Double(d) => self.w.write_u64::<Endian>(d.to_bits())?,
            CpInfo::Class(class_info) => self.write_u16(class_info.name_index)?,
            CpInfo::String { string_index } => self.write_u16(*string_index)?,
            CpInfo::FieldRef(ref_info)
            | CpInfo::MethodRef(ref_info)
            | CpInfo::InterfaceMethodRef(ref_info) => {
                self.write_u16(ref_info.class_index)?;
                self.write_u16(ref_info.name_and_type_index)?;
            }
            CpInfo::NameAndType(name_and_type) => {
                self.write_u16(name_and_type.name_index)?;
                self.write_u16(name_and_type.descriptor_index)?;
            }
            CpInfo::MethodHandle(method_handle) => {
                self.write_u8(method_handle.reference_kind)?;
                self.write_u16(method_handle.reference_index)?;
            }
            CpInfo::MethodType(method_type) => self.write_u16(method_type.descriptor_index)?,
            CpInfo::Dynamic(dynamic) | CpInfo::InvokeDynamic(dynamic) => {
                self.write_u16(dynamic.bootstrap_method_attr_index)?;
                self.write_u16(dynamic.name_and_type_index)?;
            }
            CpInfo::Module { name_index } | CpInfo::Package { name_index } => {
                self.write_u16(*name_index)?
            }
            CpInfo::Unusable => {}
        }

        Ok(())
    }

    pub fn write_attributes(&mut self, attributes: &Attributes) -> Result<()> {
        self.write_count(attributes.0.len())?;
        attributes
            .iter()
            .try_for_each(|attribute| self.write_attribute(attribute))
    }

    pub fn write_attribute(&mut self, attribute: &Attribute) -> Result<()> {
        let length = checked_length(&attribute.info)?;
        self.write_u16(attribute.name_index)?;
        self.write_u32(length)?;
        self.write_attribute_info(&attribute.info)
    }

    fn write_attribute_info(&mut self, info: &AttributeInfo) -> Result<()> {
        match info {
            AttributeInfo::ConstantValue {
                constant_value_index,
            } => self.write_u16(*constant_value_index),
            AttributeInfo::Annotations(annotations) => self.write_annotations(annotations),
            AttributeInfo::TypeAnnotations(annotations) => {
                self.write_count(annotations.len())?;
                annotations
                    .iter()
                    .try_for_each(|a| self.write_type_annotation(a))
            }
            AttributeInfo::ParameterAnnotations(parameters) => {
                let num_parameters = u8::try_from(parameters.len())
                    .map_err(|_| ClassFileError::LengthOverflow(parameters.len()))?;
                self.write_u8(num_parameters)?;
                parameters
                    .iter()
                    .try_for_each(|annotations| self.write_annotations(annotations))
            }
            AttributeInfo::AnnotationDefault(value) => self.write_element_value(value),
            AttributeInfo::NestHost { host_class_index } => self.write_u16(*host_class_index),
            AttributeInfo::NestMembers(classes) | AttributeInfo::Exceptions(classes) => {
                self.write_u16_table(classes)
            }
            AttributeInfo::EnclosingMethod {
                class_index,
                method_index,
            } => {
                self.write_u16(*class_index)?;
                self.write_u16(*method_index)
            }
            AttributeInfo::InnerClasses(classes) => {
                self.write_count(classes.len())?;
                for class in classes {
                    self.write_u16(class.inner_class_info_index)?;
                    self.write_u16(class.outer_class_info_index)?;
                    self.write_u16(class.inner_name_index)?;
                    self.write_u16(class.inner_class_access_flags.bits())?;
                }
                Ok(())
            }
            AttributeInfo::Code(code) => self.write_code_attribute(code),
            AttributeInfo::Raw(info) => Ok(self.w.write_all(info)?),
        }
    }

    fn write_code_attribute(&mut self, code: &CodeAttribute) -> Result<()> {
        self.write_u16(code.max_stack)?;
        self.write_u16(code.max_locals)?;
        let code_length = u32::try_from(code.code.len())
            .map_err(|_| ClassFileError::LengthOverflow(code.code.len()))?;
        self.write_u32(code_length)?;
        self.w.write_all(&code.code)?;

        self.write_count(code.exception_table.len())?;
        for entry in &code.exception_table {
            self.write_u16(entry.start_pc)?;
            self.write_u16(entry.end_pc)?;
            self.write_u16(entry.handler_pc)?;
            self.write_u16(entry.catch_type)?;
        }

        self.write_attributes(&code.attributes)
    }

    fn write_annotations(&mut self, annotations: &[Annotation]) -> Result<()> {
        self.write_count(annotations.len())?;
        annotations
            .iter()
            .try_for_each(|annotation| self.write_annotation(annotation))
    }

    fn write_annotation(&mut self, annotation: &Annotation) -> Result<()> {
        self.write_u16(annotation.type_index)?;
        self.write_count(annotation.element_value_pairs.len())?;
        for pair in &annotation.element_value_pairs {
            self.write_u16(pair.name_index)?;
            self.write_element_value(&pair.value)?;
        }
        Ok(())
    }

    fn write_element_value(&mut self, value: &ElementValue) -> Result<()> {
        self.write_u8(value.tag())?;
        match value {
            ElementValue::Primitive {
                const_value_index, ..
            } => self.write_u16(*const_value_index),
            ElementValue::Utf8 { utf8_index } => self.write_u16(*utf8_index),
            ElementValue::Enum {
                type_name_index,
                const_name_index,
            } => {
                self.write_u16(*type_name_index)?;
                self.write_u16(*const_name_index)
            }
            ElementValue::Class { class_info_index } => self.write_u16(*class_info_index),
            ElementValue::Annotation(annotation) => self.write_annotation(annotation),
            ElementValue::Array(values) => {
                self.write_count(values.len())?;
                values.iter().try_for_each(|v| self.write_element_value(v))
            }
        }
    }

    fn write_type_annotation(&mut self, annotation: &TypeAnnotation) -> Result<()> {
        self.write_u8(annotation.target_type)?;
        self.write_target_info(&annotation.target_info)?;

        let path_length = u8::try_from(annotation.type_path.len())
            .map_err(|_| ClassFileError::LengthOverflow(annotation.type_path.len()))?;
        self.write_u8(path_length)?;
        for entry in &annotation.type_path {
            self.write_u8(entry.type_path_kind)?;
            self.write_u8(entry.type_argument_index)?;
        }

        self.write_annotation(&annotation.annotation)
    }

    fn write_target_info(&mut self, target_info: &TargetInfo) -> Result<()> {
        match target_info {
            TargetInfo::TypeParameter {
                type_parameter_index,
            } => self.write_u8(*type_parameter_index),
            TargetInfo::Supertype { supertype_index } => self.write_u16(*supertype_index),
            TargetInfo::TypeParameterBound {
                type_parameter_index,
                bound_index,
            } => {
                self.write_u8(*type_parameter_index)?;
                self.write_u8(*bound_index)
            }
            TargetInfo::Empty => Ok(()),
            TargetInfo::FormalParameter {
                formal_parameter_index,
            } => self.write_u8(*formal_parameter_index),
            TargetInfo::Throws { throws_type_index } => self.write_u16(*throws_type_index),
            TargetInfo::LocalVar(table) => {
                self.write_count(table.len())?;
                for entry in table {
                    self.write_u16(entry.start_pc)?;
                    self.write_u16(entry.length)?;
                    self.write_u16(entry.index)?;
                }
                Ok(())
            }
            TargetInfo::Catch {
                exception_table_index,
            } => self.write_u16(*exception_table_index),
            TargetInfo::Offset { offset } => self.write_u16(*offset),
            TargetInfo::TypeArgument {
                offset,
                type_argument_index,
            } => {
                self.write_u16(*offset)?;
                self.write_u8(*type_argument_index)
            }
        }
    }

    fn write_u16_table(&mut self, table: &[u16]) -> Result<()> {
        self.write_count(table.len())?;
        table.iter().try_for_each(|i| self.write_u16(*i))
    }

    fn write_count(&mut self, count: usize) -> Result<()> {
        let count = u16::try_from(count).map_err(|_| ClassFileError::LengthOverflow(count))?;
        self.write_u16(count)
    }

    fn write_u32(&mut self, n: u32) -> Result<()> {
        Ok(self.w.write_u32::<Endian>(n)?)
    }

    fn write_u16(&mut self, n: u16) -> Result<()> {
        Ok(self.w.write_u16::<Endian>(n)?)
    }

    fn write_u8(&mut self, n: u8) -> Result<()> {
        Ok(self.w.write_u8(n)?)
    }
}

// `compute_internal_length` for payloads that can outgrow the u32 length field.
fn checked_length(info: &AttributeInfo) -> Result<u32> {
    let length = match info {
        AttributeInfo::Raw(bytes) => bytes.len() as u64,
        AttributeInfo::Code(code) => {
            let mut length = 12 + code.code.len() as u64 + 8 * code.exception_table.len() as u64;
            for attribute in code.attributes.iter() {
                length += 6 + u64::from(checked_length(&attribute.info)?);
            }
            length
        }
        _ => return Ok(info.compute_internal_length()),
    };

    u32::try_from(length).map_err(|_| ClassFileError::LengthOverflow(length as usize))
}

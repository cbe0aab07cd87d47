use std::io::{Read, Seek, Write};

use crate::{
    attributes::{Attribute, AttributeInfo, Attributes},
    constant_pool::ClassInfo,
    error::ValidationError,
    matches_cp_info,
    parser::Parser,
    validator,
    writer::Writer,
    AccessFlags, ConstantPool, Result,
};

#[derive(Debug, Clone, PartialEq)]
pub struct ClassFile {
    pub minor_version: u16,
    pub major_version: u16,
    pub constant_pool: ConstantPool,
    pub access_flags: AccessFlags,
    pub this_class: u16,
    pub super_class: u16,
    pub interfaces: Vec<u16>,
    pub fields: Vec<FieldInfo>,
    pub methods: Vec<MethodInfo>,
    pub attributes: Attributes,
}
impl ClassFile {
    pub fn parse(bytes: impl Read + Seek) -> Result<ClassFile> {
        Parser::new(bytes).parse()
    }

    pub fn write(&self, w: impl Write) -> Result<()> {
        Writer::new(w).write(self)
    }

    pub fn super_class(&self) -> Result<Option<&str>> {
        // For a class, the value of the super_class item either must be zero or must be a valid index
        // into the constant_pool table. If the value of the super_class item is nonzero, the
        // constant_pool entry at that index must be a CONSTANT_Class_info structure representing the
        // direct superclass of the class defined by this class file. Neither the direct superclass nor
        // any of its superclasses may have the ACC_FINAL flag set in the access_flags item of its
        // ClassFile structure.
        //
        // FIXME: For an interface, the value of the super_class item must always be a valid index
        //        into the constant_pool table. The constant_pool entry at that index must be a
        //        CONSTANT_Class_info structure representing the class Object.

        // If the value of the super_class item is zero, then this class file must represent the class Object,
        // the only class or interface without a direct superclass.
        if self.super_class == 0 {
            return Ok(None);
        }

        let ClassInfo { name_index } =
            matches_cp_info!(self.constant_pool, self.super_class, Class)?;

        Ok(Some(self.constant_pool.get_utf8(*name_index)?))
    }

    pub fn class_name(&self) -> Result<&str> {
        // The value of the this_class item must be a valid index into the constant_pool table.
        // The constant_pool entry at that index must be a CONSTANT_Class_info structure (§4.4.1)
        // representing the class or interface defined by this class file.

        let ClassInfo { name_index } =
            matches_cp_info!(self.constant_pool, self.this_class, Class)?;

        self.constant_pool.get_utf8(*name_index)
    }

    pub fn field_name(&self, field: &FieldInfo) -> Result<&str> {
        self.constant_pool.get_utf8(field.name_index)
    }

    pub fn field_descriptor(&self, field: &FieldInfo) -> Result<&str> {
        self.constant_pool.get_utf8(field.descriptor_index)
    }

    pub fn method_name(&self, method: &MethodInfo) -> Result<&str> {
        self.constant_pool.get_utf8(method.name_index)
    }

    pub fn method_descriptor(&self, method: &MethodInfo) -> Result<&str> {
        self.constant_pool.get_utf8(method.descriptor_index)
    }

    /// Validates the attributes of the class, its fields, its methods and their code, stopping
    /// at the first failure.
    pub fn validate_attributes(&self) -> Result<(), ValidationError> {
        let mut result = Ok(());
        self.visit_attributes(&mut |_, attribute| {
            result = validator::validate(&self.constant_pool, attribute);
            result.is_ok()
        });
        result
    }

    /// Every attribute failing validation, with where it was found.
    pub fn invalid_attributes(&self) -> Vec<(AttributeLocation, ValidationError)> {
        let mut invalid = Vec::new();
        self.visit_attributes(&mut |location, attribute| {
            if let Err(e) = validator::validate(&self.constant_pool, attribute) {
                log::debug!("{:?}: {}", location, e);
                invalid.push((location, e));
            }
            true
        });
        invalid
    }

    // Stops as soon as `visit` returns false.
    fn visit_attributes(&self, visit: &mut dyn FnMut(AttributeLocation, &Attribute) -> bool) {
        let class = self
            .attributes
            .iter()
            .map(|a| (AttributeLocation::Class, a));
        let fields = self.fields.iter().enumerate().flat_map(|(i, field)| {
            field
                .attributes
                .iter()
                .map(move |a| (AttributeLocation::Field(i), a))
        });
        let methods = self.methods.iter().enumerate().flat_map(|(i, method)| {
            method.attributes.iter().flat_map(move |a| {
                let nested: &[Attribute] = match &a.info {
                    AttributeInfo::Code(code) => code.attributes.0.as_slice(),
                    _ => &[],
                };
                std::iter::once((AttributeLocation::Method(i), a))
                    .chain(nested.iter().map(move |n| (AttributeLocation::Code(i), n)))
            })
        });

        for (location, attribute) in class.chain(fields).chain(methods) {
            if !visit(location, attribute) {
                return;
            }
        }
    }
}

/// Where an attribute sits inside a class file. Fields and methods are identified by position.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AttributeLocation {
    Class,
    Field(usize),
    Method(usize),
    /// Nested in the Code attribute of a method.
    Code(usize),
}

#[derive(Debug, Clone, PartialEq)]
pub struct FieldInfo {
    pub access_flags: AccessFlags,
    pub name_index: u16,
    pub descriptor_index: u16,
    pub attributes: Attributes,
}

#[derive(Debug, Clone, PartialEq)]
pub struct MethodInfo {
    pub access_flags: AccessFlags,
    pub name_index: u16,
    pub descriptor_index: u16,
    pub attributes: Attributes,
}

//! Constant pool references held by attributes.
//!
//! Every attribute kind lists the pool indices it holds as [`ReferencedSlot`]s, each carrying the
//! tags acceptable at that index. The validator checks the slots against a pool, and
//! [`CpReferences::cp_accesses`] reduces them to the set of entries an attribute keeps alive.

use std::{collections::BTreeSet, fmt};

use crate::{
    attributes::{
        Annotation, Attribute, AttributeInfo, Attributes, CodeAttribute, ElementValue,
        InnerClass, TypeAnnotation,
    },
    constant_pool::Tag,
};

/// Tags accepted at a referenced pool index.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TagConstraint {
    Exactly(Tag),
    /// Inclusive range in tag order.
    Range(Tag, Tag),
    OneOf(&'static [Tag]),
}
impl TagConstraint {
    /// Entries a ConstantValue attribute may point at.
    pub const CONSTANT_VALUE: TagConstraint =
        TagConstraint::OneOf(&[Tag::Integer, Tag::Float, Tag::Long, Tag::Double, Tag::String]);

    /// Entries backing a primitive element value.
    pub const PRIMITIVE: TagConstraint = TagConstraint::Range(Tag::Integer, Tag::Double);

    pub fn accepts(&self, tag: Tag) -> bool {
        match self {
            TagConstraint::Exactly(expected) => tag == *expected,
            TagConstraint::Range(low, high) => (*low..=*high).contains(&tag),
            TagConstraint::OneOf(tags) => tags.contains(&tag),
        }
    }
}
impl fmt::Display for TagConstraint {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            TagConstraint::Exactly(tag) => write!(f, "{}", tag),
            TagConstraint::Range(low, high) => write!(f, "{}..={}", low, high),
            TagConstraint::OneOf(tags) => {
                let names = tags.iter().map(Tag::to_string).collect::<Vec<_>>();
                write!(f, "one of {}", names.join(", "))
            }
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ReferencedSlot {
    pub index: u16,
    pub constraint: TagConstraint,
    /// The field may hold 0 to mean the reference is absent.
    pub zero_allowed: bool,
}
impl ReferencedSlot {
    pub fn new(index: u16, constraint: TagConstraint) -> Self {
        Self {
            index,
            constraint,
            zero_allowed: false,
        }
    }

    pub fn optional(index: u16, constraint: TagConstraint) -> Self {
        Self {
            index,
            constraint,
            zero_allowed: true,
        }
    }

    fn utf8(index: u16) -> Self {
        Self::new(index, TagConstraint::Exactly(Tag::Utf8))
    }

    fn class(index: u16) -> Self {
        Self::new(index, TagConstraint::Exactly(Tag::Class))
    }
}

pub trait CpReferences {
    fn push_slots(&self, slots: &mut Vec<ReferencedSlot>);

    fn referenced_slots(&self) -> Vec<ReferencedSlot> {
        let mut slots = Vec::new();
        self.push_slots(&mut slots);
        slots
    }

    /// Pool indices this value depends on. Absent references (index 0) are left out.
    fn cp_accesses(&self) -> BTreeSet<u16> {
        self.referenced_slots()
            .into_iter()
            .map(|slot| slot.index)
            .filter(|&index| index != 0)
            .collect()
    }
}

impl CpReferences for Attribute {
    fn push_slots(&self, slots: &mut Vec<ReferencedSlot>) {
        slots.push(ReferencedSlot::utf8(self.name_index));
        self.info.push_slots(slots);
    }
}

impl CpReferences for Attributes {
    fn push_slots(&self, slots: &mut Vec<ReferencedSlot>) {
        for attribute in self.iter() {
            attribute.push_slots(slots);
        }
    }
}

impl CpReferences for AttributeInfo {
    fn push_slots(&self, slots: &mut Vec<ReferencedSlot>) {
        match self {
            AttributeInfo::ConstantValue {
                constant_value_index,
            } => slots.push(ReferencedSlot::new(
                *constant_value_index,
                TagConstraint::CONSTANT_VALUE,
            )),
            AttributeInfo::Annotations(annotations) => {
                annotations.iter().for_each(|a| a.push_slots(slots))
            }
            AttributeInfo::TypeAnnotations(annotations) => {
                annotations.iter().for_each(|a| a.push_slots(slots))
            }
            AttributeInfo::ParameterAnnotations(parameters) => parameters
                .iter()
                .flatten()
                .for_each(|a| a.push_slots(slots)),
            AttributeInfo::AnnotationDefault(value) => value.push_slots(slots),
            AttributeInfo::NestHost { host_class_index } => {
                slots.push(ReferencedSlot::class(*host_class_index))
            }
            AttributeInfo::NestMembers(classes) | AttributeInfo::Exceptions(classes) => {
                slots.extend(classes.iter().map(|&index| ReferencedSlot::class(index)))
            }
            AttributeInfo::EnclosingMethod {
                class_index,
                method_index,
            } => {
                slots.push(ReferencedSlot::class(*class_index));
                slots.push(ReferencedSlot::optional(
                    *method_index,
                    TagConstraint::Exactly(Tag::NameAndType),
                ));
            }
            AttributeInfo::InnerClasses(classes) => {
                classes.iter().for_each(|c| c.push_slots(slots))
            }
            AttributeInfo::Code(code) => code.push_slots(slots),
            AttributeInfo::Raw(_) => {}
        }
    }
}

impl CpReferences for Annotation {
    fn push_slots(&self, slots: &mut Vec<ReferencedSlot>) {
        slots.push(ReferencedSlot::utf8(self.type_index));
        for pair in &self.element_value_pairs {
            slots.push(ReferencedSlot::utf8(pair.name_index));
            pair.value.push_slots(slots);
        }
    }
}

impl CpReferences for TypeAnnotation {
    fn push_slots(&self, slots: &mut Vec<ReferencedSlot>) {
        self.annotation.push_slots(slots);
    }
}

impl CpReferences for ElementValue {
    fn push_slots(&self, slots: &mut Vec<ReferencedSlot>) {
        match self {
            ElementValue::Primitive {
                const_value_index, ..
            } => slots.push(ReferencedSlot::new(
                *const_value_index,
                TagConstraint::PRIMITIVE,
            )),
            ElementValue::Utf8 { utf8_index } => slots.push(ReferencedSlot::utf8(*utf8_index)),
            ElementValue::Enum {
                type_name_index,
                const_name_index,
            } => {
                slots.push(ReferencedSlot::utf8(*type_name_index));
                slots.push(ReferencedSlot::utf8(*const_name_index));
            }
            ElementValue::Class { class_info_index } => {
                slots.push(ReferencedSlot::class(*class_info_index))
            }
            ElementValue::Annotation(annotation) => annotation.push_slots(slots),
            ElementValue::Array(values) => values.iter().for_each(|v| v.push_slots(slots)),
        }
    }
}

impl CpReferences for InnerClass {
    fn push_slots(&self, slots: &mut Vec<ReferencedSlot>) {
        slots.push(ReferencedSlot::class(self.inner_class_info_index));
        slots.push(ReferencedSlot::optional(
            self.outer_class_info_index,
            TagConstraint::Exactly(Tag::Class),
        ));
        slots.push(ReferencedSlot::optional(
            self.inner_name_index,
            TagConstraint::Exactly(Tag::Utf8),
        ));
    }
}

// Operands inside `code` are not decoded, so only the exception table and nested attributes
// contribute.
impl CpReferences for CodeAttribute {
    fn push_slots(&self, slots: &mut Vec<ReferencedSlot>) {
        slots.extend(self.exception_table.iter().map(|entry| {
            ReferencedSlot::optional(entry.catch_type, TagConstraint::Exactly(Tag::Class))
        }));
        self.attributes.push_slots(slots);
    }
}

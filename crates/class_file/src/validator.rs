use crate::{
    attributes::{Attribute, AttributeInfo, AttributeName},
    error::ValidationError,
    references::CpReferences,
    ConstantPool,
};

/// Checks that every constant pool reference held by `attribute` is in bounds and points at an
/// entry of an acceptable kind.
///
/// Attributes with an unknown name, a name without reference rules, or an opaque payload pass
/// unchecked. EnclosingMethod and InnerClasses accept 0 in every slot.
pub fn validate(constant_pool: &ConstantPool, attribute: &Attribute) -> Result<(), ValidationError> {
    let size = constant_pool.size();
    let name_index = attribute.name_index;
    if name_index == 0 || name_index as usize >= size {
        return Err(ValidationError::NameOutOfBounds {
            index: name_index,
            size,
        });
    }

    let name = constant_pool
        .get_utf8(name_index)
        .map_err(|_| ValidationError::NameNotUtf8 { index: name_index })?;
    let Some(name) = AttributeName::parse(name).filter(AttributeName::has_reference_rules) else {
        return Ok(());
    };
    if let AttributeInfo::Raw(_) = attribute.info {
        return Ok(());
    }
    if !attribute.info.belongs_to(name) {
        return Err(ValidationError::PayloadMismatch {
            name: name.as_str(),
            payload: attribute.info.kind(),
        });
    }

    let zero_index_allowed = name.allows_zero_index();
    for slot in attribute.info.referenced_slots() {
        let zero_allowed = zero_index_allowed || slot.zero_allowed;
        let min = if zero_allowed { 0 } else { 1 };
        if slot.index < min || slot.index as usize >= size {
            return Err(ValidationError::OutOfBounds {
                name: name.as_str(),
                index: slot.index,
                size,
            });
        }
        if zero_allowed && slot.index == 0 {
            continue;
        }

        let found = constant_pool.get(slot.index).ok().and_then(|c| c.tag());
        if !found.map_or(false, |tag| slot.constraint.accepts(tag)) {
            return Err(ValidationError::WrongTag {
                name: name.as_str(),
                index: slot.index,
                expected: slot.constraint,
                found,
            });
        }
    }

    Ok(())
}

/// [`validate`], reporting the failure reason at debug level.
pub fn is_valid(constant_pool: &ConstantPool, attribute: &Attribute) -> bool {
    match validate(constant_pool, attribute) {
        Ok(()) => true,
        Err(e) => {
            log::debug!("{}", e);
            false
        }
    }
}

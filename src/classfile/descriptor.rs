//! Field and method descriptor parsing.
//!
//! Descriptors are mapped into [`TypeTag`]s, which drive operand slot
//! accounting, wrapper boxing and overload selection in the rewriters.

use crate::common::error::{Error, Result};

/// Parsed form of one descriptor type
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum TypeTag {
    Boolean,
    Char,
    Byte,
    Short,
    Int,
    Long,
    Float,
    Double,
    Void,
    Reference(String),
    Array { dims: u8, elem: Box<TypeTag> },
}

impl TypeTag {
    /// Operand stack / local slot width (long and double take two)
    pub fn size(&self) -> u16 {
        match self {
            TypeTag::Long | TypeTag::Double => 2,
            TypeTag::Void => 0,
            _ => 1,
        }
    }

    pub fn is_primitive(&self) -> bool {
        !matches!(self, TypeTag::Reference(_) | TypeTag::Array { .. } | TypeTag::Void)
    }

    /// Descriptor string for this type
    pub fn descriptor(&self) -> String {
        match self {
            TypeTag::Boolean => "Z".into(),
            TypeTag::Char => "C".into(),
            TypeTag::Byte => "B".into(),
            TypeTag::Short => "S".into(),
            TypeTag::Int => "I".into(),
            TypeTag::Long => "J".into(),
            TypeTag::Float => "F".into(),
            TypeTag::Double => "D".into(),
            TypeTag::Void => "V".into(),
            TypeTag::Reference(name) => format!("L{};", name),
            TypeTag::Array { dims, elem } => {
                let mut s = "[".repeat(*dims as usize);
                s.push_str(&elem.descriptor());
                s
            }
        }
    }

    /// Wrapper type and `valueOf` descriptor for a primitive, or `None` for
    /// reference and array types which travel unboxed
    pub fn boxing(&self) -> Option<(&'static str, &'static str)> {
        match self {
            TypeTag::Boolean => Some(("java/lang/Boolean", "(Z)Ljava/lang/Boolean;")),
            TypeTag::Char => Some(("java/lang/Character", "(C)Ljava/lang/Character;")),
            TypeTag::Byte => Some(("java/lang/Byte", "(B)Ljava/lang/Byte;")),
            TypeTag::Short => Some(("java/lang/Short", "(S)Ljava/lang/Short;")),
            TypeTag::Int => Some(("java/lang/Integer", "(I)Ljava/lang/Integer;")),
            TypeTag::Long => Some(("java/lang/Long", "(J)Ljava/lang/Long;")),
            TypeTag::Float => Some(("java/lang/Float", "(F)Ljava/lang/Float;")),
            TypeTag::Double => Some(("java/lang/Double", "(D)Ljava/lang/Double;")),
            _ => None,
        }
    }

    /// Parameter descriptor of the concat-helper `insert` overload handling
    /// this operand type: primitives and single-dimension primitive arrays map
    /// to themselves, other arrays to a generic object array, anything else to
    /// a generic object.
    pub fn concat_overload(&self) -> String {
        match self {
            t if t.is_primitive() => t.descriptor(),
            TypeTag::Array { dims, elem } => {
                if *dims > 1 || !elem.is_primitive() {
                    "[Ljava/lang/Object;".into()
                } else {
                    format!("[{}", elem.descriptor())
                }
            }
            _ => "Ljava/lang/Object;".into(),
        }
    }
}

/// Parse a single field descriptor
pub fn parse_field_descriptor(descriptor: &str) -> Result<TypeTag> {
    let mut chars = descriptor.chars().peekable();
    let tag = parse_one(&mut chars, descriptor)?;
    if chars.next().is_some() {
        return Err(bad(descriptor));
    }
    if tag == TypeTag::Void {
        return Err(bad(descriptor));
    }
    Ok(tag)
}

/// Parse a method descriptor into parameter types and a return type
pub fn parse_method_descriptor(descriptor: &str) -> Result<(Vec<TypeTag>, TypeTag)> {
    let mut chars = descriptor.chars().peekable();
    if chars.next() != Some('(') {
        return Err(bad(descriptor));
    }
    let mut params = Vec::new();
    loop {
        match chars.peek() {
            Some(')') => {
                chars.next();
                break;
            }
            Some(_) => {
                let tag = parse_one(&mut chars, descriptor)?;
                if tag == TypeTag::Void {
                    return Err(bad(descriptor));
                }
                params.push(tag);
            }
            None => return Err(bad(descriptor)),
        }
    }
    let ret = parse_one(&mut chars, descriptor)?;
    if chars.next().is_some() {
        return Err(bad(descriptor));
    }
    Ok((params, ret))
}

/// Total argument slot count, used for the invokeinterface count operand
pub fn argument_slots(descriptor: &str) -> Result<u16> {
    let (params, _) = parse_method_descriptor(descriptor)?;
    Ok(params.iter().map(TypeTag::size).sum())
}

fn parse_one(
    chars: &mut std::iter::Peekable<std::str::Chars<'_>>,
    whole: &str,
) -> Result<TypeTag> {
    let c = chars.next().ok_or_else(|| bad(whole))?;
    Ok(match c {
        'Z' => TypeTag::Boolean,
        'C' => TypeTag::Char,
        'B' => TypeTag::Byte,
        'S' => TypeTag::Short,
        'I' => TypeTag::Int,
        'J' => TypeTag::Long,
        'F' => TypeTag::Float,
        'D' => TypeTag::Double,
        'V' => TypeTag::Void,
        'L' => {
            let mut name = String::new();
            loop {
                match chars.next() {
                    Some(';') => break,
                    Some(c) => name.push(c),
                    None => return Err(bad(whole)),
                }
            }
            if name.is_empty() {
                return Err(bad(whole));
            }
            TypeTag::Reference(name)
        }
        '[' => {
            let mut dims = 1u8;
            while chars.peek() == Some(&'[') {
                chars.next();
                dims = dims.checked_add(1).ok_or_else(|| bad(whole))?;
            }
            let elem = parse_one(chars, whole)?;
            if matches!(elem, TypeTag::Void | TypeTag::Array { .. }) {
                return Err(bad(whole));
            }
            TypeTag::Array { dims, elem: Box::new(elem) }
        }
        _ => return Err(bad(whole)),
    })
}

fn bad(descriptor: &str) -> Error {
    Error::class_format(format!("malformed descriptor: {}", descriptor))
}

//! Constant pool model for Java class files: parsing, interning and
//! serialization.
//!
//! Pool indices are 1-based; `Long` and `Double` entries occupy two slots.
//! Interning is find-or-add so a pool seeded from parsed input stays
//! index-stable while new constants are appended.

use crate::common::error::{Error, Result};
use crate::consts::MAX_POOL_ENTRIES;
use super::mutf8;

pub mod constant_tags {
    pub const CONSTANT_UTF8: u8 = 1;
    pub const CONSTANT_INTEGER: u8 = 3;
    pub const CONSTANT_FLOAT: u8 = 4;
    pub const CONSTANT_LONG: u8 = 5;
    pub const CONSTANT_DOUBLE: u8 = 6;
    pub const CONSTANT_CLASS: u8 = 7;
    pub const CONSTANT_STRING: u8 = 8;
    pub const CONSTANT_FIELDREF: u8 = 9;
    pub const CONSTANT_METHODREF: u8 = 10;
    pub const CONSTANT_INTERFACEMETHODREF: u8 = 11;
    pub const CONSTANT_NAMEANDTYPE: u8 = 12;
    pub const CONSTANT_METHODHANDLE: u8 = 15;
    pub const CONSTANT_METHODTYPE: u8 = 16;
    pub const CONSTANT_DYNAMIC: u8 = 17;
    pub const CONSTANT_INVOKEDYNAMIC: u8 = 18;
    pub const CONSTANT_MODULE: u8 = 19;
    pub const CONSTANT_PACKAGE: u8 = 20;
}

#[derive(Debug, Clone)]
pub enum Constant {
    Utf8(String),
    Integer(i32),
    Float(f32),
    Long(i64),
    Double(f64),
    Class(u16),
    String(u16),
    FieldRef(u16, u16),
    MethodRef(u16, u16),
    InterfaceMethodRef(u16, u16),
    NameAndType(u16, u16),
    MethodHandle(u8, u16),
    MethodType(u16),
    Dynamic(u16, u16),
    InvokeDynamic(u16, u16),
    Module(u16),
    Package(u16),
}

impl PartialEq for Constant {
    fn eq(&self, other: &Self) -> bool {
        use Constant::*;
        match (self, other) {
            (Utf8(a), Utf8(b)) => a == b,
            (Integer(a), Integer(b)) => a == b,
            // Bit compare so NaN constants intern consistently
            (Float(a), Float(b)) => a.to_bits() == b.to_bits(),
            (Long(a), Long(b)) => a == b,
            (Double(a), Double(b)) => a.to_bits() == b.to_bits(),
            (Class(a), Class(b)) => a == b,
            (String(a), String(b)) => a == b,
            (FieldRef(a1, a2), FieldRef(b1, b2)) => a1 == b1 && a2 == b2,
            (MethodRef(a1, a2), MethodRef(b1, b2)) => a1 == b1 && a2 == b2,
            (InterfaceMethodRef(a1, a2), InterfaceMethodRef(b1, b2)) => a1 == b1 && a2 == b2,
            (NameAndType(a1, a2), NameAndType(b1, b2)) => a1 == b1 && a2 == b2,
            (MethodHandle(a1, a2), MethodHandle(b1, b2)) => a1 == b1 && a2 == b2,
            (MethodType(a), MethodType(b)) => a == b,
            (Dynamic(a1, a2), Dynamic(b1, b2)) => a1 == b1 && a2 == b2,
            (InvokeDynamic(a1, a2), InvokeDynamic(b1, b2)) => a1 == b1 && a2 == b2,
            (Module(a), Module(b)) => a == b,
            (Package(a), Package(b)) => a == b,
            _ => false,
        }
    }
}

impl Constant {
    /// Long and double constants take two pool slots
    pub fn is_wide(&self) -> bool {
        matches!(self, Constant::Long(_) | Constant::Double(_))
    }

    pub fn to_bytes(&self) -> Vec<u8> {
        use constant_tags::*;
        let mut bytes = Vec::new();
        match self {
            Constant::Utf8(value) => {
                bytes.push(CONSTANT_UTF8);
                let utf8_bytes = mutf8::encode(value);
                bytes.extend_from_slice(&(utf8_bytes.len() as u16).to_be_bytes());
                bytes.extend_from_slice(&utf8_bytes);
            }
            Constant::Integer(value) => {
                bytes.push(CONSTANT_INTEGER);
                bytes.extend_from_slice(&value.to_be_bytes());
            }
            Constant::Float(value) => {
                bytes.push(CONSTANT_FLOAT);
                bytes.extend_from_slice(&value.to_be_bytes());
            }
            Constant::Long(value) => {
                bytes.push(CONSTANT_LONG);
                bytes.extend_from_slice(&value.to_be_bytes());
            }
            Constant::Double(value) => {
                bytes.push(CONSTANT_DOUBLE);
                bytes.extend_from_slice(&value.to_be_bytes());
            }
            Constant::Class(name_index) => {
                bytes.push(CONSTANT_CLASS);
                bytes.extend_from_slice(&name_index.to_be_bytes());
            }
            Constant::String(string_index) => {
                bytes.push(CONSTANT_STRING);
                bytes.extend_from_slice(&string_index.to_be_bytes());
            }
            Constant::FieldRef(class_index, nat_index) => {
                bytes.push(CONSTANT_FIELDREF);
                bytes.extend_from_slice(&class_index.to_be_bytes());
                bytes.extend_from_slice(&nat_index.to_be_bytes());
            }
            Constant::MethodRef(class_index, nat_index) => {
                bytes.push(CONSTANT_METHODREF);
                bytes.extend_from_slice(&class_index.to_be_bytes());
                bytes.extend_from_slice(&nat_index.to_be_bytes());
            }
            Constant::InterfaceMethodRef(class_index, nat_index) => {
                bytes.push(CONSTANT_INTERFACEMETHODREF);
                bytes.extend_from_slice(&class_index.to_be_bytes());
                bytes.extend_from_slice(&nat_index.to_be_bytes());
            }
            Constant::NameAndType(name_index, descriptor_index) => {
                bytes.push(CONSTANT_NAMEANDTYPE);
                bytes.extend_from_slice(&name_index.to_be_bytes());
                bytes.extend_from_slice(&descriptor_index.to_be_bytes());
            }
            Constant::MethodHandle(reference_kind, reference_index) => {
                bytes.push(CONSTANT_METHODHANDLE);
                bytes.push(*reference_kind);
                bytes.extend_from_slice(&reference_index.to_be_bytes());
            }
            Constant::MethodType(descriptor_index) => {
                bytes.push(CONSTANT_METHODTYPE);
                bytes.extend_from_slice(&descriptor_index.to_be_bytes());
            }
            Constant::Dynamic(bsm_index, nat_index) => {
                bytes.push(CONSTANT_DYNAMIC);
                bytes.extend_from_slice(&bsm_index.to_be_bytes());
                bytes.extend_from_slice(&nat_index.to_be_bytes());
            }
            Constant::InvokeDynamic(bsm_index, nat_index) => {
                bytes.push(CONSTANT_INVOKEDYNAMIC);
                bytes.extend_from_slice(&bsm_index.to_be_bytes());
                bytes.extend_from_slice(&nat_index.to_be_bytes());
            }
            Constant::Module(name_index) => {
                bytes.push(CONSTANT_MODULE);
                bytes.extend_from_slice(&name_index.to_be_bytes());
            }
            Constant::Package(name_index) => {
                bytes.push(CONSTANT_PACKAGE);
                bytes.extend_from_slice(&name_index.to_be_bytes());
            }
        }
        bytes
    }
}

/// One physical pool slot. The slot after a long/double entry is reserved.
#[derive(Debug, Clone)]
enum Slot {
    Entry(Constant),
    Reserved,
}

#[derive(Debug, Clone, Default)]
pub struct ConstantPool {
    slots: Vec<Slot>,
    overflowed: bool,
}

impl ConstantPool {
    pub fn new() -> Self {
        Self { slots: Vec::new(), overflowed: false }
    }

    /// Number of physical slots plus one, as written in the classfile header
    pub fn count(&self) -> u16 {
        (self.slots.len() + 1) as u16
    }

    /// Whether an intern call ran the pool past the 16-bit index space
    pub fn overflowed(&self) -> bool {
        self.overflowed
    }

    pub fn get(&self, index: u16) -> Result<&Constant> {
        match self.slots.get(index.wrapping_sub(1) as usize) {
            Some(Slot::Entry(c)) => Ok(c),
            _ => Err(Error::class_format(format!("invalid constant pool index {}", index))),
        }
    }

    pub fn utf8(&self, index: u16) -> Result<&str> {
        match self.get(index)? {
            Constant::Utf8(s) => Ok(s),
            _ => Err(Error::class_format(format!("constant {} is not Utf8", index))),
        }
    }

    pub fn class_name(&self, index: u16) -> Result<&str> {
        match self.get(index)? {
            Constant::Class(name_index) => self.utf8(*name_index),
            _ => Err(Error::class_format(format!("constant {} is not Class", index))),
        }
    }

    /// Class name for an optional index (0 means absent, e.g. Object's super)
    pub fn opt_class_name(&self, index: u16) -> Result<Option<&str>> {
        if index == 0 {
            Ok(None)
        } else {
            self.class_name(index).map(Some)
        }
    }

    pub fn name_and_type(&self, index: u16) -> Result<(&str, &str)> {
        match self.get(index)? {
            Constant::NameAndType(name_index, descriptor_index) => {
                Ok((self.utf8(*name_index)?, self.utf8(*descriptor_index)?))
            }
            _ => Err(Error::class_format(format!("constant {} is not NameAndType", index))),
        }
    }

    /// Resolve a field/method/interface-method reference into
    /// `(owner, name, descriptor, is_interface)`
    pub fn member_ref(&self, index: u16) -> Result<(&str, &str, &str, bool)> {
        let (class_index, nat_index, itf) = match self.get(index)? {
            Constant::FieldRef(c, n) => (*c, *n, false),
            Constant::MethodRef(c, n) => (*c, *n, false),
            Constant::InterfaceMethodRef(c, n) => (*c, *n, true),
            _ => {
                return Err(Error::class_format(format!("constant {} is not a member reference", index)))
            }
        };
        let owner = self.class_name(class_index)?;
        let (name, descriptor) = self.name_and_type(nat_index)?;
        Ok((owner, name, descriptor, itf))
    }

    pub fn module_name(&self, index: u16) -> Result<&str> {
        match self.get(index)? {
            Constant::Module(name_index) => self.utf8(*name_index),
            _ => Err(Error::class_format(format!("constant {} is not Module", index))),
        }
    }

    pub fn package_name(&self, index: u16) -> Result<&str> {
        match self.get(index)? {
            Constant::Package(name_index) => self.utf8(*name_index),
            _ => Err(Error::class_format(format!("constant {} is not Package", index))),
        }
    }

    fn find(&self, constant: &Constant) -> Option<u16> {
        self.slots.iter().position(|slot| match slot {
            Slot::Entry(c) => c == constant,
            Slot::Reserved => false,
        }).map(|pos| (pos + 1) as u16)
    }

    /// Find-or-add. Returns 0 and flags overflow once the index space is spent;
    /// the writer surfaces the latched overflow when it finalizes.
    fn intern(&mut self, constant: Constant) -> u16 {
        if let Some(index) = self.find(&constant) {
            return index;
        }
        let needed = if constant.is_wide() { 2 } else { 1 };
        if self.slots.len() + needed >= MAX_POOL_ENTRIES {
            self.overflowed = true;
            return 0;
        }
        let wide = constant.is_wide();
        self.slots.push(Slot::Entry(constant));
        let index = self.slots.len() as u16;
        if wide {
            self.slots.push(Slot::Reserved);
        }
        index
    }

    pub fn add_utf8(&mut self, value: &str) -> u16 {
        self.intern(Constant::Utf8(value.to_string()))
    }

    pub fn add_integer(&mut self, value: i32) -> u16 {
        self.intern(Constant::Integer(value))
    }

    pub fn add_float(&mut self, value: f32) -> u16 {
        self.intern(Constant::Float(value))
    }

    pub fn add_long(&mut self, value: i64) -> u16 {
        self.intern(Constant::Long(value))
    }

    pub fn add_double(&mut self, value: f64) -> u16 {
        self.intern(Constant::Double(value))
    }

    pub fn add_class(&mut self, name: &str) -> u16 {
        let name_index = self.add_utf8(name);
        self.intern(Constant::Class(name_index))
    }

    pub fn add_string(&mut self, value: &str) -> u16 {
        let value_index = self.add_utf8(value);
        self.intern(Constant::String(value_index))
    }

    pub fn add_name_and_type(&mut self, name: &str, descriptor: &str) -> u16 {
        let name_index = self.add_utf8(name);
        let descriptor_index = self.add_utf8(descriptor);
        self.intern(Constant::NameAndType(name_index, descriptor_index))
    }

    pub fn add_field_ref(&mut self, owner: &str, name: &str, descriptor: &str) -> u16 {
        let class_index = self.add_class(owner);
        let nat_index = self.add_name_and_type(name, descriptor);
        self.intern(Constant::FieldRef(class_index, nat_index))
    }

    pub fn add_method_ref(&mut self, owner: &str, name: &str, descriptor: &str) -> u16 {
        let class_index = self.add_class(owner);
        let nat_index = self.add_name_and_type(name, descriptor);
        self.intern(Constant::MethodRef(class_index, nat_index))
    }

    pub fn add_interface_method_ref(&mut self, owner: &str, name: &str, descriptor: &str) -> u16 {
        let class_index = self.add_class(owner);
        let nat_index = self.add_name_and_type(name, descriptor);
        self.intern(Constant::InterfaceMethodRef(class_index, nat_index))
    }

    pub fn add_method_handle(&mut self, reference_kind: u8, reference_index: u16) -> u16 {
        self.intern(Constant::MethodHandle(reference_kind, reference_index))
    }

    pub fn add_method_type(&mut self, descriptor: &str) -> u16 {
        let descriptor_index = self.add_utf8(descriptor);
        self.intern(Constant::MethodType(descriptor_index))
    }

    pub fn add_invoke_dynamic(&mut self, bsm_index: u16, name: &str, descriptor: &str) -> u16 {
        let nat_index = self.add_name_and_type(name, descriptor);
        self.intern(Constant::InvokeDynamic(bsm_index, nat_index))
    }

    pub fn add_dynamic(&mut self, bsm_index: u16, name: &str, descriptor: &str) -> u16 {
        let nat_index = self.add_name_and_type(name, descriptor);
        self.intern(Constant::Dynamic(bsm_index, nat_index))
    }

    pub fn add_module(&mut self, name: &str) -> u16 {
        let name_index = self.add_utf8(name);
        self.intern(Constant::Module(name_index))
    }

    pub fn add_package(&mut self, name: &str) -> u16 {
        let name_index = self.add_utf8(name);
        self.intern(Constant::Package(name_index))
    }

    /// Parse a pool from raw classfile bytes. `data` starts at the
    /// constant_pool_count field; returns the pool and the number of bytes
    /// consumed.
    pub fn parse(data: &[u8]) -> Result<(Self, usize)> {
        use constant_tags::*;
        fn take(data: &[u8], pos: usize, n: usize) -> Result<&[u8]> {
            data.get(pos..pos + n)
                .ok_or_else(|| Error::class_format("truncated constant pool"))
        }
        fn read_u16(data: &[u8], pos: usize) -> Result<u16> {
            Ok(u16::from_be_bytes(take(data, pos, 2)?.try_into().unwrap()))
        }
        let count = read_u16(data, 0)?;
        let mut pool = ConstantPool::new();
        let mut pos = 2;
        let mut index = 1u16;
        while index < count {
            let tag = *take(data, pos, 1)?.first().unwrap();
            pos += 1;
            let constant = match tag {
                CONSTANT_UTF8 => {
                    let len = read_u16(data, pos)? as usize;
                    let bytes = take(data, pos + 2, len)?;
                    pos += 2 + len;
                    Constant::Utf8(mutf8::decode(bytes)?)
                }
                CONSTANT_INTEGER => {
                    let v = i32::from_be_bytes(take(data, pos, 4)?.try_into().unwrap());
                    pos += 4;
                    Constant::Integer(v)
                }
                CONSTANT_FLOAT => {
                    let v = f32::from_be_bytes(take(data, pos, 4)?.try_into().unwrap());
                    pos += 4;
                    Constant::Float(v)
                }
                CONSTANT_LONG => {
                    let v = i64::from_be_bytes(take(data, pos, 8)?.try_into().unwrap());
                    pos += 8;
                    Constant::Long(v)
                }
                CONSTANT_DOUBLE => {
                    let v = f64::from_be_bytes(take(data, pos, 8)?.try_into().unwrap());
                    pos += 8;
                    Constant::Double(v)
                }
                CONSTANT_CLASS => {
                    let v = read_u16(data, pos)?;
                    pos += 2;
                    Constant::Class(v)
                }
                CONSTANT_STRING => {
                    let v = read_u16(data, pos)?;
                    pos += 2;
                    Constant::String(v)
                }
                CONSTANT_FIELDREF => {
                    let (a, b) = (read_u16(data, pos)?, read_u16(data, pos + 2)?);
                    pos += 4;
                    Constant::FieldRef(a, b)
                }
                CONSTANT_METHODREF => {
                    let (a, b) = (read_u16(data, pos)?, read_u16(data, pos + 2)?);
                    pos += 4;
                    Constant::MethodRef(a, b)
                }
                CONSTANT_INTERFACEMETHODREF => {
                    let (a, b) = (read_u16(data, pos)?, read_u16(data, pos + 2)?);
                    pos += 4;
                    Constant::InterfaceMethodRef(a, b)
                }
                CONSTANT_NAMEANDTYPE => {
                    let (a, b) = (read_u16(data, pos)?, read_u16(data, pos + 2)?);
                    pos += 4;
                    Constant::NameAndType(a, b)
                }
                CONSTANT_METHODHANDLE => {
                    let kind = *take(data, pos, 1)?.first().unwrap();
                    let v = read_u16(data, pos + 1)?;
                    pos += 3;
                    Constant::MethodHandle(kind, v)
                }
                CONSTANT_METHODTYPE => {
                    let v = read_u16(data, pos)?;
                    pos += 2;
                    Constant::MethodType(v)
                }
                CONSTANT_DYNAMIC => {
                    let (a, b) = (read_u16(data, pos)?, read_u16(data, pos + 2)?);
                    pos += 4;
                    Constant::Dynamic(a, b)
                }
                CONSTANT_INVOKEDYNAMIC => {
                    let (a, b) = (read_u16(data, pos)?, read_u16(data, pos + 2)?);
                    pos += 4;
                    Constant::InvokeDynamic(a, b)
                }
                CONSTANT_MODULE => {
                    let v = read_u16(data, pos)?;
                    pos += 2;
                    Constant::Module(v)
                }
                CONSTANT_PACKAGE => {
                    let v = read_u16(data, pos)?;
                    pos += 2;
                    Constant::Package(v)
                }
                other => {
                    return Err(Error::class_format(format!(
                        "unknown constant pool tag {} at index {}",
                        other, index
                    )))
                }
            };
            let wide = constant.is_wide();
            pool.slots.push(Slot::Entry(constant));
            if wide {
                pool.slots.push(Slot::Reserved);
                index += 2;
            } else {
                index += 1;
            }
        }
        Ok((pool, pos))
    }

    pub fn write_to(&self, buffer: &mut Vec<u8>) {
        buffer.extend_from_slice(&self.count().to_be_bytes());
        for slot in &self.slots {
            if let Slot::Entry(constant) = slot {
                buffer.extend_from_slice(&constant.to_bytes());
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_intern_deduplicates() {
        let mut pool = ConstantPool::new();
        let a = pool.add_class("java/lang/Object");
        let b = pool.add_class("java/lang/Object");
        assert_eq!(a, b);
        assert_eq!(pool.add_utf8("java/lang/Object"), 1);
    }

    #[test]
    fn test_wide_constants_take_two_slots() {
        let mut pool = ConstantPool::new();
        let l = pool.add_long(42);
        let next = pool.add_utf8("after");
        assert_eq!(next, l + 2);
    }

    #[test]
    fn test_parse_round_trip() {
        let mut pool = ConstantPool::new();
        pool.add_method_ref("java/lang/Object", "<init>", "()V");
        pool.add_double(1.5);
        pool.add_string("hello");
        let mut bytes = Vec::new();
        pool.write_to(&mut bytes);

        let (parsed, consumed) = ConstantPool::parse(&bytes).unwrap();
        assert_eq!(consumed, bytes.len());
        assert_eq!(parsed.count(), pool.count());
        let (owner, name, desc, itf) = parsed.member_ref(6).unwrap();
        assert_eq!((owner, name, desc, itf), ("java/lang/Object", "<init>", "()V", false));
    }

    #[test]
    fn test_invalid_index_rejected() {
        let pool = ConstantPool::new();
        assert!(pool.get(1).is_err());
        assert!(pool.get(0).is_err());
    }
}

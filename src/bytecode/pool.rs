//! Deduplicating facade over the class-file constant pool.
//!
//! Besides handing out indices it remembers what each index denotes, so the
//! stack simulator can recover member descriptors from an instruction's
//! operand.

use crate::error::Result;
use ristretto_classfile::{Constant, ConstantPool};
use std::collections::HashMap;

/// Decoded meaning of a constant-pool index.
#[derive(Debug, Clone, PartialEq)]
pub enum PoolEntry {
    Utf8(String),
    Class(String),
    String(String),
    Integer(i32),
    Float(f32),
    Long(i64),
    Double(f64),
    FieldRef(MemberKey),
    MethodRef(MemberKey),
    InterfaceMethodRef(MemberKey),
}

#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct MemberKey {
    pub owner: String,
    pub name: String,
    pub descriptor: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Hash)]
enum Key {
    Utf8(String),
    Class(String),
    String(String),
    Integer(i32),
    Float(u32),
    Long(i64),
    Double(u64),
    NameAndType(String, String),
    Field(MemberKey),
    Method(MemberKey),
    InterfaceMethod(MemberKey),
}

#[derive(Debug, Default)]
pub struct PoolCache {
    pool: ConstantPool,
    indices: HashMap<Key, u16>,
    entries: HashMap<u16, PoolEntry>,
}

impl PoolCache {
    pub fn new() -> Self {
        PoolCache::default()
    }

    pub fn entry(&self, index: u16) -> Option<&PoolEntry> {
        self.entries.get(&index)
    }

    pub fn pool(&self) -> &ConstantPool {
        &self.pool
    }

    pub fn into_inner(self) -> ConstantPool {
        self.pool
    }

    fn intern(
        &mut self,
        key: Key,
        entry: PoolEntry,
        add: impl FnOnce(&mut ConstantPool) -> ristretto_classfile::Result<u16>,
    ) -> Result<u16> {
        if let Some(index) = self.indices.get(&key) {
            return Ok(*index);
        }
        let index = add(&mut self.pool)?;
        self.indices.insert(key, index);
        self.entries.insert(index, entry);
        Ok(index)
    }

    pub fn utf8(&mut self, value: &str) -> Result<u16> {
        self.intern(
            Key::Utf8(value.to_string()),
            PoolEntry::Utf8(value.to_string()),
            |cp| cp.add_utf8(value),
        )
    }

    /// `internal_name` is slash-separated (or an array descriptor).
    pub fn class(&mut self, internal_name: &str) -> Result<u16> {
        let name_index = self.utf8(internal_name)?;
        self.intern(
            Key::Class(internal_name.to_string()),
            PoolEntry::Class(internal_name.to_string()),
            |cp| cp.add(Constant::Class(name_index)),
        )
    }

    pub fn string(&mut self, value: &str) -> Result<u16> {
        let utf8_index = self.utf8(value)?;
        self.intern(
            Key::String(value.to_string()),
            PoolEntry::String(value.to_string()),
            |cp| cp.add(Constant::String(utf8_index)),
        )
    }

    pub fn integer(&mut self, value: i32) -> Result<u16> {
        self.intern(Key::Integer(value), PoolEntry::Integer(value), |cp| {
            cp.add_integer(value)
        })
    }

    pub fn float(&mut self, value: f32) -> Result<u16> {
        self.intern(Key::Float(value.to_bits()), PoolEntry::Float(value), |cp| {
            cp.add_float(value)
        })
    }

    pub fn long(&mut self, value: i64) -> Result<u16> {
        self.intern(Key::Long(value), PoolEntry::Long(value), |cp| cp.add_long(value))
    }

    pub fn double(&mut self, value: f64) -> Result<u16> {
        self.intern(Key::Double(value.to_bits()), PoolEntry::Double(value), |cp| {
            cp.add_double(value)
        })
    }

    fn name_and_type(&mut self, name: &str, descriptor: &str) -> Result<u16> {
        let key = Key::NameAndType(name.to_string(), descriptor.to_string());
        if let Some(index) = self.indices.get(&key) {
            return Ok(*index);
        }
        let name_index = self.utf8(name)?;
        let descriptor_index = self.utf8(descriptor)?;
        let index = self.pool.add(Constant::NameAndType {
            name_index,
            descriptor_index,
        })?;
        self.indices.insert(key, index);
        Ok(index)
    }

    pub fn field_ref(&mut self, owner: &str, name: &str, descriptor: &str) -> Result<u16> {
        let class_index = self.class(owner)?;
        let name_and_type_index = self.name_and_type(name, descriptor)?;
        let member = member(owner, name, descriptor);
        self.intern(
            Key::Field(member.clone()),
            PoolEntry::FieldRef(member),
            |cp| {
                cp.add(Constant::FieldRef {
                    class_index,
                    name_and_type_index,
                })
            },
        )
    }

    pub fn method_ref(&mut self, owner: &str, name: &str, descriptor: &str) -> Result<u16> {
        let class_index = self.class(owner)?;
        let name_and_type_index = self.name_and_type(name, descriptor)?;
        let member = member(owner, name, descriptor);
        self.intern(
            Key::Method(member.clone()),
            PoolEntry::MethodRef(member),
            |cp| {
                cp.add(Constant::MethodRef {
                    class_index,
                    name_and_type_index,
                })
            },
        )
    }

    pub fn interface_method_ref(
        &mut self,
        owner: &str,
        name: &str,
        descriptor: &str,
    ) -> Result<u16> {
        let class_index = self.class(owner)?;
        let name_and_type_index = self.name_and_type(name, descriptor)?;
        let member = member(owner, name, descriptor);
        self.intern(
            Key::InterfaceMethod(member.clone()),
            PoolEntry::InterfaceMethodRef(member),
            |cp| {
                cp.add(Constant::InterfaceMethodRef {
                    class_index,
                    name_and_type_index,
                })
            },
        )
    }

    /// Member referenced by a field or method constant.
    pub fn member(&self, index: u16) -> Option<&MemberKey> {
        match self.entry(index)? {
            PoolEntry::FieldRef(m) | PoolEntry::MethodRef(m) | PoolEntry::InterfaceMethodRef(m) => {
                Some(m)
            }
            _ => None,
        }
    }

    /// Finds the index of a method reference that was already interned.
    pub fn find_method(&self, owner: &str, name: &str) -> Option<u16> {
        self.entries.iter().find_map(|(index, entry)| match entry {
            PoolEntry::MethodRef(m) | PoolEntry::InterfaceMethodRef(m)
                if m.owner == owner && m.name == name =>
            {
                Some(*index)
            }
            _ => None,
        })
    }
}

fn member(owner: &str, name: &str, descriptor: &str) -> MemberKey {
    MemberKey {
        owner: owner.to_string(),
        name: name.to_string(),
        descriptor: descriptor.to_string(),
    }
}

//! Class file parsing, event contract and serialization.
//!
//! This module is the byte-stream collaborator the patcher core runs on top
//! of: [`ClassReader`] turns a class file buffer into structural visit
//! events, [`ClassWriter`] turns visit events back into a buffer, and
//! everything in between is polymorphic over the [`ClassVisitor`] /
//! [`MethodVisitor`] contract.

pub mod attribute;
pub mod constpool;
pub mod defs;
pub mod descriptor;
pub mod mutf8;
pub mod opcodes;
pub mod reader;
pub mod visitor;
pub mod writer;

pub use constpool::{Constant, ConstantPool};
pub use reader::ClassReader;
pub use visitor::{
    ClassVisitor, ConstValue, Handle, Label, MethodVisitor, ModuleDecl, RawAttribute,
    RecordComponent,
};
pub use writer::ClassWriter;

//! Constructor supertype call rewriting for lowered records

use crate::classfile::defs::{CONSTRUCTOR_METHOD_NAME, OBJECT_NAME, RECORD_SUPER_NAME};
use crate::classfile::opcodes::INVOKESPECIAL;
use crate::classfile::MethodVisitor;

/// Rewrites a record class's constructor to invoke `Object.<init>()V` rather
/// than `Record.<init>()V`. Every other instruction forwards untouched.
pub struct RecordConstructorRewriter<'a> {
    mv: Box<dyn MethodVisitor + 'a>,
}

impl<'a> RecordConstructorRewriter<'a> {
    pub fn new(mv: Box<dyn MethodVisitor + 'a>) -> Self {
        Self { mv }
    }
}

impl<'a> MethodVisitor for RecordConstructorRewriter<'a> {
    fn delegate(&mut self) -> Option<&mut dyn MethodVisitor> {
        Some(self.mv.as_mut())
    }

    fn visit_method_insn(&mut self, opcode: u8, owner: &str, name: &str, descriptor: &str, is_interface: bool) {
        let owner = if opcode == INVOKESPECIAL && name == CONSTRUCTOR_METHOD_NAME && owner == RECORD_SUPER_NAME {
            OBJECT_NAME
        } else {
            owner
        };
        self.mv.visit_method_insn(opcode, owner, name, descriptor, is_interface);
    }
}

//! Rewrites indified string concatenation into helper-type call sequences.
//!
//! `invokedynamic` sites linked through `makeConcatWithConstants` do not
//! resolve on pre-9 runtimes. Each such site becomes: allocate one
//! [`ConcatSupport`](crate::consts::CONCAT_HELPER_NAME) instance, feed it
//! every operand (last operand first, because the helper prepends), then
//! resolve the recipe template into the final string.

use std::cell::Cell;
use std::rc::Rc;

use crate::classfile::defs::CONSTRUCTOR_METHOD_NAME;
use crate::classfile::descriptor;
use crate::classfile::opcodes as op;
use crate::classfile::{ConstValue, Handle, MethodVisitor};
use crate::consts::{CONCAT_BOOTSTRAP_NAME, CONCAT_HELPER_NAME};
use super::recipe;

pub struct StringIndyRewriter<'a> {
    mv: Box<dyn MethodVisitor + 'a>,
    /// Sites rewritten in this method body
    replaced: usize,
    /// Running total across the whole class visit
    counter: Rc<Cell<usize>>,
}

impl<'a> StringIndyRewriter<'a> {
    pub fn new(mv: Box<dyn MethodVisitor + 'a>, counter: Rc<Cell<usize>>) -> Self {
        Self { mv, replaced: 0, counter }
    }

    /// Number of call sites this method visitor replaced
    pub fn replaced(&self) -> usize {
        self.replaced
    }

    /// Whether the call site can be lowered onto the helper type. Sites with
    /// malformed bootstrap arguments, constant placeholders, or more
    /// placeholders than stack operands pass through untouched.
    fn rewritable(recipe_text: &str, operand_count: usize) -> bool {
        !recipe::has_constant_placeholder(recipe_text)
            && recipe::argument_count(recipe_text) <= operand_count
    }

    fn helper_descriptor() -> String {
        format!("L{};", CONCAT_HELPER_NAME)
    }
}

impl<'a> MethodVisitor for StringIndyRewriter<'a> {
    fn delegate(&mut self) -> Option<&mut dyn MethodVisitor> {
        Some(self.mv.as_mut())
    }

    fn visit_invoke_dynamic(&mut self, name: &str, descriptor: &str, bootstrap: &Handle, args: &[ConstValue]) {
        let recipe_text = match args.first() {
            Some(ConstValue::Str(s)) if name == CONCAT_BOOTSTRAP_NAME => s.clone(),
            _ => {
                self.mv.visit_invoke_dynamic(name, descriptor, bootstrap, args);
                return;
            }
        };
        let operands = match descriptor::parse_method_descriptor(descriptor) {
            Ok((params, _)) => params,
            Err(_) => {
                self.mv.visit_invoke_dynamic(name, descriptor, bootstrap, args);
                return;
            }
        };
        if !Self::rewritable(&recipe_text, operands.len()) {
            self.mv.visit_invoke_dynamic(name, descriptor, bootstrap, args);
            return;
        }

        // Fresh helper instance; the operands sit below it on the stack
        self.mv.visit_type_insn(op::NEW, CONCAT_HELPER_NAME);
        self.mv.visit_insn(op::DUP);
        self.mv.visit_method_insn(op::INVOKESPECIAL, CONCAT_HELPER_NAME, CONSTRUCTOR_METHOD_NAME, "()V", false);

        // Transfer operands last-first; the helper prepends, restoring
        // declaration order at resolution time
        for operand in operands.iter().rev() {
            if operand.size() == 1 {
                // One swap brings the operand above the helper
                self.mv.visit_insn(op::SWAP);
            } else {
                // Two-slot operands: sink a helper copy below the operand,
                // then drop the original on top
                self.mv.visit_insn(op::DUP_X2);
                self.mv.visit_insn(op::POP);
            }
            let insert_descriptor = format!("({}){}", operand.concat_overload(), Self::helper_descriptor());
            self.mv.visit_method_insn(op::INVOKEVIRTUAL, CONCAT_HELPER_NAME, "insert", &insert_descriptor, false);
        }

        // Resolve against the recipe template
        self.mv.visit_ldc(&ConstValue::Str(recipe_text));
        let build_descriptor = "(Ljava/lang/String;)Ljava/lang/String;";
        self.mv.visit_method_insn(op::INVOKEVIRTUAL, CONCAT_HELPER_NAME, "build", build_descriptor, false);

        self.replaced += 1;
        self.counter.set(self.counter.get() + 1);
    }

    fn visit_maxs(&mut self, max_stack: u16, max_locals: u16) {
        // The helper instance and its duplicate ride above the original
        // operands while a site is being lowered
        let max_stack = if self.replaced > 0 { max_stack + 2 } else { max_stack };
        self.mv.visit_maxs(max_stack, max_locals);
    }
}

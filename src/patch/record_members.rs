//! Replacement body synthesis for record member methods.
//!
//! Records inherit `equals`/`hashCode`/`toString` implementations wired up by
//! an `ObjectMethods` bootstrap that does not exist on older runtimes. The
//! rewriter here drops whatever body the compiler generated and emits a plain
//! field-by-field implementation instead, built only from the declared field
//! list. This is a full-body override: all instruction-level events from the
//! original body are ignored and the replacement is emitted at `visit_end`.

use crate::classfile::defs::access_flags::{ACC_FINAL, ACC_PUBLIC};
use crate::classfile::defs::OBJECT_NAME;
use crate::classfile::descriptor;
use crate::classfile::opcodes as op;
use crate::classfile::{Label, MethodVisitor};
use super::field_info::FieldInfo;

/// The three generated member shapes a record declares
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MemberShape {
    Equals,
    HashCode,
    ToString,
}

impl MemberShape {
    /// Recognize a generated record member from its declaration. The
    /// compiler emits these as exactly `public final`.
    pub fn recognize(access: u16, name: &str, descriptor: &str) -> Option<Self> {
        if access != ACC_PUBLIC | ACC_FINAL {
            return None;
        }
        match (name, descriptor) {
            ("equals", "(Ljava/lang/Object;)Z") => Some(MemberShape::Equals),
            ("hashCode", "()I") => Some(MemberShape::HashCode),
            ("toString", "()Ljava/lang/String;") => Some(MemberShape::ToString),
            _ => None,
        }
    }
}

/// Replaces the body of one recognized record member method.
pub struct RecordMemberRewriter<'a> {
    mv: Box<dyn MethodVisitor + 'a>,
    declaring_type: String,
    fields: Vec<FieldInfo>,
    shape: MemberShape,
    next_label: u32,
}

impl<'a> RecordMemberRewriter<'a> {
    pub fn new(
        mv: Box<dyn MethodVisitor + 'a>,
        declaring_type: impl Into<String>,
        fields: Vec<FieldInfo>,
        shape: MemberShape,
    ) -> Self {
        Self { mv, declaring_type: declaring_type.into(), fields, shape, next_label: 0 }
    }

    fn new_label(&mut self) -> Label {
        let label = Label(self.next_label);
        self.next_label += 1;
        label
    }

    fn push_int(&mut self, value: i32) {
        match value {
            -1..=5 => self.mv.visit_insn((op::ICONST_0 as i32 + value) as u8),
            -128..=127 => self.mv.visit_int_insn(op::BIPUSH, value),
            _ => self.mv.visit_int_insn(op::SIPUSH, value),
        }
    }

    /// `this.<field>` onto the stack
    fn push_field_value(&mut self, field: &FieldInfo) {
        self.mv.visit_var_insn(op::ALOAD, 0);
        self.mv.visit_field_insn(op::GETFIELD, &self.declaring_type, field.name(), field.descriptor());
    }

    /// Box a primitive stack top into its wrapper; references and arrays
    /// stay as they are (array fields keep identity semantics).
    fn box_stack_top(&mut self, descriptor: &str) {
        let boxing = descriptor::parse_field_descriptor(descriptor)
            .ok()
            .and_then(|tag| tag.boxing());
        if let Some((wrapper, value_of_descriptor)) = boxing {
            self.mv.visit_method_insn(op::INVOKESTATIC, wrapper, "valueOf", value_of_descriptor, false);
        }
    }

    /// Whether any field needs two operand slots before boxing
    fn has_wide_field(&self) -> bool {
        self.fields.iter().any(|f| {
            descriptor::parse_field_descriptor(f.descriptor())
                .map(|t| t.size() == 2)
                .unwrap_or(false)
        })
    }

    fn emit_equals(&mut self, start: Label, end: Label) -> (u16, u16) {
        let pass_equals = self.new_label();
        let pass_null = self.new_label();
        let pass_class = self.new_label();
        let cast_start = self.new_label();
        let fallback_return = self.new_label();
        // if (this == o) return true;
        self.mv.visit_var_insn(op::ALOAD, 0);
        self.mv.visit_var_insn(op::ALOAD, 1);
        self.mv.visit_jump_insn(op::IF_ACMPNE, pass_equals);
        self.mv.visit_insn(op::ICONST_1);
        self.mv.visit_insn(op::IRETURN);
        self.mv.visit_label(pass_equals);
        // if (o == null) return false;
        self.mv.visit_var_insn(op::ALOAD, 1);
        self.mv.visit_jump_insn(op::IFNONNULL, pass_null);
        self.mv.visit_insn(op::ICONST_0);
        self.mv.visit_insn(op::IRETURN);
        self.mv.visit_label(pass_null);
        // if (getClass() != o.getClass()) return false;
        self.mv.visit_var_insn(op::ALOAD, 0);
        self.mv.visit_method_insn(op::INVOKEVIRTUAL, OBJECT_NAME, "getClass", "()Ljava/lang/Class;", false);
        self.mv.visit_var_insn(op::ALOAD, 1);
        self.mv.visit_method_insn(op::INVOKEVIRTUAL, OBJECT_NAME, "getClass", "()Ljava/lang/Class;", false);
        self.mv.visit_jump_insn(op::IF_ACMPEQ, pass_class);
        self.mv.visit_insn(op::ICONST_0);
        self.mv.visit_insn(op::IRETURN);
        self.mv.visit_label(pass_class);
        // Type other = (Type) o;
        self.mv.visit_var_insn(op::ALOAD, 1);
        self.mv.visit_type_insn(op::CHECKCAST, &self.declaring_type);
        self.mv.visit_var_insn(op::ASTORE, 2);
        self.mv.visit_label(cast_start);
        // Compare all fields, bailing out on the first mismatch
        for field in self.fields.clone() {
            self.push_field_value(&field);
            self.box_stack_top(field.descriptor());
            self.mv.visit_var_insn(op::ALOAD, 2);
            self.mv.visit_field_insn(op::GETFIELD, &self.declaring_type, field.name(), field.descriptor());
            self.box_stack_top(field.descriptor());
            self.mv.visit_method_insn(
                op::INVOKESTATIC,
                "java/util/Objects",
                "equals",
                "(Ljava/lang/Object;Ljava/lang/Object;)Z",
                false,
            );
            self.mv.visit_jump_insn(op::IFEQ, fallback_return);
        }
        // All comparisons have passed
        self.mv.visit_insn(op::ICONST_1);
        self.mv.visit_insn(op::IRETURN);
        self.mv.visit_label(fallback_return);
        self.mv.visit_insn(op::ICONST_0);
        self.mv.visit_insn(op::IRETURN);

        let declaring_descriptor = format!("L{};", self.declaring_type);
        self.mv.visit_local_var("o", "Ljava/lang/Object;", start, end, 1);
        self.mv.visit_local_var("other", &declaring_descriptor, cast_start, end, 2);
        // An unboxed two-slot value below the loaded `other` raises the peak
        let max_stack = if self.has_wide_field() { 3 } else { 2 };
        (max_stack, 3)
    }

    fn emit_hash_code(&mut self) -> (u16, u16) {
        // Object[] of boxed field values, then one order-sensitive hash
        self.push_int(self.fields.len() as i32);
        self.mv.visit_type_insn(op::ANEWARRAY, OBJECT_NAME);
        for (i, field) in self.fields.clone().into_iter().enumerate() {
            self.mv.visit_insn(op::DUP);
            self.push_int(i as i32);
            self.push_field_value(&field);
            self.box_stack_top(field.descriptor());
            self.mv.visit_insn(op::AASTORE);
        }
        self.mv.visit_method_insn(op::INVOKESTATIC, "java/util/Objects", "hash", "([Ljava/lang/Object;)I", false);
        self.mv.visit_insn(op::IRETURN);
        (5, 1)
    }

    fn emit_to_string(&mut self) -> (u16, u16) {
        let simple_name = self
            .declaring_type
            .rsplit('/')
            .next()
            .unwrap_or(&self.declaring_type)
            .to_string();
        self.mv.visit_type_insn(op::NEW, "java/lang/StringBuilder");
        self.mv.visit_insn(op::DUP);
        self.mv.visit_method_insn(op::INVOKESPECIAL, "java/lang/StringBuilder", "<init>", "()V", false);
        if self.fields.is_empty() {
            self.append_literal(&format!("{}[]", simple_name));
        } else {
            for (i, field) in self.fields.clone().into_iter().enumerate() {
                if i == 0 {
                    self.append_literal(&format!("{}[{}=", simple_name, field.name()));
                } else {
                    self.append_literal(&format!(", {}=", field.name()));
                }
                self.push_field_value(&field);
                self.box_stack_top(field.descriptor());
                self.mv.visit_method_insn(
                    op::INVOKEVIRTUAL,
                    "java/lang/StringBuilder",
                    "append",
                    "(Ljava/lang/Object;)Ljava/lang/StringBuilder;",
                    false,
                );
            }
            self.append_literal("]");
        }
        self.mv.visit_method_insn(
            op::INVOKEVIRTUAL,
            "java/lang/StringBuilder",
            "toString",
            "()Ljava/lang/String;",
            false,
        );
        self.mv.visit_insn(op::ARETURN);
        (3, 1)
    }

    fn append_literal(&mut self, literal: &str) {
        self.mv.visit_ldc(&crate::classfile::ConstValue::Str(literal.to_string()));
        self.mv.visit_method_insn(
            op::INVOKEVIRTUAL,
            "java/lang/StringBuilder",
            "append",
            "(Ljava/lang/String;)Ljava/lang/StringBuilder;",
            false,
        );
    }
}

impl<'a> MethodVisitor for RecordMemberRewriter<'a> {
    // No delegate: every instruction-level event of the original body is
    // swallowed; the replacement is emitted wholesale in visit_end.

    fn visit_attribute(&mut self, name: &str, data: &[u8]) {
        self.mv.visit_attribute(name, data);
    }

    fn visit_code(&mut self) {
        self.mv.visit_code();
    }

    fn visit_end(&mut self) {
        let start = self.new_label();
        let end = self.new_label();
        self.mv.visit_label(start);
        let (max_stack, max_locals) = match self.shape {
            MemberShape::Equals => self.emit_equals(start, end),
            MemberShape::HashCode => self.emit_hash_code(),
            MemberShape::ToString => self.emit_to_string(),
        };
        self.mv.visit_label(end);
        let declaring_descriptor = format!("L{};", self.declaring_type);
        self.mv.visit_local_var("this", &declaring_descriptor, start, end, 0);
        self.mv.visit_maxs(max_stack, max_locals);
        self.mv.visit_end();
    }
}

//! Generation of the runtime concatenation helper type.
//!
//! Rewritten call sites invoke a small runtime class that collects operand
//! strings and resolves them into a recipe template. The class is emitted
//! here as raw bytes through [`ClassWriter`], so it can be deposited next to
//! any patched output without a compile step. Its contract:
//!
//! - operands are always inserted at the front of an internal list, so the
//!   reverse-order transfer done at rewritten sites ends up left-to-right;
//! - one `insert` overload per operand category, each rendering its value to
//!   the canonical Java string form;
//! - `build(template)` replaces each argument marker with the next operand
//!   until either runs out; leftover markers stay in the output verbatim.

use once_cell::sync::Lazy;

use crate::classfile::defs::access_flags::{ACC_FINAL, ACC_PRIVATE, ACC_PUBLIC, ACC_SUPER};
use crate::classfile::defs::{major_versions, CONSTRUCTOR_METHOD_NAME, OBJECT_NAME};
use crate::classfile::opcodes as op;
use crate::classfile::{ClassVisitor, ClassWriter, Label, MethodVisitor};
use crate::common::error::Result;
use crate::consts::CONCAT_HELPER_NAME;
use super::recipe::TAG_ARG;

const OPERANDS_FIELD: &str = "operands";
const LIST_DESC: &str = "Ljava/util/List;";

/// `insert` overloads: parameter descriptor, load opcode for the argument,
/// and the static rendering call turning it into a string.
const INSERT_OVERLOADS: &[(&str, u8, &str, &str)] = &[
    ("Z", op::ILOAD, "java/lang/String", "(Z)Ljava/lang/String;"),
    ("B", op::ILOAD, "java/lang/String", "(I)Ljava/lang/String;"),
    ("C", op::ILOAD, "java/lang/String", "(C)Ljava/lang/String;"),
    ("S", op::ILOAD, "java/lang/String", "(I)Ljava/lang/String;"),
    ("I", op::ILOAD, "java/lang/String", "(I)Ljava/lang/String;"),
    ("J", op::LLOAD, "java/lang/String", "(J)Ljava/lang/String;"),
    ("F", op::FLOAD, "java/lang/String", "(F)Ljava/lang/String;"),
    ("D", op::DLOAD, "java/lang/String", "(D)Ljava/lang/String;"),
    ("[Z", op::ALOAD, "java/util/Arrays", "([Z)Ljava/lang/String;"),
    ("[B", op::ALOAD, "java/util/Arrays", "([B)Ljava/lang/String;"),
    ("[C", op::ALOAD, "java/util/Arrays", "([C)Ljava/lang/String;"),
    ("[S", op::ALOAD, "java/util/Arrays", "([S)Ljava/lang/String;"),
    ("[I", op::ALOAD, "java/util/Arrays", "([I)Ljava/lang/String;"),
    ("[J", op::ALOAD, "java/util/Arrays", "([J)Ljava/lang/String;"),
    ("[F", op::ALOAD, "java/util/Arrays", "([F)Ljava/lang/String;"),
    ("[D", op::ALOAD, "java/util/Arrays", "([D)Ljava/lang/String;"),
    ("[Ljava/lang/Object;", op::ALOAD, "java/util/Arrays", "([Ljava/lang/Object;)Ljava/lang/String;"),
    ("Ljava/lang/Object;", op::ALOAD, "java/lang/String", "(Ljava/lang/Object;)Ljava/lang/String;"),
];

static HELPER_CLASS: Lazy<Vec<u8>> =
    Lazy::new(|| generate().expect("helper class assembly uses only bound labels and small bodies"));

/// The helper class binary, generated once per process.
pub fn helper_class_bytes() -> &'static [u8] {
    &HELPER_CLASS
}

/// Assemble the helper class from scratch.
pub fn generate() -> Result<Vec<u8>> {
    let helper_desc = format!("L{};", CONCAT_HELPER_NAME);
    let mut writer = ClassWriter::new();
    // Oldest version the helper's own dependencies (StringBuilder) allow, so
    // it loads on every supported target
    writer.visit_header(
        major_versions::JAVA_5_0 as u32,
        (ACC_PUBLIC | ACC_FINAL | ACC_SUPER) as u32,
        CONCAT_HELPER_NAME,
        None,
        Some(OBJECT_NAME),
        &[],
    );
    writer.visit_field(ACC_PRIVATE | ACC_FINAL, OPERANDS_FIELD, LIST_DESC, &[]);

    emit_constructor(&mut writer);
    for &(param, load, render_owner, render_desc) in INSERT_OVERLOADS {
        emit_insert(&mut writer, &helper_desc, param, load, render_owner, render_desc);
    }
    emit_build(&mut writer);

    writer.visit_end();
    writer.finish()
}

fn emit_constructor(writer: &mut ClassWriter) {
    let mut mv = writer
        .visit_method(ACC_PUBLIC, CONSTRUCTOR_METHOD_NAME, "()V", None, &[])
        .expect("writer accepts every method");
    mv.visit_code();
    mv.visit_var_insn(op::ALOAD, 0);
    mv.visit_method_insn(op::INVOKESPECIAL, OBJECT_NAME, CONSTRUCTOR_METHOD_NAME, "()V", false);
    mv.visit_var_insn(op::ALOAD, 0);
    mv.visit_type_insn(op::NEW, "java/util/ArrayList");
    mv.visit_insn(op::DUP);
    mv.visit_method_insn(op::INVOKESPECIAL, "java/util/ArrayList", CONSTRUCTOR_METHOD_NAME, "()V", false);
    mv.visit_field_insn(op::PUTFIELD, CONCAT_HELPER_NAME, OPERANDS_FIELD, LIST_DESC);
    mv.visit_insn(op::RETURN);
    mv.visit_maxs(3, 1);
    mv.visit_end();
}

/// One `insert` overload: render the argument, prepend it, return `this`.
fn emit_insert(
    writer: &mut ClassWriter,
    helper_desc: &str,
    param: &str,
    load: u8,
    render_owner: &str,
    render_desc: &str,
) {
    let descriptor = format!("({}){}", param, helper_desc);
    let wide = load == op::LLOAD || load == op::DLOAD;
    let render_name = if render_owner == "java/util/Arrays" { "toString" } else { "valueOf" };
    let mut mv = writer
        .visit_method(ACC_PUBLIC, "insert", &descriptor, None, &[])
        .expect("writer accepts every method");
    mv.visit_code();
    mv.visit_var_insn(op::ALOAD, 0);
    mv.visit_field_insn(op::GETFIELD, CONCAT_HELPER_NAME, OPERANDS_FIELD, LIST_DESC);
    mv.visit_insn(op::ICONST_0);
    mv.visit_var_insn(load, 1);
    mv.visit_method_insn(op::INVOKESTATIC, render_owner, render_name, render_desc, false);
    mv.visit_method_insn(op::INVOKEINTERFACE, "java/util/List", "add", "(ILjava/lang/Object;)V", true);
    mv.visit_var_insn(op::ALOAD, 0);
    mv.visit_insn(op::ARETURN);
    mv.visit_maxs(if wide { 4 } else { 3 }, if wide { 3 } else { 2 });
    mv.visit_end();
}

/// `build(String)`: scan the template, substituting the next operand for
/// each argument marker while operands remain; other characters (unresolved
/// markers included) are copied through.
fn emit_build(writer: &mut ClassWriter) {
    // locals: 0 this, 1 template, 2 builder, 3 position, 4 next operand, 5 char
    let mut mv = writer
        .visit_method(ACC_PUBLIC, "build", "(Ljava/lang/String;)Ljava/lang/String;", None, &[])
        .expect("writer accepts every method");
    let loop_start = Label(0);
    let plain_char = Label(1);
    let advance = Label(2);
    let done = Label(3);

    mv.visit_code();
    mv.visit_type_insn(op::NEW, "java/lang/StringBuilder");
    mv.visit_insn(op::DUP);
    mv.visit_method_insn(op::INVOKESPECIAL, "java/lang/StringBuilder", CONSTRUCTOR_METHOD_NAME, "()V", false);
    mv.visit_var_insn(op::ASTORE, 2);
    mv.visit_insn(op::ICONST_0);
    mv.visit_var_insn(op::ISTORE, 3);
    mv.visit_insn(op::ICONST_0);
    mv.visit_var_insn(op::ISTORE, 4);

    mv.visit_label(loop_start);
    mv.visit_var_insn(op::ILOAD, 3);
    mv.visit_var_insn(op::ALOAD, 1);
    mv.visit_method_insn(op::INVOKEVIRTUAL, "java/lang/String", "length", "()I", false);
    mv.visit_jump_insn(op::IF_ICMPGE, done);

    mv.visit_var_insn(op::ALOAD, 1);
    mv.visit_var_insn(op::ILOAD, 3);
    mv.visit_method_insn(op::INVOKEVIRTUAL, "java/lang/String", "charAt", "(I)C", false);
    mv.visit_var_insn(op::ISTORE, 5);

    // Argument marker with an operand left?
    mv.visit_var_insn(op::ILOAD, 5);
    mv.visit_int_insn(op::BIPUSH, TAG_ARG as i32);
    mv.visit_jump_insn(op::IF_ICMPNE, plain_char);
    mv.visit_var_insn(op::ILOAD, 4);
    mv.visit_var_insn(op::ALOAD, 0);
    mv.visit_field_insn(op::GETFIELD, CONCAT_HELPER_NAME, OPERANDS_FIELD, LIST_DESC);
    mv.visit_method_insn(op::INVOKEINTERFACE, "java/util/List", "size", "()I", true);
    mv.visit_jump_insn(op::IF_ICMPGE, plain_char);

    // Substitute the operand
    mv.visit_var_insn(op::ALOAD, 2);
    mv.visit_var_insn(op::ALOAD, 0);
    mv.visit_field_insn(op::GETFIELD, CONCAT_HELPER_NAME, OPERANDS_FIELD, LIST_DESC);
    mv.visit_var_insn(op::ILOAD, 4);
    mv.visit_method_insn(op::INVOKEINTERFACE, "java/util/List", "get", "(I)Ljava/lang/Object;", true);
    mv.visit_type_insn(op::CHECKCAST, "java/lang/String");
    mv.visit_method_insn(
        op::INVOKEVIRTUAL,
        "java/lang/StringBuilder",
        "append",
        "(Ljava/lang/String;)Ljava/lang/StringBuilder;",
        false,
    );
    mv.visit_insn(op::POP);
    mv.visit_iinc(4, 1);
    mv.visit_jump_insn(op::GOTO, advance);

    // Anything else is copied through
    mv.visit_label(plain_char);
    mv.visit_var_insn(op::ALOAD, 2);
    mv.visit_var_insn(op::ILOAD, 5);
    mv.visit_method_insn(
        op::INVOKEVIRTUAL,
        "java/lang/StringBuilder",
        "append",
        "(C)Ljava/lang/StringBuilder;",
        false,
    );
    mv.visit_insn(op::POP);

    mv.visit_label(advance);
    mv.visit_iinc(3, 1);
    mv.visit_jump_insn(op::GOTO, loop_start);

    mv.visit_label(done);
    mv.visit_var_insn(op::ALOAD, 2);
    mv.visit_method_insn(op::INVOKEVIRTUAL, "java/lang/StringBuilder", "toString", "()Ljava/lang/String;", false);
    mv.visit_insn(op::ARETURN);
    mv.visit_maxs(3, 6);
    mv.visit_end();
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::classfile::ClassReader;

    #[test]
    fn test_helper_class_parses() {
        let bytes = generate().unwrap();
        let reader = ClassReader::new(&bytes).unwrap();
        assert_eq!(reader.class_name().unwrap(), CONCAT_HELPER_NAME);
        assert_eq!(reader.major_version(), major_versions::JAVA_5_0);
    }

    #[test]
    fn test_helper_bytes_memoized() {
        assert_eq!(helper_class_bytes(), helper_class_bytes());
        assert!(!helper_class_bytes().is_empty());
    }
}

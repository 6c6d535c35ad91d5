// Pass-through fidelity of the classfile layer: bodies with branches,
// switches and exception handlers must survive a patch untouched, and
// branches must stay consistent when a rewrite changes code length.

mod common;

use common::{build_class, concat_bootstrap, summarize, MEvent};
use jretro::classfile::defs::access_flags::{ACC_PUBLIC, ACC_STATIC, ACC_SUPER};
use jretro::classfile::defs::major_versions;
use jretro::classfile::opcodes as op;
use jretro::classfile::{ClassVisitor, ConstValue, Label, MethodVisitor};
use jretro::{patch_class, TargetVersion};

fn target(release: u8) -> TargetVersion {
    TargetVersion::new(release).unwrap()
}

fn branchy_class() -> Vec<u8> {
    build_class(|w| {
        w.visit_header(
            major_versions::JAVA_17 as u32,
            (ACC_PUBLIC | ACC_SUPER) as u32,
            "sample/Branchy",
            None,
            Some("java/lang/Object"),
            &[],
        );
        let mut mv = w.visit_method(ACC_PUBLIC | ACC_STATIC, "pick", "(I)I", None, &[]).unwrap();
        let case_one = Label(0);
        let case_two = Label(1);
        let default_case = Label(2);
        let out = Label(3);
        let handler = Label(4);
        let try_start = Label(5);
        let try_end = Label(6);
        mv.visit_code();
        mv.visit_try_catch(try_start, try_end, handler, Some("java/lang/RuntimeException"));
        mv.visit_label(try_start);
        mv.visit_line_number(10, try_start);
        mv.visit_var_insn(op::ILOAD, 0);
        mv.visit_table_switch(1, 2, default_case, &[case_one, case_two]);
        mv.visit_label(case_one);
        mv.visit_insn(op::ICONST_1);
        mv.visit_jump_insn(op::GOTO, out);
        mv.visit_label(case_two);
        mv.visit_insn(op::ICONST_2);
        mv.visit_jump_insn(op::GOTO, out);
        mv.visit_label(default_case);
        mv.visit_var_insn(op::ILOAD, 0);
        mv.visit_lookup_switch(out, &[(-1, case_one), (100, case_two)]);
        mv.visit_label(try_end);
        mv.visit_label(handler);
        mv.visit_insn(op::POP);
        mv.visit_insn(op::ICONST_M1);
        mv.visit_insn(op::IRETURN);
        mv.visit_label(out);
        mv.visit_insn(op::IRETURN);
        mv.visit_maxs(1, 1);
        mv.visit_end();
    })
}

#[test]
fn test_branches_and_switches_survive_pass_through() {
    let input = branchy_class();
    let outcome = patch_class(&input, target(8)).unwrap();
    let summary = summarize(&outcome.bytes);
    let method = summary.method("pick");

    assert!(method.events.contains(&MEvent::TableSwitch { low: 1, high: 2, arms: 2 }));
    assert!(method.events.contains(&MEvent::LookupSwitch { keys: vec![-1, 100] }));
    assert!(method.events.contains(&MEvent::TryCatch(Some("java/lang/RuntimeException".to_string()))));
    assert!(method.events.contains(&MEvent::LineNumber(10)));
    assert_eq!(method.events.iter().filter(|e| matches!(e, MEvent::Jump(_))).count(), 2);
    assert_eq!(method.maxs(), Some((1, 1)));
}

#[test]
fn test_branches_stay_consistent_when_rewrite_grows_code() {
    // A branch jumps over an indified concatenation site; rewriting the site
    // lengthens the code, so the branch offset must be recomputed
    let input = build_class(|w| {
        w.visit_header(
            major_versions::JAVA_11 as u32,
            (ACC_PUBLIC | ACC_SUPER) as u32,
            "sample/JumpOver",
            None,
            Some("java/lang/Object"),
            &[],
        );
        let mut mv = w
            .visit_method(ACC_PUBLIC | ACC_STATIC, "label", "(ILjava/lang/String;)Ljava/lang/String;", None, &[])
            .unwrap();
        let fallback = Label(0);
        mv.visit_code();
        mv.visit_var_insn(op::ILOAD, 0);
        mv.visit_jump_insn(op::IFEQ, fallback);
        mv.visit_var_insn(op::ALOAD, 1);
        mv.visit_invoke_dynamic(
            "makeConcatWithConstants",
            "(Ljava/lang/String;)Ljava/lang/String;",
            &concat_bootstrap(),
            &[ConstValue::Str("Hello, \u{1}!".to_string())],
        );
        mv.visit_insn(op::ARETURN);
        mv.visit_label(fallback);
        mv.visit_ldc(&ConstValue::Str("nobody".to_string()));
        mv.visit_insn(op::ARETURN);
        mv.visit_maxs(1, 2);
        mv.visit_end();
    });

    let outcome = patch_class(&input, target(8)).unwrap();
    assert_eq!(outcome.concat_rewrites, 1);

    // The patched class must still parse cleanly, with both return paths
    let summary = summarize(&outcome.bytes);
    let method = summary.method("label");
    assert!(method.invoke_dynamics().is_empty());
    assert!(method.ldc_strings().contains(&"nobody"));
    assert!(method.ldc_strings().contains(&"Hello, \u{1}!"));
    assert_eq!(method.events.iter().filter(|e| *e == &MEvent::Insn(op::ARETURN)).count(), 2);
}

#[test]
fn test_wide_variable_indices_round_trip() {
    let input = build_class(|w| {
        w.visit_header(
            major_versions::JAVA_17 as u32,
            (ACC_PUBLIC | ACC_SUPER) as u32,
            "sample/Wide",
            None,
            Some("java/lang/Object"),
            &[],
        );
        let mut mv = w.visit_method(ACC_PUBLIC | ACC_STATIC, "wide", "()I", None, &[]).unwrap();
        mv.visit_code();
        mv.visit_insn(op::ICONST_0);
        mv.visit_var_insn(op::ISTORE, 300);
        mv.visit_iinc(300, 200);
        mv.visit_var_insn(op::ILOAD, 300);
        mv.visit_insn(op::IRETURN);
        mv.visit_maxs(1, 301);
        mv.visit_end();
    });

    let outcome = patch_class(&input, target(8)).unwrap();
    let summary = summarize(&outcome.bytes);
    let method = summary.method("wide");
    assert!(method.events.contains(&MEvent::VarInsn(op::ISTORE, 300)));
    assert!(method.events.contains(&MEvent::Iinc(300, 200)));
    assert!(method.events.contains(&MEvent::VarInsn(op::ILOAD, 300)));
}

#[test]
fn test_constants_round_trip_through_reseeded_pool() {
    let input = build_class(|w| {
        w.visit_header(
            major_versions::JAVA_17 as u32,
            (ACC_PUBLIC | ACC_SUPER) as u32,
            "sample/Constants",
            None,
            Some("java/lang/Object"),
            &[],
        );
        let mut mv = w.visit_method(ACC_PUBLIC | ACC_STATIC, "values", "()V", None, &[]).unwrap();
        mv.visit_code();
        mv.visit_ldc(&ConstValue::Long(1_234_567_890_123));
        mv.visit_insn(op::POP2);
        mv.visit_ldc(&ConstValue::Double(2.5));
        mv.visit_insn(op::POP2);
        mv.visit_ldc(&ConstValue::Int(9_999));
        mv.visit_insn(op::POP);
        mv.visit_ldc(&ConstValue::Class("java/lang/String".to_string()));
        mv.visit_insn(op::POP);
        mv.visit_insn(op::RETURN);
        mv.visit_maxs(2, 0);
        mv.visit_end();
    });

    let outcome = patch_class(&input, target(8)).unwrap();
    let summary = summarize(&outcome.bytes);
    let events = &summary.method("values").events;
    assert!(events.contains(&MEvent::Ldc(ConstValue::Long(1_234_567_890_123))));
    assert!(events.contains(&MEvent::Ldc(ConstValue::Double(2.5))));
    assert!(events.contains(&MEvent::Ldc(ConstValue::Int(9_999))));
    assert!(events.contains(&MEvent::Ldc(ConstValue::Class("java/lang/String".to_string()))));
}

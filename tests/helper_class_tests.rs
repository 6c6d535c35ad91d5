// Structure of the generated runtime helper type

mod common;

use common::summarize;
use jretro::classfile::defs::access_flags::{ACC_FINAL, ACC_PUBLIC};
use jretro::classfile::defs::major_versions;
use jretro::classfile::opcodes as op;
use jretro::{helper_class_bytes, CONCAT_HELPER_NAME};

#[test]
fn test_helper_class_shape() {
    let summary = summarize(helper_class_bytes());
    assert_eq!(summary.name, CONCAT_HELPER_NAME);
    assert_eq!(summary.super_name.as_deref(), Some("java/lang/Object"));
    assert_eq!(summary.major_version(), major_versions::JAVA_5_0);
    assert_eq!(summary.access as u16 & (ACC_PUBLIC | ACC_FINAL), ACC_PUBLIC | ACC_FINAL);
    assert_eq!(summary.fields.len(), 1);
    assert_eq!(summary.fields[0].1, "operands");
    assert_eq!(summary.fields[0].2, "Ljava/util/List;");
}

#[test]
fn test_helper_has_one_insert_overload_per_category() {
    let summary = summarize(helper_class_bytes());
    let inserts: Vec<&str> = summary
        .methods
        .iter()
        .filter(|m| m.name == "insert")
        .map(|m| m.descriptor.as_str())
        .collect();
    let helper_return = format!(")L{};", CONCAT_HELPER_NAME);
    // 8 primitives, 8 primitive arrays, Object[] and Object
    assert_eq!(inserts.len(), 18);
    for descriptor in &inserts {
        assert!(descriptor.ends_with(&helper_return));
    }
    for expected in ["(Z", "(B", "(C", "(S", "(I", "(J", "(F", "(D"] {
        assert!(inserts.iter().any(|d| d.starts_with(expected) && !d.starts_with("([")));
    }
    for expected in ["([Z", "([B", "([C", "([S", "([I", "([J", "([F", "([D", "([Ljava/lang/Object;"] {
        assert!(inserts.iter().any(|d| d.starts_with(expected)));
    }
    assert!(inserts.iter().any(|d| d.starts_with("(Ljava/lang/Object;")));
}

#[test]
fn test_helper_inserts_prepend_and_return_self() {
    let summary = summarize(helper_class_bytes());
    for method in summary.methods.iter().filter(|m| m.name == "insert") {
        assert!(method.has_code, "insert{} must carry code", method.descriptor);
        // Prepend position and interface dispatch into the backing list
        assert!(method
            .method_calls()
            .contains(&("java/util/List", "add", "(ILjava/lang/Object;)V")));
        use common::MEvent;
        assert!(method.events.contains(&MEvent::Insn(op::ICONST_0)));
        assert!(method.events.contains(&MEvent::Insn(op::ARETURN)));
    }
}

#[test]
fn test_helper_build_scans_template() {
    let summary = summarize(helper_class_bytes());
    let build = summary.method("build");
    assert_eq!(build.descriptor, "(Ljava/lang/String;)Ljava/lang/String;");
    let calls = build.method_calls();
    assert!(calls.contains(&("java/lang/String", "charAt", "(I)C")));
    assert!(calls.contains(&("java/util/List", "size", "()I")));
    assert!(calls.contains(&("java/util/List", "get", "(I)Ljava/lang/Object;")));
    assert!(calls.contains(&("java/lang/StringBuilder", "toString", "()Ljava/lang/String;")));
    use common::MEvent;
    // The scan loop branches and increments both counters
    assert!(build.events.iter().any(|e| matches!(e, MEvent::Jump(_))));
    assert!(build.events.contains(&MEvent::Iinc(3, 1)));
    assert!(build.events.contains(&MEvent::Iinc(4, 1)));
    assert_eq!(build.maxs(), Some((3, 6)));
}

#[test]
fn test_helper_constructor_initializes_backing_list() {
    let summary = summarize(helper_class_bytes());
    let ctor = summary.method("<init>");
    let calls = ctor.method_calls();
    assert!(calls.contains(&("java/lang/Object", "<init>", "()V")));
    assert!(calls.contains(&("java/util/ArrayList", "<init>", "()V")));
}

// Version clamping and feature gating across target releases

mod common;

use common::{build_class, summarize};
use jretro::classfile::defs::access_flags::{ACC_PUBLIC, ACC_SUPER};
use jretro::classfile::defs::major_versions;
use jretro::classfile::visitor::{ModuleDecl, ModuleRequire};
use jretro::classfile::ClassVisitor;
use jretro::{patch_class, TargetVersion};

fn target(release: u8) -> TargetVersion {
    TargetVersion::new(release).unwrap()
}

fn plain_class(version: u16, extra: impl FnOnce(&mut jretro::classfile::ClassWriter)) -> Vec<u8> {
    build_class(|w| {
        w.visit_header(
            version as u32,
            (ACC_PUBLIC | ACC_SUPER) as u32,
            "sample/Plain",
            None,
            Some("java/lang/Object"),
            &[],
        );
        extra(w);
    })
}

#[test]
fn test_version_61_clamps_to_52_for_target_8() {
    let input = plain_class(major_versions::JAVA_17, |_| {});
    let outcome = patch_class(&input, target(8)).unwrap();
    assert_eq!(summarize(&outcome.bytes).major_version(), major_versions::JAVA_8);
}

#[test]
fn test_clamp_is_monotonic_and_never_increases() {
    for (input_major, release, expected) in [
        (major_versions::JAVA_17, 8, major_versions::JAVA_8),
        (major_versions::JAVA_17, 17, major_versions::JAVA_17),
        (major_versions::JAVA_6_0, 17, major_versions::JAVA_6_0),
        (major_versions::JAVA_8, 8, major_versions::JAVA_8),
        (major_versions::JAVA_9, 6, major_versions::JAVA_6_0),
    ] {
        let input = plain_class(input_major, |_| {});
        let outcome = patch_class(&input, target(release)).unwrap();
        let output_major = summarize(&outcome.bytes).major_version();
        assert_eq!(output_major, expected);
        assert!(output_major <= input_major);
        assert!(output_major <= 44 + release as u16);
    }
}

#[test]
fn test_nest_members_suppressed_below_11() {
    let input = plain_class(major_versions::JAVA_17, |w| {
        w.visit_nest_member("sample/Plain$Inner");
        w.visit_nest_member("sample/Plain$Other");
    });

    let below = patch_class(&input, target(9)).unwrap();
    assert!(summarize(&below.bytes).nest_members.is_empty());

    let at = patch_class(&input, target(11)).unwrap();
    assert_eq!(
        summarize(&at.bytes).nest_members,
        vec!["sample/Plain$Inner".to_string(), "sample/Plain$Other".to_string()]
    );
}

#[test]
fn test_nest_host_suppressed_below_11() {
    let input = plain_class(major_versions::JAVA_17, |w| {
        w.visit_nest_host("sample/Outer");
    });

    let below = patch_class(&input, target(10)).unwrap();
    assert_eq!(summarize(&below.bytes).nest_host, None);

    let at = patch_class(&input, target(11)).unwrap();
    assert_eq!(summarize(&at.bytes).nest_host.as_deref(), Some("sample/Outer"));
}

#[test]
fn test_permitted_subclasses_suppressed_below_15() {
    let input = plain_class(major_versions::JAVA_17, |w| {
        w.visit_permitted_subclass("sample/Circle");
        w.visit_permitted_subclass("sample/Square");
    });

    let below = patch_class(&input, target(14)).unwrap();
    assert!(summarize(&below.bytes).permitted_subclasses.is_empty());

    let at = patch_class(&input, target(15)).unwrap();
    assert_eq!(summarize(&at.bytes).permitted_subclasses.len(), 2);
}

#[test]
fn test_module_declaration_suppressed_below_9() {
    let module = ModuleDecl {
        name: "sample.mod".to_string(),
        flags: 0,
        version: Some("1.0".to_string()),
        requires: vec![ModuleRequire {
            module: "java.base".to_string(),
            flags: 0x8000,
            version: None,
        }],
        ..Default::default()
    };
    let input = plain_class(major_versions::JAVA_11, |w| {
        w.visit_module(&module);
    });

    let below = patch_class(&input, target(8)).unwrap();
    assert!(summarize(&below.bytes).module.is_none());

    let at = patch_class(&input, target(9)).unwrap();
    let kept = summarize(&at.bytes).module.expect("module kept at 9");
    assert_eq!(kept, module);
}

#[test]
fn test_unknown_class_attributes_pass_through() {
    let input = plain_class(major_versions::JAVA_17, |w| {
        w.visit_attribute("Deprecated", &[]);
    });
    let outcome = patch_class(&input, target(8)).unwrap();
    assert!(summarize(&outcome.bytes).attributes.iter().any(|a| a == "Deprecated"));
}

#[test]
fn test_source_file_and_interfaces_survive() {
    let input = build_class(|w| {
        w.visit_header(
            major_versions::JAVA_17 as u32,
            (ACC_PUBLIC | ACC_SUPER) as u32,
            "sample/Impl",
            None,
            Some("java/lang/Object"),
            &["java/lang/Runnable".to_string(), "java/io/Serializable".to_string()],
        );
        w.visit_source("Impl.java");
    });
    let outcome = patch_class(&input, target(8)).unwrap();
    let summary = summarize(&outcome.bytes);
    assert_eq!(summary.source_file.as_deref(), Some("Impl.java"));
    assert_eq!(summary.interfaces.len(), 2);
    assert_eq!(summary.super_name.as_deref(), Some("java/lang/Object"));
}

#[test]
fn test_gating_is_idempotent() {
    let input = plain_class(major_versions::JAVA_17, |w| {
        w.visit_nest_member("sample/Plain$Inner");
        w.visit_permitted_subclass("sample/Circle");
    });

    let once = patch_class(&input, target(8)).unwrap();
    let twice = patch_class(&once.bytes, target(8)).unwrap();

    let first = summarize(&once.bytes);
    let second = summarize(&twice.bytes);
    assert_eq!(first.major_version(), second.major_version());
    assert_eq!(first.nest_members, second.nest_members);
    assert_eq!(first.permitted_subclasses, second.permitted_subclasses);
    assert_eq!(first.nest_host, second.nest_host);
}

#[test]
fn test_garbage_input_is_rejected() {
    assert!(patch_class(&[0xDE, 0xAD, 0xBE, 0xEF], target(8)).is_err());
    assert!(patch_class(&[], target(8)).is_err());
}

// Common test utilities: class builders and a recording visitor that turns
// patched output back into assertable structure.

use jretro::classfile::defs::access_flags::{ACC_FINAL, ACC_PRIVATE, ACC_PUBLIC, ACC_STATIC, ACC_SUPER};
use jretro::classfile::defs::{major_versions, ACC_RECORD, CONSTRUCTOR_METHOD_NAME, RECORD_SUPER_NAME};
use jretro::classfile::descriptor::{self, TypeTag};
use jretro::classfile::opcodes as op;
use jretro::classfile::visitor::handle_kinds::REF_INVOKE_STATIC;
use jretro::classfile::{
    ClassReader, ClassVisitor, ClassWriter, ConstValue, Handle, Label, MethodVisitor, ModuleDecl,
    RawAttribute, RecordComponent,
};

/// One recorded instruction-level event
#[derive(Debug, Clone, PartialEq)]
#[allow(dead_code)]
pub enum MEvent {
    Insn(u8),
    IntInsn(u8, i32),
    VarInsn(u8, u16),
    TypeInsn(u8, String),
    FieldInsn(u8, String, String, String),
    MethodInsn(u8, String, String, String, bool),
    InvokeDynamic(String, String),
    Jump(u8),
    Ldc(ConstValue),
    Iinc(u16, i16),
    TableSwitch { low: i32, high: i32, arms: usize },
    LookupSwitch { keys: Vec<i32> },
    TryCatch(Option<String>),
    LineNumber(u16),
    LocalVar(String, String, u16),
    Maxs(u16, u16),
}

#[derive(Debug, Clone)]
#[allow(dead_code)]
pub struct MethodSummary {
    pub access: u16,
    pub name: String,
    pub descriptor: String,
    pub has_code: bool,
    pub events: Vec<MEvent>,
}

#[allow(dead_code)]
impl MethodSummary {
    /// Events of one kind, in order
    pub fn method_calls(&self) -> Vec<(&str, &str, &str)> {
        self.events
            .iter()
            .filter_map(|e| match e {
                MEvent::MethodInsn(_, owner, name, desc, _) => {
                    Some((owner.as_str(), name.as_str(), desc.as_str()))
                }
                _ => None,
            })
            .collect()
    }

    pub fn ldc_strings(&self) -> Vec<&str> {
        self.events
            .iter()
            .filter_map(|e| match e {
                MEvent::Ldc(ConstValue::Str(s)) => Some(s.as_str()),
                _ => None,
            })
            .collect()
    }

    pub fn invoke_dynamics(&self) -> Vec<(&str, &str)> {
        self.events
            .iter()
            .filter_map(|e| match e {
                MEvent::InvokeDynamic(name, desc) => Some((name.as_str(), desc.as_str())),
                _ => None,
            })
            .collect()
    }

    pub fn maxs(&self) -> Option<(u16, u16)> {
        self.events.iter().rev().find_map(|e| match e {
            MEvent::Maxs(stack, locals) => Some((*stack, *locals)),
            _ => None,
        })
    }
}

#[derive(Debug, Clone, Default)]
#[allow(dead_code)]
pub struct ClassSummary {
    pub version: u32,
    pub access: u32,
    pub name: String,
    pub super_name: Option<String>,
    pub interfaces: Vec<String>,
    pub source_file: Option<String>,
    pub module: Option<ModuleDecl>,
    pub nest_host: Option<String>,
    pub nest_members: Vec<String>,
    pub permitted_subclasses: Vec<String>,
    pub record_components: Vec<String>,
    pub fields: Vec<(u16, String, String)>,
    pub methods: Vec<MethodSummary>,
    pub attributes: Vec<String>,
}

#[allow(dead_code)]
impl ClassSummary {
    pub fn major_version(&self) -> u16 {
        self.version as u16
    }

    pub fn method(&self, name: &str) -> &MethodSummary {
        self.methods
            .iter()
            .find(|m| m.name == name)
            .unwrap_or_else(|| panic!("no method named {}", name))
    }

    pub fn is_record(&self) -> bool {
        self.access & ACC_RECORD != 0
    }
}

#[derive(Default)]
struct Recorder {
    summary: ClassSummary,
}

struct MethodRecorder<'a> {
    recorder: &'a mut Recorder,
    summary: MethodSummary,
}

impl ClassVisitor for Recorder {
    fn visit_header(
        &mut self,
        version: u32,
        access: u32,
        name: &str,
        _signature: Option<&str>,
        super_name: Option<&str>,
        interfaces: &[String],
    ) {
        self.summary.version = version;
        self.summary.access = access;
        self.summary.name = name.to_string();
        self.summary.super_name = super_name.map(str::to_string);
        self.summary.interfaces = interfaces.to_vec();
    }

    fn visit_source(&mut self, file: &str) {
        self.summary.source_file = Some(file.to_string());
    }

    fn visit_module(&mut self, module: &ModuleDecl) {
        self.summary.module = Some(module.clone());
    }

    fn visit_nest_host(&mut self, host: &str) {
        self.summary.nest_host = Some(host.to_string());
    }

    fn visit_nest_member(&mut self, member: &str) {
        self.summary.nest_members.push(member.to_string());
    }

    fn visit_permitted_subclass(&mut self, name: &str) {
        self.summary.permitted_subclasses.push(name.to_string());
    }

    fn visit_record_component(&mut self, component: &RecordComponent) {
        self.summary.record_components.push(component.name.clone());
    }

    fn visit_field(&mut self, access: u16, name: &str, descriptor: &str, _attributes: &[RawAttribute]) {
        self.summary.fields.push((access, name.to_string(), descriptor.to_string()));
    }

    fn visit_method<'v>(
        &'v mut self,
        access: u16,
        name: &str,
        descriptor: &str,
        _signature: Option<&str>,
        _exceptions: &[String],
    ) -> Option<Box<dyn MethodVisitor + 'v>> {
        Some(Box::new(MethodRecorder {
            recorder: self,
            summary: MethodSummary {
                access,
                name: name.to_string(),
                descriptor: descriptor.to_string(),
                has_code: false,
                events: Vec::new(),
            },
        }))
    }

    fn visit_attribute(&mut self, name: &str, _data: &[u8]) {
        self.summary.attributes.push(name.to_string());
    }
}

impl<'a> MethodVisitor for MethodRecorder<'a> {
    fn visit_code(&mut self) {
        self.summary.has_code = true;
    }

    fn visit_insn(&mut self, opcode: u8) {
        self.summary.events.push(MEvent::Insn(opcode));
    }

    fn visit_int_insn(&mut self, opcode: u8, operand: i32) {
        self.summary.events.push(MEvent::IntInsn(opcode, operand));
    }

    fn visit_var_insn(&mut self, opcode: u8, var: u16) {
        self.summary.events.push(MEvent::VarInsn(opcode, var));
    }

    fn visit_type_insn(&mut self, opcode: u8, class_name: &str) {
        self.summary.events.push(MEvent::TypeInsn(opcode, class_name.to_string()));
    }

    fn visit_field_insn(&mut self, opcode: u8, owner: &str, name: &str, descriptor: &str) {
        self.summary.events.push(MEvent::FieldInsn(
            opcode,
            owner.to_string(),
            name.to_string(),
            descriptor.to_string(),
        ));
    }

    fn visit_method_insn(&mut self, opcode: u8, owner: &str, name: &str, descriptor: &str, is_interface: bool) {
        self.summary.events.push(MEvent::MethodInsn(
            opcode,
            owner.to_string(),
            name.to_string(),
            descriptor.to_string(),
            is_interface,
        ));
    }

    fn visit_invoke_dynamic(&mut self, name: &str, descriptor: &str, _bootstrap: &Handle, _args: &[ConstValue]) {
        self.summary.events.push(MEvent::InvokeDynamic(name.to_string(), descriptor.to_string()));
    }

    fn visit_jump_insn(&mut self, opcode: u8, _label: Label) {
        self.summary.events.push(MEvent::Jump(opcode));
    }

    fn visit_ldc(&mut self, value: &ConstValue) {
        self.summary.events.push(MEvent::Ldc(value.clone()));
    }

    fn visit_iinc(&mut self, var: u16, delta: i16) {
        self.summary.events.push(MEvent::Iinc(var, delta));
    }

    fn visit_table_switch(&mut self, low: i32, high: i32, _default: Label, labels: &[Label]) {
        self.summary.events.push(MEvent::TableSwitch { low, high, arms: labels.len() });
    }

    fn visit_lookup_switch(&mut self, _default: Label, pairs: &[(i32, Label)]) {
        self.summary
            .events
            .push(MEvent::LookupSwitch { keys: pairs.iter().map(|(k, _)| *k).collect() });
    }

    fn visit_try_catch(&mut self, _start: Label, _end: Label, _handler: Label, catch_type: Option<&str>) {
        self.summary.events.push(MEvent::TryCatch(catch_type.map(str::to_string)));
    }

    fn visit_line_number(&mut self, line: u16, _start: Label) {
        self.summary.events.push(MEvent::LineNumber(line));
    }

    fn visit_local_var(&mut self, name: &str, descriptor: &str, _start: Label, _end: Label, index: u16) {
        self.summary
            .events
            .push(MEvent::LocalVar(name.to_string(), descriptor.to_string(), index));
    }

    fn visit_maxs(&mut self, max_stack: u16, max_locals: u16) {
        self.summary.events.push(MEvent::Maxs(max_stack, max_locals));
    }

    fn visit_end(&mut self) {
        self.recorder.summary.methods.push(self.summary.clone());
    }
}

/// Parse a class file into an assertable summary
pub fn summarize(bytes: &[u8]) -> ClassSummary {
    let reader = ClassReader::new(bytes).expect("generated class must parse");
    let mut recorder = Recorder::default();
    reader.accept(&mut recorder).expect("generated class must replay");
    recorder.summary
}

/// Build a class through a writer callback
#[allow(dead_code)]
pub fn build_class(build: impl FnOnce(&mut ClassWriter)) -> Vec<u8> {
    let mut writer = ClassWriter::new();
    build(&mut writer);
    writer.visit_end();
    writer.finish().expect("test class must serialize")
}

/// A record class as javac would lay it out: `java/lang/Record` super,
/// record components, final fields, a canonical constructor and the three
/// generated members (bodies are placeholders; the patcher replaces them).
#[allow(dead_code)]
pub fn record_class(name: &str, fields: &[(&str, &str)]) -> Vec<u8> {
    build_class(|w| {
        w.visit_header(
            major_versions::JAVA_17 as u32,
            (ACC_PUBLIC | ACC_FINAL | ACC_SUPER) as u32 | ACC_RECORD,
            name,
            None,
            Some(RECORD_SUPER_NAME),
            &[],
        );
        for &(field_name, descriptor) in fields {
            w.visit_record_component(&RecordComponent {
                name: field_name.to_string(),
                descriptor: descriptor.to_string(),
                attributes: Vec::new(),
            });
            w.visit_field(ACC_PRIVATE | ACC_FINAL, field_name, descriptor, &[]);
        }

        let mut mv = w.visit_method(ACC_PUBLIC, CONSTRUCTOR_METHOD_NAME, "()V", None, &[]).unwrap();
        mv.visit_code();
        mv.visit_var_insn(op::ALOAD, 0);
        mv.visit_method_insn(op::INVOKESPECIAL, RECORD_SUPER_NAME, CONSTRUCTOR_METHOD_NAME, "()V", false);
        mv.visit_insn(op::RETURN);
        mv.visit_maxs(1, 1);
        mv.visit_end();
        drop(mv);

        placeholder_member(w, "equals", "(Ljava/lang/Object;)Z", op::ICONST_0, op::IRETURN);
        placeholder_member(w, "hashCode", "()I", op::ICONST_0, op::IRETURN);
        placeholder_member(w, "toString", "()Ljava/lang/String;", op::ACONST_NULL, op::ARETURN);
    })
}

fn placeholder_member(w: &mut ClassWriter, name: &str, descriptor: &str, load: u8, ret: u8) {
    let mut mv = w.visit_method(ACC_PUBLIC | ACC_FINAL, name, descriptor, None, &[]).unwrap();
    mv.visit_code();
    mv.visit_insn(load);
    mv.visit_insn(ret);
    mv.visit_maxs(1, 3);
    mv.visit_end();
}

/// The `StringConcatFactory` bootstrap javac links concatenation through
#[allow(dead_code)]
pub fn concat_bootstrap() -> Handle {
    Handle {
        kind: REF_INVOKE_STATIC,
        owner: "java/lang/invoke/StringConcatFactory".to_string(),
        name: "makeConcatWithConstants".to_string(),
        descriptor: "(Ljava/lang/invoke/MethodHandles$Lookup;Ljava/lang/String;Ljava/lang/invoke/MethodType;Ljava/lang/String;[Ljava/lang/Object;)Ljava/lang/invoke/CallSite;".to_string(),
        is_interface: false,
    }
}

/// A class with one static `concat` method whose body loads every parameter
/// and feeds an indified concatenation call site built from `recipe`.
#[allow(dead_code)]
pub fn concat_class(recipe: &str, operand_descriptors: &[&str]) -> Vec<u8> {
    let joined: String = operand_descriptors.concat();
    let method_descriptor = format!("({})Ljava/lang/String;", joined);
    build_class(|w| {
        w.visit_header(
            major_versions::JAVA_11 as u32,
            (ACC_PUBLIC | ACC_SUPER) as u32,
            "sample/Concat",
            None,
            Some("java/lang/Object"),
            &[],
        );
        let mut mv = w
            .visit_method(ACC_PUBLIC | ACC_STATIC, "concat", &method_descriptor, None, &[])
            .unwrap();
        mv.visit_code();
        let mut slot = 0u16;
        for descriptor in operand_descriptors {
            let tag = descriptor::parse_field_descriptor(descriptor).unwrap();
            let load = match tag {
                TypeTag::Long => op::LLOAD,
                TypeTag::Double => op::DLOAD,
                TypeTag::Float => op::FLOAD,
                TypeTag::Reference(_) | TypeTag::Array { .. } => op::ALOAD,
                _ => op::ILOAD,
            };
            mv.visit_var_insn(load, slot);
            slot += tag.size();
        }
        mv.visit_invoke_dynamic(
            "makeConcatWithConstants",
            &method_descriptor,
            &concat_bootstrap(),
            &[ConstValue::Str(recipe.to_string())],
        );
        mv.visit_insn(op::ARETURN);
        let stack: u16 = operand_descriptors
            .iter()
            .map(|d| descriptor::parse_field_descriptor(d).unwrap().size())
            .sum::<u16>()
            .max(1);
        mv.visit_maxs(stack, slot.max(1));
        mv.visit_end();
    })
}

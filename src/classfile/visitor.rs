//! Event contract between the classfile reader, the transform stages and the
//! writer.
//!
//! A class is a sequence of visit calls: header, gated-feature declarations,
//! fields, methods (each with a nested instruction-level sub-visitor), raw
//! attributes, end. Transform stages implement [`ClassVisitor`] /
//! [`MethodVisitor`] and hold the next stage; the default method bodies
//! forward every event through [`ClassVisitor::delegate`], so a stage only
//! overrides what it intercepts. The terminal sink is the writer.

/// Position marker inside one method body. Identity is per-method; the reader
/// keys labels by original bytecode offset, synthesizers allocate their own.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct Label(pub u32);

/// A method-handle constant
#[derive(Debug, Clone, PartialEq)]
pub struct Handle {
    pub kind: u8,
    pub owner: String,
    pub name: String,
    pub descriptor: String,
    pub is_interface: bool,
}

/// Reference kinds for method handles
pub mod handle_kinds {
    pub const REF_GET_FIELD: u8 = 1;
    pub const REF_GET_STATIC: u8 = 2;
    pub const REF_PUT_FIELD: u8 = 3;
    pub const REF_PUT_STATIC: u8 = 4;
    pub const REF_INVOKE_VIRTUAL: u8 = 5;
    pub const REF_INVOKE_STATIC: u8 = 6;
    pub const REF_INVOKE_SPECIAL: u8 = 7;
    pub const REF_NEW_INVOKE_SPECIAL: u8 = 8;
    pub const REF_INVOKE_INTERFACE: u8 = 9;
}

/// A loadable constant: `ldc` operands and bootstrap-method arguments
#[derive(Debug, Clone, PartialEq)]
pub enum ConstValue {
    Int(i32),
    Float(f32),
    Long(i64),
    Double(f64),
    Str(String),
    /// Internal class name (or array descriptor) of a class constant
    Class(String),
    MethodHandle(Handle),
    MethodType(String),
    Dynamic {
        name: String,
        descriptor: String,
        bootstrap: Handle,
        args: Vec<ConstValue>,
    },
}

impl ConstValue {
    /// Slot width on the operand stack
    pub fn size(&self) -> u16 {
        match self {
            ConstValue::Long(_) | ConstValue::Double(_) => 2,
            ConstValue::Dynamic { descriptor, .. } => {
                if descriptor == "J" || descriptor == "D" { 2 } else { 1 }
            }
            _ => 1,
        }
    }
}

/// An attribute carried through without interpretation. Data references the
/// constant pool by index, which stays valid because the writer is seeded
/// with the input pool.
#[derive(Debug, Clone, PartialEq)]
pub struct RawAttribute {
    pub name: String,
    pub data: Vec<u8>,
}

/// One record component declaration
#[derive(Debug, Clone, PartialEq)]
pub struct RecordComponent {
    pub name: String,
    pub descriptor: String,
    pub attributes: Vec<RawAttribute>,
}

/// A `requires` entry of a module declaration
#[derive(Debug, Clone, PartialEq)]
pub struct ModuleRequire {
    pub module: String,
    pub flags: u16,
    pub version: Option<String>,
}

/// An `exports` or `opens` entry of a module declaration
#[derive(Debug, Clone, PartialEq)]
pub struct ModulePackageEntry {
    pub package: String,
    pub flags: u16,
    pub to: Vec<String>,
}

/// A `provides` entry of a module declaration
#[derive(Debug, Clone, PartialEq)]
pub struct ModuleProvide {
    pub service: String,
    pub with: Vec<String>,
}

/// Decoded module declaration
#[derive(Debug, Clone, PartialEq, Default)]
pub struct ModuleDecl {
    pub name: String,
    pub flags: u16,
    pub version: Option<String>,
    pub requires: Vec<ModuleRequire>,
    pub exports: Vec<ModulePackageEntry>,
    pub opens: Vec<ModulePackageEntry>,
    pub uses: Vec<String>,
    pub provides: Vec<ModuleProvide>,
}

/// Structural event sink for one class.
///
/// Event order produced by the reader: `visit_header`, `visit_source?`,
/// `visit_module?`, `visit_nest_host?`, `visit_nest_member*`,
/// `visit_permitted_subclass*`, `visit_record_component*`, `visit_field*`,
/// `visit_method*`, `visit_attribute*`, `visit_end`.
pub trait ClassVisitor {
    /// Next stage in the pipeline; default event handlers forward here
    fn delegate(&mut self) -> Option<&mut dyn ClassVisitor> {
        None
    }

    /// Class header. `version` is the packed classfile version
    /// (`minor << 16 | major`); `access` carries [`super::defs::ACC_RECORD`]
    /// as a pseudo flag above the 16-bit file flags.
    fn visit_header(
        &mut self,
        version: u32,
        access: u32,
        name: &str,
        signature: Option<&str>,
        super_name: Option<&str>,
        interfaces: &[String],
    ) {
        if let Some(cv) = self.delegate() {
            cv.visit_header(version, access, name, signature, super_name, interfaces);
        }
    }

    fn visit_source(&mut self, file: &str) {
        if let Some(cv) = self.delegate() {
            cv.visit_source(file);
        }
    }

    fn visit_module(&mut self, module: &ModuleDecl) {
        if let Some(cv) = self.delegate() {
            cv.visit_module(module);
        }
    }

    fn visit_nest_host(&mut self, host: &str) {
        if let Some(cv) = self.delegate() {
            cv.visit_nest_host(host);
        }
    }

    fn visit_nest_member(&mut self, member: &str) {
        if let Some(cv) = self.delegate() {
            cv.visit_nest_member(member);
        }
    }

    fn visit_permitted_subclass(&mut self, name: &str) {
        if let Some(cv) = self.delegate() {
            cv.visit_permitted_subclass(name);
        }
    }

    fn visit_record_component(&mut self, component: &RecordComponent) {
        if let Some(cv) = self.delegate() {
            cv.visit_record_component(component);
        }
    }

    fn visit_field(&mut self, access: u16, name: &str, descriptor: &str, attributes: &[RawAttribute]) {
        if let Some(cv) = self.delegate() {
            cv.visit_field(access, name, descriptor, attributes);
        }
    }

    /// Begin a method; returns the instruction-level sink, or `None` to drop
    /// the method entirely.
    fn visit_method<'v>(
        &'v mut self,
        access: u16,
        name: &str,
        descriptor: &str,
        signature: Option<&str>,
        exceptions: &[String],
    ) -> Option<Box<dyn MethodVisitor + 'v>> {
        self.delegate()
            .and_then(|cv| cv.visit_method(access, name, descriptor, signature, exceptions))
    }

    /// Uninterpreted class-level attribute
    fn visit_attribute(&mut self, name: &str, data: &[u8]) {
        if let Some(cv) = self.delegate() {
            cv.visit_attribute(name, data);
        }
    }

    fn visit_end(&mut self) {
        if let Some(cv) = self.delegate() {
            cv.visit_end();
        }
    }
}

/// Instruction-level event sink for one method body.
///
/// Event order produced by the reader: `visit_attribute*`, then for methods
/// with code: `visit_code`, `visit_try_catch*`, instruction and debug events
/// in bytecode order, `visit_maxs`, and finally `visit_end` for every method.
pub trait MethodVisitor {
    /// Next visitor in the chain; default event handlers forward here
    fn delegate(&mut self) -> Option<&mut dyn MethodVisitor> {
        None
    }

    /// Uninterpreted method-level attribute (never the Code attribute)
    fn visit_attribute(&mut self, name: &str, data: &[u8]) {
        if let Some(mv) = self.delegate() {
            mv.visit_attribute(name, data);
        }
    }

    fn visit_code(&mut self) {
        if let Some(mv) = self.delegate() {
            mv.visit_code();
        }
    }

    fn visit_try_catch(&mut self, start: Label, end: Label, handler: Label, catch_type: Option<&str>) {
        if let Some(mv) = self.delegate() {
            mv.visit_try_catch(start, end, handler, catch_type);
        }
    }

    fn visit_label(&mut self, label: Label) {
        if let Some(mv) = self.delegate() {
            mv.visit_label(label);
        }
    }

    fn visit_insn(&mut self, opcode: u8) {
        if let Some(mv) = self.delegate() {
            mv.visit_insn(opcode);
        }
    }

    /// `bipush`, `sipush` and `newarray`
    fn visit_int_insn(&mut self, opcode: u8, operand: i32) {
        if let Some(mv) = self.delegate() {
            mv.visit_int_insn(opcode, operand);
        }
    }

    fn visit_var_insn(&mut self, opcode: u8, var: u16) {
        if let Some(mv) = self.delegate() {
            mv.visit_var_insn(opcode, var);
        }
    }

    fn visit_type_insn(&mut self, opcode: u8, class_name: &str) {
        if let Some(mv) = self.delegate() {
            mv.visit_type_insn(opcode, class_name);
        }
    }

    fn visit_field_insn(&mut self, opcode: u8, owner: &str, name: &str, descriptor: &str) {
        if let Some(mv) = self.delegate() {
            mv.visit_field_insn(opcode, owner, name, descriptor);
        }
    }

    fn visit_method_insn(&mut self, opcode: u8, owner: &str, name: &str, descriptor: &str, is_interface: bool) {
        if let Some(mv) = self.delegate() {
            mv.visit_method_insn(opcode, owner, name, descriptor, is_interface);
        }
    }

    fn visit_invoke_dynamic(&mut self, name: &str, descriptor: &str, bootstrap: &Handle, args: &[ConstValue]) {
        if let Some(mv) = self.delegate() {
            mv.visit_invoke_dynamic(name, descriptor, bootstrap, args);
        }
    }

    fn visit_jump_insn(&mut self, opcode: u8, label: Label) {
        if let Some(mv) = self.delegate() {
            mv.visit_jump_insn(opcode, label);
        }
    }

    fn visit_ldc(&mut self, value: &ConstValue) {
        if let Some(mv) = self.delegate() {
            mv.visit_ldc(value);
        }
    }

    fn visit_iinc(&mut self, var: u16, delta: i16) {
        if let Some(mv) = self.delegate() {
            mv.visit_iinc(var, delta);
        }
    }

    fn visit_table_switch(&mut self, low: i32, high: i32, default: Label, labels: &[Label]) {
        if let Some(mv) = self.delegate() {
            mv.visit_table_switch(low, high, default, labels);
        }
    }

    fn visit_lookup_switch(&mut self, default: Label, pairs: &[(i32, Label)]) {
        if let Some(mv) = self.delegate() {
            mv.visit_lookup_switch(default, pairs);
        }
    }

    fn visit_multianewarray(&mut self, descriptor: &str, dims: u8) {
        if let Some(mv) = self.delegate() {
            mv.visit_multianewarray(descriptor, dims);
        }
    }

    fn visit_local_var(&mut self, name: &str, descriptor: &str, start: Label, end: Label, index: u16) {
        if let Some(mv) = self.delegate() {
            mv.visit_local_var(name, descriptor, start, end, index);
        }
    }

    fn visit_line_number(&mut self, line: u16, start: Label) {
        if let Some(mv) = self.delegate() {
            mv.visit_line_number(line, start);
        }
    }

    /// Declared operand accounting for the body. The writer serializes these
    /// bounds as given; stages adjust them when they change the instruction
    /// stream.
    fn visit_maxs(&mut self, max_stack: u16, max_locals: u16) {
        if let Some(mv) = self.delegate() {
            mv.visit_maxs(max_stack, max_locals);
        }
    }

    fn visit_end(&mut self) {
        if let Some(mv) = self.delegate() {
            mv.visit_end();
        }
    }
}

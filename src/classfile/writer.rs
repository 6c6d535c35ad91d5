//! Event-driven class file serializer.
//!
//! `ClassWriter` is the terminal sink of a visitor pipeline. It interns
//! everything it receives into its constant pool, resolves labels to byte
//! offsets when a method body ends, and assembles the final buffer in
//! `finish()`. Operand accounting is serialized exactly as declared by
//! `visit_maxs`; the writer never recomputes bounds.
//!
//! Visit methods are infallible; the first internal failure (unbound label,
//! branch overflow, pool exhaustion) is latched and surfaced by `finish()`,
//! so a partial buffer can never escape.

use std::collections::HashMap;

use crate::common::error::{Error, Result};
use crate::consts::MAX_CODE_BYTES;
use super::attribute::{
    AttributeInfo, CodeAttribute, ExceptionTableEntry, LineNumberTable, LineNumberEntry,
    LocalVariableEntry, LocalVariableTable,
};
use super::constpool::ConstantPool;
use super::defs::{ACC_RECORD, MAGIC};
use super::opcodes as op;
use super::visitor::{ClassVisitor, ConstValue, Handle, Label, MethodVisitor, ModuleDecl, RawAttribute, RecordComponent};

#[derive(Debug)]
struct MemberRec {
    access: u16,
    name_index: u16,
    descriptor_index: u16,
    attributes: Vec<AttributeInfo>,
}

impl MemberRec {
    fn write_to(&self, buffer: &mut Vec<u8>) {
        buffer.extend_from_slice(&self.access.to_be_bytes());
        buffer.extend_from_slice(&self.name_index.to_be_bytes());
        buffer.extend_from_slice(&self.descriptor_index.to_be_bytes());
        buffer.extend_from_slice(&(self.attributes.len() as u16).to_be_bytes());
        for attribute in &self.attributes {
            buffer.extend_from_slice(&attribute.to_bytes());
        }
    }
}

#[derive(Debug, PartialEq)]
struct BsmEntry {
    method_handle_index: u16,
    arg_indices: Vec<u16>,
}

pub struct ClassWriter {
    pool: ConstantPool,
    version: u32,
    access: u16,
    this_class: u16,
    super_class: u16,
    interfaces: Vec<u16>,
    signature: Option<u16>,
    source_file: Option<u16>,
    module: Option<Vec<u8>>,
    nest_host: Option<u16>,
    nest_members: Vec<u16>,
    permitted_subclasses: Vec<u16>,
    is_record: bool,
    record_components: Vec<(u16, u16, Vec<AttributeInfo>)>,
    fields: Vec<MemberRec>,
    methods: Vec<MemberRec>,
    bootstrap_methods: Vec<BsmEntry>,
    raw_attributes: Vec<AttributeInfo>,
    error: Option<Error>,
}

impl ClassWriter {
    pub fn new() -> Self {
        Self::with_pool(ConstantPool::new())
    }

    /// Start from an existing pool (typically the input class's) so raw
    /// attribute pass-through keeps valid indices.
    pub fn with_pool(pool: ConstantPool) -> Self {
        Self {
            pool,
            version: 0,
            access: 0,
            this_class: 0,
            super_class: 0,
            interfaces: Vec::new(),
            signature: None,
            source_file: None,
            module: None,
            nest_host: None,
            nest_members: Vec::new(),
            permitted_subclasses: Vec::new(),
            is_record: false,
            record_components: Vec::new(),
            fields: Vec::new(),
            methods: Vec::new(),
            bootstrap_methods: Vec::new(),
            raw_attributes: Vec::new(),
            error: None,
        }
    }

    fn fail(&mut self, error: Error) {
        if self.error.is_none() {
            self.error = Some(error);
        }
    }

    fn named_attribute(&mut self, name: &str, data: Vec<u8>) -> AttributeInfo {
        AttributeInfo::new(self.pool.add_utf8(name), data)
    }

    fn convert_raw(&mut self, attrs: &[RawAttribute]) -> Vec<AttributeInfo> {
        attrs
            .iter()
            .map(|a| AttributeInfo::new(self.pool.add_utf8(&a.name), a.data.clone()))
            .collect()
    }

    /// Intern a member reference for a method handle; interface members keep
    /// their own constant kind.
    fn handle_reference(&mut self, handle: &Handle) -> u16 {
        if handle.kind <= super::visitor::handle_kinds::REF_PUT_STATIC {
            self.pool.add_field_ref(&handle.owner, &handle.name, &handle.descriptor)
        } else if handle.is_interface {
            self.pool.add_interface_method_ref(&handle.owner, &handle.name, &handle.descriptor)
        } else {
            self.pool.add_method_ref(&handle.owner, &handle.name, &handle.descriptor)
        }
    }

    fn intern_handle(&mut self, handle: &Handle) -> u16 {
        let reference = self.handle_reference(handle);
        self.pool.add_method_handle(handle.kind, reference)
    }

    fn intern_bsm(&mut self, bootstrap: &Handle, args: &[ConstValue]) -> u16 {
        let method_handle_index = self.intern_handle(bootstrap);
        let arg_indices: Vec<u16> = args.iter().map(|a| self.intern_const(a)).collect();
        let entry = BsmEntry { method_handle_index, arg_indices };
        if let Some(pos) = self.bootstrap_methods.iter().position(|e| *e == entry) {
            return pos as u16;
        }
        self.bootstrap_methods.push(entry);
        (self.bootstrap_methods.len() - 1) as u16
    }

    fn intern_const(&mut self, value: &ConstValue) -> u16 {
        match value {
            ConstValue::Int(v) => self.pool.add_integer(*v),
            ConstValue::Float(v) => self.pool.add_float(*v),
            ConstValue::Long(v) => self.pool.add_long(*v),
            ConstValue::Double(v) => self.pool.add_double(*v),
            ConstValue::Str(v) => self.pool.add_string(v),
            ConstValue::Class(name) => self.pool.add_class(name),
            ConstValue::MethodHandle(handle) => self.intern_handle(handle),
            ConstValue::MethodType(descriptor) => self.pool.add_method_type(descriptor),
            ConstValue::Dynamic { name, descriptor, bootstrap, args } => {
                let bsm_index = self.intern_bsm(bootstrap, args);
                self.pool.add_dynamic(bsm_index, name, descriptor)
            }
        }
    }

    fn encode_module(&mut self, module: &ModuleDecl) -> Vec<u8> {
        let mut body = Vec::new();
        let name_index = self.pool.add_module(&module.name);
        body.extend_from_slice(&name_index.to_be_bytes());
        body.extend_from_slice(&module.flags.to_be_bytes());
        let version_index = module.version.as_deref().map_or(0, |v| self.pool.add_utf8(v));
        body.extend_from_slice(&version_index.to_be_bytes());

        body.extend_from_slice(&(module.requires.len() as u16).to_be_bytes());
        for require in &module.requires {
            let index = self.pool.add_module(&require.module);
            body.extend_from_slice(&index.to_be_bytes());
            body.extend_from_slice(&require.flags.to_be_bytes());
            let version_index = require.version.as_deref().map_or(0, |v| self.pool.add_utf8(v));
            body.extend_from_slice(&version_index.to_be_bytes());
        }
        for list in [&module.exports, &module.opens] {
            body.extend_from_slice(&(list.len() as u16).to_be_bytes());
            for entry in list {
                let index = self.pool.add_package(&entry.package);
                body.extend_from_slice(&index.to_be_bytes());
                body.extend_from_slice(&entry.flags.to_be_bytes());
                body.extend_from_slice(&(entry.to.len() as u16).to_be_bytes());
                for target in &entry.to {
                    let index = self.pool.add_module(target);
                    body.extend_from_slice(&index.to_be_bytes());
                }
            }
        }
        body.extend_from_slice(&(module.uses.len() as u16).to_be_bytes());
        for service in &module.uses {
            let index = self.pool.add_class(service);
            body.extend_from_slice(&index.to_be_bytes());
        }
        body.extend_from_slice(&(module.provides.len() as u16).to_be_bytes());
        for provide in &module.provides {
            let index = self.pool.add_class(&provide.service);
            body.extend_from_slice(&index.to_be_bytes());
            body.extend_from_slice(&(provide.with.len() as u16).to_be_bytes());
            for implementation in &provide.with {
                let index = self.pool.add_class(implementation);
                body.extend_from_slice(&index.to_be_bytes());
            }
        }
        body
    }

    /// Assemble the final class file buffer.
    pub fn finish(mut self) -> Result<Vec<u8>> {
        if let Some(error) = self.error.take() {
            return Err(error);
        }

        let mut attributes: Vec<AttributeInfo> = Vec::new();
        if let Some(index) = self.signature {
            attributes.push(self.named_attribute("Signature", index.to_be_bytes().to_vec()));
        }
        if let Some(index) = self.source_file {
            attributes.push(self.named_attribute("SourceFile", index.to_be_bytes().to_vec()));
        }
        if let Some(body) = self.module.take() {
            attributes.push(self.named_attribute("Module", body));
        }
        if let Some(index) = self.nest_host {
            attributes.push(self.named_attribute("NestHost", index.to_be_bytes().to_vec()));
        }
        if !self.nest_members.is_empty() {
            let mut body = Vec::new();
            body.extend_from_slice(&(self.nest_members.len() as u16).to_be_bytes());
            for index in &self.nest_members {
                body.extend_from_slice(&index.to_be_bytes());
            }
            attributes.push(self.named_attribute("NestMembers", body));
        }
        if !self.permitted_subclasses.is_empty() {
            let mut body = Vec::new();
            body.extend_from_slice(&(self.permitted_subclasses.len() as u16).to_be_bytes());
            for index in &self.permitted_subclasses {
                body.extend_from_slice(&index.to_be_bytes());
            }
            attributes.push(self.named_attribute("PermittedSubclasses", body));
        }
        if self.is_record || !self.record_components.is_empty() {
            let mut body = Vec::new();
            body.extend_from_slice(&(self.record_components.len() as u16).to_be_bytes());
            for (name_index, descriptor_index, attrs) in &self.record_components {
                body.extend_from_slice(&name_index.to_be_bytes());
                body.extend_from_slice(&descriptor_index.to_be_bytes());
                body.extend_from_slice(&(attrs.len() as u16).to_be_bytes());
                for attribute in attrs {
                    body.extend_from_slice(&attribute.to_bytes());
                }
            }
            attributes.push(self.named_attribute("Record", body));
        }
        if !self.bootstrap_methods.is_empty() {
            let mut body = Vec::new();
            body.extend_from_slice(&(self.bootstrap_methods.len() as u16).to_be_bytes());
            for entry in &self.bootstrap_methods {
                body.extend_from_slice(&entry.method_handle_index.to_be_bytes());
                body.extend_from_slice(&(entry.arg_indices.len() as u16).to_be_bytes());
                for index in &entry.arg_indices {
                    body.extend_from_slice(&index.to_be_bytes());
                }
            }
            attributes.push(self.named_attribute("BootstrapMethods", body));
        }
        attributes.append(&mut self.raw_attributes);

        if self.pool.overflowed() {
            return Err(Error::codegen("constant pool exceeds 65535 entries"));
        }

        let mut buffer = Vec::new();
        buffer.extend_from_slice(&MAGIC.to_be_bytes());
        buffer.extend_from_slice(&((self.version >> 16) as u16).to_be_bytes());
        buffer.extend_from_slice(&(self.version as u16).to_be_bytes());
        self.pool.write_to(&mut buffer);
        buffer.extend_from_slice(&self.access.to_be_bytes());
        buffer.extend_from_slice(&self.this_class.to_be_bytes());
        buffer.extend_from_slice(&self.super_class.to_be_bytes());
        buffer.extend_from_slice(&(self.interfaces.len() as u16).to_be_bytes());
        for index in &self.interfaces {
            buffer.extend_from_slice(&index.to_be_bytes());
        }
        buffer.extend_from_slice(&(self.fields.len() as u16).to_be_bytes());
        for field in &self.fields {
            field.write_to(&mut buffer);
        }
        buffer.extend_from_slice(&(self.methods.len() as u16).to_be_bytes());
        for method in &self.methods {
            method.write_to(&mut buffer);
        }
        buffer.extend_from_slice(&(attributes.len() as u16).to_be_bytes());
        for attribute in &attributes {
            buffer.extend_from_slice(&attribute.to_bytes());
        }
        Ok(buffer)
    }
}

impl Default for ClassWriter {
    fn default() -> Self {
        Self::new()
    }
}

impl ClassVisitor for ClassWriter {
    fn visit_header(
        &mut self,
        version: u32,
        access: u32,
        name: &str,
        signature: Option<&str>,
        super_name: Option<&str>,
        interfaces: &[String],
    ) {
        self.version = version;
        self.access = access as u16;
        self.is_record = access & ACC_RECORD != 0;
        self.this_class = self.pool.add_class(name);
        self.super_class = super_name.map_or(0, |s| self.pool.add_class(s));
        self.interfaces = interfaces.iter().map(|i| self.pool.add_class(i)).collect();
        self.signature = signature.map(|s| self.pool.add_utf8(s));
    }

    fn visit_source(&mut self, file: &str) {
        self.source_file = Some(self.pool.add_utf8(file));
    }

    fn visit_module(&mut self, module: &ModuleDecl) {
        let body = self.encode_module(module);
        self.module = Some(body);
    }

    fn visit_nest_host(&mut self, host: &str) {
        self.nest_host = Some(self.pool.add_class(host));
    }

    fn visit_nest_member(&mut self, member: &str) {
        let index = self.pool.add_class(member);
        self.nest_members.push(index);
    }

    fn visit_permitted_subclass(&mut self, name: &str) {
        let index = self.pool.add_class(name);
        self.permitted_subclasses.push(index);
    }

    fn visit_record_component(&mut self, component: &RecordComponent) {
        let name_index = self.pool.add_utf8(&component.name);
        let descriptor_index = self.pool.add_utf8(&component.descriptor);
        let attributes = self.convert_raw(&component.attributes);
        self.record_components.push((name_index, descriptor_index, attributes));
    }

    fn visit_field(&mut self, access: u16, name: &str, descriptor: &str, attributes: &[RawAttribute]) {
        let name_index = self.pool.add_utf8(name);
        let descriptor_index = self.pool.add_utf8(descriptor);
        let attributes = self.convert_raw(attributes);
        self.fields.push(MemberRec { access, name_index, descriptor_index, attributes });
    }

    fn visit_method<'v>(
        &'v mut self,
        access: u16,
        name: &str,
        descriptor: &str,
        signature: Option<&str>,
        exceptions: &[String],
    ) -> Option<Box<dyn MethodVisitor + 'v>> {
        let name_index = self.pool.add_utf8(name);
        let descriptor_index = self.pool.add_utf8(descriptor);
        let signature_index = signature.map(|s| self.pool.add_utf8(s));
        let exception_indices: Vec<u16> = exceptions.iter().map(|e| self.pool.add_class(e)).collect();
        Some(Box::new(MethodWriter {
            writer: self,
            access,
            name_index,
            descriptor_index,
            signature_index,
            exception_indices,
            attributes: Vec::new(),
            code: None,
        }))
    }

    fn visit_attribute(&mut self, name: &str, data: &[u8]) {
        let attribute = self.named_attribute(name, data.to_vec());
        self.raw_attributes.push(attribute);
    }

    fn visit_end(&mut self) {}
}

struct Fixup {
    /// Byte position of the placeholder inside the code buffer
    at: usize,
    /// Offset of the owning opcode; branch deltas are relative to it
    base: u32,
    label: Label,
    wide: bool,
}

#[derive(Default)]
struct CodeBuffer {
    bytes: Vec<u8>,
    labels: HashMap<Label, u32>,
    fixups: Vec<Fixup>,
    try_catches: Vec<(Label, Label, Label, u16)>,
    line_numbers: Vec<(Label, u16)>,
    local_vars: Vec<(u16, u16, Label, Label, u16)>,
    max_stack: u16,
    max_locals: u16,
}

pub struct MethodWriter<'w> {
    writer: &'w mut ClassWriter,
    access: u16,
    name_index: u16,
    descriptor_index: u16,
    signature_index: Option<u16>,
    exception_indices: Vec<u16>,
    attributes: Vec<AttributeInfo>,
    code: Option<CodeBuffer>,
}

impl<'w> MethodWriter<'w> {
    fn code_mut(&mut self) -> &mut CodeBuffer {
        self.code.get_or_insert_with(CodeBuffer::default)
    }

    fn offset(&mut self) -> u32 {
        self.code_mut().bytes.len() as u32
    }

    fn push(&mut self, byte: u8) {
        self.code_mut().bytes.push(byte);
    }

    fn push_u16(&mut self, value: u16) {
        self.code_mut().bytes.extend_from_slice(&value.to_be_bytes());
    }

    fn push_fixup(&mut self, base: u32, label: Label, wide: bool) {
        let code = self.code_mut();
        let at = code.bytes.len();
        code.fixups.push(Fixup { at, base, label, wide });
        let placeholder: &[u8] = if wide { &[0; 4] } else { &[0; 2] };
        code.bytes.extend_from_slice(placeholder);
    }

    fn resolve_label(labels: &HashMap<Label, u32>, label: Label) -> Result<u32> {
        labels
            .get(&label)
            .copied()
            .ok_or_else(|| Error::codegen(format!("unbound label {:?}", label)))
    }

    fn pc16(labels: &HashMap<Label, u32>, label: Label) -> Result<u16> {
        let pc = Self::resolve_label(labels, label)?;
        u16::try_from(pc).map_err(|_| Error::codegen("code offset exceeds 16-bit range"))
    }

    fn finish_code(&mut self) -> Result<Option<AttributeInfo>> {
        let Some(code) = self.code.take() else { return Ok(None) };
        let CodeBuffer {
            mut bytes,
            labels,
            fixups,
            try_catches,
            line_numbers,
            local_vars,
            max_stack,
            max_locals,
        } = code;
        if bytes.len() > MAX_CODE_BYTES {
            return Err(Error::codegen(format!("method body exceeds {} bytes", MAX_CODE_BYTES)));
        }
        for fixup in &fixups {
            let target = Self::resolve_label(&labels, fixup.label)?;
            let delta = target as i64 - fixup.base as i64;
            if fixup.wide {
                bytes[fixup.at..fixup.at + 4].copy_from_slice(&(delta as i32).to_be_bytes());
            } else {
                let delta = i16::try_from(delta)
                    .map_err(|_| Error::codegen("branch offset exceeds 16-bit range"))?;
                bytes[fixup.at..fixup.at + 2].copy_from_slice(&delta.to_be_bytes());
            }
        }

        let mut exception_table = Vec::with_capacity(try_catches.len());
        for &(start, end, handler, catch_type) in &try_catches {
            exception_table.push(ExceptionTableEntry {
                start_pc: Self::pc16(&labels, start)?,
                end_pc: Self::pc16(&labels, end)?,
                handler_pc: Self::pc16(&labels, handler)?,
                catch_type,
            });
        }

        let mut attributes = Vec::new();
        if !line_numbers.is_empty() {
            let mut table = LineNumberTable::default();
            for &(start, line) in &line_numbers {
                table.entries.push(LineNumberEntry {
                    start_pc: Self::pc16(&labels, start)?,
                    line_number: line,
                });
            }
            let body = table.to_bytes();
            attributes.push(AttributeInfo::new(self.writer.pool.add_utf8("LineNumberTable"), body));
        }
        if !local_vars.is_empty() {
            let mut table = LocalVariableTable::default();
            for &(name_index, descriptor_index, start, end, index) in &local_vars {
                let start_pc = Self::pc16(&labels, start)?;
                let end_pc = Self::pc16(&labels, end)?;
                if end_pc < start_pc {
                    return Err(Error::codegen("local variable range ends before it starts"));
                }
                table.entries.push(LocalVariableEntry {
                    start_pc,
                    length: end_pc - start_pc,
                    name_index,
                    descriptor_index,
                    index,
                });
            }
            let body = table.to_bytes();
            attributes.push(AttributeInfo::new(self.writer.pool.add_utf8("LocalVariableTable"), body));
        }

        let attribute = CodeAttribute {
            max_stack,
            max_locals,
            code: bytes,
            exception_table,
            attributes,
        };
        Ok(Some(AttributeInfo::new(self.writer.pool.add_utf8("Code"), attribute.to_bytes())))
    }
}

impl<'w> MethodVisitor for MethodWriter<'w> {
    fn visit_attribute(&mut self, name: &str, data: &[u8]) {
        let attribute = self.writer.named_attribute(name, data.to_vec());
        self.attributes.push(attribute);
    }

    fn visit_code(&mut self) {
        self.code_mut();
    }

    fn visit_try_catch(&mut self, start: Label, end: Label, handler: Label, catch_type: Option<&str>) {
        let catch_index = catch_type.map_or(0, |t| self.writer.pool.add_class(t));
        self.code_mut().try_catches.push((start, end, handler, catch_index));
    }

    fn visit_label(&mut self, label: Label) {
        let offset = self.offset();
        let prior = self.code_mut().labels.insert(label, offset);
        if let Some(bound) = prior {
            if bound != offset {
                self.writer.fail(Error::codegen(format!("label {:?} bound twice", label)));
            }
        }
    }

    fn visit_insn(&mut self, opcode: u8) {
        self.push(opcode);
    }

    fn visit_int_insn(&mut self, opcode: u8, operand: i32) {
        self.push(opcode);
        match opcode {
            op::BIPUSH | op::NEWARRAY => self.push(operand as u8),
            op::SIPUSH => self.push_u16(operand as u16),
            _ => self.writer.fail(Error::codegen(format!("invalid int instruction 0x{:02x}", opcode))),
        }
    }

    fn visit_var_insn(&mut self, opcode: u8, var: u16) {
        let is_load_store = (op::ILOAD..=op::ALOAD).contains(&opcode) || (op::ISTORE..=op::ASTORE).contains(&opcode);
        if var <= 3 && is_load_store {
            // Compact one-byte form
            let base = if opcode >= op::ISTORE { op::ISTORE_0 + (opcode - op::ISTORE) * 4 } else { op::ILOAD_0 + (opcode - op::ILOAD) * 4 };
            self.push(base + var as u8);
        } else if var <= 0xFF {
            self.push(opcode);
            self.push(var as u8);
        } else {
            self.push(op::WIDE);
            self.push(opcode);
            self.push_u16(var);
        }
    }

    fn visit_type_insn(&mut self, opcode: u8, class_name: &str) {
        let index = self.writer.pool.add_class(class_name);
        self.push(opcode);
        self.push_u16(index);
    }

    fn visit_field_insn(&mut self, opcode: u8, owner: &str, name: &str, descriptor: &str) {
        let index = self.writer.pool.add_field_ref(owner, name, descriptor);
        self.push(opcode);
        self.push_u16(index);
    }

    fn visit_method_insn(&mut self, opcode: u8, owner: &str, name: &str, descriptor: &str, is_interface: bool) {
        let index = if is_interface {
            self.writer.pool.add_interface_method_ref(owner, name, descriptor)
        } else {
            self.writer.pool.add_method_ref(owner, name, descriptor)
        };
        self.push(opcode);
        self.push_u16(index);
        if opcode == op::INVOKEINTERFACE {
            match super::descriptor::argument_slots(descriptor) {
                Ok(slots) => {
                    self.push(slots as u8 + 1);
                    self.push(0);
                }
                Err(error) => self.writer.fail(error),
            }
        }
    }

    fn visit_invoke_dynamic(&mut self, name: &str, descriptor: &str, bootstrap: &Handle, args: &[ConstValue]) {
        let bsm_index = self.writer.intern_bsm(bootstrap, args);
        let index = self.writer.pool.add_invoke_dynamic(bsm_index, name, descriptor);
        self.push(op::INVOKEDYNAMIC);
        self.push_u16(index);
        self.push_u16(0);
    }

    fn visit_jump_insn(&mut self, opcode: u8, label: Label) {
        let base = self.offset();
        self.push(opcode);
        let wide = opcode == op::GOTO_W || opcode == op::JSR_W;
        self.push_fixup(base, label, wide);
    }

    fn visit_ldc(&mut self, value: &ConstValue) {
        let index = self.writer.intern_const(value);
        if value.size() == 2 {
            self.push(op::LDC2_W);
            self.push_u16(index);
        } else if index <= 0xFF {
            self.push(op::LDC);
            self.push(index as u8);
        } else {
            self.push(op::LDC_W);
            self.push_u16(index);
        }
    }

    fn visit_iinc(&mut self, var: u16, delta: i16) {
        if var <= 0xFF && (-128..=127).contains(&delta) {
            self.push(op::IINC);
            self.push(var as u8);
            self.push(delta as u8);
        } else {
            self.push(op::WIDE);
            self.push(op::IINC);
            self.push_u16(var);
            self.push_u16(delta as u16);
        }
    }

    fn visit_table_switch(&mut self, low: i32, high: i32, default: Label, labels: &[Label]) {
        let base = self.offset();
        self.push(op::TABLESWITCH);
        while self.offset() % 4 != 0 {
            self.push(0);
        }
        self.push_fixup(base, default, true);
        self.code_mut().bytes.extend_from_slice(&low.to_be_bytes());
        self.code_mut().bytes.extend_from_slice(&high.to_be_bytes());
        for &label in labels {
            self.push_fixup(base, label, true);
        }
    }

    fn visit_lookup_switch(&mut self, default: Label, pairs: &[(i32, Label)]) {
        let base = self.offset();
        self.push(op::LOOKUPSWITCH);
        while self.offset() % 4 != 0 {
            self.push(0);
        }
        self.push_fixup(base, default, true);
        self.code_mut().bytes.extend_from_slice(&(pairs.len() as i32).to_be_bytes());
        for &(key, label) in pairs {
            self.code_mut().bytes.extend_from_slice(&key.to_be_bytes());
            self.push_fixup(base, label, true);
        }
    }

    fn visit_multianewarray(&mut self, descriptor: &str, dims: u8) {
        let index = self.writer.pool.add_class(descriptor);
        self.push(op::MULTIANEWARRAY);
        self.push_u16(index);
        self.push(dims);
    }

    fn visit_local_var(&mut self, name: &str, descriptor: &str, start: Label, end: Label, index: u16) {
        let name_index = self.writer.pool.add_utf8(name);
        let descriptor_index = self.writer.pool.add_utf8(descriptor);
        self.code_mut().local_vars.push((name_index, descriptor_index, start, end, index));
    }

    fn visit_line_number(&mut self, line: u16, start: Label) {
        self.code_mut().line_numbers.push((start, line));
    }

    fn visit_maxs(&mut self, max_stack: u16, max_locals: u16) {
        let code = self.code_mut();
        code.max_stack = max_stack;
        code.max_locals = max_locals;
    }

    fn visit_end(&mut self) {
        let code_attribute = match self.finish_code() {
            Ok(attr) => attr,
            Err(error) => {
                self.writer.fail(error);
                None
            }
        };
        let mut attributes = std::mem::take(&mut self.attributes);
        if let Some(attr) = code_attribute {
            attributes.push(attr);
        }
        if !self.exception_indices.is_empty() {
            let mut body = Vec::new();
            body.extend_from_slice(&(self.exception_indices.len() as u16).to_be_bytes());
            for index in &self.exception_indices {
                body.extend_from_slice(&index.to_be_bytes());
            }
            let attribute = self.writer.named_attribute("Exceptions", body);
            attributes.push(attribute);
        }
        if let Some(index) = self.signature_index {
            let attribute = self.writer.named_attribute("Signature", index.to_be_bytes().to_vec());
            attributes.push(attribute);
        }
        self.writer.methods.push(MemberRec {
            access: self.access,
            name_index: self.name_index,
            descriptor_index: self.descriptor_index,
            attributes,
        });
    }
}

//! Event-driven class file parser.
//!
//! `ClassReader` parses one class file buffer and replays it as visit events
//! on a [`ClassVisitor`]. Instruction streams are decoded fully (short forms
//! normalized, branch targets lifted into labels) so downstream stages can
//! rewrite code without tracking byte offsets.
//!
//! Not forwarded: `StackMapTable`, `LocalVariableTypeTable` and code-level
//! type annotations (their offsets would be stale after rewriting), and
//! `BootstrapMethods` (consumed here to resolve dynamic call sites; the
//! writer rebuilds it from the interned call sites it receives).

use std::collections::{BTreeMap, BTreeSet};

use crate::common::error::{Error, Result};
use crate::consts::READER_MAX_CONDY_DEPTH;
use super::constpool::{Constant, ConstantPool};
use super::defs::{ACC_RECORD, MAGIC};
use super::opcodes as op;
use super::visitor::{
    ClassVisitor, ConstValue, Handle, Label, MethodVisitor, ModuleDecl, ModulePackageEntry,
    ModuleProvide, ModuleRequire, RawAttribute, RecordComponent,
};

/// Bounds-checked cursor over the input buffer
struct ByteCursor<'a> {
    data: &'a [u8],
    pos: usize,
}

impl<'a> ByteCursor<'a> {
    fn new(data: &'a [u8], pos: usize) -> Self {
        Self { data, pos }
    }

    fn pos(&self) -> usize {
        self.pos
    }

    fn at_end(&self) -> bool {
        self.pos >= self.data.len()
    }

    fn bytes(&mut self, n: usize) -> Result<&'a [u8]> {
        let slice = self
            .data
            .get(self.pos..self.pos + n)
            .ok_or_else(|| Error::class_format("unexpected end of class file"))?;
        self.pos += n;
        Ok(slice)
    }

    fn u8(&mut self) -> Result<u8> {
        Ok(self.bytes(1)?[0])
    }

    fn u16(&mut self) -> Result<u16> {
        Ok(u16::from_be_bytes(self.bytes(2)?.try_into().unwrap()))
    }

    fn u32(&mut self) -> Result<u32> {
        Ok(u32::from_be_bytes(self.bytes(4)?.try_into().unwrap()))
    }

    fn i8(&mut self) -> Result<i8> {
        Ok(self.u8()? as i8)
    }

    fn i16(&mut self) -> Result<i16> {
        Ok(self.u16()? as i16)
    }

    fn i32(&mut self) -> Result<i32> {
        Ok(self.u32()? as i32)
    }
}

/// One bootstrap-method entry, unresolved (pool indices)
struct RawBsm {
    method_ref: u16,
    args: Vec<u16>,
}

struct RawField {
    access: u16,
    name_index: u16,
    descriptor_index: u16,
    attributes: Vec<(u16, usize, usize)>, // name index, data start, data len
}

type RawMethod = RawField;

/// Decoded instruction, ready to replay as events. Branch operands are
/// absolute code offsets at this point; they become labels on emission.
enum Insn {
    Simple(u8),
    Int(u8, i32),
    Var(u8, u16),
    Type(u8, u16),
    Field(u8, u16),
    Method(u8, u16),
    InvokeDynamic(u16),
    Jump(u8, u32),
    Ldc(u16),
    Iinc(u16, i16),
    TableSwitch { low: i32, high: i32, default: u32, targets: Vec<u32> },
    LookupSwitch { default: u32, pairs: Vec<(i32, u32)> },
    MultiANewArray(u16, u8),
}

pub struct ClassReader<'a> {
    data: &'a [u8],
    pool: ConstantPool,
    version: u32,
    access: u16,
    this_class: u16,
    super_class: u16,
    interfaces: Vec<u16>,
    /// Offset of the fields section
    body_pos: usize,
}

impl<'a> ClassReader<'a> {
    pub fn new(data: &'a [u8]) -> Result<Self> {
        let mut cur = ByteCursor::new(data, 0);
        if cur.u32()? != MAGIC {
            return Err(Error::class_format("bad magic number"));
        }
        let minor = cur.u16()?;
        let major = cur.u16()?;
        let (pool, pool_len) = ConstantPool::parse(&data[8..])?;
        let mut cur = ByteCursor::new(data, 8 + pool_len);
        let access = cur.u16()?;
        let this_class = cur.u16()?;
        let super_class = cur.u16()?;
        let interface_count = cur.u16()?;
        let mut interfaces = Vec::with_capacity(interface_count as usize);
        for _ in 0..interface_count {
            interfaces.push(cur.u16()?);
        }
        Ok(Self {
            data,
            pool,
            version: ((minor as u32) << 16) | major as u32,
            access,
            this_class,
            super_class,
            interfaces,
            body_pos: cur.pos(),
        })
    }

    /// Packed classfile version (`minor << 16 | major`)
    pub fn version(&self) -> u32 {
        self.version
    }

    pub fn major_version(&self) -> u16 {
        self.version as u16
    }

    pub fn class_name(&self) -> Result<&str> {
        self.pool.class_name(self.this_class)
    }

    pub fn pool(&self) -> &ConstantPool {
        &self.pool
    }

    /// Replay the class as events on `visitor`.
    pub fn accept(&self, visitor: &mut dyn ClassVisitor) -> Result<()> {
        let class_name = self.class_name()?.to_string();
        let mut cur = ByteCursor::new(self.data, self.body_pos);

        let fields = self.parse_members(&mut cur)?;
        let methods = self.parse_members(&mut cur)?;

        // Class attributes come after methods in the file, but bootstrap
        // methods must be in hand before instruction decoding, so parse them
        // all up front.
        let attr_count = cur.u16()?;
        let mut source_file = None;
        let mut signature = None;
        let mut module = None;
        let mut nest_host = None;
        let mut nest_members = Vec::new();
        let mut permitted = Vec::new();
        let mut components = Vec::new();
        let mut has_record_attr = false;
        let mut bsms: Vec<RawBsm> = Vec::new();
        let mut raw_attrs = Vec::new();
        for _ in 0..attr_count {
            let name_index = cur.u16()?;
            let len = cur.u32()? as usize;
            let start = cur.pos();
            let data = cur.bytes(len)?;
            let name = self.pool.utf8(name_index).map_err(|e| e.in_context(&class_name))?;
            let mut acur = ByteCursor::new(self.data, start);
            match name {
                "SourceFile" => source_file = Some(self.pool.utf8(acur.u16()?)?.to_string()),
                "Signature" => signature = Some(self.pool.utf8(acur.u16()?)?.to_string()),
                "Module" => module = Some(self.parse_module(&mut acur)?),
                "NestHost" => nest_host = Some(self.pool.class_name(acur.u16()?)?.to_string()),
                "NestMembers" => {
                    for _ in 0..acur.u16()? {
                        nest_members.push(self.pool.class_name(acur.u16()?)?.to_string());
                    }
                }
                "PermittedSubclasses" => {
                    for _ in 0..acur.u16()? {
                        permitted.push(self.pool.class_name(acur.u16()?)?.to_string());
                    }
                }
                "Record" => {
                    has_record_attr = true;
                    for _ in 0..acur.u16()? {
                        components.push(self.parse_record_component(&mut acur)?);
                    }
                }
                "BootstrapMethods" => {
                    for _ in 0..acur.u16()? {
                        let method_ref = acur.u16()?;
                        let arg_count = acur.u16()?;
                        let mut args = Vec::with_capacity(arg_count as usize);
                        for _ in 0..arg_count {
                            args.push(acur.u16()?);
                        }
                        bsms.push(RawBsm { method_ref, args });
                    }
                }
                other => raw_attrs.push(RawAttribute { name: other.to_string(), data: data.to_vec() }),
            }
        }

        let mut access = self.access as u32;
        if has_record_attr {
            access |= ACC_RECORD;
        }
        let interfaces: Vec<String> = self
            .interfaces
            .iter()
            .map(|&i| self.pool.class_name(i).map(str::to_string))
            .collect::<Result<_>>()?;

        visitor.visit_header(
            self.version,
            access,
            &class_name,
            signature.as_deref(),
            self.pool.opt_class_name(self.super_class)?,
            &interfaces,
        );
        if let Some(file) = &source_file {
            visitor.visit_source(file);
        }
        if let Some(module) = &module {
            visitor.visit_module(module);
        }
        if let Some(host) = &nest_host {
            visitor.visit_nest_host(host);
        }
        for member in &nest_members {
            visitor.visit_nest_member(member);
        }
        for name in &permitted {
            visitor.visit_permitted_subclass(name);
        }
        for component in &components {
            visitor.visit_record_component(component);
        }

        for field in &fields {
            let name = self.pool.utf8(field.name_index)?;
            let descriptor = self.pool.utf8(field.descriptor_index)?;
            let attributes = self.raw_attributes(&field.attributes)?;
            visitor.visit_field(field.access, name, descriptor, &attributes);
        }

        for method in &methods {
            self.accept_method(visitor, method, &bsms, &class_name)?;
        }

        for attr in &raw_attrs {
            visitor.visit_attribute(&attr.name, &attr.data);
        }
        visitor.visit_end();
        Ok(())
    }

    fn parse_members(&self, cur: &mut ByteCursor<'a>) -> Result<Vec<RawField>> {
        let count = cur.u16()?;
        let mut members = Vec::with_capacity(count as usize);
        for _ in 0..count {
            let access = cur.u16()?;
            let name_index = cur.u16()?;
            let descriptor_index = cur.u16()?;
            let attr_count = cur.u16()?;
            let mut attributes = Vec::with_capacity(attr_count as usize);
            for _ in 0..attr_count {
                let attr_name = cur.u16()?;
                let len = cur.u32()? as usize;
                let start = cur.pos();
                cur.bytes(len)?;
                attributes.push((attr_name, start, len));
            }
            members.push(RawField { access, name_index, descriptor_index, attributes });
        }
        Ok(members)
    }

    fn raw_attributes(&self, attrs: &[(u16, usize, usize)]) -> Result<Vec<RawAttribute>> {
        attrs
            .iter()
            .map(|&(name_index, start, len)| {
                Ok(RawAttribute {
                    name: self.pool.utf8(name_index)?.to_string(),
                    data: self.data[start..start + len].to_vec(),
                })
            })
            .collect()
    }

    fn parse_record_component(&self, cur: &mut ByteCursor<'a>) -> Result<RecordComponent> {
        let name = self.pool.utf8(cur.u16()?)?.to_string();
        let descriptor = self.pool.utf8(cur.u16()?)?.to_string();
        let attr_count = cur.u16()?;
        let mut attributes = Vec::with_capacity(attr_count as usize);
        for _ in 0..attr_count {
            let attr_name = self.pool.utf8(cur.u16()?)?.to_string();
            let len = cur.u32()? as usize;
            attributes.push(RawAttribute { name: attr_name, data: cur.bytes(len)?.to_vec() });
        }
        Ok(RecordComponent { name, descriptor, attributes })
    }

    fn parse_module(&self, cur: &mut ByteCursor<'a>) -> Result<ModuleDecl> {
        let name = self.pool.module_name(cur.u16()?)?.to_string();
        let flags = cur.u16()?;
        let version = self.opt_utf8(cur.u16()?)?;
        let mut module = ModuleDecl { name, flags, version, ..Default::default() };
        for _ in 0..cur.u16()? {
            module.requires.push(ModuleRequire {
                module: self.pool.module_name(cur.u16()?)?.to_string(),
                flags: cur.u16()?,
                version: self.opt_utf8(cur.u16()?)?,
            });
        }
        for list in [&mut module.exports, &mut module.opens] {
            for _ in 0..cur.u16()? {
                let package = self.pool.package_name(cur.u16()?)?.to_string();
                let flags = cur.u16()?;
                let mut to = Vec::new();
                for _ in 0..cur.u16()? {
                    to.push(self.pool.module_name(cur.u16()?)?.to_string());
                }
                list.push(ModulePackageEntry { package, flags, to });
            }
        }
        for _ in 0..cur.u16()? {
            module.uses.push(self.pool.class_name(cur.u16()?)?.to_string());
        }
        for _ in 0..cur.u16()? {
            let service = self.pool.class_name(cur.u16()?)?.to_string();
            let mut with = Vec::new();
            for _ in 0..cur.u16()? {
                with.push(self.pool.class_name(cur.u16()?)?.to_string());
            }
            module.provides.push(ModuleProvide { service, with });
        }
        Ok(module)
    }

    fn opt_utf8(&self, index: u16) -> Result<Option<String>> {
        if index == 0 {
            Ok(None)
        } else {
            Ok(Some(self.pool.utf8(index)?.to_string()))
        }
    }

    fn accept_method(
        &self,
        visitor: &mut dyn ClassVisitor,
        method: &RawMethod,
        bsms: &[RawBsm],
        class_name: &str,
    ) -> Result<()> {
        let name = self.pool.utf8(method.name_index)?;
        let descriptor = self.pool.utf8(method.descriptor_index)?;
        let context = format!("{}.{}{}", class_name, name, descriptor);

        let mut code = None;
        let mut signature = None;
        let mut exceptions = Vec::new();
        let mut raw_attrs = Vec::new();
        for &(attr_name_index, start, len) in &method.attributes {
            let attr_name = self.pool.utf8(attr_name_index)?;
            let mut acur = ByteCursor::new(self.data, start);
            match attr_name {
                "Code" => code = Some((start, len)),
                "Signature" => signature = Some(self.pool.utf8(acur.u16()?)?.to_string()),
                "Exceptions" => {
                    for _ in 0..acur.u16()? {
                        exceptions.push(self.pool.class_name(acur.u16()?)?.to_string());
                    }
                }
                other => raw_attrs.push(RawAttribute {
                    name: other.to_string(),
                    data: self.data[start..start + len].to_vec(),
                }),
            }
        }

        let mv = visitor.visit_method(method.access, name, descriptor, signature.as_deref(), &exceptions);
        let Some(mut mv) = mv else { return Ok(()) };

        for attr in &raw_attrs {
            mv.visit_attribute(&attr.name, &attr.data);
        }
        if let Some((start, _len)) = code {
            self.accept_code(mv.as_mut(), start, bsms, &context)
                .map_err(|e| e.in_context(&context))?;
        }
        mv.visit_end();
        Ok(())
    }

    fn accept_code(
        &self,
        mv: &mut dyn MethodVisitor,
        start: usize,
        bsms: &[RawBsm],
        context: &str,
    ) -> Result<()> {
        let mut cur = ByteCursor::new(self.data, start);
        let max_stack = cur.u16()?;
        let max_locals = cur.u16()?;
        let code_len = cur.u32()? as usize;
        let code = cur.bytes(code_len)?;

        let (insns, mut label_offsets, offsets) = self.decode_code(code)?;

        struct TryCatch {
            start: u32,
            end: u32,
            handler: u32,
            catch_type: Option<String>,
        }
        let exc_count = cur.u16()?;
        let mut try_catches = Vec::with_capacity(exc_count as usize);
        for _ in 0..exc_count {
            let start_pc = cur.u16()? as u32;
            let end_pc = cur.u16()? as u32;
            let handler_pc = cur.u16()? as u32;
            let catch_index = cur.u16()?;
            let catch_type = if catch_index == 0 {
                None
            } else {
                Some(self.pool.class_name(catch_index)?.to_string())
            };
            label_offsets.extend([start_pc, end_pc, handler_pc]);
            try_catches.push(TryCatch { start: start_pc, end: end_pc, handler: handler_pc, catch_type });
        }

        // Code sub-attributes: decode debug tables, drop offset-bearing rest
        let mut line_numbers: BTreeMap<u32, Vec<u16>> = BTreeMap::new();
        let mut local_vars = Vec::new();
        for _ in 0..cur.u16()? {
            let attr_name_index = cur.u16()?;
            let len = cur.u32()? as usize;
            let data_start = cur.pos();
            cur.bytes(len)?;
            let mut acur = ByteCursor::new(self.data, data_start);
            match self.pool.utf8(attr_name_index)? {
                "LineNumberTable" => {
                    for _ in 0..acur.u16()? {
                        let pc = acur.u16()? as u32;
                        let line = acur.u16()?;
                        if offsets.contains(&pc) {
                            line_numbers.entry(pc).or_default().push(line);
                            label_offsets.insert(pc);
                        }
                    }
                }
                "LocalVariableTable" => {
                    for _ in 0..acur.u16()? {
                        let start_pc = acur.u16()? as u32;
                        let length = acur.u16()? as u32;
                        let name = self.pool.utf8(acur.u16()?)?.to_string();
                        let descriptor = self.pool.utf8(acur.u16()?)?.to_string();
                        let index = acur.u16()?;
                        let end_pc = start_pc + length;
                        let valid = (offsets.contains(&start_pc) || start_pc == code_len as u32)
                            && (offsets.contains(&end_pc) || end_pc == code_len as u32);
                        if valid {
                            label_offsets.extend([start_pc, end_pc]);
                            local_vars.push((name, descriptor, start_pc, end_pc, index));
                        }
                    }
                }
                // StackMapTable, LocalVariableTypeTable, type annotations:
                // offsets go stale under rewriting, so they are not carried
                _ => {}
            }
        }

        // Branch targets must land on instruction boundaries
        for &target in &label_offsets {
            if !offsets.contains(&target) && target != code_len as u32 {
                return Err(Error::class_format(format!(
                    "branch or range target {} is not an instruction boundary",
                    target
                )));
            }
        }

        mv.visit_code();
        for tc in &try_catches {
            mv.visit_try_catch(
                Label(tc.start),
                Label(tc.end),
                Label(tc.handler),
                tc.catch_type.as_deref(),
            );
        }
        for (offset, insn) in &insns {
            if label_offsets.contains(offset) {
                mv.visit_label(Label(*offset));
            }
            if let Some(lines) = line_numbers.get(offset) {
                for &line in lines {
                    mv.visit_line_number(line, Label(*offset));
                }
            }
            self.emit_insn(mv, insn, bsms, context)?;
        }
        if label_offsets.contains(&(code_len as u32)) {
            mv.visit_label(Label(code_len as u32));
        }
        for (name, descriptor, start_pc, end_pc, index) in &local_vars {
            mv.visit_local_var(name, descriptor, Label(*start_pc), Label(*end_pc), *index);
        }
        mv.visit_maxs(max_stack, max_locals);
        Ok(())
    }

    /// Decode raw code bytes into instructions, collecting branch-target
    /// offsets and the set of valid instruction boundaries.
    #[allow(clippy::type_complexity)]
    fn decode_code(&self, code: &[u8]) -> Result<(Vec<(u32, Insn)>, BTreeSet<u32>, BTreeSet<u32>)> {
        let mut cur = ByteCursor::new(code, 0);
        let mut insns = Vec::new();
        let mut targets = BTreeSet::new();
        let mut offsets = BTreeSet::new();
        while !cur.at_end() {
            let offset = cur.pos() as u32;
            offsets.insert(offset);
            let opcode = cur.u8()?;
            let insn = match opcode {
                op::NOP..=op::DCONST_1
                | op::IALOAD..=op::SALOAD
                | op::IASTORE..=op::SASTORE
                | op::POP..=op::SWAP
                | op::IADD..=op::LXOR
                | op::I2L..=op::I2S
                | op::LCMP..=op::DCMPG
                | op::IRETURN..=op::RETURN
                | op::ARRAYLENGTH
                | op::ATHROW
                | op::MONITORENTER
                | op::MONITOREXIT => Insn::Simple(opcode),
                op::BIPUSH => Insn::Int(opcode, cur.i8()? as i32),
                op::SIPUSH => Insn::Int(opcode, cur.i16()? as i32),
                op::NEWARRAY => Insn::Int(opcode, cur.u8()? as i32),
                op::LDC => Insn::Ldc(cur.u8()? as u16),
                op::LDC_W | op::LDC2_W => Insn::Ldc(cur.u16()?),
                op::ILOAD..=op::ALOAD | op::ISTORE..=op::ASTORE | op::RET => {
                    Insn::Var(opcode, cur.u8()? as u16)
                }
                op::ILOAD_0..=0x2d => {
                    let short = opcode - op::ILOAD_0;
                    Insn::Var(op::ILOAD + (short >> 2), (short & 0x3) as u16)
                }
                op::ISTORE_0..=0x4e => {
                    let short = opcode - op::ISTORE_0;
                    Insn::Var(op::ISTORE + (short >> 2), (short & 0x3) as u16)
                }
                op::IINC => Insn::Iinc(cur.u8()? as u16, cur.i8()? as i16),
                op::WIDE => {
                    let wide_op = cur.u8()?;
                    match wide_op {
                        op::IINC => Insn::Iinc(cur.u16()?, cur.i16()?),
                        op::ILOAD..=op::ALOAD | op::ISTORE..=op::ASTORE | op::RET => {
                            Insn::Var(wide_op, cur.u16()?)
                        }
                        other => {
                            return Err(Error::class_format(format!(
                                "invalid wide opcode 0x{:02x}",
                                other
                            )))
                        }
                    }
                }
                op::IFEQ..=op::JSR | op::IFNULL | op::IFNONNULL => {
                    let delta = cur.i16()? as i32;
                    let target = offset as i32 + delta;
                    let target = self.check_target(target, code.len())?;
                    targets.insert(target);
                    Insn::Jump(opcode, target)
                }
                op::GOTO_W | op::JSR_W => {
                    let delta = cur.i32()?;
                    let target = offset as i32 + delta;
                    let target = self.check_target(target, code.len())?;
                    targets.insert(target);
                    Insn::Jump(opcode, target)
                }
                op::TABLESWITCH => {
                    while cur.pos() % 4 != 0 {
                        cur.u8()?;
                    }
                    let default = self.check_target(offset as i32 + cur.i32()?, code.len())?;
                    let low = cur.i32()?;
                    let high = cur.i32()?;
                    if high < low {
                        return Err(Error::class_format("tableswitch high < low"));
                    }
                    let count = (high as i64 - low as i64 + 1) as usize;
                    let mut switch_targets = Vec::with_capacity(count);
                    for _ in 0..count {
                        let t = self.check_target(offset as i32 + cur.i32()?, code.len())?;
                        targets.insert(t);
                        switch_targets.push(t);
                    }
                    targets.insert(default);
                    Insn::TableSwitch { low, high, default, targets: switch_targets }
                }
                op::LOOKUPSWITCH => {
                    while cur.pos() % 4 != 0 {
                        cur.u8()?;
                    }
                    let default = self.check_target(offset as i32 + cur.i32()?, code.len())?;
                    targets.insert(default);
                    let npairs = cur.i32()?;
                    if npairs < 0 {
                        return Err(Error::class_format("negative lookupswitch pair count"));
                    }
                    let mut pairs = Vec::with_capacity(npairs as usize);
                    for _ in 0..npairs {
                        let key = cur.i32()?;
                        let t = self.check_target(offset as i32 + cur.i32()?, code.len())?;
                        targets.insert(t);
                        pairs.push((key, t));
                    }
                    Insn::LookupSwitch { default, pairs }
                }
                op::GETSTATIC..=op::PUTFIELD => Insn::Field(opcode, cur.u16()?),
                op::INVOKEVIRTUAL | op::INVOKESPECIAL | op::INVOKESTATIC => {
                    Insn::Method(opcode, cur.u16()?)
                }
                op::INVOKEINTERFACE => {
                    let index = cur.u16()?;
                    cur.u16()?; // count + reserved zero
                    Insn::Method(opcode, index)
                }
                op::INVOKEDYNAMIC => {
                    let index = cur.u16()?;
                    cur.u16()?; // two reserved zero bytes
                    Insn::InvokeDynamic(index)
                }
                op::NEW | op::ANEWARRAY | op::CHECKCAST | op::INSTANCEOF => {
                    Insn::Type(opcode, cur.u16()?)
                }
                op::MULTIANEWARRAY => Insn::MultiANewArray(cur.u16()?, cur.u8()?),
                other => {
                    return Err(Error::class_format(format!("unknown opcode 0x{:02x}", other)))
                }
            };
            insns.push((offset, insn));
        }
        Ok((insns, targets, offsets))
    }

    fn check_target(&self, target: i32, code_len: usize) -> Result<u32> {
        if target < 0 || target as usize >= code_len {
            return Err(Error::class_format(format!("branch target {} out of code bounds", target)));
        }
        Ok(target as u32)
    }

    fn emit_insn(
        &self,
        mv: &mut dyn MethodVisitor,
        insn: &Insn,
        bsms: &[RawBsm],
        context: &str,
    ) -> Result<()> {
        match insn {
            Insn::Simple(opcode) => mv.visit_insn(*opcode),
            Insn::Int(opcode, operand) => mv.visit_int_insn(*opcode, *operand),
            Insn::Var(opcode, var) => mv.visit_var_insn(*opcode, *var),
            Insn::Type(opcode, index) => mv.visit_type_insn(*opcode, self.pool.class_name(*index)?),
            Insn::Field(opcode, index) => {
                let (owner, name, descriptor, _) = self.pool.member_ref(*index)?;
                mv.visit_field_insn(*opcode, owner, name, descriptor);
            }
            Insn::Method(opcode, index) => {
                let (owner, name, descriptor, is_interface) = self.pool.member_ref(*index)?;
                mv.visit_method_insn(*opcode, owner, name, descriptor, is_interface);
            }
            Insn::InvokeDynamic(index) => {
                let (bsm_index, nat_index) = match self.pool.get(*index)? {
                    Constant::InvokeDynamic(b, n) => (*b, *n),
                    _ => return Err(Error::class_format("invokedynamic without InvokeDynamic constant")),
                };
                let (name, descriptor) = self.pool.name_and_type(nat_index)?;
                let (bootstrap, args) = self.resolve_bsm(bsm_index, bsms, 0, context)?;
                mv.visit_invoke_dynamic(name, descriptor, &bootstrap, &args);
            }
            Insn::Jump(opcode, target) => mv.visit_jump_insn(*opcode, Label(*target)),
            Insn::Ldc(index) => {
                let value = self.resolve_const(*index, bsms, 0, context)?;
                mv.visit_ldc(&value);
            }
            Insn::Iinc(var, delta) => mv.visit_iinc(*var, *delta),
            Insn::TableSwitch { low, high, default, targets } => {
                let labels: Vec<Label> = targets.iter().map(|&t| Label(t)).collect();
                mv.visit_table_switch(*low, *high, Label(*default), &labels);
            }
            Insn::LookupSwitch { default, pairs } => {
                let pairs: Vec<(i32, Label)> = pairs.iter().map(|&(k, t)| (k, Label(t))).collect();
                mv.visit_lookup_switch(Label(*default), &pairs);
            }
            Insn::MultiANewArray(index, dims) => {
                mv.visit_multianewarray(self.pool.class_name(*index)?, *dims);
            }
        }
        Ok(())
    }

    fn resolve_handle(&self, index: u16) -> Result<Handle> {
        match self.pool.get(index)? {
            Constant::MethodHandle(kind, reference) => {
                let (owner, name, descriptor, is_interface) = self.pool.member_ref(*reference)?;
                Ok(Handle {
                    kind: *kind,
                    owner: owner.to_string(),
                    name: name.to_string(),
                    descriptor: descriptor.to_string(),
                    is_interface,
                })
            }
            _ => Err(Error::class_format(format!("constant {} is not MethodHandle", index))),
        }
    }

    fn resolve_bsm(
        &self,
        bsm_index: u16,
        bsms: &[RawBsm],
        depth: usize,
        context: &str,
    ) -> Result<(Handle, Vec<ConstValue>)> {
        let raw = bsms.get(bsm_index as usize).ok_or_else(|| {
            Error::class_format(format!("bootstrap method index {} out of range", bsm_index))
        })?;
        let handle = self.resolve_handle(raw.method_ref)?;
        let args = raw
            .args
            .iter()
            .map(|&arg| self.resolve_const(arg, bsms, depth + 1, context))
            .collect::<Result<Vec<_>>>()?;
        Ok((handle, args))
    }

    /// Resolve a loadable constant; dynamic constants recurse through the
    /// bootstrap table with a depth cap against self-referential pools.
    fn resolve_const(
        &self,
        index: u16,
        bsms: &[RawBsm],
        depth: usize,
        context: &str,
    ) -> Result<ConstValue> {
        if depth > READER_MAX_CONDY_DEPTH {
            return Err(Error::unsupported(
                context.to_string(),
                "dynamic constant nesting exceeds supported depth",
            ));
        }
        Ok(match self.pool.get(index)? {
            Constant::Integer(v) => ConstValue::Int(*v),
            Constant::Float(v) => ConstValue::Float(*v),
            Constant::Long(v) => ConstValue::Long(*v),
            Constant::Double(v) => ConstValue::Double(*v),
            Constant::String(utf8_index) => ConstValue::Str(self.pool.utf8(*utf8_index)?.to_string()),
            Constant::Class(name_index) => ConstValue::Class(self.pool.utf8(*name_index)?.to_string()),
            Constant::MethodHandle(..) => ConstValue::MethodHandle(self.resolve_handle(index)?),
            Constant::MethodType(descriptor_index) => {
                ConstValue::MethodType(self.pool.utf8(*descriptor_index)?.to_string())
            }
            Constant::Dynamic(bsm_index, nat_index) => {
                let (name, descriptor) = self.pool.name_and_type(*nat_index)?;
                let (bootstrap, args) = self.resolve_bsm(*bsm_index, bsms, depth, context)?;
                ConstValue::Dynamic {
                    name: name.to_string(),
                    descriptor: descriptor.to_string(),
                    bootstrap,
                    args,
                }
            }
            other => {
                return Err(Error::class_format(format!(
                    "constant {} ({:?}) is not loadable",
                    index, other
                )))
            }
        })
    }
}

//! Patcher visitor that downgrades future-versioned content

use std::cell::Cell;
use std::rc::Rc;

use crate::classfile::defs::{ACC_RECORD, CONSTRUCTOR_METHOD_NAME, OBJECT_NAME, RECORD_SUPER_NAME};
use crate::classfile::{ClassVisitor, MethodVisitor, ModuleDecl, RecordComponent};
use super::field_info::FieldInfo;
use super::record_ctor::RecordConstructorRewriter;
use super::record_members::{MemberShape, RecordMemberRewriter};
use super::string_indy::StringIndyRewriter;
use super::version::{Feature, TargetVersion};

/// Downgrades one class's event stream to the target release: clamps the
/// file version, strips constructs the target predates, lowers record
/// semantics and de-sugars indified string concatenation.
pub struct VersionPatcher<'a> {
    cv: &'a mut dyn ClassVisitor,
    target: TargetVersion,
    // State info
    class_name: String,
    fields: Vec<FieldInfo>,
    patch_record: bool,
    concat_rewrites: Rc<Cell<usize>>,
}

impl<'a> VersionPatcher<'a> {
    pub fn new(cv: &'a mut dyn ClassVisitor, target: TargetVersion) -> Self {
        Self {
            cv,
            target,
            class_name: String::new(),
            fields: Vec::new(),
            patch_record: false,
            concat_rewrites: Rc::new(Cell::new(0)),
        }
    }

    /// Number of concatenation call sites rewritten so far
    pub fn concat_rewrites(&self) -> usize {
        self.concat_rewrites.get()
    }

    /// Whether the visited class was a record that got lowered
    pub fn record_lowered(&self) -> bool {
        self.patch_record
    }
}

impl<'a> ClassVisitor for VersionPatcher<'a> {
    fn delegate(&mut self) -> Option<&mut dyn ClassVisitor> {
        Some(&mut *self.cv)
    }

    fn visit_header(
        &mut self,
        version: u32,
        access: u32,
        name: &str,
        signature: Option<&str>,
        super_name: Option<&str>,
        interfaces: &[String],
    ) {
        // Clamp the file version; never increase it
        let version = self.target.clamp_packed(version);
        // Lower the super-type for records (previewed in 14)
        let mut access = access;
        let mut super_name = super_name;
        if !self.target.supports(Feature::Records) && super_name == Some(RECORD_SUPER_NAME) {
            self.patch_record = true;
            super_name = Some(OBJECT_NAME);
            access &= !ACC_RECORD;
        }
        self.class_name = name.to_string();
        self.cv.visit_header(version, access, name, signature, super_name, interfaces);
    }

    fn visit_field(&mut self, access: u16, name: &str, descriptor: &str, attributes: &[crate::classfile::RawAttribute]) {
        self.fields.push(FieldInfo::new(access, name, descriptor));
        self.cv.visit_field(access, name, descriptor, attributes);
    }

    fn visit_method<'v>(
        &'v mut self,
        access: u16,
        name: &str,
        descriptor: &str,
        signature: Option<&str>,
        exceptions: &[String],
    ) -> Option<Box<dyn MethodVisitor + 'v>> {
        let patch_record = self.patch_record;
        let class_name = self.class_name.clone();
        let fields = self.fields.clone();
        let counter = self.concat_rewrites.clone();
        let rewrite_concat = !self.target.supports(Feature::IndyStringConcat);

        let mut mv = self.cv.visit_method(access, name, descriptor, signature, exceptions)?;
        if patch_record {
            // Constructors point their super call at java/lang/Object
            if name == CONSTRUCTOR_METHOD_NAME {
                mv = Box::new(RecordConstructorRewriter::new(mv));
            }
            // Generated member implementations are rebuilt from the fields
            if let Some(shape) = MemberShape::recognize(access, name, descriptor) {
                mv = Box::new(RecordMemberRewriter::new(mv, class_name, fields, shape));
            }
        }
        if rewrite_concat {
            mv = Box::new(StringIndyRewriter::new(mv, counter));
        }
        Some(mv)
    }

    fn visit_module(&mut self, module: &ModuleDecl) {
        if !self.target.supports(Feature::Modules) {
            return;
        }
        self.cv.visit_module(module);
    }

    fn visit_nest_host(&mut self, host: &str) {
        if !self.target.supports(Feature::NestMates) {
            return;
        }
        self.cv.visit_nest_host(host);
    }

    fn visit_nest_member(&mut self, member: &str) {
        if !self.target.supports(Feature::NestMates) {
            return;
        }
        self.cv.visit_nest_member(member);
    }

    fn visit_permitted_subclass(&mut self, name: &str) {
        if !self.target.supports(Feature::PermittedSubclasses) {
            return;
        }
        self.cv.visit_permitted_subclass(name);
    }

    fn visit_record_component(&mut self, component: &RecordComponent) {
        if !self.target.supports(Feature::Records) {
            return;
        }
        self.cv.visit_record_component(component);
    }
}

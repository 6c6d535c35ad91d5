//! jretro
//!
//! Downgrades compiled JVM class files so they remain loadable on older
//! runtimes: clamps the classfile version, strips attributes the target
//! release predates (modules, nest mates, permitted subclasses, record
//! metadata), lowers record classes onto plain `java/lang/Object` semantics,
//! and rewrites `invokedynamic` string concatenation onto a generated
//! runtime helper type.
//!
//! ## Architecture
//!
//! - **classfile**: event-driven class file reader/writer plus the
//!   `ClassVisitor`/`MethodVisitor` contract the transform runs on
//! - **patch**: the downgrade transform itself, a pipeline of visitor stages
//! - **bin**: command-line interface over files and directories
//!
//! ```text
//! input bytes → ClassReader → VersionPatcher (+ method rewriters) → ClassWriter → output bytes
//! ```

pub mod classfile;
pub mod common;
pub mod consts;
pub mod patch;

pub use common::error::{Error, Result};
pub use consts::CONCAT_HELPER_NAME;
pub use patch::{helper_class_bytes, TargetVersion, VersionPatcher};

use classfile::{ClassReader, ClassWriter};

/// Result of patching one class
#[derive(Debug, Clone)]
pub struct PatchOutcome {
    /// The rewritten class file
    pub bytes: Vec<u8>,
    /// Concatenation call sites rewritten onto the helper type
    pub concat_rewrites: usize,
    /// Whether the class was a record that got lowered
    pub record_lowered: bool,
}

/// Patch one class file buffer down to the given target release.
///
/// The transform is deterministic and stateless across classes; callers may
/// patch independent classes in parallel. When `concat_rewrites` is non-zero
/// the caller must deposit [`helper_class_bytes`] (named
/// [`CONCAT_HELPER_NAME`]) next to the output.
pub fn patch_class(bytes: &[u8], target: TargetVersion) -> Result<PatchOutcome> {
    let reader = ClassReader::new(bytes)?;
    // Seeding the writer with the input pool keeps indices stable for
    // attributes that pass through raw
    let mut writer = ClassWriter::with_pool(reader.pool().clone());
    let mut patcher = VersionPatcher::new(&mut writer, target);
    reader.accept(&mut patcher)?;
    let concat_rewrites = patcher.concat_rewrites();
    let record_lowered = patcher.record_lowered();
    let bytes = writer.finish()?;
    Ok(PatchOutcome { bytes, concat_rewrites, record_lowered })
}

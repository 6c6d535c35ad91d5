//! The downgrade transform: version clamping, feature stripping, record
//! lowering and string-concatenation de-sugaring.

pub mod compat;
pub mod field_info;
pub mod patcher;
pub mod recipe;
pub mod record_ctor;
pub mod record_members;
pub mod string_indy;
pub mod version;

pub use compat::helper_class_bytes;
pub use field_info::FieldInfo;
pub use patcher::VersionPatcher;
pub use record_ctor::RecordConstructorRewriter;
pub use record_members::{MemberShape, RecordMemberRewriter};
pub use string_indy::StringIndyRewriter;
pub use version::{Feature, TargetVersion};

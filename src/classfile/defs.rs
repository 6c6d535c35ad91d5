//! Generic classfile-specific definitions

/// Header of Java class file (magic number)
pub const MAGIC: u32 = 0xCAFEBABE;

/// Name of a constructor
pub const CONSTRUCTOR_METHOD_NAME: &str = "<init>";

/// Name of a static initializer
pub const STATIC_INITIALIZER_METHOD_NAME: &str = "<clinit>";

/// Superclass conferring record semantics
pub const RECORD_SUPER_NAME: &str = "java/lang/Record";

/// The root of the class hierarchy
pub const OBJECT_NAME: &str = "java/lang/Object";

/// JVM version constants
pub mod major_versions {
    pub const JAVA_1_1: u16 = 45;
    pub const JAVA_1_2: u16 = 46;
    pub const JAVA_1_3: u16 = 47;
    pub const JAVA_1_4: u16 = 48;
    pub const JAVA_5_0: u16 = 49;
    pub const JAVA_6_0: u16 = 50;
    pub const JAVA_7: u16 = 51;
    pub const JAVA_8: u16 = 52;
    pub const JAVA_9: u16 = 53;
    pub const JAVA_10: u16 = 54;
    pub const JAVA_11: u16 = 55;
    pub const JAVA_12: u16 = 56;
    pub const JAVA_13: u16 = 57;
    pub const JAVA_14: u16 = 58;
    pub const JAVA_15: u16 = 59;
    pub const JAVA_16: u16 = 60;
    pub const JAVA_17: u16 = 61;
    pub const JAVA_18: u16 = 62;
    pub const JAVA_19: u16 = 63;
    pub const JAVA_20: u16 = 64;
    pub const JAVA_21: u16 = 65;
}

/// Class, field and method access flags
pub mod access_flags {
    pub const ACC_PUBLIC: u16 = 0x0001;
    pub const ACC_PRIVATE: u16 = 0x0002;
    pub const ACC_PROTECTED: u16 = 0x0004;
    pub const ACC_STATIC: u16 = 0x0008;
    pub const ACC_FINAL: u16 = 0x0010;
    pub const ACC_SUPER: u16 = 0x0020;
    pub const ACC_SYNCHRONIZED: u16 = 0x0020;
    pub const ACC_VOLATILE: u16 = 0x0040;
    pub const ACC_BRIDGE: u16 = 0x0040;
    pub const ACC_TRANSIENT: u16 = 0x0080;
    pub const ACC_VARARGS: u16 = 0x0080;
    pub const ACC_NATIVE: u16 = 0x0100;
    pub const ACC_INTERFACE: u16 = 0x0200;
    pub const ACC_ABSTRACT: u16 = 0x0400;
    pub const ACC_STRICT: u16 = 0x0800;
    pub const ACC_SYNTHETIC: u16 = 0x1000;
    pub const ACC_ANNOTATION: u16 = 0x2000;
    pub const ACC_ENUM: u16 = 0x4000;
    pub const ACC_MODULE: u16 = 0x8000;
}

/// Pseudo access flag marking a type as a record. The file format has no such
/// flag bit (record-ness is the `Record` attribute), so header events carry
/// class access as `u32` with this bit set when the attribute is present.
pub const ACC_RECORD: u32 = 0x10000;

//! Field declaration information collected during one class visit

/// Wrapper of field declaration information.
///
/// Instances are collected in declaration order while a class is visited and
/// feed the record member synthesizer; declaration order drives both the
/// comparison order in `equals`/`hashCode` and the display order in
/// `toString`.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct FieldInfo {
    access: u16,
    name: String,
    descriptor: String,
}

impl FieldInfo {
    pub fn new(access: u16, name: impl Into<String>, descriptor: impl Into<String>) -> Self {
        Self { access, name: name.into(), descriptor: descriptor.into() }
    }

    /// Field modifiers
    pub fn access(&self) -> u16 {
        self.access
    }

    /// Field name
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Field descriptor
    pub fn descriptor(&self) -> &str {
        &self.descriptor
    }
}

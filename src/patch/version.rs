//! Target version handling and the feature gate table

use crate::common::error::{Error, Result};
use crate::classfile::defs::major_versions;

/// Language features whose classfile constructs are stripped or rewritten
/// when the target release predates them.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Feature {
    /// Module declarations (the `Module` attribute)
    Modules,
    /// Nest host references and nest member lists
    NestMates,
    /// `invokedynamic`-based string concatenation
    IndyStringConcat,
    /// Record classes: `java/lang/Record` ancestry, component metadata,
    /// generated member bodies
    Records,
    /// Sealed-class permitted subclass lists
    PermittedSubclasses,
}

impl Feature {
    /// Java release that introduced the construct
    pub fn introduced_in(self) -> u8 {
        match self {
            Feature::Modules => 9,
            Feature::IndyStringConcat => 9,
            Feature::NestMates => 11,
            Feature::Records => 14,
            Feature::PermittedSubclasses => 15,
        }
    }
}

/// Java release number the output must load on (e.g. 8 for a Java 8 runtime).
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
pub struct TargetVersion(u8);

/// Classfile major versions are the Java release plus this offset
const MAJOR_VERSION_OFFSET: u16 = 44;

impl TargetVersion {
    /// The oldest release the runtime helper type loads on
    pub const MIN: u8 = 5;
    pub const MAX: u8 = (major_versions::JAVA_21 - MAJOR_VERSION_OFFSET) as u8;

    pub fn new(release: u8) -> Result<Self> {
        if (Self::MIN..=Self::MAX).contains(&release) {
            Ok(Self(release))
        } else {
            Err(Error::InvalidTargetVersion { version: release.to_string() })
        }
    }

    pub fn release(self) -> u8 {
        self.0
    }

    /// Highest classfile major version loadable on the target runtime
    pub fn clamp_major(self) -> u16 {
        MAJOR_VERSION_OFFSET + self.0 as u16
    }

    /// Clamp a packed classfile version (`minor << 16 | major`). Clamping
    /// resets the minor version, so a preview flag (minor 0xFFFF) is cleared
    /// at or above the boundary; legacy minors below it (45.3) are kept.
    pub fn clamp_packed(self, version: u32) -> u32 {
        let clamp = self.clamp_major() as u32;
        if version as u16 as u32 >= clamp {
            version.min(clamp)
        } else {
            version
        }
    }

    /// Whether the target runtime understands the given feature natively
    pub fn supports(self, feature: Feature) -> bool {
        self.0 >= feature.introduced_in()
    }
}

impl std::fmt::Display for TargetVersion {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "Java {}", self.0)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_clamp_never_increases() {
        let target = TargetVersion::new(8).unwrap();
        assert_eq!(target.clamp_packed(61), 52);
        assert_eq!(target.clamp_packed(50), 50);
        assert_eq!(target.clamp_packed(52), 52);
        // Legacy 45.3 stays untouched
        let legacy = (3_u32 << 16) | 45;
        assert_eq!(target.clamp_packed(legacy), legacy);
    }

    #[test]
    fn test_clamp_clears_preview_minor() {
        let target = TargetVersion::new(17).unwrap();
        let preview = (0xFFFF_u32 << 16) | 61;
        assert_eq!(target.clamp_packed(preview), 61);
        let preview_newer = (0xFFFF_u32 << 16) | 65;
        assert_eq!(target.clamp_packed(preview_newer), 61);
    }

    #[test]
    fn test_feature_gates() {
        let eight = TargetVersion::new(8).unwrap();
        let eleven = TargetVersion::new(11).unwrap();
        assert!(!eight.supports(Feature::Modules));
        assert!(!eight.supports(Feature::NestMates));
        assert!(eleven.supports(Feature::NestMates));
        assert!(!eleven.supports(Feature::Records));
        assert!(!eleven.supports(Feature::PermittedSubclasses));
        assert!(TargetVersion::new(15).unwrap().supports(Feature::PermittedSubclasses));
    }

    #[test]
    fn test_release_bounds() {
        assert!(TargetVersion::new(4).is_err());
        assert!(TargetVersion::new(5).is_ok());
        assert!(TargetVersion::new(21).is_ok());
        assert!(TargetVersion::new(22).is_err());
    }
}

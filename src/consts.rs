// Global safety caps to prevent pathological or malformed inputs from looping

// Reader: maximum nesting depth when resolving dynamic constants through the
// bootstrap-method table (a malformed pool can reference itself)
pub const READER_MAX_CONDY_DEPTH: usize = 16;

// Writer: JVM structural limits enforced at serialization time
pub const MAX_CODE_BYTES: usize = 65_535;
pub const MAX_POOL_ENTRIES: usize = 65_535;

// Internal name of the runtime helper type deposited next to patched output
pub const CONCAT_HELPER_NAME: &str = "jretro/ConcatSupport";

// Linkage name used by indified string concatenation call sites
pub const CONCAT_BOOTSTRAP_NAME: &str = "makeConcatWithConstants";

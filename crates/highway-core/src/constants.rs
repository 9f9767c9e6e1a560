/// Numerical epsilon for near-zero comparisons
pub const EPSILON: f64 = 1e-10;

/// Refractory span stamped on both endpoints of a freshly crystallized edge.
pub const REFRACTORY_SPAN: u32 = 1;

/// Count a crystallized sequential edge is floor-reset to.
pub const DEMOTED_EDGE_FLOOR: u32 = 1;

/// Payload key holding the literal crystallized text.
pub const PAYLOAD_SOURCE: &str = "source";

/// Payload key holding the number of base units a crystallized instance spans.
pub const PAYLOAD_CRYSTALLIZED_COUNT: &str = "crystallized_count";

/// Calibration file format version.
pub const CALIBRATION_VERSION: u32 = 1;

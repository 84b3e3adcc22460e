//! Outline parser constants.

/// Bullet placed before each rendered expectation block.
pub const C_PREFIX_EXPECTATION: &str = "・";
/// Separator between rendered steps/expectations and between continuation lines.
pub const C_SEP_LINE: &str = "\n";
/// Generic heading marker; any line starting with it ends a test-case body.
pub const C_MARKER_HEADING: char = '#';

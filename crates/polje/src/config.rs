//! Parser configuration.

use crate::DEFAULT_RECURSION_LIMIT;

/// Options controlling how messages are parsed.
///
/// The options travel with every parse call and are stored inside each
/// lazy field, so a deferred parse follows the same rules as the eager
/// parse that captured it.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ParseOptions {
    /// Maximum message/group nesting depth
    pub recursion_limit: u32,
    /// Keep fields marked `[lazy = true]` as unparsed bytes until accessed
    pub lazy_fields: bool,
    /// Parse MessageSet items immediately instead of deferring them
    pub eager_message_sets: bool,
    /// Reject invalid UTF-8 in string fields that require valid UTF-8
    pub check_utf8: bool,
}

impl Default for ParseOptions {
    fn default() -> Self {
        Self {
            recursion_limit: DEFAULT_RECURSION_LIMIT,
            lazy_fields: true,
            eager_message_sets: false,
            check_utf8: true,
        }
    }
}

impl ParseOptions {
    /// Creates options with default values
    pub fn new() -> Self {
        Self::default()
    }

    /// Sets the maximum nesting depth
    pub fn recursion_limit(mut self, limit: u32) -> Self {
        self.recursion_limit = limit;
        self
    }

    /// Enables or disables deferred parsing of lazy message fields
    pub fn lazy_fields(mut self, enabled: bool) -> Self {
        self.lazy_fields = enabled;
        self
    }

    /// Enables or disables eager parsing of MessageSet items
    pub fn eager_message_sets(mut self, enabled: bool) -> Self {
        self.eager_message_sets = enabled;
        self
    }

    /// Enables or disables strict UTF-8 checking
    pub fn check_utf8(mut self, enabled: bool) -> Self {
        self.check_utf8 = enabled;
        self
    }
}

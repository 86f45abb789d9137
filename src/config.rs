use serde::{Deserialize, Serialize};

use crate::format::HiddenFields;

/// Construction-time toggles. Serde-derived so hosts can embed them in
/// their own configuration files; all toggles default to on.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct DumpOptions {
    pub show_request: bool,
    pub show_response: bool,
    pub show_body: bool,
    pub show_headers: bool,
    pub show_cookies: bool,
    /// Truncate string values in dumped bodies to this many characters.
    pub max_string_len: Option<usize>,
}

impl Default for DumpOptions {
    fn default() -> Self {
        Self {
            show_request: true,
            show_response: true,
            show_body: true,
            show_headers: true,
            show_cookies: true,
            max_string_len: None,
        }
    }
}

/// Resolved middleware configuration. Built once at construction; there is
/// no runtime reconfiguration.
#[derive(Debug, Clone)]
pub struct DumpConfig {
    pub(crate) show_request: bool,
    pub(crate) show_response: bool,
    pub(crate) show_body: bool,
    pub(crate) show_headers: bool,
    pub(crate) header_hidden: HiddenFields,
    pub(crate) body_hidden: HiddenFields,
    pub(crate) max_string_len: Option<usize>,
}

impl DumpConfig {
    /// Everything captured, cookies included.
    pub fn new() -> Self {
        Self::from_options(DumpOptions::default())
    }

    pub fn from_options(options: DumpOptions) -> Self {
        let mut header_hidden = HiddenFields::default();
        if !options.show_cookies {
            header_hidden.insert("cookie");
        }
        Self {
            show_request: options.show_request,
            show_response: options.show_response,
            show_body: options.show_body,
            show_headers: options.show_headers,
            header_hidden,
            body_hidden: HiddenFields::default(),
            max_string_len: options.max_string_len,
        }
    }

    /// Omit a request/response header from dumped output.
    pub fn hide_header_field(mut self, name: &str) -> Self {
        self.header_hidden.insert(name);
        self
    }

    /// Omit a top-level body field from dumped output.
    pub fn hide_body_field(mut self, name: &str) -> Self {
        self.body_hidden.insert(name);
        self
    }

    /// Truncate string values in dumped bodies to at most `max` characters.
    pub fn max_string_len(mut self, max: usize) -> Self {
        self.max_string_len = Some(max);
        self
    }
}

impl Default for DumpConfig {
    fn default() -> Self {
        Self::new()
    }
}

impl From<DumpOptions> for DumpConfig {
    fn from(options: DumpOptions) -> Self {
        Self::from_options(options)
    }
}

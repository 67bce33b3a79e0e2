//! Field-level form errors, rendered inline next to each input.

use serde::Serialize;
use std::collections::BTreeMap;

pub const REQUIRED: &str = "This field is required.";
pub const SINGLE_LINE: &str = "Enter a single line of text.";

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct FormErrors {
    fields: BTreeMap<String, Vec<String>>,
    /// Errors not tied to a single field
    non_field: Vec<String>,
}

impl FormErrors {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    pub fn add(&mut self, field: &str, message: impl Into<String>) {
        self.fields
            .entry(field.to_string())
            .or_default()
            .push(message.into());
    }

    pub fn add_non_field(&mut self, message: impl Into<String>) {
        self.non_field.push(message.into());
    }

    /// Record "This field is required." when `value` is blank; returns the trimmed value.
    pub fn require<'a>(&mut self, field: &str, value: &'a str) -> &'a str {
        let trimmed = value.trim();
        if trimmed.is_empty() {
            self.add(field, REQUIRED);
        }
        trimmed
    }

    /// Like `require`, but also rejects line breaks and other control
    /// characters. Use it for values that may end up in mail headers.
    pub fn require_line<'a>(&mut self, field: &str, value: &'a str) -> &'a str {
        let trimmed = self.require(field, value);
        if trimmed.chars().any(char::is_control) {
            self.add(field, SINGLE_LINE);
        }
        trimmed
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.fields.is_empty() && self.non_field.is_empty()
    }

    #[must_use]
    pub fn field(&self, field: &str) -> &[String] {
        self.fields.get(field).map_or(&[], Vec::as_slice)
    }

    #[must_use]
    pub fn non_field(&self) -> &[String] {
        &self.non_field
    }

    /// Every message, field errors first, for logs and flat displays.
    #[must_use]
    pub fn messages(&self) -> Vec<String> {
        self.fields
            .values()
            .flatten()
            .chain(self.non_field.iter())
            .cloned()
            .collect()
    }

    /// `Ok(())` when nothing was recorded.
    pub fn into_result(self) -> Result<(), Self> {
        if self.is_empty() { Ok(()) } else { Err(self) }
    }
}

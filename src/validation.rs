use std::collections::BTreeMap;
use std::fmt;

/// Field-local form validation errors, keyed by field name.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct FieldErrors {
    errors: BTreeMap<String, String>,
}

impl FieldErrors {
    /// Creates an empty error map.
    pub fn new() -> Self {
        Self::default()
    }

    /// Records `message` for `field`, keeping the first message per field.
    pub fn add(&mut self, field: impl Into<String>, message: impl Into<String>) {
        self.errors.entry(field.into()).or_insert_with(|| message.into());
    }

    /// Records a "required" error when `value` is blank.
    pub fn require(&mut self, field: &str, label: &str, value: &str) {
        if value.trim().is_empty() {
            self.add(field, format!("{label} is required"));
        }
    }

    /// Returns the message for `field`.
    pub fn get(&self, field: &str) -> Option<&str> {
        self.errors.get(field).map(String::as_str)
    }

    /// Drops the error for `field`, typically when the user edits it.
    pub fn clear_field(&mut self, field: &str) {
        self.errors.remove(field);
    }

    /// Returns `true` when no field has an error.
    pub fn is_empty(&self) -> bool {
        self.errors.is_empty()
    }

    /// Iterates `(field, message)` pairs in field order.
    pub fn iter(&self) -> impl Iterator<Item = (&str, &str)> {
        self.errors
            .iter()
            .map(|(field, message)| (field.as_str(), message.as_str()))
    }

    /// Converts into `Ok(())` when empty.
    pub fn into_result(self) -> Result<(), FieldErrors> {
        if self.is_empty() { Ok(()) } else { Err(self) }
    }
}

impl fmt::Display for FieldErrors {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let mut first = true;
        for (field, message) in self.iter() {
            if !first {
                f.write_str("; ")?;
            }
            write!(f, "{field}: {message}")?;
            first = false;
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn require_flags_blank_values_only() {
        let mut errors = FieldErrors::new();
        errors.require("name", "Name", "  ");
        errors.require("address", "Address", "1 Main St");

        assert_eq!(errors.get("name"), Some("Name is required"));
        assert_eq!(errors.get("address"), None);
    }

    #[test]
    fn clear_field_removes_single_entry() {
        let mut errors = FieldErrors::new();
        errors.add("name", "Name is required");
        errors.add("phone", "Phone is required");
        errors.clear_field("name");

        assert_eq!(errors.to_string(), "phone: Phone is required");
        assert!(errors.into_result().is_err());
    }
}

//! Configuration access port.

use crate::domain::error::GridfixError;

pub trait ConfigPort {
    fn get_string(&self, section: &str, key: &str) -> Option<String>;

    /// True when the key is present with a non-blank value.
    fn has(&self, section: &str, key: &str) -> bool {
        self.get_string(section, key)
            .is_some_and(|v| !v.trim().is_empty())
    }

    /// Strict boolean lookup: absent or blank is `None`, an unrecognised
    /// word is an error.
    fn get_bool(&self, section: &str, key: &str) -> Result<Option<bool>, GridfixError> {
        let Some(raw) = self.get_string(section, key) else {
            return Ok(None);
        };
        match raw.trim().to_lowercase().as_str() {
            "" => Ok(None),
            "true" | "yes" | "on" | "1" => Ok(Some(true)),
            "false" | "no" | "off" | "0" => Ok(Some(false)),
            other => Err(GridfixError::ConfigInvalid {
                section: section.to_string(),
                key: key.to_string(),
                reason: format!("expected true or false, found '{}'", other),
            }),
        }
    }
}

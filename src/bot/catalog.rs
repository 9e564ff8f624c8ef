//! Localized message catalog.
//!
//! Catalogs are flat JSON objects of `key -> template`, embedded at build
//! time. Templates use `%s` placeholders filled positionally.

use std::collections::HashMap;

use crate::error::{Error, Result};

const EN: &str = include_str!("../../locales/en.json");

#[derive(Debug, Clone)]
pub struct Catalog {
    locale: String,
    entries: Option<HashMap<String, String>>,
}

impl Catalog {
    /// Load the catalog for `locale`, falling back to English.
    pub fn for_locale(locale: &str) -> Result<Self> {
        let source = match locale {
            "en" => EN,
            other => {
                tracing::warn!("No message catalog for locale '{}', using 'en'", other);
                EN
            }
        };
        Self::from_json("en", source)
    }

    pub fn from_json(locale: &str, source: &str) -> Result<Self> {
        let entries: HashMap<String, String> = serde_json::from_str(source)?;
        if entries.is_empty() {
            return Err(Error::Config(format!("message catalog '{}' is empty", locale)));
        }
        Ok(Self {
            locale: locale.to_string(),
            entries: Some(entries),
        })
    }

    /// A catalog that renders `key:arg:arg` instead of text.
    pub fn keys_only() -> Self {
        Self {
            locale: "keys".to_string(),
            entries: None,
        }
    }

    pub fn locale(&self) -> &str {
        &self.locale
    }

    /// Render `key` with positional arguments. Unknown keys render as the key.
    pub fn t(&self, key: &str, args: &[&str]) -> String {
        let Some(entries) = &self.entries else {
            let mut out = key.to_string();
            for arg in args {
                out.push(':');
                out.push_str(arg);
            }
            return out;
        };

        let Some(template) = entries.get(key) else {
            tracing::warn!("Missing message key '{}' in '{}' catalog", key, self.locale);
            return key.to_string();
        };

        let mut out = String::with_capacity(template.len());
        let mut args = args.iter();
        let mut rest = template.as_str();
        while let Some(idx) = rest.find("%s") {
            out.push_str(&rest[..idx]);
            out.push_str(args.next().copied().unwrap_or(""));
            rest = &rest[idx + 2..];
        }
        out.push_str(rest);
        out
    }
}

use std::{collections::HashMap, fmt, str::FromStr};

use serde::{Deserialize, Serialize};

use crate::error::{FieldError, MessageArg, UnsupportedLocale};

const ENGLISH_BUNDLE: &str = include_str!("../messages/messages_en.toml");
const SPANISH_BUNDLE: &str = include_str!("../messages/messages_es.toml");

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Locale {
    #[default]
    English,
    Spanish,
}

impl Locale {
    pub fn code(self) -> &'static str {
        match self {
            Locale::English => "en",
            Locale::Spanish => "es",
        }
    }
}

impl fmt::Display for Locale {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.code())
    }
}

/// Accepts bare language codes as well as region-qualified tags
/// (`es`, `es-MX`, `es_MX`).
impl FromStr for Locale {
    type Err = UnsupportedLocale;

    fn from_str(raw: &str) -> Result<Self, Self::Err> {
        let language = raw
            .trim()
            .split(['-', '_'])
            .next()
            .unwrap_or_default()
            .to_ascii_lowercase();
        match language.as_str() {
            "en" => Ok(Locale::English),
            "es" => Ok(Locale::Spanish),
            _ => Err(UnsupportedLocale(raw.to_string())),
        }
    }
}

/// Locale-aware lookup of message patterns by key.
///
/// Patterns use `{0}`-style positional placeholders. A key missing from the
/// requested locale falls back to English, and a key missing everywhere
/// renders as the key itself.
#[derive(Debug, Clone, Default)]
pub struct MessageCatalog {
    bundles: HashMap<Locale, HashMap<String, String>>,
}

impl MessageCatalog {
    pub fn embedded() -> Result<Self, toml::de::Error> {
        Self::from_bundles([
            (Locale::English, ENGLISH_BUNDLE),
            (Locale::Spanish, SPANISH_BUNDLE),
        ])
    }

    pub fn from_bundles<'a>(
        bundles: impl IntoIterator<Item = (Locale, &'a str)>,
    ) -> Result<Self, toml::de::Error> {
        let mut parsed = HashMap::new();
        for (locale, raw) in bundles {
            parsed.insert(locale, toml::from_str::<HashMap<String, String>>(raw)?);
        }
        Ok(Self { bundles: parsed })
    }

    pub fn message(&self, key: &str, args: &[MessageArg], locale: Locale) -> String {
        let Some(pattern) = self.lookup(key, locale) else {
            return key.to_string();
        };
        let args: Vec<String> = args
            .iter()
            .map(|arg| match arg {
                MessageArg::Text(value) => value.clone(),
                MessageArg::Localized(key) => self.message(key, &[], locale),
            })
            .collect();
        format_message(pattern, &args)
    }

    pub fn localize(&self, errors: &[FieldError], locale: Locale) -> Vec<String> {
        errors
            .iter()
            .map(|error| self.message(&error.key, &error.args, locale))
            .collect()
    }

    fn lookup(&self, key: &str, locale: Locale) -> Option<&str> {
        self.bundles
            .get(&locale)
            .and_then(|bundle| bundle.get(key))
            .or_else(|| {
                self.bundles
                    .get(&Locale::English)
                    .and_then(|bundle| bundle.get(key))
            })
            .map(String::as_str)
    }
}

fn format_message(pattern: &str, args: &[String]) -> String {
    let mut out = String::with_capacity(pattern.len());
    let mut rest = pattern;
    while let Some(open) = rest.find('{') {
        out.push_str(&rest[..open]);
        let after = &rest[open + 1..];
        let Some(close) = after.find('}') else {
            out.push_str(&rest[open..]);
            rest = "";
            break;
        };
        let index = &after[..close];
        match index.parse::<usize>().ok().and_then(|i| args.get(i)) {
            Some(value) => out.push_str(value),
            None => {
                out.push('{');
                out.push_str(index);
                out.push('}');
            }
        }
        rest = &after[close + 1..];
    }
    out.push_str(rest);
    out
}

#[cfg(test)]
#[path = "tests/messages_tests.rs"]
mod tests;

//! Message catalogs used to localize problem titles and details.

use std::collections::HashMap;

use serde_json::Value;

const BUILTIN_EN: &str = include_str!("messages.properties");
const BUILTIN_ZH: &str = include_str!("messages_zh.properties");

/// Resolves message codes to text.
pub trait MessageSource: Send + Sync {
    /// Message for `code` in `locale` (or the default locale), with `{N}`
    /// placeholders replaced by `args[N]`.
    fn message(&self, code: &str, args: &[Value], locale: Option<&str>) -> Option<String>;
}

/// In-memory message tables keyed by locale.
///
/// Lookups fall back from the most specific locale to its language and then
/// to the default table: `zh-CN` tries `zh-cn`, then `zh`, then the default.
#[derive(Debug, Clone, Default)]
pub struct StaticMessageSource {
    default: HashMap<String, String>,
    locales: HashMap<String, HashMap<String, String>>,
}

impl StaticMessageSource {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Messages for every catalog problem, in English (default) and Chinese.
    #[must_use]
    pub fn builtin() -> Self {
        Self::new()
            .with_properties(None, BUILTIN_EN)
            .with_properties(Some("zh"), BUILTIN_ZH)
    }

    pub fn insert(&mut self, locale: Option<&str>, code: impl Into<String>, text: impl Into<String>) {
        let table = match locale {
            Some(tag) => self.locales.entry(normalize(tag)).or_default(),
            None => &mut self.default,
        };
        table.insert(code.into(), text.into());
    }

    #[must_use]
    pub fn with_message(
        mut self,
        locale: Option<&str>,
        code: impl Into<String>,
        text: impl Into<String>,
    ) -> Self {
        self.insert(locale, code, text);
        self
    }

    /// Add every `key=value` entry of a `.properties` document.
    #[must_use]
    pub fn with_properties(mut self, locale: Option<&str>, source: &str) -> Self {
        for (code, text) in parse_properties(source) {
            self.insert(locale, code, text);
        }
        self
    }

    fn lookup(&self, code: &str, locale: Option<&str>) -> Option<&str> {
        let localized = locale.and_then(|tag| {
            let tag = normalize(tag);
            let language = tag.split('-').next().unwrap_or_default().to_owned();
            [tag, language]
                .iter()
                .filter_map(|candidate| self.locales.get(candidate))
                .find_map(|table| table.get(code))
        });
        localized.or_else(|| self.default.get(code)).map(String::as_str)
    }
}

impl MessageSource for StaticMessageSource {
    fn message(&self, code: &str, args: &[Value], locale: Option<&str>) -> Option<String> {
        self.lookup(code, locale)
            .map(|template| format_message(template, args))
    }
}

fn normalize(tag: &str) -> String {
    tag.replace('_', "-").to_ascii_lowercase()
}

fn parse_properties(source: &str) -> Vec<(String, String)> {
    let mut entries = Vec::new();
    let mut pending = String::new();
    for line in source.lines() {
        let line = line.trim_start();
        if pending.is_empty() && (line.is_empty() || line.starts_with('#') || line.starts_with('!')) {
            continue;
        }
        if let Some(continued) = line.strip_suffix('\\') {
            pending.push_str(continued);
            continue;
        }
        pending.push_str(line);
        let logical = std::mem::take(&mut pending);
        if let Some((key, value)) = logical.split_once(['=', ':']) {
            entries.push((key.trim().to_owned(), value.trim().to_owned()));
        }
    }
    entries
}

/// Replace `{N}` placeholders with `args[N]`; unknown placeholders are kept.
#[must_use]
pub fn format_message(template: &str, args: &[Value]) -> String {
    let mut out = String::with_capacity(template.len());
    let mut rest = template;
    while let Some(open) = rest.find('{') {
        out.push_str(&rest[..open]);
        let after = &rest[open + 1..];
        let Some(close) = after.find('}') else {
            out.push_str(&rest[open..]);
            return out;
        };
        let key = &after[..close];
        match key.parse::<usize>().ok().and_then(|i| args.get(i)) {
            Some(Value::String(s)) => out.push_str(s),
            Some(other) => out.push_str(&other.to_string()),
            None => {
                out.push('{');
                out.push_str(key);
                out.push('}');
            }
        }
        rest = &after[close + 1..];
    }
    out.push_str(rest);
    out
}

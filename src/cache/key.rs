//! Cache key derivation

use crate::filters::{dims, FilterSet, FilterValue};

/// Default key namespace
pub const DEFAULT_NAMESPACE: &str = "kpi";

/// How a key field is rendered
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum FieldKind {
    /// ASCII lower-cased, spaces written as `_`
    Text,
    /// Case kept
    Date,
}

/// Fields that participate in the key, in key order
const KEY_FIELDS: &[(&str, FieldKind)] = &[
    (dims::PLATFORM, FieldKind::Text),
    (dims::BRAND, FieldKind::Text),
    (dims::LOCATION, FieldKind::Text),
    (dims::CATEGORY, FieldKind::Text),
    (dims::THRESHOLD_DOH, FieldKind::Text),
    (dims::START_DATE, FieldKind::Date),
    (dims::END_DATE, FieldKind::Date),
    (dims::COMPARE_START_DATE, FieldKind::Date),
    (dims::COMPARE_END_DATE, FieldKind::Date),
];

/// Builds deterministic cache keys from a section name and filters.
///
/// Keys look like
/// `kpi:overview:platform=amazon:brand=nike,puma:startDate=2026-01-01`.
/// Every present field is tagged with its dimension name and fields whose
/// value is `All` are skipped, so two filter sets share a key only when
/// they select the same data.
///
/// Values are escaped before joining: `%`, `:`, `,` and `_` are
/// percent-encoded, a space becomes `_` and any other whitespace is
/// percent-encoded. Text values are ASCII lower-cased, matching the
/// warehouse's case-insensitive comparison. Multi-valued text fields are
/// de-duplicated and sorted after that, so `["B","A"]` and `["a","b"]`
/// share a key.
#[derive(Debug, Clone)]
pub struct CacheKeyBuilder {
    namespace: String,
}

impl CacheKeyBuilder {
    /// Create a builder for a namespace
    pub fn new(namespace: impl Into<String>) -> Self {
        Self {
            namespace: namespace.into(),
        }
    }

    /// The namespace prefix
    pub fn namespace(&self) -> &str {
        &self.namespace
    }

    /// Derive the key for `section` under `filters`
    pub fn build_key(&self, section: &str, filters: &FilterSet) -> String {
        let mut key = self.section_prefix(section);

        for &(dim, kind) in KEY_FIELDS {
            let value = filters.get(dim);
            if value.is_all() {
                continue;
            }
            key.push(':');
            key.push_str(dim);
            key.push('=');
            key.push_str(&render(value, kind));
        }

        key
    }

    /// `"<namespace>:<section>"`, the prefix shared by every key of a section
    pub fn section_prefix(&self, section: &str) -> String {
        format!("{}:{}", self.namespace, section.trim().to_lowercase())
    }

    /// Glob pattern matching every key of a section
    pub fn section_pattern(&self, section: &str) -> String {
        format!("{}*", self.section_prefix(section))
    }
}

impl Default for CacheKeyBuilder {
    fn default() -> Self {
        Self::new(DEFAULT_NAMESPACE)
    }
}

fn render(value: &FilterValue, kind: FieldKind) -> String {
    match value {
        FilterValue::All => String::new(),
        FilterValue::Single(v) => escape(v, kind),
        FilterValue::Multi(vs) => {
            let mut parts: Vec<String> = vs.iter().map(|v| escape(v, kind)).collect();
            if kind == FieldKind::Text {
                parts.sort();
                parts.dedup();
            }
            parts.join(",")
        }
    }
}

/// Escape one value so it cannot be confused with a separator or with a
/// different value
fn escape(value: &str, kind: FieldKind) -> String {
    let mut out = String::with_capacity(value.len());
    for c in value.chars() {
        match c {
            ' ' => out.push('_'),
            '%' | ':' | ',' | '_' => percent_encode(&mut out, c),
            c if c.is_whitespace() || c.is_control() => percent_encode(&mut out, c),
            c if kind == FieldKind::Text => out.push(c.to_ascii_lowercase()),
            c => out.push(c),
        }
    }
    out
}

fn percent_encode(out: &mut String, c: char) {
    let mut buf = [0u8; 4];
    for byte in c.encode_utf8(&mut buf).bytes() {
        out.push_str(&format!("%{:02X}", byte));
    }
}

//! Filter normalization
//!
//! Request filters arrive in several shapes: a single string, a
//! comma-joined string, an array of strings, or nothing at all. They are
//! parsed exactly once at ingress into [`FilterValue`]; everything
//! downstream (cache keys, window resolution, warehouse matching) works on
//! the tagged value only.

use chrono::NaiveDate;
use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, HashMap};

use crate::types::DATE_FORMAT;

/// Well-known filter dimension names
pub mod dims {
    pub const PLATFORM: &str = "platform";
    pub const BRAND: &str = "brand";
    pub const LOCATION: &str = "location";
    pub const CATEGORY: &str = "category";
    pub const START_DATE: &str = "startDate";
    pub const END_DATE: &str = "endDate";
    pub const COMPARE_START_DATE: &str = "compareStartDate";
    pub const COMPARE_END_DATE: &str = "compareEndDate";
    /// Per-request override of the days-of-cover target
    pub const THRESHOLD_DOH: &str = "thresholdDoh";
}

/// Categories a request may filter on. Anything else is dropped.
pub const CATEGORY_ALLOW_LIST: &[&str] = &[
    "Apparel",
    "Footwear",
    "Accessories",
    "Beauty",
    "Home",
    "Electronics",
];

/// A filter value as it arrives on the wire
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum RawFilter {
    /// JSON array of values
    Many(Vec<String>),
    /// Single or comma-joined string
    One(String),
}

impl From<&str> for RawFilter {
    fn from(value: &str) -> Self {
        RawFilter::One(value.to_string())
    }
}

impl From<Vec<&str>> for RawFilter {
    fn from(values: Vec<&str>) -> Self {
        RawFilter::Many(values.into_iter().map(str::to_string).collect())
    }
}

/// Canonical filter value for one dimension
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub enum FilterValue {
    /// No restriction
    #[default]
    All,
    /// Exactly one value
    Single(String),
    /// Several values in request order
    Multi(Vec<String>),
}

impl FilterValue {
    /// Check if this value places no restriction
    pub fn is_all(&self) -> bool {
        matches!(self, FilterValue::All)
    }

    /// Values as a slice view; empty for `All`
    pub fn values(&self) -> Vec<&str> {
        match self {
            FilterValue::All => Vec::new(),
            FilterValue::Single(v) => vec![v.as_str()],
            FilterValue::Multi(vs) => vs.iter().map(String::as_str).collect(),
        }
    }

    /// The single value, if this is `Single`
    pub fn as_single(&self) -> Option<&str> {
        match self {
            FilterValue::Single(v) => Some(v.as_str()),
            _ => None,
        }
    }

    /// Check if `candidate` passes this filter (case-insensitive)
    pub fn matches(&self, candidate: &str) -> bool {
        match self {
            FilterValue::All => true,
            FilterValue::Single(v) => v.eq_ignore_ascii_case(candidate),
            FilterValue::Multi(vs) => vs.iter().any(|v| v.eq_ignore_ascii_case(candidate)),
        }
    }

    fn from_list(mut values: Vec<String>) -> Self {
        match values.len() {
            0 => FilterValue::All,
            1 => FilterValue::Single(values.remove(0)),
            _ => FilterValue::Multi(values),
        }
    }
}

/// Check if a raw token means "no restriction"
fn is_all_like(token: &str) -> bool {
    let token = token.trim();
    token.is_empty() || token.eq_ignore_ascii_case("all") || token == "undefined"
}

/// Normalize a raw filter into its canonical value.
///
/// Absent, `"All"`, `"all"`, `""` and `"undefined"` become `All`. A string
/// is split on `,`; array items are taken whole, so `["Foo, Inc."]` stays
/// one value. Entries are trimmed and stripped of All-like ones; an empty
/// remainder is `All`, one entry is `Single`, more is `Multi`.
pub fn normalize(raw: Option<&RawFilter>) -> FilterValue {
    let tokens: Vec<String> = match raw {
        None => return FilterValue::All,
        Some(RawFilter::One(s)) => s
            .split(',')
            .filter(|t| !is_all_like(t))
            .map(|t| t.trim().to_string())
            .collect(),
        Some(RawFilter::Many(items)) => items
            .iter()
            .filter(|t| !is_all_like(t))
            .map(|t| t.trim().to_string())
            .collect(),
    };
    FilterValue::from_list(tokens)
}

/// Normalize a category filter against [`CATEGORY_ALLOW_LIST`].
///
/// Requested categories outside the allow-list are dropped. When nothing
/// requested survives (including the `All` case), the full allow-list is
/// returned, never `All`.
pub fn normalize_category(raw: Option<&RawFilter>) -> FilterValue {
    let requested = normalize(raw);
    let mut allowed: Vec<String> = Vec::new();
    for value in requested.values() {
        if let Some(canonical) = CATEGORY_ALLOW_LIST
            .iter()
            .find(|c| c.eq_ignore_ascii_case(value))
        {
            if !allowed.iter().any(|a| a == canonical) {
                allowed.push(canonical.to_string());
            }
        }
    }

    if allowed.is_empty() {
        return FilterValue::Multi(CATEGORY_ALLOW_LIST.iter().map(|c| c.to_string()).collect());
    }
    FilterValue::from_list(allowed)
}

/// Canonical filters for one request, keyed by dimension name
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct FilterSet {
    values: BTreeMap<String, FilterValue>,
}

static ALL: FilterValue = FilterValue::All;

impl FilterSet {
    /// Create an empty (unrestricted) filter set
    pub fn new() -> Self {
        Self::default()
    }

    /// Parse raw request filters, applying the category policy
    pub fn from_raw(raw: &HashMap<String, RawFilter>) -> Self {
        let mut set = Self::new();
        for (dim, value) in raw {
            if dim != dims::CATEGORY {
                set.values.insert(dim.clone(), normalize(Some(value)));
            }
        }
        // Category never resolves to "no filter"
        set.values.insert(
            dims::CATEGORY.to_string(),
            normalize_category(raw.get(dims::CATEGORY)),
        );
        set
    }

    /// Parse flat query-string parameters (`brand=a,b&platform=All`)
    pub fn from_query_params(params: &HashMap<String, String>) -> Self {
        let raw: HashMap<String, RawFilter> = params
            .iter()
            .map(|(k, v)| (k.clone(), RawFilter::One(v.clone())))
            .collect();
        Self::from_raw(&raw)
    }

    /// Set a dimension, consuming and returning the set
    pub fn with(mut self, dim: &str, value: FilterValue) -> Self {
        self.insert(dim, value);
        self
    }

    /// Set a dimension
    pub fn insert(&mut self, dim: &str, value: FilterValue) {
        self.values.insert(dim.to_string(), value);
    }

    /// Value for a dimension; `All` when absent
    pub fn get(&self, dim: &str) -> &FilterValue {
        self.values.get(dim).unwrap_or(&ALL)
    }

    /// Parse a single-valued date dimension.
    ///
    /// Values that are absent, multi-valued or not `YYYY-MM-DD` yield `None`
    /// and fall back to the default window.
    pub fn date(&self, dim: &str) -> Option<NaiveDate> {
        let raw = self.get(dim).as_single()?;
        match NaiveDate::parse_from_str(raw, DATE_FORMAT) {
            Ok(date) => Some(date),
            Err(e) => {
                tracing::debug!(dimension = dim, value = raw, error = %e, "Ignoring unparseable date filter");
                None
            }
        }
    }

    /// Parse a single-valued numeric dimension
    pub fn number(&self, dim: &str) -> Option<f64> {
        self.get(dim)
            .as_single()
            .and_then(|raw| raw.parse::<f64>().ok())
            .filter(|n| n.is_finite())
    }

    /// Iterate over dimensions in name order
    pub fn iter(&self) -> impl Iterator<Item = (&str, &FilterValue)> {
        self.values.iter().map(|(k, v)| (k.as_str(), v))
    }
}

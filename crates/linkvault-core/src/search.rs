//! Saved-search parameter resolution.
//!
//! A search request arrives as loose string key/value pairs. The effective
//! search is resolved per field through an ordered provider chain:
//!
//! 1. the explicit request value (non-empty),
//! 2. the value stored on an attached [`SearchBundle`](crate::bundle::SearchBundle),
//! 3. the user's stored preference,
//! 4. the hard default.
//!
//! A bundle acts as a *floor*, not an extra tier: for every field the bundle
//! carries, stored preferences are bypassed entirely.
//!
//! The stored and effective representations of the date range are distinct:
//! when the date filter mode is `relative` the range is derived from the
//! relative token on every read, and the stored fields are shadowed but
//! never mutated.

use chrono::{DateTime, NaiveDate, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;
use tracing::debug;
use uuid::Uuid;

use crate::bundle::SearchBundle;
use crate::dates::{parse_timestamp, resolve_relative_range};

/// Date format used for absolute range fields in query strings and stored
/// bundle parameters.
const DATE_FORMAT: &str = "%Y-%m-%d";

// =============================================================================
// CLOSED PARAMETER VOCABULARIES
// =============================================================================

/// Sort order for search results.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "snake_case")]
pub enum SortOrder {
    AddedAsc,
    #[default]
    AddedDesc,
    TitleAsc,
    TitleDesc,
    Random,
    DeletedAsc,
    DeletedDesc,
}

impl SortOrder {
    /// Query-string representation.
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::AddedAsc => "added_asc",
            Self::AddedDesc => "added_desc",
            Self::TitleAsc => "title_asc",
            Self::TitleDesc => "title_desc",
            Self::Random => "random",
            Self::DeletedAsc => "deleted_asc",
            Self::DeletedDesc => "deleted_desc",
        }
    }

    /// Parse a query-string value. Unrecognized values yield `None` and are
    /// ignored at construction, never stored.
    pub fn parse(value: &str) -> Option<Self> {
        match value {
            "added_asc" => Some(Self::AddedAsc),
            "added_desc" => Some(Self::AddedDesc),
            "title_asc" => Some(Self::TitleAsc),
            "title_desc" => Some(Self::TitleDesc),
            "random" => Some(Self::Random),
            "deleted_asc" => Some(Self::DeletedAsc),
            "deleted_desc" => Some(Self::DeletedDesc),
            _ => None,
        }
    }
}

impl fmt::Display for SortOrder {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Tri-state filter used for the shared/unread/tagged dimensions.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "snake_case")]
pub enum TriState {
    #[default]
    Off,
    Yes,
    No,
}

impl TriState {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Off => "off",
            Self::Yes => "yes",
            Self::No => "no",
        }
    }

    pub fn parse(value: &str) -> Option<Self> {
        match value {
            "off" => Some(Self::Off),
            "yes" => Some(Self::Yes),
            "no" => Some(Self::No),
            _ => None,
        }
    }
}

impl fmt::Display for TriState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Which timestamp the date filter applies to.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "snake_case")]
pub enum DateFilterField {
    #[default]
    Off,
    Added,
    Modified,
    Deleted,
}

impl DateFilterField {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Off => "off",
            Self::Added => "added",
            Self::Modified => "modified",
            Self::Deleted => "deleted",
        }
    }

    pub fn parse(value: &str) -> Option<Self> {
        match value {
            "off" => Some(Self::Off),
            "added" => Some(Self::Added),
            "modified" => Some(Self::Modified),
            "deleted" => Some(Self::Deleted),
            _ => None,
        }
    }
}

impl fmt::Display for DateFilterField {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Whether the date range is stored as concrete dates or derived from a
/// relative token on every read.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "snake_case")]
pub enum DateFilterMode {
    #[default]
    Absolute,
    Relative,
}

impl DateFilterMode {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Absolute => "absolute",
            Self::Relative => "relative",
        }
    }

    pub fn parse(value: &str) -> Option<Self> {
        match value {
            "absolute" => Some(Self::Absolute),
            "relative" => Some(Self::Relative),
            _ => None,
        }
    }
}

impl fmt::Display for DateFilterMode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

// =============================================================================
// FIELD ENUMERATION
// =============================================================================

/// The closed set of search parameter keys.
///
/// Per-field resolution, modification reporting, and query serialization all
/// iterate this enum instead of doing dynamic attribute lookup.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SearchField {
    Query,
    User,
    Bundle,
    Sort,
    Shared,
    Unread,
    Tagged,
    ModifiedSince,
    AddedSince,
    DeletedSince,
    DateFilterBy,
    DateFilterType,
    DateFilterRelative,
    DateFilterStart,
    DateFilterEnd,
}

impl SearchField {
    /// Every parameter, in serialization order.
    pub const ALL: [SearchField; 15] = [
        Self::Query,
        Self::User,
        Self::Bundle,
        Self::Sort,
        Self::Shared,
        Self::Unread,
        Self::Tagged,
        Self::ModifiedSince,
        Self::AddedSince,
        Self::DeletedSince,
        Self::DateFilterBy,
        Self::DateFilterType,
        Self::DateFilterRelative,
        Self::DateFilterStart,
        Self::DateFilterEnd,
    ];

    /// The subset persisted as per-user preferences.
    pub const PREFERENCES: [SearchField; 7] = [
        Self::Sort,
        Self::Shared,
        Self::Unread,
        Self::Tagged,
        Self::DateFilterBy,
        Self::DateFilterType,
        Self::DateFilterRelative,
    ];

    /// Query-string key for the field.
    pub fn key(&self) -> &'static str {
        match self {
            Self::Query => "q",
            Self::User => "user",
            Self::Bundle => "bundle",
            Self::Sort => "sort",
            Self::Shared => "shared",
            Self::Unread => "unread",
            Self::Tagged => "tagged",
            Self::ModifiedSince => "modified_since",
            Self::AddedSince => "added_since",
            Self::DeletedSince => "deleted_since",
            Self::DateFilterBy => "date_filter_by",
            Self::DateFilterType => "date_filter_type",
            Self::DateFilterRelative => "date_filter_relative",
            Self::DateFilterStart => "date_filter_start",
            Self::DateFilterEnd => "date_filter_end",
        }
    }
}

// =============================================================================
// PARTIAL INPUT PARAMETERS
// =============================================================================

/// A partial, typed set of search parameters.
///
/// This is the input shape used by all three non-default providers: explicit
/// request values, a bundle's stored parameters, and stored preferences.
/// Every field is optional; an absent field means "this provider has no
/// opinion". Construction from strings ignores unrecognized enum values and
/// unparsable dates — they are never stored.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct SearchParams {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub q: Option<String>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub user: Option<String>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub bundle: Option<Uuid>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub sort: Option<SortOrder>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub shared: Option<TriState>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub unread: Option<TriState>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub tagged: Option<TriState>,

    /// Raw epoch string; see [`parse_timestamp`] for the accepted precisions.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub modified_since: Option<String>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub added_since: Option<String>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub deleted_since: Option<String>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub date_filter_by: Option<DateFilterField>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub date_filter_type: Option<DateFilterMode>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub date_filter_relative: Option<String>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub date_filter_start: Option<NaiveDate>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub date_filter_end: Option<NaiveDate>,
}

impl SearchParams {
    /// Build from raw request pairs (repeated keys: last one wins).
    ///
    /// Empty values, unknown keys, unrecognized enum values, bad UUIDs and
    /// unparsable dates are all ignored.
    pub fn from_pairs<'a, I>(pairs: I) -> Self
    where
        I: IntoIterator<Item = (&'a str, &'a str)>,
    {
        let mut params = Self::default();
        for (key, value) in pairs {
            params.set_from_str(key, value);
        }
        params
    }

    /// Build from a stored JSON map (a bundle's `search_params` document or a
    /// stored-preferences document), applying the same tolerant rules as
    /// request input.
    pub fn from_json_value(value: &serde_json::Value) -> Self {
        let mut params = Self::default();
        if let Some(map) = value.as_object() {
            for (key, entry) in map {
                match entry {
                    serde_json::Value::String(s) => params.set_from_str(key, s),
                    serde_json::Value::Number(n) => params.set_from_str(key, &n.to_string()),
                    _ => {}
                }
            }
        }
        params
    }

    /// Set a single field from its string representation. Invalid values are
    /// dropped, not stored.
    pub fn set_from_str(&mut self, key: &str, value: &str) {
        let value = value.trim();
        if value.is_empty() {
            return;
        }
        match key {
            "q" => self.q = Some(value.to_string()),
            "user" => self.user = Some(value.to_string()),
            "bundle" => match Uuid::parse_str(value) {
                Ok(id) => self.bundle = Some(id),
                Err(_) => debug!(key, value, "ignoring invalid bundle id"),
            },
            "sort" => match SortOrder::parse(value) {
                Some(sort) => self.sort = Some(sort),
                None => debug!(key, value, "ignoring unrecognized value"),
            },
            "shared" => match TriState::parse(value) {
                Some(v) => self.shared = Some(v),
                None => debug!(key, value, "ignoring unrecognized value"),
            },
            "unread" => match TriState::parse(value) {
                Some(v) => self.unread = Some(v),
                None => debug!(key, value, "ignoring unrecognized value"),
            },
            "tagged" => match TriState::parse(value) {
                Some(v) => self.tagged = Some(v),
                None => debug!(key, value, "ignoring unrecognized value"),
            },
            "modified_since" => self.modified_since = Some(value.to_string()),
            "added_since" => self.added_since = Some(value.to_string()),
            "deleted_since" => self.deleted_since = Some(value.to_string()),
            "date_filter_by" => match DateFilterField::parse(value) {
                Some(v) => self.date_filter_by = Some(v),
                None => debug!(key, value, "ignoring unrecognized value"),
            },
            "date_filter_type" => match DateFilterMode::parse(value) {
                Some(v) => self.date_filter_type = Some(v),
                None => debug!(key, value, "ignoring unrecognized value"),
            },
            "date_filter_relative" => self.date_filter_relative = Some(value.to_string()),
            "date_filter_start" => match NaiveDate::parse_from_str(value, DATE_FORMAT) {
                Ok(d) => self.date_filter_start = Some(d),
                Err(_) => debug!(key, value, "ignoring unparsable date"),
            },
            "date_filter_end" => match NaiveDate::parse_from_str(value, DATE_FORMAT) {
                Ok(d) => self.date_filter_end = Some(d),
                Err(_) => debug!(key, value, "ignoring unparsable date"),
            },
            _ => {}
        }
    }

    /// Set a field addressed by its [`SearchField`], with the same tolerant
    /// parsing as [`set_from_str`](Self::set_from_str).
    pub fn set(&mut self, field: SearchField, value: &str) {
        self.set_from_str(field.key(), value);
    }

    /// Canonical string value of a field, `None` when unset.
    pub fn get(&self, field: SearchField) -> Option<String> {
        match field {
            SearchField::Query => self.q.clone(),
            SearchField::User => self.user.clone(),
            SearchField::Bundle => self.bundle.map(|id| id.to_string()),
            SearchField::Sort => self.sort.map(|v| v.as_str().to_string()),
            SearchField::Shared => self.shared.map(|v| v.as_str().to_string()),
            SearchField::Unread => self.unread.map(|v| v.as_str().to_string()),
            SearchField::Tagged => self.tagged.map(|v| v.as_str().to_string()),
            SearchField::ModifiedSince => self.modified_since.clone(),
            SearchField::AddedSince => self.added_since.clone(),
            SearchField::DeletedSince => self.deleted_since.clone(),
            SearchField::DateFilterBy => self.date_filter_by.map(|v| v.as_str().to_string()),
            SearchField::DateFilterType => self.date_filter_type.map(|v| v.as_str().to_string()),
            SearchField::DateFilterRelative => self.date_filter_relative.clone(),
            SearchField::DateFilterStart => self
                .date_filter_start
                .map(|d| d.format(DATE_FORMAT).to_string()),
            SearchField::DateFilterEnd => self
                .date_filter_end
                .map(|d| d.format(DATE_FORMAT).to_string()),
        }
    }

    /// True when no field carries a value.
    pub fn is_empty(&self) -> bool {
        *self == Self::default()
    }
}

// =============================================================================
// RESOLVED SPECIFICATION
// =============================================================================

/// The fully resolved set of filter/sort parameters governing one search
/// evaluation.
///
/// Produced by [`SearchSpecification::resolve`]; every enum field holds a
/// value from its closed vocabulary, optional fields are `None` when no
/// provider supplied them. The stored date range is private — use
/// [`date_filter_start`](Self::date_filter_start) /
/// [`date_filter_end`](Self::date_filter_end) for the effective values,
/// which derive from the relative token when the mode is relative.
#[derive(Debug, Clone, PartialEq)]
pub struct SearchSpecification {
    pub q: String,
    pub user: String,
    pub bundle: Option<SearchBundle>,
    pub sort: SortOrder,
    pub shared: TriState,
    pub unread: TriState,
    pub tagged: TriState,
    pub modified_since: Option<String>,
    pub added_since: Option<String>,
    pub deleted_since: Option<String>,
    pub date_filter_by: DateFilterField,
    pub date_filter_type: DateFilterMode,
    pub date_filter_relative: Option<String>,
    date_filter_start: Option<NaiveDate>,
    date_filter_end: Option<NaiveDate>,
}

impl Default for SearchSpecification {
    /// The hard defaults: the specification a request with no parameters, no
    /// bundle and no stored preferences resolves to.
    fn default() -> Self {
        Self {
            q: String::new(),
            user: String::new(),
            bundle: None,
            sort: SortOrder::default(),
            shared: TriState::default(),
            unread: TriState::default(),
            tagged: TriState::default(),
            modified_since: None,
            added_since: None,
            deleted_since: None,
            date_filter_by: DateFilterField::default(),
            date_filter_type: DateFilterMode::default(),
            date_filter_relative: None,
            date_filter_start: None,
            date_filter_end: None,
        }
    }
}

/// First provider with a value wins.
fn pick<T: Clone>(
    explicit: Option<&T>,
    bundle: Option<&T>,
    preference: Option<&T>,
    default: T,
) -> T {
    explicit
        .or(bundle)
        .or(preference)
        .cloned()
        .unwrap_or(default)
}

/// First provider with a value wins; no hard default.
fn pick_opt<T: Clone>(
    explicit: Option<&T>,
    bundle: Option<&T>,
    preference: Option<&T>,
) -> Option<T> {
    explicit.or(bundle).or(preference).cloned()
}

impl SearchSpecification {
    /// Resolve the effective search from the three optional providers.
    ///
    /// Per-field precedence: explicit > bundle-carried > stored preference >
    /// hard default. Because the bundle provider sits above preferences in
    /// the chain, preferences are bypassed for every field the bundle
    /// carries — the bundle is a floor replacing them, not an extra tier.
    ///
    /// Pure: reads the bundle, never mutates it.
    pub fn resolve(
        explicit: &SearchParams,
        bundle: Option<&SearchBundle>,
        preferences: Option<&SearchParams>,
    ) -> Self {
        let b = bundle.map(|b| &b.search_params);
        let p = preferences;

        Self {
            q: pick(
                explicit.q.as_ref(),
                b.and_then(|b| b.q.as_ref()),
                p.and_then(|p| p.q.as_ref()),
                String::new(),
            ),
            user: pick(
                explicit.user.as_ref(),
                b.and_then(|b| b.user.as_ref()),
                p.and_then(|p| p.user.as_ref()),
                String::new(),
            ),
            bundle: bundle.cloned(),
            sort: pick(
                explicit.sort.as_ref(),
                b.and_then(|b| b.sort.as_ref()),
                p.and_then(|p| p.sort.as_ref()),
                SortOrder::default(),
            ),
            shared: pick(
                explicit.shared.as_ref(),
                b.and_then(|b| b.shared.as_ref()),
                p.and_then(|p| p.shared.as_ref()),
                TriState::default(),
            ),
            unread: pick(
                explicit.unread.as_ref(),
                b.and_then(|b| b.unread.as_ref()),
                p.and_then(|p| p.unread.as_ref()),
                TriState::default(),
            ),
            tagged: pick(
                explicit.tagged.as_ref(),
                b.and_then(|b| b.tagged.as_ref()),
                p.and_then(|p| p.tagged.as_ref()),
                TriState::default(),
            ),
            modified_since: pick_opt(
                explicit.modified_since.as_ref(),
                b.and_then(|b| b.modified_since.as_ref()),
                p.and_then(|p| p.modified_since.as_ref()),
            ),
            added_since: pick_opt(
                explicit.added_since.as_ref(),
                b.and_then(|b| b.added_since.as_ref()),
                p.and_then(|p| p.added_since.as_ref()),
            ),
            deleted_since: pick_opt(
                explicit.deleted_since.as_ref(),
                b.and_then(|b| b.deleted_since.as_ref()),
                p.and_then(|p| p.deleted_since.as_ref()),
            ),
            date_filter_by: pick(
                explicit.date_filter_by.as_ref(),
                b.and_then(|b| b.date_filter_by.as_ref()),
                p.and_then(|p| p.date_filter_by.as_ref()),
                DateFilterField::default(),
            ),
            date_filter_type: pick(
                explicit.date_filter_type.as_ref(),
                b.and_then(|b| b.date_filter_type.as_ref()),
                p.and_then(|p| p.date_filter_type.as_ref()),
                DateFilterMode::default(),
            ),
            date_filter_relative: pick_opt(
                explicit.date_filter_relative.as_ref(),
                b.and_then(|b| b.date_filter_relative.as_ref()),
                p.and_then(|p| p.date_filter_relative.as_ref()),
            ),
            date_filter_start: pick_opt(
                explicit.date_filter_start.as_ref(),
                b.and_then(|b| b.date_filter_start.as_ref()),
                p.and_then(|p| p.date_filter_start.as_ref()),
            ),
            date_filter_end: pick_opt(
                explicit.date_filter_end.as_ref(),
                b.and_then(|b| b.date_filter_end.as_ref()),
                p.and_then(|p| p.date_filter_end.as_ref()),
            ),
        }
    }

    /// Convenience wrapper resolving directly from raw request pairs.
    pub fn from_pairs<'a, I>(
        pairs: I,
        bundle: Option<&SearchBundle>,
        preferences: Option<&SearchParams>,
    ) -> Self
    where
        I: IntoIterator<Item = (&'a str, &'a str)>,
    {
        Self::resolve(&SearchParams::from_pairs(pairs), bundle, preferences)
    }

    // =========================================================================
    // EFFECTIVE DATE RANGE
    // =========================================================================

    /// Effective `(start, end)` for the given reference day.
    ///
    /// In relative mode with a resolvable token, the range is derived from
    /// the token; otherwise the stored values apply. The stored fields are
    /// never mutated to reflect a derived value.
    pub fn effective_date_range_on(
        &self,
        today: NaiveDate,
    ) -> (Option<NaiveDate>, Option<NaiveDate>) {
        if self.date_filter_type == DateFilterMode::Relative {
            if let Some(token) = &self.date_filter_relative {
                if let Some((start, end)) = resolve_relative_range(token, today) {
                    return (Some(start), Some(end));
                }
            }
        }
        (self.date_filter_start, self.date_filter_end)
    }

    /// Effective range relative to the current UTC day.
    pub fn effective_date_range(&self) -> (Option<NaiveDate>, Option<NaiveDate>) {
        self.effective_date_range_on(Utc::now().date_naive())
    }

    /// Effective start of the date filter.
    pub fn date_filter_start(&self) -> Option<NaiveDate> {
        self.effective_date_range().0
    }

    /// Effective end of the date filter.
    pub fn date_filter_end(&self) -> Option<NaiveDate> {
        self.effective_date_range().1
    }

    /// The stored (non-derived) range, regardless of mode.
    pub fn stored_date_range(&self) -> (Option<NaiveDate>, Option<NaiveDate>) {
        (self.date_filter_start, self.date_filter_end)
    }

    /// Set the stored range (absolute-mode editing).
    pub fn set_stored_date_range(&mut self, start: Option<NaiveDate>, end: Option<NaiveDate>) {
        self.date_filter_start = start;
        self.date_filter_end = end;
    }

    /// `modified_since` parsed as an epoch timestamp, if parsable.
    pub fn modified_since_datetime(&self) -> Option<DateTime<Utc>> {
        self.modified_since
            .as_deref()
            .and_then(|s| parse_timestamp(s).ok())
    }

    /// `added_since` parsed as an epoch timestamp, if parsable.
    pub fn added_since_datetime(&self) -> Option<DateTime<Utc>> {
        self.added_since
            .as_deref()
            .and_then(|s| parse_timestamp(s).ok())
    }

    /// `deleted_since` parsed as an epoch timestamp, if parsable.
    pub fn deleted_since_datetime(&self) -> Option<DateTime<Utc>> {
        self.deleted_since
            .as_deref()
            .and_then(|s| parse_timestamp(s).ok())
    }

    // =========================================================================
    // MODIFICATION REPORTING
    // =========================================================================

    /// Whether the resolved value differs from the hard default.
    ///
    /// Exception: in relative mode the derived start/end fields are never
    /// reported as modified — they are recomputable from the token.
    pub fn is_modified(&self, field: SearchField) -> bool {
        if self.date_filter_type == DateFilterMode::Relative
            && matches!(field, SearchField::DateFilterStart | SearchField::DateFilterEnd)
        {
            return false;
        }
        match field {
            SearchField::Query => !self.q.is_empty(),
            SearchField::User => !self.user.is_empty(),
            SearchField::Bundle => self.bundle.is_some(),
            SearchField::Sort => self.sort != SortOrder::default(),
            SearchField::Shared => self.shared != TriState::default(),
            SearchField::Unread => self.unread != TriState::default(),
            SearchField::Tagged => self.tagged != TriState::default(),
            SearchField::ModifiedSince => self.modified_since.is_some(),
            SearchField::AddedSince => self.added_since.is_some(),
            SearchField::DeletedSince => self.deleted_since.is_some(),
            SearchField::DateFilterBy => self.date_filter_by != DateFilterField::default(),
            SearchField::DateFilterType => self.date_filter_type != DateFilterMode::default(),
            SearchField::DateFilterRelative => self.date_filter_relative.is_some(),
            SearchField::DateFilterStart => self.date_filter_start.is_some(),
            SearchField::DateFilterEnd => self.date_filter_end.is_some(),
        }
    }

    /// All fields whose resolved value differs from the hard default.
    pub fn modified_params(&self) -> Vec<SearchField> {
        SearchField::ALL
            .into_iter()
            .filter(|f| self.is_modified(*f))
            .collect()
    }

    /// Modified fields restricted to the preference subset.
    pub fn modified_preferences(&self) -> Vec<SearchField> {
        SearchField::PREFERENCES
            .into_iter()
            .filter(|f| self.is_modified(*f))
            .collect()
    }

    pub fn has_modifications(&self) -> bool {
        !self.modified_params().is_empty()
    }

    pub fn has_modified_preferences(&self) -> bool {
        !self.modified_preferences().is_empty()
    }

    /// Snapshot of the preference fields, in the shape stored preferences
    /// are persisted in.
    pub fn to_preferences(&self) -> SearchParams {
        SearchParams {
            sort: Some(self.sort),
            shared: Some(self.shared),
            unread: Some(self.unread),
            tagged: Some(self.tagged),
            date_filter_by: Some(self.date_filter_by),
            date_filter_type: Some(self.date_filter_type),
            date_filter_relative: self.date_filter_relative.clone(),
            ..SearchParams::default()
        }
    }

    /// String map of the preference fields, the opaque shape the
    /// persistence layer stores preference documents in.
    pub fn preferences_map(&self) -> std::collections::HashMap<&'static str, String> {
        SearchField::PREFERENCES
            .into_iter()
            .filter_map(|field| self.field_value(field).map(|value| (field.key(), value)))
            .collect()
    }

    // =========================================================================
    // MINIMAL-DIFF QUERY SERIALIZATION
    // =========================================================================

    /// Canonical string value of a field; `None` when unset or empty.
    fn field_value(&self, field: SearchField) -> Option<String> {
        match field {
            SearchField::Query => (!self.q.is_empty()).then(|| self.q.clone()),
            SearchField::User => (!self.user.is_empty()).then(|| self.user.clone()),
            SearchField::Bundle => self.bundle.as_ref().map(|b| b.id.to_string()),
            SearchField::Sort => Some(self.sort.as_str().to_string()),
            SearchField::Shared => Some(self.shared.as_str().to_string()),
            SearchField::Unread => Some(self.unread.as_str().to_string()),
            SearchField::Tagged => Some(self.tagged.as_str().to_string()),
            SearchField::ModifiedSince => self.modified_since.clone(),
            SearchField::AddedSince => self.added_since.clone(),
            SearchField::DeletedSince => self.deleted_since.clone(),
            SearchField::DateFilterBy => Some(self.date_filter_by.as_str().to_string()),
            SearchField::DateFilterType => Some(self.date_filter_type.as_str().to_string()),
            SearchField::DateFilterRelative => self.date_filter_relative.clone(),
            SearchField::DateFilterStart => self
                .date_filter_start
                .map(|d| d.format(DATE_FORMAT).to_string()),
            SearchField::DateFilterEnd => self
                .date_filter_end
                .map(|d| d.format(DATE_FORMAT).to_string()),
        }
    }

    /// Minimal query representation, suitable for shareable links.
    ///
    /// Without a bundle, only modified fields are emitted. With a bundle, the
    /// bundle id is always emitted and every other field is emitted only when
    /// it differs from what re-deriving a specification from the bundle alone
    /// would produce; in relative mode the range fields are never emitted,
    /// and in absolute mode they are compared against the bundle's own
    /// resolved range. Combined with the bundle id, the result round-trips to
    /// the same effective search.
    pub fn query_params_on(&self, today: NaiveDate) -> Vec<(&'static str, String)> {
        let mut params: Vec<(&'static str, String)> = Vec::new();

        let Some(bundle) = &self.bundle else {
            for field in SearchField::ALL {
                if self.is_modified(field) {
                    if let Some(value) = self.field_value(field) {
                        params.push((field.key(), value));
                    }
                }
            }
            return params;
        };

        params.push((SearchField::Bundle.key(), bundle.id.to_string()));
        let baseline = Self::resolve(&SearchParams::default(), Some(bundle), None);
        let (self_start, self_end) = self.effective_date_range_on(today);
        let (base_start, base_end) = baseline.effective_date_range_on(today);

        for field in SearchField::ALL {
            if field == SearchField::Bundle {
                continue;
            }
            if matches!(field, SearchField::DateFilterStart | SearchField::DateFilterEnd) {
                // Relative ranges are recomputable from the token and never
                // serialized; absolute ranges are compared against the
                // bundle's own resolved range.
                if self.date_filter_type == DateFilterMode::Relative {
                    continue;
                }
                let (own, base) = if field == SearchField::DateFilterStart {
                    (self_start, base_start)
                } else {
                    (self_end, base_end)
                };
                if let Some(date) = own {
                    if Some(date) != base {
                        params.push((field.key(), date.format(DATE_FORMAT).to_string()));
                    }
                }
                continue;
            }
            if let Some(value) = self.field_value(field) {
                if Some(&value) != baseline.field_value(field).as_ref() {
                    params.push((field.key(), value));
                }
            }
        }
        params
    }

    /// [`query_params_on`](Self::query_params_on) for the current UTC day.
    pub fn query_params(&self) -> Vec<(&'static str, String)> {
        self.query_params_on(Utc::now().date_naive())
    }

    /// URL-encoded query string of [`query_params`](Self::query_params).
    pub fn query_string(&self) -> String {
        let mut serializer = url::form_urlencoded::Serializer::new(String::new());
        for (key, value) in self.query_params() {
            serializer.append_pair(key, &value);
        }
        serializer.finish()
    }
}

// =============================================================================
// TESTS
// =============================================================================

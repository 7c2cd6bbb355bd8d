//! Validation of the `/posts` query string.
//!
//! The raw parameters arrive as optional strings and leave as a typed
//! `PageRequest`, or as a field → message map when any of them is invalid.
//! The order column and direction are closed enums: the only text they can
//! contribute to SQL is the fixed literal returned by `as_sql`.

use rocket::FromForm;
use serde::Serialize;
use std::collections::BTreeMap;
use std::fmt;
use std::str::FromStr;

pub const DEFAULT_LIMIT: i64 = 5;
pub const MAX_LIMIT: i64 = 30;
pub const DEFAULT_OFFSET: i64 = 0;

/// Query parameters exactly as received.
#[derive(Debug, Default, Clone, FromForm)]
pub struct RawPageParams {
    pub limit: Option<String>,
    pub offset: Option<String>,
    pub order: Option<String>,
    #[field(name = "orderType")]
    pub order_type: Option<String>,
}

#[derive(Debug, Default, Clone, Copy, PartialEq, Eq)]
pub enum OrderColumn {
    #[default]
    Rowid,
    Id,
    Title,
    Url,
    Created,
}

impl OrderColumn {
    pub const ALL: [OrderColumn; 5] = [
        OrderColumn::Rowid,
        OrderColumn::Id,
        OrderColumn::Title,
        OrderColumn::Url,
        OrderColumn::Created,
    ];

    /// Public name, as accepted in `order=`.
    pub fn name(self) -> &'static str {
        match self {
            OrderColumn::Rowid => "rowid",
            OrderColumn::Id => "id",
            OrderColumn::Title => "title",
            OrderColumn::Url => "url",
            OrderColumn::Created => "created",
        }
    }

    /// Column name in the `news` table.
    pub fn as_sql(self) -> &'static str {
        match self {
            OrderColumn::Id => "hash",
            other => other.name(),
        }
    }
}

impl FromStr for OrderColumn {
    type Err = ();

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        OrderColumn::ALL.into_iter().find(|c| c.name() == s).ok_or(())
    }
}

#[derive(Debug, Default, Clone, Copy, PartialEq, Eq)]
pub enum OrderDirection {
    #[default]
    Asc,
    Desc,
}

impl OrderDirection {
    pub fn as_sql(self) -> &'static str {
        match self {
            OrderDirection::Asc => "ASC",
            OrderDirection::Desc => "DESC",
        }
    }
}

/// Case-sensitive: `asc` is rejected.
impl FromStr for OrderDirection {
    type Err = ();

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "ASC" => Ok(OrderDirection::Asc),
            "DESC" => Ok(OrderDirection::Desc),
            _ => Err(()),
        }
    }
}

/// A validated page request, safe to hand to `storage::select_page`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PageRequest {
    /// 1..=30
    pub limit: i64,
    /// Unbounded; SQLite treats a negative offset as zero.
    pub offset: i64,
    pub order: OrderColumn,
    pub direction: OrderDirection,
}

impl Default for PageRequest {
    fn default() -> Self {
        Self {
            limit: DEFAULT_LIMIT,
            offset: DEFAULT_OFFSET,
            order: OrderColumn::default(),
            direction: OrderDirection::default(),
        }
    }
}

/// Per-field validation messages, keyed by query parameter name.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
#[serde(transparent)]
pub struct ValidationErrors(BTreeMap<&'static str, String>);

impl ValidationErrors {
    fn add(&mut self, field: &'static str, message: String) {
        self.0.insert(field, message);
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    pub fn get(&self, field: &str) -> Option<&str> {
        self.0.get(field).map(String::as_str)
    }

    pub fn fields(&self) -> impl Iterator<Item = &'static str> + '_ {
        self.0.keys().copied()
    }
}

impl fmt::Display for ValidationErrors {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let parts: Vec<String> = self.0.iter().map(|(k, v)| format!("{k}: {v}")).collect();
        write!(f, "{}", parts.join("; "))
    }
}

fn order_column_message() -> String {
    let names: Vec<String> = OrderColumn::ALL.iter().map(|c| format!("'{}'", c.name())).collect();
    format!("Key must be str and one of: [{}]", names.join(", "))
}

/// Parse an integer the way a lenient form parser would: surrounding
/// whitespace and a leading `+` are accepted.
fn parse_int(raw: &str) -> Option<i64> {
    raw.trim().parse::<i64>().ok()
}

/// Validate all four parameters, collecting every failing field.
pub fn validate(raw: &RawPageParams) -> Result<PageRequest, ValidationErrors> {
    let mut errors = ValidationErrors::default();
    let mut request = PageRequest::default();

    if let Some(limit) = raw.limit.as_deref() {
        match parse_int(limit) {
            Some(n) if (1..=MAX_LIMIT).contains(&n) => request.limit = n,
            _ => errors.add("limit", "Key must be integer in range(1,30)".to_string()),
        }
    }

    if let Some(offset) = raw.offset.as_deref() {
        match parse_int(offset) {
            Some(n) => request.offset = n,
            None => errors.add("offset", "Key must be integer".to_string()),
        }
    }

    if let Some(order) = raw.order.as_deref() {
        match order.parse::<OrderColumn>() {
            Ok(column) => request.order = column,
            Err(()) => errors.add("order", order_column_message()),
        }
    }

    if let Some(direction) = raw.order_type.as_deref() {
        match direction.parse::<OrderDirection>() {
            Ok(direction) => request.direction = direction,
            Err(()) => errors.add("orderType", "Key must be str and one of: ASC, DESC".to_string()),
        }
    }

    if errors.is_empty() {
        Ok(request)
    } else {
        Err(errors)
    }
}

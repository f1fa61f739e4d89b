//! Page/limit pagination for list endpoints.

use serde::{Deserialize, Serialize};

const DEFAULT_PAGE: u32 = 1;
const DEFAULT_LIMIT: u32 = 10;
/// Largest page a client may ask for.
pub const MAX_LIMIT: u32 = 100;

/// Raw query string. Values are parsed leniently: anything that is not a
/// positive integer falls back to the default.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct PageQuery {
    pub page: Option<String>,
    pub limit: Option<String>,
    pub search: Option<String>,
}

impl PageQuery {
    pub fn request(&self) -> PageRequest {
        PageRequest::new(
            parse_positive(self.page.as_deref()).unwrap_or(DEFAULT_PAGE),
            parse_positive(self.limit.as_deref()).unwrap_or(DEFAULT_LIMIT),
        )
    }

    /// Trimmed search term; empty means no filter.
    pub fn search(&self) -> &str {
        self.search.as_deref().map(str::trim).unwrap_or_default()
    }
}

fn parse_positive(value: Option<&str>) -> Option<u32> {
    value
        .and_then(|v| v.trim().parse::<u32>().ok())
        .filter(|v| *v > 0)
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PageRequest {
    pub page: u32,
    pub limit: u32,
}

impl PageRequest {
    pub fn new(page: u32, limit: u32) -> Self {
        Self {
            page: page.max(1),
            limit: limit.clamp(1, MAX_LIMIT),
        }
    }

    /// Rows to skip, as SQLite's signed 64-bit `OFFSET`.
    pub fn offset(&self) -> i64 {
        i64::from(self.page - 1).saturating_mul(i64::from(self.limit))
    }
}

impl Default for PageRequest {
    fn default() -> Self {
        Self::new(DEFAULT_PAGE, DEFAULT_LIMIT)
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct PageMeta {
    pub total: u64,
    pub page: u32,
    pub last_page: u64,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct Page<T> {
    pub data: Vec<T>,
    pub meta: PageMeta,
}

impl<T> Page<T> {
    pub fn new(data: Vec<T>, total: u64, request: PageRequest) -> Self {
        Self {
            data,
            meta: PageMeta {
                total,
                page: request.page,
                last_page: total.div_ceil(u64::from(request.limit)),
            },
        }
    }
}

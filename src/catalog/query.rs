//! Search criteria, sort order, and paging for catalog queries.
//!
//! Criteria compile into a fixed list of [`Filter`]s, always in the same order, which are
//! ANDed into a single sea-orm [`Condition`]. Sorting only ever touches allow-listed columns.

use sea_orm::sea_query::{Alias, Expr, Func, SimpleExpr};
use sea_orm::{ColumnTrait, Condition, Order};
use serde::{Deserialize, Serialize};

use crate::db::entities::imagery::Column;

pub const DEFAULT_PAGE_SIZE: u64 = 20;
pub const MAX_PAGE_SIZE: u64 = 1000;

/// Optional search fields; absent or blank fields do not constrain the result.
#[derive(Debug, Clone, Default, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct SearchCriteria {
    pub original_name: Option<String>,
    pub original_name_contains: Option<String>,
    pub cog_name: Option<String>,
    pub width: Option<i32>,
    pub height: Option<i32>,
    pub band_count: Option<i32>,
    pub projection: Option<String>,
}

/// One (field, comparator) pair of a search.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Filter {
    OriginalNameEquals(String),
    OriginalNameContains(String),
    CogNameEquals(String),
    WidthEquals(i32),
    HeightEquals(i32),
    BandCountEquals(i32),
    ProjectionContains(String),
}

fn text(value: &Option<String>) -> Option<String> {
    value.as_ref().filter(|s| !s.trim().is_empty()).cloned()
}

impl SearchCriteria {
    /// Builds criteria from discrete query parameters. Unrelated parameters are ignored.
    pub fn from_pairs(pairs: &[(String, String)]) -> Result<Self, String> {
        let mut criteria = Self::default();
        for (name, value) in pairs {
            match name.as_str() {
                "originalName" => criteria.original_name = Some(value.clone()),
                "originalNameContains" => criteria.original_name_contains = Some(value.clone()),
                "cogName" => criteria.cog_name = Some(value.clone()),
                "width" => criteria.width = parse_number(name, value)?,
                "height" => criteria.height = parse_number(name, value)?,
                "bandCount" => criteria.band_count = parse_number(name, value)?,
                "projection" => criteria.projection = Some(value.clone()),
                _ => {}
            }
        }
        Ok(criteria)
    }

    pub fn filters(&self) -> Vec<Filter> {
        let mut filters = Vec::new();
        if let Some(v) = text(&self.original_name) {
            filters.push(Filter::OriginalNameEquals(v));
        }
        if let Some(v) = text(&self.original_name_contains) {
            filters.push(Filter::OriginalNameContains(v));
        }
        if let Some(v) = text(&self.cog_name) {
            filters.push(Filter::CogNameEquals(v));
        }
        if let Some(v) = self.width {
            filters.push(Filter::WidthEquals(v));
        }
        if let Some(v) = self.height {
            filters.push(Filter::HeightEquals(v));
        }
        if let Some(v) = self.band_count {
            filters.push(Filter::BandCountEquals(v));
        }
        if let Some(v) = text(&self.projection) {
            filters.push(Filter::ProjectionContains(v));
        }
        filters
    }

    /// Conjunction of all filters; matches everything when there are none.
    pub fn condition(&self) -> Condition {
        self.filters()
            .into_iter()
            .fold(Condition::all(), |condition, filter| condition.add(filter.into_expr()))
    }
}

fn parse_number(name: &str, value: &str) -> Result<Option<i32>, String> {
    let value = value.trim();
    if value.is_empty() {
        return Ok(None);
    }
    value
        .parse()
        .map(Some)
        .map_err(|_| format!("{} must be an integer, got {:?}", name, value))
}

impl Filter {
    pub fn into_expr(self) -> SimpleExpr {
        match self {
            Filter::OriginalNameEquals(v) => Column::OriginalName.eq(v),
            Filter::OriginalNameContains(v) => contains(Column::OriginalName, v),
            Filter::CogNameEquals(v) => Column::CogName.eq(v),
            Filter::WidthEquals(v) => Column::Width.eq(v),
            Filter::HeightEquals(v) => Column::Height.eq(v),
            Filter::BandCountEquals(v) => Column::BandCount.eq(v),
            Filter::ProjectionContains(v) => contains(Column::Projection, v),
        }
    }
}

/// Case-sensitive literal substring test; `%` and `_` are not wildcards here.
fn contains(column: Column, needle: String) -> SimpleExpr {
    Expr::expr(
        Func::cust(Alias::new("instr"))
            .arg(Expr::col(column))
            .arg(needle),
    )
    .gt(0)
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SortKey {
    Id,
    CreatedAt,
    OriginalName,
    BandCount,
    Width,
    Height,
}

impl SortKey {
    pub fn parse(name: &str) -> Option<Self> {
        match name {
            "id" => Some(SortKey::Id),
            "createdAt" => Some(SortKey::CreatedAt),
            "originalName" => Some(SortKey::OriginalName),
            "bandCount" => Some(SortKey::BandCount),
            "width" => Some(SortKey::Width),
            "height" => Some(SortKey::Height),
            _ => None,
        }
    }

    pub fn column(self) -> Column {
        match self {
            SortKey::Id => Column::Id,
            SortKey::CreatedAt => Column::CreatedAt,
            SortKey::OriginalName => Column::OriginalName,
            SortKey::BandCount => Column::BandCount,
            SortKey::Width => Column::Width,
            SortKey::Height => Column::Height,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SortDirection {
    Asc,
    Desc,
}

impl SortDirection {
    pub fn order(self) -> Order {
        match self {
            SortDirection::Asc => Order::Asc,
            SortDirection::Desc => Order::Desc,
        }
    }
}

/// Requested sort order, already filtered down to allow-listed keys.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct SortSpec {
    orders: Vec<(SortKey, SortDirection)>,
}

impl SortSpec {
    /// Parses `key`, `key,asc|desc` or `key1,key2,desc` values. Unknown keys are dropped.
    pub fn parse<S: AsRef<str>>(values: &[S]) -> Self {
        let mut spec = Self::default();
        for value in values {
            let mut parts: Vec<&str> = value
                .as_ref()
                .split(',')
                .map(str::trim)
                .filter(|p| !p.is_empty())
                .collect();

            let direction = match parts.last().map(|p| p.to_ascii_lowercase()) {
                Some(last) if last == "desc" => {
                    parts.pop();
                    SortDirection::Desc
                }
                Some(last) if last == "asc" => {
                    parts.pop();
                    SortDirection::Asc
                }
                _ => SortDirection::Asc,
            };

            for key in parts.into_iter().filter_map(SortKey::parse) {
                spec.push(key, direction);
            }
        }
        spec
    }

    pub fn by(key: SortKey, direction: SortDirection) -> Self {
        let mut spec = Self::default();
        spec.push(key, direction);
        spec
    }

    fn push(&mut self, key: SortKey, direction: SortDirection) {
        if !self.orders.iter().any(|(k, _)| *k == key) {
            self.orders.push((key, direction));
        }
    }

    pub fn is_empty(&self) -> bool {
        self.orders.is_empty()
    }

    /// Orders to apply: the requested ones, or id descending, with id as final tie-break.
    pub fn resolved(&self) -> Vec<(SortKey, SortDirection)> {
        let mut orders = self.orders.clone();
        if !orders.iter().any(|(k, _)| *k == SortKey::Id) {
            orders.push((SortKey::Id, SortDirection::Desc));
        }
        orders
    }
}

/// Zero-based offset/limit paging plus sort order.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PageRequest {
    pub page: u64,
    pub size: u64,
    pub sort: SortSpec,
}

impl Default for PageRequest {
    fn default() -> Self {
        Self {
            page: 0,
            size: DEFAULT_PAGE_SIZE,
            sort: SortSpec::default(),
        }
    }
}

impl PageRequest {
    pub fn new(page: u64, size: u64, sort: SortSpec) -> Self {
        Self {
            page,
            size: size.clamp(1, MAX_PAGE_SIZE),
            sort,
        }
    }

    /// Reads `page`, `size` and repeated `sort` parameters.
    pub fn from_pairs(pairs: &[(String, String)]) -> Result<Self, String> {
        let mut page = 0;
        let mut size = DEFAULT_PAGE_SIZE;
        let mut sort = Vec::new();
        for (name, value) in pairs {
            match name.as_str() {
                "page" => {
                    page = value
                        .trim()
                        .parse()
                        .map_err(|_| format!("page must be a non-negative integer, got {:?}", value))?
                }
                "size" => {
                    size = value
                        .trim()
                        .parse()
                        .map_err(|_| format!("size must be a positive integer, got {:?}", value))?
                }
                "sort" => sort.push(value.as_str()),
                _ => {}
            }
        }
        Ok(Self::new(page, size, SortSpec::parse(&sort)))
    }

    /// Row offset, capped at `i64::MAX` since SQLite binds offsets as signed integers.
    /// Pages past the end of the result set come back empty.
    pub fn offset(&self) -> u64 {
        self.page.saturating_mul(self.size).min(i64::MAX as u64)
    }
}

/// One page of results plus the size of the whole filtered set.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Page<T> {
    pub content: Vec<T>,
    pub total_elements: u64,
    pub total_pages: u64,
    pub number: u64,
    pub size: u64,
}

impl<T> Page<T> {
    pub fn new(content: Vec<T>, total_elements: u64, request: &PageRequest) -> Self {
        Self {
            content,
            total_elements,
            total_pages: total_elements.div_ceil(request.size),
            number: request.page,
            size: request.size,
        }
    }
}

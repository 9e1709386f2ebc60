//! Listing filters and pagination shared by every store implementation.

use chrono::{DateTime, Utc};
use serde::Serialize;

use stockroom_core::{CategoryId, DomainError, DomainResult, ProductId};
use stockroom_inventory::{MovementType, Product, StockMovement, StockStatus};

/// 1-based page request, already clamped.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PageRequest {
    pub page: u32,
    pub per_page: u32,
}

impl PageRequest {
    pub const MAX_PER_PAGE: u32 = 100;

    /// Clamp raw query values; `page < 1` becomes 1 and `per_page` falls back
    /// to `default` when missing or zero.
    pub fn new(page: Option<u32>, per_page: Option<u32>, default: u32) -> Self {
        let per_page = match per_page {
            Some(0) | None => default,
            Some(n) => n.min(Self::MAX_PER_PAGE),
        };
        Self {
            page: page.unwrap_or(1).max(1),
            per_page,
        }
    }

    pub fn offset(&self) -> u64 {
        u64::from(self.page - 1) * u64::from(self.per_page)
    }

    pub fn limit(&self) -> u64 {
        u64::from(self.per_page)
    }
}

/// One page of results plus the total count behind it.
#[derive(Debug, Clone, PartialEq)]
pub struct Page<T> {
    pub items: Vec<T>,
    pub total: u64,
    pub page: u32,
    pub per_page: u32,
}

impl<T> Page<T> {
    /// Slice an already filtered and ordered collection.
    pub fn from_vec(all: Vec<T>, request: PageRequest) -> Self {
        let total = all.len() as u64;
        let items = all
            .into_iter()
            .skip(request.offset() as usize)
            .take(request.per_page as usize)
            .collect();
        Self {
            items,
            total,
            page: request.page,
            per_page: request.per_page,
        }
    }

    pub fn last_page(&self) -> u32 {
        if self.total == 0 || self.per_page == 0 {
            return 1;
        }
        self.total.div_ceil(u64::from(self.per_page)) as u32
    }

    pub fn map<U>(self, f: impl FnMut(T) -> U) -> Page<U> {
        Page {
            items: self.items.into_iter().map(f).collect(),
            total: self.total,
            page: self.page,
            per_page: self.per_page,
        }
    }

    /// Like [`Page::map`], stopping at the first failing item.
    pub fn try_map<U, E>(self, f: impl FnMut(T) -> Result<U, E>) -> Result<Page<U>, E> {
        Ok(Page {
            items: self.items.into_iter().map(f).collect::<Result<_, E>>()?,
            total: self.total,
            page: self.page,
            per_page: self.per_page,
        })
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum ProductSortField {
    Name,
    Sku,
    Price,
    StockQuantity,
    MinimumStock,
    #[default]
    CreatedAt,
    UpdatedAt,
}

impl ProductSortField {
    pub fn parse(s: &str) -> DomainResult<Self> {
        match s {
            "name" => Ok(Self::Name),
            "sku" => Ok(Self::Sku),
            "price" => Ok(Self::Price),
            "stock_quantity" => Ok(Self::StockQuantity),
            "minimum_stock" => Ok(Self::MinimumStock),
            "created_at" => Ok(Self::CreatedAt),
            "updated_at" => Ok(Self::UpdatedAt),
            _ => Err(DomainError::invalid_field("sort_field", "unsupported sort field")),
        }
    }

    /// Column name; only ever one of the fixed identifiers above.
    pub fn column(self) -> &'static str {
        match self {
            Self::Name => "name",
            Self::Sku => "sku",
            Self::Price => "price",
            Self::StockQuantity => "stock_quantity",
            Self::MinimumStock => "minimum_stock",
            Self::CreatedAt => "created_at",
            Self::UpdatedAt => "updated_at",
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum SortDirection {
    Asc,
    #[default]
    Desc,
}

impl SortDirection {
    pub fn parse(s: &str) -> DomainResult<Self> {
        match s.to_ascii_lowercase().as_str() {
            "asc" => Ok(Self::Asc),
            "desc" => Ok(Self::Desc),
            _ => Err(DomainError::invalid_field("sort_direction", "sort_direction must be asc or desc")),
        }
    }

    pub fn sql(self) -> &'static str {
        match self {
            Self::Asc => "ASC",
            Self::Desc => "DESC",
        }
    }
}

/// Product listing filter. Soft-deleted products never match.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ProductFilter {
    pub search: Option<String>,
    pub category_id: Option<CategoryId>,
    pub stock_status: Option<StockStatus>,
    pub include_inactive: bool,
    pub sort_field: ProductSortField,
    pub sort_direction: SortDirection,
}

impl ProductFilter {
    pub fn matches(&self, p: &Product) -> bool {
        if p.is_deleted() || (!self.include_inactive && !p.is_active) {
            return false;
        }
        if self.category_id.is_some() && p.category_id != self.category_id {
            return false;
        }
        if self.stock_status.is_some_and(|s| p.stock_status() != s) {
            return false;
        }
        match search_term(self.search.as_deref()) {
            Some(term) => {
                contains_ci(&p.name, &term)
                    || contains_ci(&p.sku, &term)
                    || p.description.as_deref().is_some_and(|d| contains_ci(d, &term))
            }
            None => true,
        }
    }

    pub fn compare(&self, a: &Product, b: &Product) -> std::cmp::Ordering {
        let ord = match self.sort_field {
            ProductSortField::Name => a.name.cmp(&b.name),
            ProductSortField::Sku => a.sku.cmp(&b.sku),
            ProductSortField::Price => a.price.cmp(&b.price),
            ProductSortField::StockQuantity => a.stock_quantity.cmp(&b.stock_quantity),
            ProductSortField::MinimumStock => a.minimum_stock.cmp(&b.minimum_stock),
            ProductSortField::CreatedAt => a.created_at.cmp(&b.created_at),
            ProductSortField::UpdatedAt => a.updated_at.cmp(&b.updated_at),
        }
        .then_with(|| a.id.cmp(&b.id));

        match self.sort_direction {
            SortDirection::Asc => ord,
            SortDirection::Desc => ord.reverse(),
        }
    }
}

/// Ledger listing filter. Entries of soft-deleted products are included.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct MovementFilter {
    pub movement_type: Option<MovementType>,
    pub product_id: Option<ProductId>,
    pub range: DateRange,
    /// Matches the product sku/name snapshot.
    pub search: Option<String>,
}

impl MovementFilter {
    pub fn matches(&self, m: &StockMovement) -> bool {
        if self.movement_type.is_some_and(|t| m.movement_type != t) {
            return false;
        }
        if self.product_id.is_some_and(|id| m.product_id != id) {
            return false;
        }
        if !self.range.contains(m.movement_date) {
            return false;
        }
        match search_term(self.search.as_deref()) {
            Some(term) => contains_ci(&m.product_name, &term) || contains_ci(&m.product_sku, &term),
            None => true,
        }
    }
}

/// Inclusive timestamp range; open on any missing side.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct DateRange {
    pub start: Option<DateTime<Utc>>,
    pub end: Option<DateTime<Utc>>,
}

impl DateRange {
    pub fn new(start: Option<DateTime<Utc>>, end: Option<DateTime<Utc>>) -> DomainResult<Self> {
        if let (Some(s), Some(e)) = (start, end) {
            if e < s {
                return Err(DomainError::invalid_field("end_date", "end_date must not be before start_date"));
            }
        }
        Ok(Self { start, end })
    }

    pub fn contains(&self, at: DateTime<Utc>) -> bool {
        self.start.is_none_or(|s| at >= s) && self.end.is_none_or(|e| at <= e)
    }
}

/// Trimmed, lower-cased search term; `None` when blank.
pub fn search_term(raw: Option<&str>) -> Option<String> {
    raw.map(str::trim).filter(|s| !s.is_empty()).map(str::to_lowercase)
}

fn contains_ci(haystack: &str, needle_lower: &str) -> bool {
    haystack.to_lowercase().contains(needle_lower)
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Duration;

    #[test]
    fn page_request_clamps() {
        assert_eq!(PageRequest::new(None, None, 15), PageRequest { page: 1, per_page: 15 });
        assert_eq!(PageRequest::new(Some(0), Some(500), 15), PageRequest { page: 1, per_page: 100 });
        assert_eq!(PageRequest::new(Some(3), Some(10), 15).offset(), 20);
    }

    #[test]
    fn page_slices_and_counts() {
        let page = Page::from_vec((1..=23).collect::<Vec<_>>(), PageRequest::new(Some(3), Some(10), 10));
        assert_eq!(page.items, vec![21, 22, 23]);
        assert_eq!(page.total, 23);
        assert_eq!(page.last_page(), 3);

        let empty: Page<u8> = Page::from_vec(vec![], PageRequest::new(None, None, 10));
        assert_eq!(empty.last_page(), 1);
    }

    #[test]
    fn try_map_keeps_paging_or_fails() {
        let page = Page::from_vec(vec![1, 2, 3], PageRequest::new(Some(1), Some(2), 10));
        let doubled = page.clone().try_map(|n| Ok::<_, String>(n * 2)).unwrap();
        assert_eq!((doubled.items, doubled.total), (vec![2, 4], 3));

        let err = page.try_map(|n| if n == 2 { Err("two") } else { Ok(n) }).unwrap_err();
        assert_eq!(err, "two");
    }

    #[test]
    fn sort_parsing_rejects_unknown_columns() {
        assert_eq!(ProductSortField::parse("price").unwrap(), ProductSortField::Price);
        assert!(ProductSortField::parse("price; DROP TABLE products").is_err());
        assert_eq!(SortDirection::parse("ASC").unwrap(), SortDirection::Asc);
    }

    #[test]
    fn date_range_is_inclusive_and_ordered() {
        let now = Utc::now();
        let r = DateRange::new(Some(now - Duration::days(1)), Some(now)).unwrap();
        assert!(r.contains(now));
        assert!(!r.contains(now + Duration::seconds(1)));
        assert!(DateRange::new(Some(now), Some(now - Duration::days(1))).is_err());
        assert!(DateRange::default().contains(now));
    }

    #[test]
    fn blank_search_is_ignored() {
        assert_eq!(search_term(Some("   ")), None);
        assert_eq!(search_term(Some(" Taladro ")), Some("taladro".into()));
    }
}

use std::collections::HashMap;
use std::str::FromStr;

use validator::Validate;

use stockroom_auth::{Permission, Principal};
use stockroom_core::{CategoryId, DomainError, DomainResult};
use stockroom_infra::InventoryStore;

use crate::app::dto::CategoryBrief;
use crate::app::errors::ApiError;
use crate::authz;
use crate::context::PrincipalContext;

/// Path ids that do not parse can't name an existing record.
pub fn parse_id<T: FromStr>(raw: &str, entity: &'static str) -> DomainResult<T> {
    raw.parse().map_err(|_| DomainError::not_found(entity))
}

/// Optional id from a query string; malformed values are a validation error.
pub fn parse_query_id<T: FromStr>(raw: Option<&str>, field: &'static str) -> DomainResult<Option<T>> {
    match raw.map(str::trim).filter(|s| !s.is_empty()) {
        None => Ok(None),
        Some(s) => s
            .parse()
            .map(Some)
            .map_err(|_| DomainError::invalid_field(field, format!("{field} is not a valid id"))),
    }
}

/// Authorize a write and validate its body, then make sure the acting user
/// exists for ledger attribution. Rejected writes never touch the user table.
pub async fn writer<B: Validate>(
    store: &dyn InventoryStore,
    ctx: &PrincipalContext,
    permission: Permission,
    body: &B,
) -> Result<Principal, ApiError> {
    let principal = authz::require(ctx, permission)?;
    body.validate()?;
    store.record_user(principal.user_id, principal.primary_role()).await?;
    Ok(principal)
}

/// Category id → display fields, for embedding into product payloads.
pub async fn category_lookup(store: &dyn InventoryStore) -> DomainResult<HashMap<CategoryId, CategoryBrief>> {
    let summaries = store.list_categories(None).await?;
    Ok(summaries
        .iter()
        .map(|s| (s.category.id, CategoryBrief::from(&s.category)))
        .collect())
}

//! Tenant identifiers.

use policy_core::{AppError, AppResult};

/// Reject empty tenant ids before they reach any store.
pub fn validate_tenant(tenant_id: &str) -> AppResult<()> {
    if tenant_id.trim().is_empty() {
        return Err(AppError::Other("Tenant id cannot be empty".to_string()));
    }
    Ok(())
}

/// File-safe form of a tenant id: every non-ASCII-alphanumeric char becomes `_`.
///
/// Distinct ids can share a sanitized form (`acme-1` and `acme_1`). They then
/// share one index file and one id sequence, while metadata stays keyed by
/// the raw id.
pub fn sanitize_tenant(tenant_id: &str) -> String {
    tenant_id
        .chars()
        .map(|c| if c.is_ascii_alphanumeric() { c } else { '_' })
        .collect()
}

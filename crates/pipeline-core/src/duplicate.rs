//! Duplicate-Opportunity Guard
//!
//! Rejects creating a second open opportunity for the same
//! (principal, customer, product) triple.

use serde::Deserialize;
use std::fmt;
use thiserror::Error;
use tracing::{debug, warn};

use crate::domain::{OpportunityId, OrganizationId, ProductId, Stage};
use crate::provider::{DataProvider, ListParams, ProviderError, Sort, OPPORTUNITIES, OPPORTUNITY_PRODUCTS};
use crate::validation::ValidationErrors;

pub const DEFAULT_CANDIDATE_PAGE_SIZE: u32 = 100;

/// Identity of the record that blocks creation
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct ExistingOpportunity {
    pub id: OpportunityId,
    pub name: String,
    pub stage: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum DuplicateError {
    #[error("Duplicate opportunity detected. Existing opportunity: {0}")]
    Duplicate(ExistingOpportunity),
    #[error("Duplicate check failed: {0}")]
    Provider(#[from] ProviderError),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct DuplicateQuery {
    pub principal_id: OrganizationId,
    pub customer_id: OrganizationId,
    pub product_id: ProductId,
    /// Set when checking an update so the record does not match itself
    pub exclude_id: Option<OpportunityId>,
}

impl DuplicateQuery {
    pub fn new(principal_id: OrganizationId, customer_id: OrganizationId, product_id: ProductId) -> Self {
        Self {
            principal_id,
            customer_id,
            product_id,
            exclude_id: None,
        }
    }

    pub fn excluding(mut self, id: OpportunityId) -> Self {
        self.exclude_id = Some(id);
        self
    }
}

/// Look for an open opportunity with the same triple.
///
/// Candidates share principal and customer; the first one already linked
/// to the product fails the check.
pub async fn check_exact_duplicate<P: DataProvider + ?Sized>(
    provider: &P,
    query: DuplicateQuery,
    page_size: u32,
) -> Result<(), DuplicateError> {
    let candidates = provider
        .get_list(
            OPPORTUNITIES,
            ListParams::new()
                .filter("principal_organization_id", query.principal_id)
                .filter("customer_organization_id", query.customer_id)
                .not_deleted()
                .page(1, page_size)
                .sort(Sort::desc("created_at")),
        )
        .await?;

    for raw in candidates.data {
        let candidate: ExistingOpportunity = match serde_json::from_value(raw) {
            Ok(c) => c,
            Err(e) => {
                warn!("Skipping unreadable duplicate candidate: {}", e);
                continue;
            }
        };
        if Some(candidate.id) == query.exclude_id {
            continue;
        }

        let links = provider
            .get_list(
                OPPORTUNITY_PRODUCTS,
                ListParams::new()
                    .filter("opportunity_id", candidate.id)
                    .filter("product_id", query.product_id)
                    .not_deleted()
                    .page(1, 1)
                    .sort(Sort::asc("id")),
            )
            .await?;

        if !links.data.is_empty() {
            warn!(
                "Duplicate opportunity {} for principal {} / customer {} / product {}",
                candidate.id, query.principal_id, query.customer_id, query.product_id
            );
            return Err(DuplicateError::Duplicate(candidate));
        }
    }

    debug!("No duplicate for product {}", query.product_id);
    Ok(())
}

/// Form-level wrapper: a duplicate becomes an error on `product_id`.
/// Provider failures propagate unchanged.
pub async fn validate_no_duplicate<P: DataProvider + ?Sized>(
    provider: &P,
    query: DuplicateQuery,
    page_size: u32,
) -> Result<Result<(), ValidationErrors>, ProviderError> {
    match check_exact_duplicate(provider, query, page_size).await {
        Ok(()) => Ok(Ok(())),
        Err(DuplicateError::Duplicate(existing)) => Ok(Err(ValidationErrors::single(
            "product_id",
            DuplicateError::Duplicate(existing).to_string(),
        ))),
        Err(DuplicateError::Provider(e)) => Err(e),
    }
}

impl fmt::Display for ExistingOpportunity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "\"{}\" (ID: {}, Stage: {})", self.name, self.id, self.stage)
    }
}

impl ExistingOpportunity {
    /// Stage as a board column, when it is one
    pub fn board_stage(&self) -> Option<Stage> {
        Stage::parse(&self.stage)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testing::ScriptedProvider;
    use serde_json::json;

    fn seeded() -> ScriptedProvider {
        let provider = ScriptedProvider::new();
        provider.seed(
            OPPORTUNITIES,
            json!({"id": 1, "name": "Ballpark Franks", "stage": "new_lead",
                   "principal_organization_id": 10, "customer_organization_id": 20,
                   "created_at": "2026-01-01T00:00:00Z", "deleted_at": null}),
        );
        provider.seed(
            OPPORTUNITY_PRODUCTS,
            json!({"id": 1, "opportunity_id": 1, "product_id": 5, "deleted_at": null}),
        );
        provider
    }

    #[tokio::test]
    async fn test_duplicate_names_existing_record() {
        let provider = seeded();
        let err = check_exact_duplicate(&provider, DuplicateQuery::new(10, 20, 5), DEFAULT_CANDIDATE_PAGE_SIZE)
            .await
            .unwrap_err();
        assert_eq!(
            err.to_string(),
            "Duplicate opportunity detected. Existing opportunity: \"Ballpark Franks\" (ID: 1, Stage: new_lead)"
        );
    }

    #[tokio::test]
    async fn test_different_product_passes() {
        let provider = seeded();
        check_exact_duplicate(&provider, DuplicateQuery::new(10, 20, 6), DEFAULT_CANDIDATE_PAGE_SIZE)
            .await
            .unwrap();
    }

    #[tokio::test]
    async fn test_excluded_record_does_not_match_itself() {
        let provider = seeded();
        check_exact_duplicate(
            &provider,
            DuplicateQuery::new(10, 20, 5).excluding(1),
            DEFAULT_CANDIDATE_PAGE_SIZE,
        )
        .await
        .unwrap();
        // Only the candidate query ran
        assert_eq!(provider.list_calls(), 1);
    }

    #[tokio::test]
    async fn test_soft_deleted_candidates_are_ignored() {
        let provider = ScriptedProvider::new();
        provider.seed(
            OPPORTUNITIES,
            json!({"id": 1, "name": "Old", "stage": "closed_lost",
                   "principal_organization_id": 10, "customer_organization_id": 20,
                   "deleted_at": "2026-02-01T00:00:00Z"}),
        );
        provider.seed(OPPORTUNITY_PRODUCTS, json!({"id": 1, "opportunity_id": 1, "product_id": 5}));
        check_exact_duplicate(&provider, DuplicateQuery::new(10, 20, 5), DEFAULT_CANDIDATE_PAGE_SIZE)
            .await
            .unwrap();
    }

    #[tokio::test]
    async fn test_validation_wrapper_keys_product_id() {
        let provider = seeded();
        let errors = validate_no_duplicate(&provider, DuplicateQuery::new(10, 20, 5), DEFAULT_CANDIDATE_PAGE_SIZE)
            .await
            .unwrap()
            .unwrap_err();
        assert!(errors
            .message_for("product_id")
            .unwrap()
            .contains("Ballpark Franks"));
    }
}

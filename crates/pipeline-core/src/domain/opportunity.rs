//! Opportunity Entity
//!
//! A sales deal tracked on the pipeline board.

use chrono::{DateTime, NaiveDate, Utc};
use serde::{Deserialize, Serialize};

use super::stage::Stage;

pub type OpportunityId = u32;
pub type OrganizationId = u32;
pub type ContactId = u32;
pub type ProductId = u32;

/// Lifecycle status, independent of the pipeline stage
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "snake_case")]
pub enum OpportunityStatus {
    #[default]
    Active,
    OnHold,
    Nurturing,
    Stalled,
    Expired,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize, Default)]
#[serde(rename_all = "snake_case")]
pub enum Priority {
    Low,
    #[default]
    Medium,
    High,
    Critical,
}

/// Why a deal was won
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum WinReason {
    Relationship,
    ProductQuality,
    PriceCompetitive,
    Timing,
    Other,
}

/// Why a deal was lost
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum LossReason {
    PriceTooHigh,
    NoAuthorization,
    CompetitorRelationship,
    ProductFit,
    Timing,
    NoResponse,
    Other,
}

impl WinReason {
    pub const ALL: [WinReason; 5] = [
        WinReason::Relationship,
        WinReason::ProductQuality,
        WinReason::PriceCompetitive,
        WinReason::Timing,
        WinReason::Other,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            WinReason::Relationship => "relationship",
            WinReason::ProductQuality => "product_quality",
            WinReason::PriceCompetitive => "price_competitive",
            WinReason::Timing => "timing",
            WinReason::Other => "other",
        }
    }

    pub fn label(&self) -> &'static str {
        match self {
            WinReason::Relationship => "Strong relationship",
            WinReason::ProductQuality => "Product quality",
            WinReason::PriceCompetitive => "Competitive pricing",
            WinReason::Timing => "Right timing",
            WinReason::Other => "Other",
        }
    }

    pub fn parse(s: &str) -> Option<Self> {
        Self::ALL.into_iter().find(|r| r.as_str() == s)
    }

    pub fn is_other(&self) -> bool {
        matches!(self, WinReason::Other)
    }
}

impl LossReason {
    pub const ALL: [LossReason; 7] = [
        LossReason::PriceTooHigh,
        LossReason::NoAuthorization,
        LossReason::CompetitorRelationship,
        LossReason::ProductFit,
        LossReason::Timing,
        LossReason::NoResponse,
        LossReason::Other,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            LossReason::PriceTooHigh => "price_too_high",
            LossReason::NoAuthorization => "no_authorization",
            LossReason::CompetitorRelationship => "competitor_relationship",
            LossReason::ProductFit => "product_fit",
            LossReason::Timing => "timing",
            LossReason::NoResponse => "no_response",
            LossReason::Other => "other",
        }
    }

    pub fn label(&self) -> &'static str {
        match self {
            LossReason::PriceTooHigh => "Price too high",
            LossReason::NoAuthorization => "No distributor authorization",
            LossReason::CompetitorRelationship => "Competitor relationship",
            LossReason::ProductFit => "Product not a fit",
            LossReason::Timing => "Bad timing",
            LossReason::NoResponse => "Customer unresponsive",
            LossReason::Other => "Other",
        }
    }

    pub fn parse(s: &str) -> Option<Self> {
        Self::ALL.into_iter().find(|r| r.as_str() == s)
    }

    pub fn is_other(&self) -> bool {
        matches!(self, LossReason::Other)
    }
}

/// The captured reason for entering a terminal stage
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CloseReason {
    Won(WinReason),
    Lost(LossReason),
}

impl CloseReason {
    pub fn is_other(&self) -> bool {
        match self {
            CloseReason::Won(r) => r.is_other(),
            CloseReason::Lost(r) => r.is_other(),
        }
    }

    pub fn label(&self) -> &'static str {
        match self {
            CloseReason::Won(r) => r.label(),
            CloseReason::Lost(r) => r.label(),
        }
    }
}

/// A sales opportunity as the board sees it
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Opportunity {
    pub id: OpportunityId,
    pub name: String,
    pub stage: Stage,
    #[serde(default)]
    pub status: OpportunityStatus,
    #[serde(default)]
    pub priority: Priority,

    // Organization references
    pub customer_organization_id: OrganizationId,
    pub principal_organization_id: OrganizationId,
    #[serde(default)]
    pub distributor_organization_id: Option<OrganizationId>,
    #[serde(default)]
    pub contact_ids: Vec<ContactId>,

    #[serde(default)]
    pub estimated_close_date: Option<NaiveDate>,
    #[serde(default)]
    pub days_in_stage: u32,
    #[serde(default)]
    pub days_since_last_activity: Option<u32>,

    // Set only in terminal stages
    #[serde(default)]
    pub win_reason: Option<WinReason>,
    #[serde(default)]
    pub loss_reason: Option<LossReason>,
    #[serde(default)]
    pub close_reason_notes: Option<String>,

    #[serde(default)]
    pub created_at: Option<DateTime<Utc>>,
    #[serde(default)]
    pub updated_at: Option<DateTime<Utc>>,
}

impl Opportunity {
    /// Create an opportunity with default status/priority and no dates
    pub fn new(
        id: OpportunityId,
        name: impl Into<String>,
        stage: Stage,
        customer_organization_id: OrganizationId,
        principal_organization_id: OrganizationId,
    ) -> Self {
        Self {
            id,
            name: name.into(),
            stage,
            status: OpportunityStatus::Active,
            priority: Priority::Medium,
            customer_organization_id,
            principal_organization_id,
            distributor_organization_id: None,
            contact_ids: Vec::new(),
            estimated_close_date: None,
            days_in_stage: 0,
            days_since_last_activity: None,
            win_reason: None,
            loss_reason: None,
            close_reason_notes: None,
            created_at: None,
            updated_at: None,
        }
    }

    pub fn with_days_in_stage(mut self, days: u32) -> Self {
        self.days_in_stage = days;
        self
    }

    pub fn with_close_date(mut self, date: NaiveDate) -> Self {
        self.estimated_close_date = Some(date);
        self
    }

    pub fn is_closed(&self) -> bool {
        self.stage.is_terminal()
    }

    /// The recorded close reason, if the opportunity is in a terminal stage
    pub fn close_reason(&self) -> Option<CloseReason> {
        match self.stage {
            Stage::ClosedWon => self.win_reason.map(CloseReason::Won),
            Stage::ClosedLost => self.loss_reason.map(CloseReason::Lost),
            _ => None,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_opportunity_creation() {
        let opp = Opportunity::new(1, "Sysco - Chicago", Stage::NewLead, 10, 20);
        assert_eq!(opp.id, 1);
        assert_eq!(opp.status, OpportunityStatus::Active);
        assert!(!opp.is_closed());
        assert_eq!(opp.close_reason(), None);
    }

    #[test]
    fn test_deserialize_minimal_record() {
        let json = r#"{
            "id": 7,
            "name": "Deal",
            "stage": "demo_scheduled",
            "customer_organization_id": 1,
            "principal_organization_id": 2,
            "estimated_close_date": "2026-03-01",
            "days_in_stage": 4
        }"#;
        let opp: Opportunity = serde_json::from_str(json).unwrap();
        assert_eq!(opp.stage, Stage::DemoScheduled);
        assert_eq!(opp.days_in_stage, 4);
        assert_eq!(opp.estimated_close_date, NaiveDate::from_ymd_opt(2026, 3, 1));
        assert!(opp.contact_ids.is_empty());
    }

    #[test]
    fn test_close_reason_follows_stage() {
        let mut opp = Opportunity::new(1, "Deal", Stage::ClosedWon, 1, 2);
        opp.win_reason = Some(WinReason::Timing);
        opp.loss_reason = Some(LossReason::Timing);
        assert_eq!(opp.close_reason(), Some(CloseReason::Won(WinReason::Timing)));
    }

    #[test]
    fn test_reason_parse() {
        assert_eq!(WinReason::parse("product_quality"), Some(WinReason::ProductQuality));
        assert_eq!(LossReason::parse("no_response"), Some(LossReason::NoResponse));
        assert!(LossReason::parse("relationship").is_none());
        assert!(LossReason::Other.is_other());
    }
}

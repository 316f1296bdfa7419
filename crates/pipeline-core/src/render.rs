//! Renderer Registry
//!
//! Picks a renderer for a card by walking an ordered list of
//! `{key, predicate, renderer}` descriptors. The first predicate that
//! matches wins; a registry may carry a fallback for when none do.

use crate::domain::{Opportunity, StageHealth};

pub struct RendererDescriptor<C, R> {
    pub key: &'static str,
    pub predicate: fn(&C) -> bool,
    pub renderer: R,
}

pub struct RendererRegistry<C, R> {
    descriptors: Vec<RendererDescriptor<C, R>>,
    fallback: Option<R>,
}

impl<C, R> Default for RendererRegistry<C, R> {
    fn default() -> Self {
        Self {
            descriptors: Vec::new(),
            fallback: None,
        }
    }
}

impl<C, R> RendererRegistry<C, R> {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a descriptor; earlier registrations take precedence
    pub fn register(mut self, key: &'static str, predicate: fn(&C) -> bool, renderer: R) -> Self {
        self.descriptors.push(RendererDescriptor {
            key,
            predicate,
            renderer,
        });
        self
    }

    pub fn fallback(mut self, renderer: R) -> Self {
        self.fallback = Some(renderer);
        self
    }

    pub fn resolve(&self, ctx: &C) -> Option<&R> {
        self.descriptors
            .iter()
            .find(|d| (d.predicate)(ctx))
            .map(|d| &d.renderer)
            .or(self.fallback.as_ref())
    }

    pub fn resolve_key(&self, ctx: &C) -> Option<&'static str> {
        self.descriptors.iter().find(|d| (d.predicate)(ctx)).map(|d| d.key)
    }

    pub fn keys(&self) -> Vec<&'static str> {
        self.descriptors.iter().map(|d| d.key).collect()
    }
}

/// What a card renderer gets to look at
#[derive(Debug, Clone, PartialEq)]
pub struct CardContext {
    pub opportunity: Opportunity,
    pub health: StageHealth,
}

pub fn has_close_reason(ctx: &CardContext) -> bool {
    ctx.opportunity.close_reason().is_some()
}

pub fn is_urgent(ctx: &CardContext) -> bool {
    ctx.health.is_urgent()
}

pub fn is_warning(ctx: &CardContext) -> bool {
    ctx.health == StageHealth::Warning
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::{Stage, WinReason};

    fn registry() -> RendererRegistry<CardContext, &'static str> {
        RendererRegistry::new()
            .register("close_reason", has_close_reason, "reason badge")
            .register("urgent", is_urgent, "urgency badge")
            .fallback("plain")
    }

    #[test]
    fn test_first_matching_descriptor_wins() {
        let mut opp = Opportunity::new(1, "Deal", Stage::ClosedWon, 1, 1);
        opp.win_reason = Some(WinReason::Timing);
        let ctx = CardContext {
            opportunity: opp,
            health: StageHealth::Closed,
        };
        assert_eq!(registry().resolve(&ctx), Some(&"reason badge"));
        assert_eq!(registry().resolve_key(&ctx), Some("close_reason"));
    }

    #[test]
    fn test_fallback_when_nothing_matches() {
        let ctx = CardContext {
            opportunity: Opportunity::new(1, "Deal", Stage::NewLead, 1, 1),
            health: StageHealth::Healthy,
        };
        assert_eq!(registry().resolve(&ctx), Some(&"plain"));
        assert_eq!(registry().resolve_key(&ctx), None);

        let urgent = CardContext {
            health: StageHealth::Rotting,
            ..ctx
        };
        assert_eq!(registry().resolve(&urgent), Some(&"urgency badge"));
        assert_eq!(registry().keys(), vec!["close_reason", "urgent"]);
    }
}

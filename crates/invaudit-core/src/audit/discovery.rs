//! Discovery of parts missing from the reference store.
//!
//! When a line item's key is not found, the coordinator asks a
//! [`DiscoveryChannel`] what to do. Decisions are cached per key in a
//! [`DiscoverySession`] that lives for one processing run, so each unknown
//! part is presented at most once.

use std::collections::HashMap;

use rust_decimal::Decimal;
use serde::Serialize;
use tracing::{debug, info};
use uuid::Uuid;

use super::CompositeKey;
use crate::error::{AuditError, DiscoveryError, Result};
use crate::models::{ChargeType, InvoiceMeta, LineItem, NewPart, Part};
use crate::store::ReferenceStore;

/// What the channel is shown about an unknown part.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct DiscoveryContext {
    pub key: CompositeKey,
    pub item_code: String,
    pub description: String,
    pub charge_type: ChargeType,
    /// Rate billed on the invoice.
    pub discovered_price: Decimal,
    pub quantity: u32,
    pub invoice: InvoiceMeta,
}

impl DiscoveryContext {
    pub fn new(item: &LineItem, key: &CompositeKey, invoice: Option<&InvoiceMeta>) -> Self {
        Self {
            key: key.clone(),
            item_code: item.item_code.clone().unwrap_or_default(),
            description: item.description.clone(),
            charge_type: item.charge_type,
            discovered_price: item.rate,
            quantity: item.quantity,
            invoice: invoice.cloned().unwrap_or_default(),
        }
    }
}

/// Choice made for an unknown part.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Decision {
    /// Add the part at the billed rate.
    AddDiscoveredPrice,
    /// Add the part at another price.
    AddWithPrice(Decimal),
    /// Leave this part unknown.
    Skip,
    /// Leave this and every later unknown part unknown.
    SkipAll,
    /// Stop processing.
    Abort,
}

/// Source of discovery decisions.
pub trait DiscoveryChannel {
    /// Present an unknown part and wait for a decision.
    fn present(&mut self, ctx: &DiscoveryContext) -> std::result::Result<Decision, DiscoveryError>;
}

/// Channel that declines every unknown part. Used for batch runs.
#[derive(Debug, Clone, Copy, Default)]
pub struct AutoSkip;

impl DiscoveryChannel for AutoSkip {
    fn present(&mut self, ctx: &DiscoveryContext) -> std::result::Result<Decision, DiscoveryError> {
        debug!("Auto-skipping unknown part {}", ctx.key);
        Ok(Decision::Skip)
    }
}

/// Channel replaying a fixed list of decisions.
#[cfg(test)]
#[derive(Debug, Clone, Default)]
pub struct ScriptedChannel {
    decisions: std::collections::VecDeque<Decision>,
    /// Every context presented so far.
    pub presented: Vec<DiscoveryContext>,
}

#[cfg(test)]
impl ScriptedChannel {
    pub fn new(decisions: impl IntoIterator<Item = Decision>) -> Self {
        Self {
            decisions: decisions.into_iter().collect(),
            presented: Vec::new(),
        }
    }
}

#[cfg(test)]
impl DiscoveryChannel for ScriptedChannel {
    fn present(&mut self, ctx: &DiscoveryContext) -> std::result::Result<Decision, DiscoveryError> {
        self.presented.push(ctx.clone());
        self.decisions
            .pop_front()
            .ok_or_else(|| DiscoveryError::Channel(format!("no decision scripted for {}", ctx.key)))
    }
}

/// Decision recorded for a key during a run.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RecordedDecision {
    Added(Decimal),
    Skipped,
}

/// Per-run discovery state. Never persisted.
#[derive(Debug, Clone)]
pub struct DiscoverySession {
    id: Uuid,
    decisions: HashMap<CompositeKey, RecordedDecision>,
    skip_all: bool,
    added: usize,
    skipped: usize,
}

impl DiscoverySession {
    pub fn new() -> Self {
        Self {
            id: Uuid::new_v4(),
            decisions: HashMap::new(),
            skip_all: false,
            added: 0,
            skipped: 0,
        }
    }

    pub fn id(&self) -> Uuid {
        self.id
    }

    /// Decision already made for a key in this run.
    pub fn decision(&self, key: &CompositeKey) -> Option<RecordedDecision> {
        self.decisions.get(key).copied()
    }

    pub fn is_skipping_all(&self) -> bool {
        self.skip_all
    }

    /// Parts added during this run.
    pub fn added(&self) -> usize {
        self.added
    }

    /// Parts left unknown during this run.
    pub fn skipped(&self) -> usize {
        self.skipped
    }

    fn record_skip(&mut self, key: &CompositeKey) {
        self.decisions.insert(key.clone(), RecordedDecision::Skipped);
        self.skipped += 1;
    }
}

impl Default for DiscoverySession {
    fn default() -> Self {
        Self::new()
    }
}

/// Result of resolving an unknown part.
#[derive(Debug, Clone, PartialEq)]
pub enum DiscoveryOutcome {
    /// A part was created for the key.
    Created(Part),
    /// The part stays unknown.
    Declined,
}

/// Drives the discovery exchange for unknown parts.
pub struct DiscoveryCoordinator<'a> {
    channel: &'a mut dyn DiscoveryChannel,
}

impl<'a> DiscoveryCoordinator<'a> {
    pub fn new(channel: &'a mut dyn DiscoveryChannel) -> Self {
        Self { channel }
    }

    /// Resolve an unknown key, prompting at most once per key per session.
    ///
    /// Returns [`AuditError::Aborted`] if the channel aborts; nothing is
    /// stored for that key.
    pub fn resolve(
        &mut self,
        item: &LineItem,
        key: &CompositeKey,
        invoice: Option<&InvoiceMeta>,
        store: &mut dyn ReferenceStore,
        session: &mut DiscoverySession,
    ) -> Result<DiscoveryOutcome> {
        match session.decision(key) {
            Some(RecordedDecision::Skipped) => {
                debug!("Replaying skip for {}", key);
                return Ok(DiscoveryOutcome::Declined);
            }
            Some(RecordedDecision::Added(_)) => {
                debug!("Replaying add for {}", key);
                return store
                    .find(key)?
                    .map(DiscoveryOutcome::Created)
                    .ok_or_else(|| AuditError::Consistency(key.to_string()));
            }
            None => {}
        }

        if session.skip_all {
            session.record_skip(key);
            return Ok(DiscoveryOutcome::Declined);
        }

        let ctx = DiscoveryContext::new(item, key, invoice);
        let decision = self.channel.present(&ctx)?;

        let price = match decision {
            Decision::AddDiscoveredPrice => item.rate,
            Decision::AddWithPrice(price) => price,
            Decision::Skip => {
                session.record_skip(key);
                return Ok(DiscoveryOutcome::Declined);
            }
            Decision::SkipAll => {
                info!("Skipping all remaining unknown parts");
                session.skip_all = true;
                session.record_skip(key);
                return Ok(DiscoveryOutcome::Declined);
            }
            Decision::Abort => {
                info!("Processing aborted while resolving {}", key);
                return Err(AuditError::Aborted);
            }
        };

        if price.is_sign_negative() && !price.is_zero() {
            return Err(DiscoveryError::InvalidPrice(price.to_string()).into());
        }

        let metadata = serde_json::json!({
            "source": "discovery",
            "session": session.id.to_string(),
            "discovered_price": item.rate.to_string(),
            "invoice": ctx.invoice.number,
        });
        let part = store.create(NewPart::from_line_item(item, key.clone(), price).with_metadata(metadata))?;

        session.decisions.insert(key.clone(), RecordedDecision::Added(price));
        session.added += 1;
        info!("Added part {} at {}", key, price);

        Ok(DiscoveryOutcome::Created(part))
    }
}

//! Price validation of line items against authorized parts.

use rust_decimal::Decimal;
use tracing::{debug, warn};

use super::discovery::{DiscoveryCoordinator, DiscoveryOutcome, DiscoverySession};
use super::CompositeKey;
use crate::error::{AuditError, Result};
use crate::models::{InvoiceMeta, LineItem, Part, ValidationConfig, ValidationResult, ValidationStatus};
use crate::store::ReferenceStore;

/// Validates billed rates against the reference store.
#[derive(Debug, Clone)]
pub struct ValidationEngine {
    tolerance: Decimal,
}

impl ValidationEngine {
    /// Create an engine with the given price tolerance.
    pub fn new(tolerance: Decimal) -> Self {
        Self { tolerance }
    }

    pub fn from_config(config: &ValidationConfig) -> Self {
        Self::new(config.tolerance)
    }

    pub fn tolerance(&self) -> Decimal {
        self.tolerance
    }

    /// Validate one line item.
    ///
    /// Unknown parts go through discovery; a part created there is looked
    /// up again with the same key. Errors are returned only for conditions
    /// that stop the run (store failure, abort, consistency violation).
    pub fn validate(
        &self,
        item: &LineItem,
        store: &mut dyn ReferenceStore,
        discovery: &mut DiscoveryCoordinator<'_>,
        session: &mut DiscoverySession,
        invoice: Option<&InvoiceMeta>,
    ) -> Result<ValidationResult> {
        let result = self.resolve_and_compare(item, store, discovery, session, invoice)?;
        Ok(match invoice {
            Some(meta) => result.with_invoice(meta.clone()),
            None => result,
        })
    }

    fn resolve_and_compare(
        &self,
        item: &LineItem,
        store: &mut dyn ReferenceStore,
        discovery: &mut DiscoveryCoordinator<'_>,
        session: &mut DiscoverySession,
        invoice: Option<&InvoiceMeta>,
    ) -> Result<ValidationResult> {
        let Some(key) = CompositeKey::for_item(item) else {
            debug!("Line {} has no item code", item.line_number);
            return Ok(ValidationResult::unresolved(
                item,
                ValidationStatus::Failed,
                "missing part number".to_string(),
            ));
        };

        if let Some(part) = store.find(&key)? {
            return Ok(self.compare(item, part));
        }

        debug!("Part {} not found, starting discovery", key);
        match discovery.resolve(item, &key, invoice, store, session)? {
            DiscoveryOutcome::Created(_) => {
                let part = store
                    .find(&key)?
                    .ok_or_else(|| AuditError::Consistency(key.to_string()))?;
                Ok(self.compare(item, part))
            }
            DiscoveryOutcome::Declined => Ok(ValidationResult::unresolved(
                item,
                ValidationStatus::Unknown,
                "part not found; user declined to add".to_string(),
            )),
        }
    }

    /// Compare a line item's rate with a resolved part.
    pub fn compare(&self, item: &LineItem, part: Part) -> ValidationResult {
        let authorized = part.authorized_price;
        let signed = item.rate - authorized;
        let difference = signed.abs();

        let (status, errors) = if difference <= self.tolerance {
            (ValidationStatus::Passed, Vec::new())
        } else {
            warn!(
                "Line {}: billed {} but authorized {} for {}",
                item.line_number, item.rate, authorized, part.key
            );
            (
                ValidationStatus::Failed,
                vec![format!(
                    "price mismatch: billed {}, authorized {} (difference {})",
                    item.rate,
                    authorized,
                    signed_amount(signed)
                )],
            )
        };

        ValidationResult {
            line_item: item.clone(),
            part: Some(part),
            extracted_price: item.rate,
            authorized_price: Some(authorized),
            price_difference: Some(difference),
            status,
            errors,
            invoice: None,
        }
    }

    /// Validate line items in order, stopping at the first run-halting error.
    pub fn validate_all(
        &self,
        items: &[LineItem],
        store: &mut dyn ReferenceStore,
        discovery: &mut DiscoveryCoordinator<'_>,
        session: &mut DiscoverySession,
        invoice: Option<&InvoiceMeta>,
    ) -> Result<Vec<ValidationResult>> {
        let mut results = Vec::with_capacity(items.len());
        for item in items {
            results.push(self.validate(item, store, discovery, session, invoice)?);
        }
        Ok(results)
    }
}

impl Default for ValidationEngine {
    fn default() -> Self {
        Self::from_config(&ValidationConfig::default())
    }
}

fn signed_amount(value: Decimal) -> String {
    if value.is_sign_positive() && !value.is_zero() {
        format!("+{}", value)
    } else {
        value.to_string()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::audit::{Decision, DiscoveryChannel, ScriptedChannel};
    use crate::error::StoreError;
    use crate::models::{Alignment, ChargeType, NewPart};
    use crate::store::MemoryStore;
    use chrono::NaiveDate;
    use pretty_assertions::assert_eq;
    use std::str::FromStr;

    fn dec(s: &str) -> Decimal {
        Decimal::from_str(s).unwrap()
    }

    fn item(code: Option<&str>, rate: &str) -> LineItem {
        LineItem {
            line_number: 4,
            page: 1,
            subject: Some("MARIA".to_string()),
            item_code: code.map(str::to_string),
            variant: None,
            description: "SHIRT WORK LS BTN COTTON".to_string(),
            size: None,
            charge_type: ChargeType::Rent,
            quantity: 3,
            rate: dec(rate),
            total: dec(rate) * Decimal::from(3),
            alignment: Alignment::Confident,
            raw_text: String::new(),
        }
    }

    fn seeded(price: &str) -> MemoryStore {
        MemoryStore::with_parts([NewPart::new(
            ChargeType::Rent,
            "shirt work ls btn cotton",
            "gs0448",
            dec(price),
        )])
        .unwrap()
    }

    fn run(
        channel: &mut dyn DiscoveryChannel,
        store: &mut dyn ReferenceStore,
        line: &LineItem,
    ) -> Result<ValidationResult> {
        let engine = ValidationEngine::default();
        let mut session = DiscoverySession::new();
        let mut discovery = DiscoveryCoordinator::new(channel);
        engine.validate(line, store, &mut discovery, &mut session, None)
    }

    #[test]
    fn test_passed_within_tolerance() {
        let mut store = seeded("0.350");
        let mut channel = ScriptedChannel::default();

        let result = run(&mut channel, &mut store, &item(Some("GS0448"), "0.3505")).unwrap();

        assert_eq!(result.status, ValidationStatus::Passed);
        assert_eq!(result.price_difference, Some(dec("0.0005")));
        assert!(result.errors.is_empty());
        assert!(channel.presented.is_empty());
    }

    #[test]
    fn test_tolerance_boundary() {
        let mut store = seeded("0.350");
        let mut channel = ScriptedChannel::default();

        let at_limit = run(&mut channel, &mut store, &item(Some("GS0448"), "0.351")).unwrap();
        assert_eq!(at_limit.status, ValidationStatus::Passed);
        assert_eq!(at_limit.price_difference, Some(dec("0.001")));

        let below = run(&mut channel, &mut store, &item(Some("GS0448"), "0.349")).unwrap();
        assert_eq!(below.status, ValidationStatus::Passed);

        let over = run(&mut channel, &mut store, &item(Some("GS0448"), "0.3511")).unwrap();
        assert_eq!(over.status, ValidationStatus::Failed);
        assert_eq!(over.price_difference, Some(dec("0.0011")));
    }

    #[test]
    fn test_failed_reports_signed_difference() {
        let mut store = seeded("0.350");
        let mut channel = ScriptedChannel::default();

        let result = run(&mut channel, &mut store, &item(Some("GS0448"), "0.400")).unwrap();

        assert_eq!(result.status, ValidationStatus::Failed);
        assert_eq!(result.authorized_price, Some(dec("0.350")));
        assert_eq!(result.price_difference, Some(dec("0.050")));
        assert_eq!(
            result.errors,
            vec!["price mismatch: billed 0.400, authorized 0.350 (difference +0.050)"]
        );
    }

    #[test]
    fn test_undercharge_is_failed() {
        let mut store = seeded("0.350");
        let mut channel = ScriptedChannel::default();

        let result = run(&mut channel, &mut store, &item(Some("GS0448"), "0.300")).unwrap();
        assert_eq!(result.status, ValidationStatus::Failed);
        assert!(result.errors[0].ends_with("(difference -0.050)"));
    }

    #[test]
    fn test_missing_part_number() {
        let mut store = seeded("0.350");
        let mut channel = ScriptedChannel::default();

        let result = run(&mut channel, &mut store, &item(None, "0.350")).unwrap();
        assert_eq!(result.status, ValidationStatus::Failed);
        assert_eq!(result.errors, vec!["missing part number"]);
        assert_eq!(result.part, None);
    }

    #[test]
    fn test_unknown_part_skipped() {
        let mut store = MemoryStore::new();
        let mut channel = ScriptedChannel::new([Decision::Skip]);

        let result = run(&mut channel, &mut store, &item(Some("GS0448"), "0.350")).unwrap();

        assert_eq!(result.status, ValidationStatus::Unknown);
        assert_eq!(result.errors, vec!["part not found; user declined to add"]);
        assert!(store.is_empty());
    }

    #[test]
    fn test_discovered_part_is_revalidated() {
        let mut store = MemoryStore::new();
        let mut channel = ScriptedChannel::new([Decision::AddWithPrice(dec("0.250"))]);

        let result = run(&mut channel, &mut store, &item(Some("GS0448"), "0.300")).unwrap();

        assert_eq!(result.status, ValidationStatus::Failed);
        assert_eq!(result.authorized_price, Some(dec("0.250")));
        assert_eq!(store.len(), 1);
    }

    #[test]
    fn test_invoice_meta_attached() {
        let mut store = seeded("0.350");
        let mut channel = ScriptedChannel::default();
        let mut session = DiscoverySession::new();
        let mut discovery = DiscoveryCoordinator::new(&mut channel);
        let meta = InvoiceMeta {
            number: Some("4062217350".to_string()),
            date: NaiveDate::from_ymd_opt(2024, 3, 14),
        };

        let result = ValidationEngine::default()
            .validate(&item(Some("GS0448"), "0.350"), &mut store, &mut discovery, &mut session, Some(&meta))
            .unwrap();
        assert_eq!(result.invoice, Some(meta));
    }

    /// Store that accepts creates but never finds anything.
    struct ForgetfulStore;

    impl ReferenceStore for ForgetfulStore {
        fn find(&self, _key: &CompositeKey) -> std::result::Result<Option<Part>, StoreError> {
            Ok(None)
        }

        fn create(&mut self, part: NewPart) -> std::result::Result<Part, StoreError> {
            Ok(part.into_part(chrono::Utc::now()))
        }

        fn list(&self) -> std::result::Result<Vec<Part>, StoreError> {
            Ok(Vec::new())
        }
    }

    #[test]
    fn test_second_miss_is_consistency_violation() {
        let mut store = ForgetfulStore;
        let mut channel = ScriptedChannel::new([Decision::AddDiscoveredPrice]);

        let err = run(&mut channel, &mut store, &item(Some("GS0448"), "0.300")).unwrap_err();
        assert!(matches!(err, AuditError::Consistency(_)));
        assert!(err.halts_run());
    }

    #[test]
    fn test_validate_all_keeps_order() {
        let mut store = seeded("0.350");
        let mut channel = ScriptedChannel::new([Decision::Skip]);
        let mut session = DiscoverySession::new();
        let mut discovery = DiscoveryCoordinator::new(&mut channel);

        let items = vec![
            item(Some("GS0448"), "0.350"),
            item(Some("ZZ9999"), "1.000"),
            item(Some("ZZ9999"), "1.000"),
        ];
        let results = ValidationEngine::default()
            .validate_all(&items, &mut store, &mut discovery, &mut session, None)
            .unwrap();

        let statuses: Vec<ValidationStatus> = results.iter().map(|r| r.status).collect();
        assert_eq!(
            statuses,
            vec![ValidationStatus::Passed, ValidationStatus::Unknown, ValidationStatus::Unknown]
        );
        assert_eq!(session.skipped(), 1);
    }
}

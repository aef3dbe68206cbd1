//! Posting business events as journal vouchers

use bigdecimal::{BigDecimal, Zero};
use chrono::NaiveDate;
use serde::{Deserialize, Serialize};

use crate::config::PostingConfig;
use crate::procurement::PurchaseDocument;
use crate::traits::*;
use crate::types::*;

/// One requested line of a posting, addressed by account code
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PostingLine {
    pub account_code: String,
    pub debit: BigDecimal,
    pub credit: BigDecimal,
}

/// Business event to be turned into a journal voucher
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PostingEvent {
    /// Idempotency key: at most one voucher exists per source document
    pub source_document_id: Option<String>,
    pub date: NaiveDate,
    pub description: String,
    pub lines: Vec<PostingLine>,
}

impl PostingEvent {
    /// Standard purchase mapping.
    ///
    /// One debit per distinct target account, in order of first appearance: the
    /// line's own account code, else the inventory account for stocked lines, else
    /// the expense account. One credit to the payable account for the document total.
    pub fn for_purchase_document(document: &PurchaseDocument, config: &PostingConfig) -> Self {
        let scale = config.minor_unit_scale;
        let mut debits: Vec<(String, BigDecimal)> = Vec::new();

        for line in &document.lines {
            let code = match (&line.account_code, &line.item_id) {
                (Some(code), _) => code.clone(),
                (None, Some(_)) => config.inventory_account_code.clone(),
                (None, None) => config.expense_account_code.clone(),
            };
            let amount = line.amount(scale);
            match debits.iter_mut().find(|(c, _)| *c == code) {
                Some((_, total)) => *total += amount,
                None => debits.push((code, amount)),
            }
        }

        let mut builder = VoucherBuilder::new(
            document.date,
            format!(
                "Purchase from {} for {}",
                document.counterparty_name, document.project_name
            ),
        )
        .source(document.id.clone());

        for (code, amount) in debits {
            if !amount.is_zero() {
                builder = builder.debit(code, amount);
            }
        }

        let total = document.total_with_scale(scale);
        if !total.is_zero() {
            builder = builder.credit(config.payable_account_code.clone(), total);
        }

        builder.build()
    }

    pub fn total_debits(&self) -> BigDecimal {
        self.lines.iter().map(|l| &l.debit).sum()
    }

    pub fn total_credits(&self) -> BigDecimal {
        self.lines.iter().map(|l| &l.credit).sum()
    }
}

/// Voucher builder for assembling posting events
#[derive(Debug)]
pub struct VoucherBuilder {
    event: PostingEvent,
}

impl VoucherBuilder {
    pub fn new(date: NaiveDate, description: impl Into<String>) -> Self {
        Self {
            event: PostingEvent {
                source_document_id: None,
                date,
                description: description.into(),
                lines: Vec::new(),
            },
        }
    }

    /// Set the source document (idempotency key)
    pub fn source(mut self, source_document_id: impl Into<String>) -> Self {
        self.event.source_document_id = Some(source_document_id.into());
        self
    }

    /// Add a debit line
    pub fn debit(mut self, account_code: impl Into<String>, amount: BigDecimal) -> Self {
        self.event.lines.push(PostingLine {
            account_code: account_code.into(),
            debit: amount,
            credit: BigDecimal::zero(),
        });
        self
    }

    /// Add a credit line
    pub fn credit(mut self, account_code: impl Into<String>, amount: BigDecimal) -> Self {
        self.event.lines.push(PostingLine {
            account_code: account_code.into(),
            debit: BigDecimal::zero(),
            credit: amount,
        });
        self
    }

    /// Add a custom line
    pub fn line(mut self, line: PostingLine) -> Self {
        self.event.lines.push(line);
        self
    }

    /// Finish the event. Balance is checked when the event is posted.
    pub fn build(self) -> PostingEvent {
        self.event
    }
}

/// Structural checks that need no storage access
pub fn validate_posting(event: &PostingEvent) -> LedgerResult<()> {
    if event.lines.is_empty() {
        return Err(LedgerError::validation(
            "Posting must have at least one line",
        ));
    }

    for (idx, line) in event.lines.iter().enumerate() {
        if line.debit < BigDecimal::zero() || line.credit < BigDecimal::zero() {
            return Err(LedgerError::Validation(format!(
                "Posting line {}: amounts cannot be negative",
                idx + 1
            )));
        }
        if line.debit.is_zero() == line.credit.is_zero() {
            return Err(LedgerError::Validation(format!(
                "Posting line {}: exactly one of debit or credit must be non-zero",
                idx + 1
            )));
        }
    }

    let debits = event.total_debits();
    let credits = event.total_credits();
    if debits != credits {
        return Err(LedgerError::UnbalancedPosting { debits, credits });
    }

    Ok(())
}

/// Ledger poster: the only producer of journal vouchers
pub struct LedgerPoster<S: LedgerStorage> {
    storage: S,
}

impl<S: LedgerStorage> LedgerPoster<S> {
    pub fn new(storage: S) -> Self {
        Self { storage }
    }

    /// Validate an event and resolve its account codes into an unsaved voucher
    pub async fn draft(&self, event: &PostingEvent) -> LedgerResult<JournalVoucher> {
        validate_posting(event)?;

        let mut lines = Vec::with_capacity(event.lines.len());
        for line in &event.lines {
            let account = self
                .storage
                .get_account_by_code(&line.account_code)
                .await?
                .ok_or_else(|| LedgerError::UnknownAccount(line.account_code.clone()))?;
            lines.push(VoucherLine {
                account_id: account.id,
                debit: line.debit.clone(),
                credit: line.credit.clone(),
            });
        }

        Ok(JournalVoucher {
            id: uuid::Uuid::new_v4().to_string(),
            source_document_id: event.source_document_id.clone(),
            date: event.date,
            description: event.description.clone(),
            lines,
            created_at: chrono::Utc::now().naive_utc(),
        })
    }

    /// Draft and persist a voucher.
    ///
    /// Purchase documents are posted only by their completing transition, so a
    /// source id naming a stored document is refused with `Conflict`.
    pub async fn post(&mut self, event: PostingEvent) -> LedgerResult<JournalVoucher> {
        if let Some(source) = &event.source_document_id {
            if self.storage.get_document(source).await?.is_some() {
                return Err(LedgerError::Conflict(format!(
                    "Purchase document '{}' is posted by its completion, not directly",
                    source
                )));
            }
        }
        let voucher = self.draft(&event).await?;
        self.storage.save_voucher(&voucher).await?;

        tracing::info!(
            voucher_id = %voucher.id,
            source = ?voucher.source_document_id,
            amount = %voucher.total_debits(),
            "journal voucher posted"
        );

        Ok(voucher)
    }

    /// Get a voucher by ID
    pub async fn get(&self, voucher_id: &str) -> LedgerResult<Option<JournalVoucher>> {
        self.storage.get_voucher(voucher_id).await
    }

    /// Voucher posted for a source document, if any
    pub async fn find_by_source(
        &self,
        source_document_id: &str,
    ) -> LedgerResult<Option<JournalVoucher>> {
        self.storage.find_voucher_by_source(source_document_id).await
    }

    pub async fn list(&self) -> LedgerResult<Vec<JournalVoucher>> {
        self.storage.list_vouchers().await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ledger::account::{utils::seed_standard_chart, AccountRegistry};
    use crate::procurement::{DocumentInput, DocumentLine};
    use crate::utils::memory_storage::MemoryStorage;

    fn date() -> NaiveDate {
        NaiveDate::from_ymd_opt(2024, 4, 2).unwrap()
    }

    async fn seeded() -> MemoryStorage {
        let storage = MemoryStorage::new();
        let mut registry = AccountRegistry::new(storage.clone());
        seed_standard_chart(&mut registry).await.unwrap();
        storage
    }

    #[test]
    fn purchase_mapping_groups_debits_by_account() {
        let document = PurchaseDocument::new(DocumentInput {
            counterparty_name: "Hillside Hire".to_string(),
            project_name: "Depot Extension".to_string(),
            warehouse_id: "main".to_string(),
            date: date(),
            lines: vec![
                DocumentLine::new("Rebar", BigDecimal::from(2), BigDecimal::from(100))
                    .with_item("rebar"),
                DocumentLine::new("Excavator hire", BigDecimal::from(3), BigDecimal::from(40))
                    .with_account("5300"),
                DocumentLine::new("Cement", BigDecimal::from(1), BigDecimal::from(50))
                    .with_item("cement"),
                DocumentLine::new("Site cleaning", BigDecimal::from(1), BigDecimal::from(30)),
            ],
        });

        let event = PostingEvent::for_purchase_document(&document, &PostingConfig::default());
        let debits: Vec<(&str, BigDecimal)> = event
            .lines
            .iter()
            .filter(|l| !l.debit.is_zero())
            .map(|l| (l.account_code.as_str(), l.debit.clone()))
            .collect();

        assert_eq!(
            debits,
            vec![
                ("1300", BigDecimal::from(250)),
                ("5300", BigDecimal::from(120)),
                ("5100", BigDecimal::from(30)),
            ]
        );
        let credit = event.lines.last().unwrap();
        assert_eq!(credit.account_code, "2100");
        assert_eq!(credit.credit, BigDecimal::from(400));
        assert_eq!(event.source_document_id.as_deref(), Some(document.id.as_str()));
        assert!(validate_posting(&event).is_ok());
    }

    #[test]
    fn validation_rejects_two_sided_and_negative_lines() {
        let two_sided = VoucherBuilder::new(date(), "bad")
            .line(PostingLine {
                account_code: "1100".to_string(),
                debit: BigDecimal::from(1),
                credit: BigDecimal::from(1),
            })
            .build();
        assert!(matches!(validate_posting(&two_sided), Err(LedgerError::Validation(_))));

        let negative = VoucherBuilder::new(date(), "bad")
            .debit("1100", BigDecimal::from(-5))
            .credit("2100", BigDecimal::from(-5))
            .build();
        assert!(matches!(validate_posting(&negative), Err(LedgerError::Validation(_))));

        let empty = VoucherBuilder::new(date(), "empty").build();
        assert!(matches!(validate_posting(&empty), Err(LedgerError::Validation(_))));
    }

    #[tokio::test]
    async fn unbalanced_posting_is_rejected_without_writing() {
        let storage = seeded().await;
        let mut poster = LedgerPoster::new(storage.clone());

        let event = VoucherBuilder::new(date(), "Short credit")
            .debit("5100", BigDecimal::from(1000))
            .credit("2100", BigDecimal::from(500))
            .build();

        let err = poster.post(event).await.unwrap_err();
        assert!(matches!(err, LedgerError::UnbalancedPosting { .. }));
        assert!(poster.list().await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn unknown_account_code_is_rejected() {
        let mut poster = LedgerPoster::new(seeded().await);
        let event = VoucherBuilder::new(date(), "Typo")
            .debit("5999", BigDecimal::from(10))
            .credit("2100", BigDecimal::from(10))
            .build();

        let err = poster.post(event).await.unwrap_err();
        assert!(matches!(err, LedgerError::UnknownAccount(code) if code == "5999"));
        assert!(poster.list().await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn post_resolves_codes_and_enforces_one_voucher_per_source() {
        let storage = seeded().await;
        let mut poster = LedgerPoster::new(storage.clone());

        let event = VoucherBuilder::new(date(), "Scaffold hire")
            .source("po-1")
            .debit("5300", "812.50".parse::<BigDecimal>().unwrap())
            .credit("2100", "812.50".parse::<BigDecimal>().unwrap())
            .build();

        let voucher = poster.post(event.clone()).await.unwrap();
        assert!(voucher.is_balanced());
        let hire = storage.get_account_by_code("5300").await.unwrap().unwrap();
        assert_eq!(voucher.lines[0].account_id, hire.id);

        let found = poster.find_by_source("po-1").await.unwrap().unwrap();
        assert_eq!(found.id, voucher.id);

        let again = poster.post(event).await;
        assert!(matches!(again, Err(LedgerError::Conflict(_))));
        assert_eq!(poster.list().await.unwrap().len(), 1);
    }

    #[tokio::test]
    async fn post_refuses_stored_purchase_document_as_source() {
        let mut storage = seeded().await;
        let document = PurchaseDocument::new(DocumentInput {
            counterparty_name: "Hillside Hire".to_string(),
            project_name: "Depot Extension".to_string(),
            warehouse_id: "main".to_string(),
            date: date(),
            lines: Vec::new(),
        });
        storage.save_document(&document).await.unwrap();
        let mut poster = LedgerPoster::new(storage.clone());

        let event = VoucherBuilder::new(date(), "Manual entry")
            .source(document.id.clone())
            .debit("5300", BigDecimal::from(1))
            .credit("1100", BigDecimal::from(1))
            .build();

        let err = poster.post(event).await.unwrap_err();
        assert!(matches!(err, LedgerError::Conflict(_)));
        assert!(poster.find_by_source(&document.id).await.unwrap().is_none());
    }
}

//! # Settlement Service
//!
//! Orchestrates the close of a served sale:
//!
//! ```text
//! settle(sale, payment, buyer?)
//!   1. validate      sale served, buyer identity, lines
//!   2. stock         resolve recipes → pre-check shortfalls → FIFO allocate
//!   3. sequential    issue gapless number, build access key
//!   4. compose       canonical document + printable ticket
//!   5. submit        sign → authority verdict (bounded by timeout)
//!   6. commit        record verdict, close the sale
//! ```
//!
//! ## Failure Semantics
//! Steps 1-2 abort before the sale or any fiscal state changes (the stock
//! allocation rolls itself back on shortfall). From step 3 on, failures
//! leave the sale `served` with its stock deducted and a document on file:
//! a rejected document is retried under a fresh sequential without
//! repeating the stock work, and an indeterminate submission is resolved by
//! querying the authority on the next attempt rather than re-submitting.
//!
//! Sequentials issued for documents the authority later rejects are
//! abandoned, never reused.

use std::collections::BTreeMap;
use std::sync::Arc;

use chrono::{DateTime, Utc};
use rand::Rng;
use tracing::{debug, info, warn};
use uuid::Uuid;

use crate::authority::{AuthorityClient, AuthorityVerdict};
use crate::config::SettlementConfig;
use crate::error::{FiscalResult, SettlementError, Shortage};
use crate::signer::DocumentSigner;
use fogon_core::access_key::{build_access_key, AccessKeyInput, EmissionType};
use fogon_core::document::{compose, ComposeInput, ComposeLine, ComposedDocument};
use fogon_core::tax::TaxEngine;
use fogon_core::ticket::render_ticket;
use fogon_core::validation::{validate_buyer, validate_line_quantity};
use fogon_core::{
    AuthorityLogEntry, AuthorityStatus, BuyerIdentity, CompanyProfile, FiscalDocument,
    PaymentMethod, Sale, SaleLine, SaleStatus,
};
use fogon_db::{Database, ItemRequirement, SaleClose};

// =============================================================================
// Request / Receipt
// =============================================================================

/// A cashier's request to settle one sale.
#[derive(Debug, Clone)]
pub struct SettlementRequest {
    pub sale_id: String,
    pub payment_method: PaymentMethod,
    /// Buyer data; `None` settles to the final consumer.
    pub buyer: Option<BuyerIdentity>,
    /// Staff member performing the settlement.
    pub settled_by: Option<String>,
}

/// A successful settlement: the authorized document plus any soft-policy
/// warnings raised along the way (missing recipes, tax rate fallbacks).
#[derive(Debug, Clone)]
pub struct SettlementReceipt {
    pub document: FiscalDocument,
    pub warnings: Vec<String>,
}

// =============================================================================
// Settlement Service
// =============================================================================

/// The settlement orchestrator. Holds the database handle, the issuer
/// profile, and the authority/signer seams.
pub struct SettlementService {
    db: Database,
    profile: CompanyProfile,
    config: SettlementConfig,
    authority: Arc<dyn AuthorityClient>,
    signer: Arc<dyn DocumentSigner>,
}

impl SettlementService {
    pub fn new(
        db: Database,
        profile: CompanyProfile,
        config: SettlementConfig,
        authority: Arc<dyn AuthorityClient>,
        signer: Arc<dyn DocumentSigner>,
    ) -> Self {
        SettlementService {
            db,
            profile,
            config,
            authority,
            signer,
        }
    }

    /// Settles a served sale end to end.
    pub async fn settle(&self, request: SettlementRequest) -> FiscalResult<SettlementReceipt> {
        let sale = self.db.sales().get_sale(&request.sale_id).await?;

        if sale.status == SaleStatus::Closed {
            return Err(SettlementError::AlreadySettled {
                sale_id: sale.id,
                ticket_number: sale.ticket_number,
            });
        }
        if !sale.is_settleable() {
            return Err(SettlementError::NotSettleable {
                sale_id: sale.id,
                status: sale.status,
            });
        }

        let buyer = request
            .buyer
            .clone()
            .unwrap_or_else(BuyerIdentity::final_consumer);
        validate_buyer(&buyer).map_err(SettlementError::Validation)?;

        let lines = self.db.sales().get_lines(&sale.id).await?;
        if lines.is_empty() {
            return Err(SettlementError::EmptySale { sale_id: sale.id });
        }
        for line in &lines {
            validate_line_quantity(line.quantity).map_err(SettlementError::Validation)?;
        }

        let mut warnings = Vec::new();

        // Resume work for a sale with an earlier document on file.
        let skip_stock = match self.db.fiscal().latest_for_sale(&sale.id).await? {
            Some(doc) => match doc.status {
                AuthorityStatus::Authorized => {
                    // Crash between verdict and close: just finish the commit.
                    return self.finalize(&sale, &request, doc, warnings).await;
                }
                AuthorityStatus::Pending => {
                    match self.resolve_pending(&sale, &request, doc, &mut warnings).await? {
                        Some(receipt) => return Ok(receipt),
                        None => true,
                    }
                }
                AuthorityStatus::Rejected => true,
            },
            None => false,
        };

        if skip_stock {
            info!(sale_id = %sale.id, "Retrying settlement; stock already deducted");
        } else {
            let requirements = self.gather_requirements(&lines, &mut warnings).await?;
            self.precheck_stock(&requirements).await?;
            self.db.batches().allocate(&requirements, &sale.id).await?;
        }

        let emitted_at = Utc::now();
        let (document, composed) = self
            .issue_document(&sale, &lines, &buyer, &request, emitted_at, &mut warnings)
            .await?;
        self.db.fiscal().insert_document(&document).await?;

        let signed_text = self.signer.sign(&composed.text)?;
        self.log_authority(&document.access_key, "submit", "pending", None, None)
            .await?;
        let verdict = self.submit(&document.access_key, &signed_text).await?;

        match verdict {
            AuthorityVerdict::Authorized {
                authorization_code,
                raw_response,
            } => {
                let now = Utc::now();
                self.log_authority(
                    &document.access_key,
                    "submit",
                    "authorized",
                    Some(&authorization_code),
                    Some(&raw_response),
                )
                .await?;
                self.db
                    .fiscal()
                    .set_verdict(
                        &document.id,
                        AuthorityStatus::Authorized,
                        Some(&authorization_code),
                        Some(now),
                    )
                    .await?;
                let document = self.db.fiscal().get_document(&document.id).await?;
                self.finalize(&sale, &request, document, warnings).await
            }
            AuthorityVerdict::Rejected {
                reason,
                raw_response,
            } => {
                self.log_authority(
                    &document.access_key,
                    "submit",
                    "rejected",
                    Some(&reason),
                    Some(&raw_response),
                )
                .await?;
                self.db
                    .fiscal()
                    .set_verdict(&document.id, AuthorityStatus::Rejected, None, None)
                    .await?;
                warn!(
                    sale_id = %sale.id,
                    access_key = %document.access_key,
                    reason = %reason,
                    "Document rejected; sale left open for retry"
                );
                Err(SettlementError::AuthorityRejected {
                    access_key: document.access_key,
                    reason,
                })
            }
            AuthorityVerdict::Pending => {
                self.log_authority(
                    &document.access_key,
                    "submit",
                    "pending",
                    Some("no verdict returned"),
                    None,
                )
                .await?;
                Err(SettlementError::AuthorityIndeterminate {
                    access_key: document.access_key,
                    reason: "no verdict returned".to_string(),
                })
            }
        }
    }

    /// Returns the printable ticket of a settled sale. Idempotent: the
    /// stored text is returned verbatim, nothing is recomputed.
    ///
    /// Only an authorized document can be reprinted. A sale with no
    /// document, or with only pending/rejected attempts on file, fails
    /// with [`SettlementError::NoAuthorizedDocument`] — those tickets were
    /// never fiscally valid.
    pub async fn reprint(&self, sale_id: &str) -> FiscalResult<String> {
        match self.db.fiscal().authorized_for_sale(sale_id).await? {
            Some(doc) => Ok(doc.ticket_text),
            None => Err(SettlementError::NoAuthorizedDocument {
                sale_id: sale_id.to_string(),
            }),
        }
    }

    // =========================================================================
    // Pipeline Steps
    // =========================================================================

    /// Aggregates recipe requirements per (item, pinned batch) over all
    /// sale lines. Dishes without a recipe are skipped with a warning.
    async fn gather_requirements(
        &self,
        lines: &[SaleLine],
        warnings: &mut Vec<String>,
    ) -> FiscalResult<Vec<ItemRequirement>> {
        let recipes = self.db.recipes();
        let mut aggregated: BTreeMap<(String, Option<String>), fogon_core::Quantity> =
            BTreeMap::new();

        for line in lines {
            let entries = recipes
                .resolve(&line.dish_id, line.variant_id.as_deref())
                .await?;
            if entries.is_empty() {
                warn!(dish_id = %line.dish_id, "No recipe; line has no stock impact");
                warnings.push(format!("no recipe for dish {}", line.dish_id));
                continue;
            }
            for entry in entries {
                let needed = entry.quantity_per_unit().multiply_units(line.quantity);
                *aggregated
                    .entry((entry.item_id.clone(), entry.batch_override.clone()))
                    .or_default() += needed;
            }
        }

        Ok(aggregated
            .into_iter()
            .map(|((item_id, pinned_batch), required)| ItemRequirement {
                item_id,
                required,
                pinned_batch,
            })
            .collect())
    }

    /// Checks every requirement against current stock and reports all
    /// shortfalls at once, before anything is deducted.
    async fn precheck_stock(&self, requirements: &[ItemRequirement]) -> FiscalResult<()> {
        let batches = self.db.batches();
        let mut shortages = Vec::new();

        for req in requirements {
            let shortfall = batches
                .check_availability(&req.item_id, req.required, req.pinned_batch.as_deref())
                .await?;
            if shortfall.is_positive() {
                shortages.push(Shortage {
                    item_id: req.item_id.clone(),
                    shortfall,
                });
            }
        }

        if shortages.is_empty() {
            Ok(())
        } else {
            Err(SettlementError::InsufficientStock { shortages })
        }
    }

    /// Issues the sequential and access key, composes the document and
    /// ticket, and builds the pending fiscal document record.
    async fn issue_document(
        &self,
        sale: &Sale,
        lines: &[SaleLine],
        buyer: &BuyerIdentity,
        request: &SettlementRequest,
        emitted_at: DateTime<Utc>,
        warnings: &mut Vec<String>,
    ) -> FiscalResult<(FiscalDocument, ComposedDocument)> {
        let engine = TaxEngine::new(self.db.tax_rules().active_rules().await?);

        let compose_lines: Vec<ComposeLine> = lines
            .iter()
            .map(|line| {
                let tax = engine.compute_line(
                    line.unit_price(),
                    line.quantity,
                    line.discount(),
                    &line.tax_code,
                );
                if tax.used_fallback {
                    warn!(
                        tax_code = %line.tax_code,
                        rate_bps = tax.rate.bps(),
                        "No active tax rule; default rate applied"
                    );
                    warnings.push(format!(
                        "tax code '{}' unconfigured; {} bps applied",
                        line.tax_code,
                        tax.rate.bps()
                    ));
                }
                ComposeLine {
                    code: match line.variant_id.as_deref() {
                        Some(variant) => format!("{}/{}", line.dish_id, variant),
                        None => line.dish_id.clone(),
                    },
                    description: line.description.clone(),
                    quantity: line.quantity,
                    unit_price: line.unit_price(),
                    discount: line.discount(),
                    tax,
                }
            })
            .collect();

        let sequential = self
            .db
            .sequences()
            .next_sequential(
                &self.config.doc_type,
                &self.profile.establishment,
                &self.profile.emission_point,
            )
            .await?;

        let access_key = build_access_key(&AccessKeyInput {
            emitted_on: emitted_at.date_naive(),
            doc_type: &self.config.doc_type,
            issuer_tax_id: &self.profile.tax_id,
            environment: self.config.environment,
            establishment: &self.profile.establishment,
            emission_point: &self.profile.emission_point,
            sequential: &sequential,
            security_code: rand::thread_rng().gen_range(0..100_000_000),
            emission_type: EmissionType::Normal,
        })?;

        let composed = compose(&ComposeInput {
            profile: &self.profile,
            buyer,
            doc_type: &self.config.doc_type,
            sequential: &sequential,
            access_key: &access_key,
            payment_method: request.payment_method,
            emitted_at,
            table_number: sale.table_number,
            server: &sale.staff_id,
            lines: &compose_lines,
        })?;

        let ticket_text = render_ticket(
            &composed,
            &self.profile.trade_name,
            request.payment_method,
            emitted_at,
        );

        debug!(
            sale_id = %sale.id,
            sequential = %sequential,
            access_key = %access_key,
            "Document issued"
        );

        let document = FiscalDocument {
            id: Uuid::new_v4().to_string(),
            sale_id: sale.id.clone(),
            doc_type: self.config.doc_type.clone(),
            sequential,
            access_key,
            status: AuthorityStatus::Pending,
            authorization_code: None,
            authorized_at: None,
            buyer_tax_id: buyer.tax_id.clone(),
            buyer_name: buyer.legal_name.clone(),
            subtotal_zero_cents: composed.totals.subtotal_zero.cents(),
            subtotal_standard_cents: composed.totals.subtotal_standard.cents(),
            tax_cents: composed.totals.tax_total.cents(),
            total_cents: composed.totals.grand_total.cents(),
            payment_code: request.payment_method.authority_code().to_string(),
            document_text: composed.text.clone(),
            ticket_text,
            emitted_at,
            created_at: Utc::now(),
        };

        Ok((document, composed))
    }

    /// Submits with the configured timeout. A timeout or transport failure
    /// is indeterminate: the document stays pending for a later query.
    async fn submit(&self, access_key: &str, signed_text: &str) -> FiscalResult<AuthorityVerdict> {
        match tokio::time::timeout(
            self.config.submit_timeout,
            self.authority.submit(access_key, signed_text),
        )
        .await
        {
            Ok(Ok(verdict)) => Ok(verdict),
            Ok(Err(err)) => {
                let reason = err.to_string();
                self.log_authority(access_key, "submit", "error", Some(&reason), None)
                    .await?;
                Err(SettlementError::AuthorityIndeterminate {
                    access_key: access_key.to_string(),
                    reason,
                })
            }
            Err(_) => {
                self.log_authority(access_key, "submit", "error", Some("timeout"), None)
                    .await?;
                Err(SettlementError::AuthorityIndeterminate {
                    access_key: access_key.to_string(),
                    reason: "timeout".to_string(),
                })
            }
        }
    }

    /// Resolves a document left pending by a lost submission response:
    /// query the authority instead of re-submitting.
    ///
    /// Returns `Some(receipt)` when the query came back authorized and the
    /// sale was closed; `None` when the document turned out rejected and a
    /// fresh one should be issued.
    async fn resolve_pending(
        &self,
        sale: &Sale,
        request: &SettlementRequest,
        doc: FiscalDocument,
        warnings: &mut Vec<String>,
    ) -> FiscalResult<Option<SettlementReceipt>> {
        info!(
            sale_id = %sale.id,
            access_key = %doc.access_key,
            "Pending document found; querying authority"
        );

        let verdict = match tokio::time::timeout(
            self.config.submit_timeout,
            self.authority.query_status(&doc.access_key),
        )
        .await
        {
            Ok(Ok(verdict)) => verdict,
            Ok(Err(err)) => {
                return Err(SettlementError::AuthorityIndeterminate {
                    access_key: doc.access_key,
                    reason: err.to_string(),
                })
            }
            Err(_) => {
                return Err(SettlementError::AuthorityIndeterminate {
                    access_key: doc.access_key,
                    reason: "timeout".to_string(),
                })
            }
        };

        match verdict {
            AuthorityVerdict::Authorized {
                authorization_code,
                raw_response,
            } => {
                self.log_authority(
                    &doc.access_key,
                    "query",
                    "authorized",
                    Some(&authorization_code),
                    Some(&raw_response),
                )
                .await?;
                self.db
                    .fiscal()
                    .set_verdict(
                        &doc.id,
                        AuthorityStatus::Authorized,
                        Some(&authorization_code),
                        Some(Utc::now()),
                    )
                    .await?;
                let doc = self.db.fiscal().get_document(&doc.id).await?;
                let receipt = self
                    .finalize(sale, request, doc, std::mem::take(warnings))
                    .await?;
                Ok(Some(receipt))
            }
            AuthorityVerdict::Rejected {
                reason,
                raw_response,
            } => {
                self.log_authority(
                    &doc.access_key,
                    "query",
                    "rejected",
                    Some(&reason),
                    Some(&raw_response),
                )
                .await?;
                self.db
                    .fiscal()
                    .set_verdict(&doc.id, AuthorityStatus::Rejected, None, None)
                    .await?;
                Ok(None)
            }
            AuthorityVerdict::Pending => {
                self.log_authority(&doc.access_key, "query", "pending", None, None)
                    .await?;
                Err(SettlementError::AuthorityIndeterminate {
                    access_key: doc.access_key,
                    reason: "still pending at the authority".to_string(),
                })
            }
        }
    }

    /// Terminal commit: stamps the settlement fields and closes the sale.
    async fn finalize(
        &self,
        sale: &Sale,
        request: &SettlementRequest,
        document: FiscalDocument,
        warnings: Vec<String>,
    ) -> FiscalResult<SettlementReceipt> {
        let closed = self
            .db
            .sales()
            .close_sale(
                &sale.id,
                &SaleClose {
                    payment_method: request.payment_method,
                    settled_by: request.settled_by.as_deref(),
                    ticket_number: &document.sequential,
                    subtotal_cents: document.subtotal_zero_cents
                        + document.subtotal_standard_cents,
                    tax_cents: document.tax_cents,
                    total_cents: document.total_cents,
                    closed_at: Utc::now(),
                },
            )
            .await?;

        if !closed {
            // Lost the close guard to a concurrent settlement of the same
            // sale. Our document stands; report the sale as settled.
            let current = self.db.sales().get_sale(&sale.id).await?;
            return Err(SettlementError::AlreadySettled {
                sale_id: sale.id.clone(),
                ticket_number: current.ticket_number,
            });
        }

        info!(
            sale_id = %sale.id,
            ticket = %document.sequential,
            total_cents = document.total_cents,
            "Sale settled"
        );

        Ok(SettlementReceipt { document, warnings })
    }

    /// Appends one authority interaction to the audit log.
    async fn log_authority(
        &self,
        access_key: &str,
        request_kind: &str,
        outcome: &str,
        message: Option<&str>,
        raw_response: Option<&str>,
    ) -> FiscalResult<()> {
        self.db
            .fiscal()
            .insert_log(&AuthorityLogEntry {
                id: Uuid::new_v4().to_string(),
                access_key: access_key.to_string(),
                request_kind: request_kind.to_string(),
                outcome: outcome.to_string(),
                message: message.map(str::to_string),
                raw_response: raw_response.map(str::to_string),
                created_at: Utc::now(),
            })
            .await?;
        Ok(())
    }
}

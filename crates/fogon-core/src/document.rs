//! # Document Composer
//!
//! Assembles the canonical fiscal document from the settlement pipeline's
//! intermediate outputs: the sale lines with computed taxes, the issuer
//! profile, the buyer identity, and the issued sequential/access key.
//!
//! ## Canonical Text
//! The document text is the deterministic JSON serialization of
//! [`CanonicalDocument`] — fixed top-level sections `issuerInfo`,
//! `documentInfo`, `lines`, `additionalInfo`, fields emitted in struct
//! order. The same inputs always produce byte-identical text, which is what
//! makes reprints idempotent.
//!
//! ## Field Widths
//! All free-text values are truncated to the authority's widths before
//! serialization (tax id 13, address 200, description 200, product code
//! 25) — truncated, never rejected.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::error::CoreResult;
use crate::money::Money;
use crate::tax::{LineTax, TaxBracket};
use crate::types::{BuyerIdentity, CompanyProfile, PaymentMethod};
use crate::validation::{
    truncate_field, MAX_ADDRESS_LEN, MAX_DESCRIPTION_LEN, MAX_PRODUCT_CODE_LEN, MAX_TAX_ID_LEN,
};

// =============================================================================
// Canonical Document Schema
// =============================================================================

/// The fixed-schema document submitted to the tax authority.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CanonicalDocument {
    pub issuer_info: IssuerInfo,
    pub document_info: DocumentInfo,
    pub lines: Vec<DocumentLine>,
    pub additional_info: Vec<AdditionalField>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct IssuerInfo {
    pub tax_id: String,
    pub legal_name: String,
    pub trade_name: String,
    pub address: String,
    pub establishment: String,
    pub emission_point: String,
    pub access_key: String,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DocumentInfo {
    pub doc_type: String,
    pub sequential: String,
    /// Emission date, ddmmyyyy, matching the access-key date field.
    pub emission_date: String,
    pub buyer_tax_id: String,
    pub buyer_name: String,
    pub buyer_address: Option<String>,
    pub subtotal_zero_cents: i64,
    pub subtotal_standard_cents: i64,
    pub tax_total_cents: i64,
    pub grand_total_cents: i64,
    /// Authority payment-method code.
    pub payment_code: String,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DocumentLine {
    pub code: String,
    pub description: String,
    pub quantity: i64,
    pub unit_price_cents: i64,
    pub discount_cents: i64,
    pub taxable_base_cents: i64,
    pub rate_bps: u32,
    pub tax_cents: i64,
    /// "zero" or "standard".
    pub bracket: String,
}

/// Free-form key/value pair in the `additionalInfo` section.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AdditionalField {
    pub name: String,
    pub value: String,
}

// =============================================================================
// Compose Inputs/Outputs
// =============================================================================

/// One sale line ready for composition: order-time snapshot plus the tax
/// engine's output.
#[derive(Debug, Clone)]
pub struct ComposeLine {
    /// Product/dish code (≤25 chars after truncation).
    pub code: String,
    pub description: String,
    pub quantity: i64,
    pub unit_price: Money,
    pub discount: Money,
    pub tax: LineTax,
}

/// Everything the composer needs. The orchestrator gathers these from the
/// repositories and the issuer; composition itself is pure.
#[derive(Debug, Clone)]
pub struct ComposeInput<'a> {
    pub profile: &'a CompanyProfile,
    pub buyer: &'a BuyerIdentity,
    pub doc_type: &'a str,
    pub sequential: &'a str,
    pub access_key: &'a str,
    pub payment_method: PaymentMethod,
    pub emitted_at: DateTime<Utc>,
    pub table_number: i64,
    pub server: &'a str,
    pub lines: &'a [ComposeLine],
}

/// Document-level totals accumulated by tax bracket.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct DocumentTotals {
    pub subtotal_zero: Money,
    pub subtotal_standard: Money,
    pub tax_total: Money,
    pub grand_total: Money,
}

/// A composed draft: the canonical structure, its serialized text, and the
/// totals the fiscal document record carries.
#[derive(Debug, Clone)]
pub struct ComposedDocument {
    pub canonical: CanonicalDocument,
    pub totals: DocumentTotals,
    pub text: String,
}

// =============================================================================
// Composition
// =============================================================================

/// Computes document totals by bracket over composed lines.
pub fn compute_totals(lines: &[ComposeLine]) -> DocumentTotals {
    let mut totals = DocumentTotals::default();
    for line in lines {
        match line.tax.bracket {
            TaxBracket::ZeroRated => totals.subtotal_zero += line.tax.taxable_base,
            TaxBracket::Standard => totals.subtotal_standard += line.tax.taxable_base,
        }
        totals.tax_total += line.tax.tax_amount;
    }
    totals.grand_total = totals.subtotal_zero + totals.subtotal_standard + totals.tax_total;
    totals
}

/// Assembles the canonical fiscal document draft.
pub fn compose(input: &ComposeInput<'_>) -> CoreResult<ComposedDocument> {
    let totals = compute_totals(input.lines);

    let issuer_info = IssuerInfo {
        tax_id: truncate_field(&input.profile.tax_id, MAX_TAX_ID_LEN),
        legal_name: input.profile.legal_name.clone(),
        trade_name: input.profile.trade_name.clone(),
        address: truncate_field(&input.profile.address, MAX_ADDRESS_LEN),
        establishment: input.profile.establishment.clone(),
        emission_point: input.profile.emission_point.clone(),
        access_key: input.access_key.to_string(),
    };

    let document_info = DocumentInfo {
        doc_type: input.doc_type.to_string(),
        sequential: input.sequential.to_string(),
        emission_date: input.emitted_at.format("%d%m%Y").to_string(),
        buyer_tax_id: truncate_field(&input.buyer.tax_id, MAX_TAX_ID_LEN),
        buyer_name: input.buyer.legal_name.clone(),
        buyer_address: input
            .buyer
            .address
            .as_deref()
            .map(|a| truncate_field(a, MAX_ADDRESS_LEN)),
        subtotal_zero_cents: totals.subtotal_zero.cents(),
        subtotal_standard_cents: totals.subtotal_standard.cents(),
        tax_total_cents: totals.tax_total.cents(),
        grand_total_cents: totals.grand_total.cents(),
        payment_code: input.payment_method.authority_code().to_string(),
    };

    let lines: Vec<DocumentLine> = input
        .lines
        .iter()
        .map(|l| DocumentLine {
            code: truncate_field(&l.code, MAX_PRODUCT_CODE_LEN),
            description: truncate_field(&l.description, MAX_DESCRIPTION_LEN),
            quantity: l.quantity,
            unit_price_cents: l.unit_price.cents(),
            discount_cents: l.discount.cents(),
            taxable_base_cents: l.tax.taxable_base.cents(),
            rate_bps: l.tax.rate.bps(),
            tax_cents: l.tax.tax_amount.cents(),
            bracket: match l.tax.bracket {
                TaxBracket::ZeroRated => "zero".to_string(),
                TaxBracket::Standard => "standard".to_string(),
            },
        })
        .collect();

    let mut additional_info = vec![
        AdditionalField {
            name: "table".to_string(),
            value: input.table_number.to_string(),
        },
        AdditionalField {
            name: "server".to_string(),
            value: input.server.to_string(),
        },
    ];
    if let Some(email) = input.buyer.email.as_deref() {
        additional_info.push(AdditionalField {
            name: "buyerEmail".to_string(),
            value: email.to_string(),
        });
    }
    if let Some(phone) = input.buyer.phone.as_deref() {
        additional_info.push(AdditionalField {
            name: "buyerPhone".to_string(),
            value: phone.to_string(),
        });
    }

    let canonical = CanonicalDocument {
        issuer_info,
        document_info,
        lines,
        additional_info,
    };

    // Struct-order serialization keeps the text deterministic for a given
    // input, which reprint relies on.
    let text = serde_json::to_string(&canonical).map_err(|e| {
        crate::error::CoreError::Validation(crate::error::ValidationError::InvalidFormat {
            field: "document".to_string(),
            reason: e.to_string(),
        })
    })?;

    Ok(ComposedDocument {
        canonical,
        totals,
        text,
    })
}

// =============================================================================
// Unit Tests
// =============================================================================

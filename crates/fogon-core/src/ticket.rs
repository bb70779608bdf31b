//! # Ticket Rendering
//!
//! Derives the printable cashier ticket from a composed fiscal document.
//! Pure formatting: the same document always renders byte-identical text,
//! which is what the reprint endpoint returns.

use crate::document::{CanonicalDocument, ComposedDocument};
use crate::money::Money;
use crate::types::PaymentMethod;
use chrono::{DateTime, Utc};

/// Width of the printed ticket in characters (standard 58mm roll).
const TICKET_WIDTH: usize = 42;

/// Renders the printable ticket for a composed document.
///
/// Ticket number is the document sequential; table and server come from the
/// `additionalInfo` section the composer filled in.
pub fn render_ticket(
    composed: &ComposedDocument,
    trade_name: &str,
    payment_method: PaymentMethod,
    emitted_at: DateTime<Utc>,
) -> String {
    let doc = &composed.canonical;
    let mut out = String::new();

    center_line(&mut out, trade_name);
    center_line(&mut out, &doc.issuer_info.legal_name);
    push_line(&mut out, &format!("RUC: {}", doc.issuer_info.tax_id));
    push_line(&mut out, &doc.issuer_info.address);
    rule(&mut out);

    push_line(
        &mut out,
        &format!(
            "TICKET {}-{}-{}",
            doc.issuer_info.establishment, doc.issuer_info.emission_point, doc.document_info.sequential
        ),
    );
    push_line(
        &mut out,
        &format!("FECHA: {}", emitted_at.format("%d/%m/%Y %H:%M")),
    );
    if let Some(table) = additional(doc, "table") {
        push_line(&mut out, &format!("MESA: {table}"));
    }
    if let Some(server) = additional(doc, "server") {
        push_line(&mut out, &format!("ATIENDE: {server}"));
    }
    push_line(&mut out, &format!("CLIENTE: {}", doc.document_info.buyer_name));
    rule(&mut out);

    for line in &doc.lines {
        push_line(&mut out, &line.description);
        push_line(
            &mut out,
            &format!(
                "  {} x {} = {}",
                line.quantity,
                Money::from_cents(line.unit_price_cents),
                Money::from_cents(line.taxable_base_cents + line.discount_cents),
            ),
        );
        if line.discount_cents > 0 {
            push_line(
                &mut out,
                &format!("  desc. -{}", Money::from_cents(line.discount_cents)),
            );
        }
    }
    rule(&mut out);

    amount_line(&mut out, "SUBTOTAL 0%", composed.totals.subtotal_zero);
    amount_line(&mut out, "SUBTOTAL", composed.totals.subtotal_standard);
    amount_line(&mut out, "IVA", composed.totals.tax_total);
    amount_line(&mut out, "TOTAL", composed.totals.grand_total);
    rule(&mut out);

    push_line(
        &mut out,
        &format!("PAGO: {}", payment_label(payment_method)),
    );
    push_line(&mut out, "CLAVE DE ACCESO:");
    push_line(&mut out, &doc.issuer_info.access_key);
    center_line(&mut out, "GRACIAS POR SU VISITA");

    out
}

fn payment_label(method: PaymentMethod) -> &'static str {
    match method {
        PaymentMethod::Cash => "EFECTIVO",
        PaymentMethod::Card => "TARJETA",
        PaymentMethod::Transfer => "TRANSFERENCIA",
        PaymentMethod::Check => "CHEQUE",
    }
}

fn additional<'a>(doc: &'a CanonicalDocument, name: &str) -> Option<&'a str> {
    doc.additional_info
        .iter()
        .find(|f| f.name == name)
        .map(|f| f.value.as_str())
}

fn push_line(out: &mut String, line: &str) {
    out.push_str(line);
    out.push('\n');
}

fn center_line(out: &mut String, line: &str) {
    let len = line.chars().count();
    if len < TICKET_WIDTH {
        out.push_str(&" ".repeat((TICKET_WIDTH - len) / 2));
    }
    out.push_str(line);
    out.push('\n');
}

fn amount_line(out: &mut String, label: &str, amount: Money) {
    let value = amount.to_string();
    let pad = TICKET_WIDTH
        .saturating_sub(label.chars().count())
        .saturating_sub(value.chars().count());
    out.push_str(label);
    out.push_str(&" ".repeat(pad.max(1)));
    out.push_str(&value);
    out.push('\n');
}

fn rule(out: &mut String) {
    out.push_str(&"-".repeat(TICKET_WIDTH));
    out.push('\n');
}

// =============================================================================
// Unit Tests
// =============================================================================

#[cfg(test)]
mod tests {
    use super::*;
    use crate::document::{compose, ComposeInput, ComposeLine};
    use crate::tax::TaxEngine;
    use crate::types::{BuyerIdentity, CompanyProfile};
    use chrono::TimeZone;

    fn composed() -> ComposedDocument {
        let profile = CompanyProfile {
            tax_id: "1790012345001".to_string(),
            legal_name: "Fogón Restaurante S.A.".to_string(),
            trade_name: "Fogón".to_string(),
            address: "Av. Principal 123".to_string(),
            establishment: "001".to_string(),
            emission_point: "002".to_string(),
        };
        let buyer = BuyerIdentity::final_consumer();
        let engine = TaxEngine::empty();
        let lines = vec![ComposeLine {
            code: "dish-lomo".to_string(),
            description: "Lomo saltado".to_string(),
            quantity: 2,
            unit_price: Money::from_cents(1200),
            discount: Money::zero(),
            tax: engine.compute_line(Money::from_cents(1200), 2, Money::zero(), "standard"),
        }];
        compose(&ComposeInput {
            profile: &profile,
            buyer: &buyer,
            doc_type: "01",
            sequential: "000000042",
            access_key: "2708202601179001234500110010020000000421234567819",
            payment_method: PaymentMethod::Card,
            emitted_at: Utc.with_ymd_and_hms(2026, 8, 27, 13, 30, 0).unwrap(),
            table_number: 7,
            server: "mesero-3",
            lines: &lines,
        })
        .unwrap()
    }

    #[test]
    fn test_ticket_contains_required_fields() {
        let emitted = Utc.with_ymd_and_hms(2026, 8, 27, 13, 30, 0).unwrap();
        let ticket = render_ticket(&composed(), "Fogón", PaymentMethod::Card, emitted);

        assert!(ticket.contains("TICKET 001-002-000000042"));
        assert!(ticket.contains("MESA: 7"));
        assert!(ticket.contains("ATIENDE: mesero-3"));
        assert!(ticket.contains("Lomo saltado"));
        assert!(ticket.contains("TOTAL"));
        assert!(ticket.contains("PAGO: TARJETA"));
        assert!(ticket.contains("2708202601179001234500110010020000000421234567819"));
    }

    #[test]
    fn test_ticket_rendering_is_deterministic() {
        let emitted = Utc.with_ymd_and_hms(2026, 8, 27, 13, 30, 0).unwrap();
        let a = render_ticket(&composed(), "Fogón", PaymentMethod::Card, emitted);
        let b = render_ticket(&composed(), "Fogón", PaymentMethod::Card, emitted);
        assert_eq!(a, b);
    }
}

//! End-to-end settlement pipeline tests over an in-memory database.

use std::collections::VecDeque;
use std::sync::{Arc, Mutex, Once};

use async_trait::async_trait;
use chrono::Utc;

use fogon_core::{
    AuthorityStatus, Batch, BuyerIdentity, CompanyProfile, KitchenStatus, PaymentMethod,
    Quantity, RecipeEntry, Sale, SaleLine, SaleStatus,
};
use fogon_db::{Database, DbConfig};
use fogon_fiscal::{
    AuthorityClient, AuthorityVerdict, FiscalResult, PassthroughSigner, SettlementConfig,
    SettlementError, SettlementRequest, SettlementService, SimulatedAuthority,
};

// =============================================================================
// Test Fixtures
// =============================================================================

/// Authority whose verdicts are scripted per call, in order.
struct ScriptedAuthority {
    submits: Mutex<VecDeque<AuthorityVerdict>>,
    queries: Mutex<VecDeque<AuthorityVerdict>>,
}

impl ScriptedAuthority {
    fn new(
        submits: impl IntoIterator<Item = AuthorityVerdict>,
        queries: impl IntoIterator<Item = AuthorityVerdict>,
    ) -> Self {
        ScriptedAuthority {
            submits: Mutex::new(submits.into_iter().collect()),
            queries: Mutex::new(queries.into_iter().collect()),
        }
    }
}

#[async_trait]
impl AuthorityClient for ScriptedAuthority {
    async fn submit(&self, _access_key: &str, _signed_text: &str) -> FiscalResult<AuthorityVerdict> {
        Ok(self
            .submits
            .lock()
            .unwrap()
            .pop_front()
            .expect("unscripted submit"))
    }

    async fn query_status(&self, _access_key: &str) -> FiscalResult<AuthorityVerdict> {
        Ok(self
            .queries
            .lock()
            .unwrap()
            .pop_front()
            .expect("unscripted query"))
    }
}

fn authorized(code: &str) -> AuthorityVerdict {
    AuthorityVerdict::Authorized {
        authorization_code: code.to_string(),
        raw_response: format!("{{\"estado\":\"AUTORIZADO\",\"numeroAutorizacion\":\"{code}\"}}"),
    }
}

fn rejected(reason: &str) -> AuthorityVerdict {
    AuthorityVerdict::Rejected {
        reason: reason.to_string(),
        raw_response: "{\"estado\":\"DEVUELTA\"}".to_string(),
    }
}

fn profile() -> CompanyProfile {
    CompanyProfile {
        tax_id: "1790012345001".to_string(),
        legal_name: "Fogón Restaurante S.A.".to_string(),
        trade_name: "Fogón".to_string(),
        address: "Av. Principal 123, Quito".to_string(),
        establishment: "001".to_string(),
        emission_point: "002".to_string(),
    }
}

fn service(db: Database, authority: Arc<dyn AuthorityClient>) -> SettlementService {
    SettlementService::new(
        db,
        profile(),
        SettlementConfig::default(),
        authority,
        Arc::new(PassthroughSigner),
    )
}

fn request(sale_id: &str) -> SettlementRequest {
    SettlementRequest {
        sale_id: sale_id.to_string(),
        payment_method: PaymentMethod::Cash,
        buyer: None,
        settled_by: Some("staff-2".to_string()),
    }
}

/// Seeds a served sale with one line (2 × dish-lomo at $12.00, standard
/// rate), a recipe consuming 0.250 of beef per portion, and a beef batch.
async fn seed_standard_sale(db: &Database, sale_id: &str, beef_milli: i64) {
    db.sales()
        .insert_sale(&Sale {
            id: sale_id.to_string(),
            table_number: 7,
            staff_id: "mesero-3".to_string(),
            status: SaleStatus::Served,
            subtotal_cents: 0,
            tax_cents: 0,
            total_cents: 0,
            payment_method: None,
            settled_by: None,
            ticket_number: None,
            created_at: Utc::now(),
            updated_at: Utc::now(),
            closed_at: None,
        })
        .await
        .unwrap();

    db.sales()
        .insert_line(&SaleLine {
            id: format!("{sale_id}-l1"),
            sale_id: sale_id.to_string(),
            dish_id: "dish-lomo".to_string(),
            variant_id: None,
            description: "Lomo saltado".to_string(),
            quantity: 2,
            unit_price_cents: 1200,
            discount_cents: 0,
            line_total_cents: 2400,
            tax_code: "standard".to_string(),
            kitchen_status: KitchenStatus::Delivered,
            created_at: Utc::now(),
        })
        .await
        .unwrap();

    db.recipes()
        .insert_entry(&RecipeEntry {
            id: format!("{sale_id}-r1"),
            dish_id: "dish-lomo".to_string(),
            variant_id: None,
            item_id: "beef".to_string(),
            quantity_per_unit_milli: 250,
            batch_override: None,
        })
        .await
        .unwrap();

    db.batches()
        .insert_batch(&Batch {
            id: format!("{sale_id}-b1"),
            item_id: "beef".to_string(),
            batch_code: "LOT-1".to_string(),
            quantity_milli: beef_milli,
            unit_cost_cents: 450,
            received_at: Utc::now(),
            is_active: true,
        })
        .await
        .unwrap();
}

static TRACING: Once = Once::new();

async fn db() -> Database {
    // One subscriber per test process; RUST_LOG tunes the filter.
    TRACING.call_once(fogon_fiscal::init_tracing);
    Database::new(DbConfig::in_memory()).await.unwrap()
}

// =============================================================================
// Tests
// =============================================================================

#[tokio::test]
async fn settles_a_served_sale_end_to_end() {
    let db = db().await;
    seed_standard_sale(&db, "s1", 5000).await;
    let svc = service(db.clone(), Arc::new(SimulatedAuthority::always_approving()));

    let receipt = svc.settle(request("s1")).await.unwrap();
    let doc = &receipt.document;

    // First document in the series, totals from the 15% seeded rate.
    assert_eq!(doc.sequential, "000000001");
    assert_eq!(doc.access_key.len(), 49);
    assert_eq!(doc.status, AuthorityStatus::Authorized);
    assert!(doc.authorization_code.is_some());
    assert_eq!(doc.subtotal_standard_cents, 2400);
    assert_eq!(doc.tax_cents, 360);
    assert_eq!(doc.total_cents, 2760);
    assert_eq!(doc.buyer_tax_id, "9999999999999");
    assert!(receipt.warnings.is_empty());

    // Sale committed.
    let sale = db.sales().get_sale("s1").await.unwrap();
    assert_eq!(sale.status, SaleStatus::Closed);
    assert_eq!(sale.ticket_number.as_deref(), Some("000000001"));
    assert_eq!(sale.total_cents, 2760);

    // Stock deducted: 2 portions × 0.250 = 0.500 of beef.
    let remaining = db.batches().available_quantity("beef").await.unwrap();
    assert_eq!(remaining, Quantity::from_milli(4500));
    let movements = db.batches().movements_for_sale("s1").await.unwrap();
    assert_eq!(movements.len(), 1);
    assert_eq!(movements[0].delta_milli, -500);

    // Authority interaction logged: one entry before the call, one with
    // the verdict.
    let logs = db.fiscal().logs_for_key(&doc.access_key).await.unwrap();
    assert_eq!(logs.len(), 2);
    assert_eq!(logs[0].outcome, "pending");
    assert_eq!(logs[1].outcome, "authorized");
}

#[tokio::test]
async fn shortfall_aborts_before_any_mutation() {
    let db = db().await;
    seed_standard_sale(&db, "s1", 300).await; // needs 500

    let svc = service(db.clone(), Arc::new(SimulatedAuthority::always_approving()));
    let err = svc.settle(request("s1")).await.unwrap_err();

    match err {
        SettlementError::InsufficientStock { shortages } => {
            assert_eq!(shortages.len(), 1);
            assert_eq!(shortages[0].item_id, "beef");
            assert_eq!(shortages[0].shortfall, Quantity::from_milli(200));
        }
        other => panic!("unexpected error: {other}"),
    }

    // Nothing moved: sale open, stock intact, no document, no sequential.
    let sale = db.sales().get_sale("s1").await.unwrap();
    assert_eq!(sale.status, SaleStatus::Served);
    assert_eq!(
        db.batches().available_quantity("beef").await.unwrap(),
        Quantity::from_milli(300)
    );
    assert!(db.fiscal().latest_for_sale("s1").await.unwrap().is_none());
    assert!(db
        .sequences()
        .get_sequence("01", "001", "002")
        .await
        .unwrap()
        .is_none());
}

#[tokio::test]
async fn all_shortfalls_reported_at_once() {
    let db = db().await;
    seed_standard_sale(&db, "s1", 5000).await;
    // Two more ingredients for the same dish: rice is short, oil is not.
    for (id, item, per_unit, stocked) in [
        ("r2", "rice", 300, 100i64),
        ("r3", "oil", 50, 9000),
    ] {
        db.recipes()
            .insert_entry(&RecipeEntry {
                id: id.to_string(),
                dish_id: "dish-lomo".to_string(),
                variant_id: None,
                item_id: item.to_string(),
                quantity_per_unit_milli: per_unit,
                batch_override: None,
            })
            .await
            .unwrap();
        db.batches()
            .insert_batch(&Batch {
                id: format!("b-{item}"),
                item_id: item.to_string(),
                batch_code: format!("LOT-{item}"),
                quantity_milli: stocked,
                unit_cost_cents: 100,
                received_at: Utc::now(),
                is_active: true,
            })
            .await
            .unwrap();
    }
    // Drain beef below requirement too: needs 500, leave 200.
    sqlx::query("UPDATE batches SET quantity_milli = 200 WHERE item_id = 'beef'")
        .execute(db.pool())
        .await
        .unwrap();

    let svc = service(db.clone(), Arc::new(SimulatedAuthority::always_approving()));
    let err = svc.settle(request("s1")).await.unwrap_err();

    // Exactly beef and rice are reported, with exact shortfalls; oil is not.
    match err {
        SettlementError::InsufficientStock { mut shortages } => {
            shortages.sort_by(|a, b| a.item_id.cmp(&b.item_id));
            assert_eq!(shortages.len(), 2);
            assert_eq!(shortages[0].item_id, "beef");
            assert_eq!(shortages[0].shortfall, Quantity::from_milli(300));
            assert_eq!(shortages[1].item_id, "rice");
            assert_eq!(shortages[1].shortfall, Quantity::from_milli(500));
        }
        other => panic!("unexpected error: {other}"),
    }

    // Allocation was never attempted: all quantities intact.
    assert_eq!(
        db.batches().available_quantity("oil").await.unwrap(),
        Quantity::from_milli(9000)
    );
    assert!(db.batches().movements_for_sale("s1").await.unwrap().is_empty());
}

#[tokio::test]
async fn rejection_keeps_sale_open_and_retry_skips_stock() {
    let db = db().await;
    seed_standard_sale(&db, "s1", 5000).await;
    let authority = Arc::new(ScriptedAuthority::new(
        [rejected("RUC DEL EMISOR NO EXISTE"), authorized("AUTH-2")],
        [],
    ));
    let svc = service(db.clone(), authority);

    let err = svc.settle(request("s1")).await.unwrap_err();
    assert!(matches!(err, SettlementError::AuthorityRejected { .. }));

    // Stock was deducted and stays deducted; the sale stays open.
    let sale = db.sales().get_sale("s1").await.unwrap();
    assert_eq!(sale.status, SaleStatus::Served);
    assert_eq!(
        db.batches().available_quantity("beef").await.unwrap(),
        Quantity::from_milli(4500)
    );
    let first_doc = db.fiscal().latest_for_sale("s1").await.unwrap().unwrap();
    assert_eq!(first_doc.status, AuthorityStatus::Rejected);
    assert_eq!(first_doc.sequential, "000000001");

    // Retry: fresh sequential, no second deduction.
    let receipt = svc.settle(request("s1")).await.unwrap();
    assert_eq!(receipt.document.sequential, "000000002");
    assert_ne!(receipt.document.access_key, first_doc.access_key);
    assert_eq!(
        db.batches().available_quantity("beef").await.unwrap(),
        Quantity::from_milli(4500)
    );

    let sale = db.sales().get_sale("s1").await.unwrap();
    assert_eq!(sale.status, SaleStatus::Closed);
    assert_eq!(sale.ticket_number.as_deref(), Some("000000002"));

    // The rejected document stays on file untouched.
    let rejected_doc = db.fiscal().get_document(&first_doc.id).await.unwrap();
    assert_eq!(rejected_doc.status, AuthorityStatus::Rejected);
}

#[tokio::test]
async fn indeterminate_submission_is_resolved_by_query() {
    let db = db().await;
    seed_standard_sale(&db, "s1", 5000).await;
    let authority = Arc::new(ScriptedAuthority::new(
        [AuthorityVerdict::Pending],
        [authorized("AUTH-9")],
    ));
    let svc = service(db.clone(), authority);

    // First attempt gets no verdict; the document stays pending.
    let err = svc.settle(request("s1")).await.unwrap_err();
    assert!(matches!(err, SettlementError::AuthorityIndeterminate { .. }));
    let doc = db.fiscal().latest_for_sale("s1").await.unwrap().unwrap();
    assert_eq!(doc.status, AuthorityStatus::Pending);

    // Second attempt queries instead of re-submitting: same sequential,
    // no new document, no further stock impact.
    let receipt = svc.settle(request("s1")).await.unwrap();
    assert_eq!(receipt.document.id, doc.id);
    assert_eq!(receipt.document.sequential, "000000001");
    assert_eq!(
        receipt.document.authorization_code.as_deref(),
        Some("AUTH-9")
    );
    assert_eq!(
        db.batches().available_quantity("beef").await.unwrap(),
        Quantity::from_milli(4500)
    );

    let sale = db.sales().get_sale("s1").await.unwrap();
    assert_eq!(sale.status, SaleStatus::Closed);
}

#[tokio::test]
async fn missing_recipe_settles_with_warning_and_no_stock_impact() {
    let db = db().await;
    seed_standard_sale(&db, "s1", 5000).await;
    // A second line whose dish has no recipe.
    db.sales()
        .insert_line(&SaleLine {
            id: "s1-l2".to_string(),
            sale_id: "s1".to_string(),
            dish_id: "dish-cafe".to_string(),
            variant_id: None,
            description: "Café".to_string(),
            quantity: 1,
            unit_price_cents: 200,
            discount_cents: 0,
            line_total_cents: 200,
            tax_code: "standard".to_string(),
            kitchen_status: KitchenStatus::Delivered,
            created_at: Utc::now(),
        })
        .await
        .unwrap();

    let svc = service(db.clone(), Arc::new(SimulatedAuthority::always_approving()));
    let receipt = svc.settle(request("s1")).await.unwrap();

    assert!(receipt
        .warnings
        .iter()
        .any(|w| w.contains("dish-cafe")));
    // Only the recipe-backed line moved stock.
    let movements = db.batches().movements_for_sale("s1").await.unwrap();
    assert_eq!(movements.len(), 1);
    // Both lines are billed.
    assert_eq!(receipt.document.subtotal_standard_cents, 2600);
}

#[tokio::test]
async fn invalid_buyer_aborts_before_mutation() {
    let db = db().await;
    seed_standard_sale(&db, "s1", 5000).await;
    let svc = service(db.clone(), Arc::new(SimulatedAuthority::always_approving()));

    let mut req = request("s1");
    req.buyer = Some(BuyerIdentity {
        tax_id: "12AB".to_string(),
        legal_name: "".to_string(),
        address: None,
        phone: None,
        email: None,
    });

    let err = svc.settle(req).await.unwrap_err();
    assert!(matches!(err, SettlementError::Validation(_)));

    assert_eq!(
        db.batches().available_quantity("beef").await.unwrap(),
        Quantity::from_milli(5000)
    );
    assert!(db.fiscal().latest_for_sale("s1").await.unwrap().is_none());
}

#[tokio::test]
async fn settled_sale_refuses_resettlement_and_reprints() {
    let db = db().await;
    seed_standard_sale(&db, "s1", 5000).await;
    let svc = service(db.clone(), Arc::new(SimulatedAuthority::always_approving()));

    let receipt = svc.settle(request("s1")).await.unwrap();
    let ticket = receipt.document.ticket_text.clone();

    let err = svc.settle(request("s1")).await.unwrap_err();
    match err {
        SettlementError::AlreadySettled { ticket_number, .. } => {
            assert_eq!(ticket_number.as_deref(), Some("000000001"));
        }
        other => panic!("unexpected error: {other}"),
    }

    // Reprint returns the stored text verbatim, as many times as asked.
    assert_eq!(svc.reprint("s1").await.unwrap(), ticket);
    assert_eq!(svc.reprint("s1").await.unwrap(), ticket);
}

#[tokio::test]
async fn reprint_without_authorized_document_fails() {
    let db = db().await;
    seed_standard_sale(&db, "s1", 5000).await;
    let svc = service(
        db.clone(),
        Arc::new(ScriptedAuthority::new([rejected("RUC inválido")], [])),
    );

    // No document at all.
    let err = svc.reprint("s1").await.unwrap_err();
    assert!(matches!(err, SettlementError::NoAuthorizedDocument { .. }));

    // A rejected attempt on file is not reprintable either: its ticket was
    // never fiscally valid.
    let err = svc.settle(request("s1")).await.unwrap_err();
    assert!(matches!(err, SettlementError::AuthorityRejected { .. }));
    let err = svc.reprint("s1").await.unwrap_err();
    assert!(matches!(err, SettlementError::NoAuthorizedDocument { .. }));
}

#[tokio::test]
async fn empty_sale_cannot_settle() {
    let db = db().await;
    db.sales()
        .insert_sale(&Sale {
            id: "s1".to_string(),
            table_number: 1,
            staff_id: "mesero-1".to_string(),
            status: SaleStatus::Served,
            subtotal_cents: 0,
            tax_cents: 0,
            total_cents: 0,
            payment_method: None,
            settled_by: None,
            ticket_number: None,
            created_at: Utc::now(),
            updated_at: Utc::now(),
            closed_at: None,
        })
        .await
        .unwrap();

    let svc = service(db.clone(), Arc::new(SimulatedAuthority::always_approving()));
    let err = svc.settle(request("s1")).await.unwrap_err();
    assert!(matches!(err, SettlementError::EmptySale { .. }));
}

#[tokio::test]
async fn unserved_sale_cannot_settle() {
    let db = db().await;
    seed_standard_sale(&db, "s1", 5000).await;
    // Knock the sale back to pending.
    sqlx::query("UPDATE sales SET status = 'pending' WHERE id = 's1'")
        .execute(db.pool())
        .await
        .unwrap();

    let svc = service(db.clone(), Arc::new(SimulatedAuthority::always_approving()));
    let err = svc.settle(request("s1")).await.unwrap_err();
    assert!(matches!(
        err,
        SettlementError::NotSettleable {
            status: SaleStatus::Pending,
            ..
        }
    ));
}

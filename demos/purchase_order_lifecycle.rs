//! Walks one purchase order from draft to completion and prints the results

use bigdecimal::BigDecimal;
use chrono::NaiveDate;
use procurement_ledger::{
    init_tracing, Action, Actor, DocumentInput, DocumentLine, InventoryItem, Ledger, MemoryStorage,
    Module, StaticPermissionGate,
};

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    init_tracing();

    let gate = StaticPermissionGate::new()
        .grant("site-manager", "*")
        .grant("buyer", "purchase_orders.*")
        .allow("buyer", Module::Accounts, Action::View);
    let mut ledger = Ledger::new(MemoryStorage::new(), gate);
    let manager = Actor::new("site-manager");
    let buyer = Actor::new("buyer");

    println!("=== Procurement Ledger Demo ===\n");

    ledger.setup_standard_chart_of_accounts(&manager).await?;
    println!("Chart of accounts:");
    for option in ledger.account_options(&buyer, "").await? {
        println!(
            "  {}{} {}",
            "  ".repeat(option.depth),
            option.account.code,
            option.account.name
        );
    }

    for (item, name) in [("cement-50kg", "Cement 50kg bag"), ("rebar-12", "Rebar 12mm")] {
        ledger
            .register_inventory_item(&manager, InventoryItem::new(item, "main-yard", name))
            .await?;
    }

    let doc = ledger
        .documents()
        .create(
            &buyer,
            DocumentInput {
                counterparty_name: "Coastal Building Supplies".to_string(),
                project_name: "Riverside Clinic".to_string(),
                warehouse_id: "main-yard".to_string(),
                date: NaiveDate::from_ymd_opt(2024, 6, 3).ok_or("invalid date")?,
                lines: vec![
                    DocumentLine::new("Cement", BigDecimal::from(40), "9.85".parse()?)
                        .with_item("cement-50kg"),
                    DocumentLine::new("Rebar", BigDecimal::from(120), "4.20".parse()?)
                        .with_item("rebar-12"),
                    DocumentLine::new("Crane hire, half day", BigDecimal::from(1), BigDecimal::from(650))
                        .with_account("5300"),
                ],
            },
        )
        .await?;
    println!("\nCreated purchase order {} (total {})", doc.id, doc.total());

    ledger.documents().submit(&buyer, &doc.id).await?;
    ledger.documents().approve(&buyer, &doc.id).await?;

    let next = ledger.documents().available_transitions(&doc, &buyer).await;
    println!("Buyer may move a draft to: {:?}", next);

    if let Err(e) = ledger.documents().complete(&buyer, &doc.id).await {
        println!("Buyer cannot complete: {e}");
    }
    let done = ledger.documents().complete(&manager, &doc.id).await?;
    println!("Completed by site manager, status = {}", done.status);

    if let Some(voucher_id) = &done.ledger_reference {
        if let Some(voucher) = ledger.get_voucher(&manager, voucher_id).await? {
            println!("\nVoucher {}:", voucher.id);
            for line in &voucher.lines {
                println!("  {:<38} Dr {:>10} Cr {:>10}", line.account_id, line.debit, line.credit);
            }
        }
    }

    println!("\nStock on hand:");
    for item in ledger.list_inventory(&manager).await? {
        println!("  {} @ {}: {}", item.name, item.warehouse_id, item.on_hand);
    }

    let report = ledger.validate_integrity(&manager).await?;
    println!(
        "\nIntegrity: {} ({} accounts, {} vouchers)",
        if report.is_valid { "ok" } else { "FAILED" },
        report.account_count,
        report.voucher_count
    );

    Ok(())
}

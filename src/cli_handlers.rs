use crate::analytics::{crop_shares, format_money};
use crate::core::{Ledger, parse_category, parse_count, parse_date, parse_decimal, parse_f64};
use crate::error::LedgerError;
use crate::market::{HttpQuoteSource, Quote, QuoteOutcome, REFERENCE_PRICES};
use crate::models::{
    CashEntry, CheckFilter, CheckView, Flow, Invoice, NewCashEntry, NewCheck, NewCropArea,
    NewDairyRecord, NewInvoice, NewLivestock, NewMargin, NewProvider,
};
use chrono::NaiveDate;
use std::path::Path;
use std::time::Duration;

type HandlerResult = Result<(), LedgerError>;

fn optional_date(field: &'static str, raw: Option<&str>) -> Result<Option<NaiveDate>, LedgerError> {
    Ok(raw.map(|r| parse_date(field, r)).transpose()?)
}

fn optional_f64(field: &'static str, raw: Option<&str>) -> Result<Option<f64>, LedgerError> {
    Ok(raw.map(|r| parse_f64(field, r)).transpose()?)
}

fn or_dash<T: ToString>(value: Option<T>) -> String {
    value.map_or_else(|| "-".to_string(), |v| v.to_string())
}

fn print_check(view: &CheckView) {
    let check = &view.check;
    println!(
        "{icon} #{id} {number} | {bank} | {amount} | due {due} ({days} days, {band}) [{status}]",
        icon = view.band.icon(),
        id = check.id,
        number = check.number,
        bank = check.bank,
        amount = format_money(check.amount),
        due = check.due_date,
        days = view.days_remaining,
        band = view.band,
        status = check.status,
    );
}

fn print_invoice(invoice: &Invoice) {
    println!(
        "#{} {} | {} | {} | provider {}{}",
        invoice.id,
        invoice.date,
        invoice.number,
        format_money(invoice.amount),
        or_dash(invoice.provider_id.map(|id| format!("#{id}"))),
        invoice
            .description
            .as_deref()
            .map(|d| format!(" | {d}"))
            .unwrap_or_default(),
    );
}

fn print_entry(entry: &CashEntry) {
    println!(
        "#{} {} | {:<9} | {} | {}{}",
        entry.id,
        entry.date,
        entry.category.as_str(),
        entry.concept,
        format_money(entry.amount),
        entry
            .description
            .as_deref()
            .map(|d| format!(" | {d}"))
            .unwrap_or_default(),
    );
}

/// Handle the init command
pub fn handle_init(ledger: &Ledger) -> HandlerResult {
    let seeded = ledger.init()?;

    println!(
        "Initialized agroledger database at {}",
        ledger.store().path().display()
    );
    if seeded {
        println!("  - Loaded demonstration data");
    } else {
        println!("  - Existing data kept");
    }

    Ok(())
}

/// Handle the dashboard command
pub fn handle_dashboard(ledger: &Ledger, days: Option<i64>) -> HandlerResult {
    let dashboard = ledger.dashboard(days)?;

    println!("Dashboard for {}", ledger.today());
    println!(
        "Checks due within {} days: {}",
        dashboard.horizon_days,
        dashboard.due_check_count()
    );
    for view in &dashboard.due_checks {
        print!("  ");
        print_check(view);
    }
    println!("Providers:          {}", dashboard.provider_count);
    println!("Farmed area:        {:.2} ha", dashboard.total_hectares);
    println!(
        "Expenses this month: {}",
        format_money(dashboard.month.expenses)
    );
    println!(
        "Income this month:   {}",
        format_money(dashboard.month.income)
    );

    Ok(())
}

// ==================== Checks ====================

pub fn handle_check_add(
    ledger: &Ledger,
    number: &str,
    bank: &str,
    amount: &str,
    due_date: &str,
) -> HandlerResult {
    let check = ledger.add_check(NewCheck {
        number: number.to_string(),
        bank: bank.to_string(),
        amount: parse_decimal("amount", amount)?,
        due_date: parse_date("due_date", due_date)?,
    })?;

    println!(
        "Registered check #{}: {} ({}) {} due {}",
        check.id,
        check.number,
        check.bank,
        format_money(check.amount),
        check.due_date
    );

    Ok(())
}

pub fn handle_check_list(ledger: &Ledger, pending: bool, due_within: Option<i64>) -> HandlerResult {
    let filter = match (pending, due_within) {
        (_, Some(days)) => CheckFilter::DueWithin(days),
        (true, None) => CheckFilter::Pending,
        (false, None) => CheckFilter::All,
    };
    let checks = ledger.checks(filter)?;

    if checks.is_empty() {
        println!("No checks found");
        return Ok(());
    }
    for view in &checks {
        print_check(view);
    }

    Ok(())
}

pub fn handle_check_pay(ledger: &Ledger, id: i64) -> HandlerResult {
    let view = ledger.pay_check(id)?;
    println!(
        "Check #{} marked as paid ({})",
        view.check.id,
        format_money(view.check.amount)
    );
    Ok(())
}

pub fn handle_check_delete(ledger: &Ledger, id: i64) -> HandlerResult {
    ledger.delete_check(id)?;
    println!("Deleted check #{id}");
    Ok(())
}

// ==================== Providers ====================

pub fn handle_provider_add(ledger: &Ledger, new: NewProvider) -> HandlerResult {
    let provider = ledger.add_provider(new)?;
    println!("Added provider #{}: {}", provider.id, provider.name);
    Ok(())
}

pub fn handle_provider_list(ledger: &Ledger) -> HandlerResult {
    let providers = ledger.providers()?;

    if providers.is_empty() {
        println!("No providers found");
        return Ok(());
    }
    for p in &providers {
        println!("#{} {}", p.id, p.name);
        println!(
            "    sector: {} | tax id: {} | phone: {} | email: {}",
            or_dash(p.sector.as_deref()),
            or_dash(p.tax_id.as_deref()),
            or_dash(p.phone.as_deref()),
            or_dash(p.email.as_deref()),
        );
        if let Some(ref address) = p.address {
            println!("    address: {address}");
        }
    }

    Ok(())
}

pub fn handle_provider_delete(ledger: &Ledger, id: i64) -> HandlerResult {
    ledger.delete_provider(id)?;
    println!("Deleted provider #{id}");
    Ok(())
}

// ==================== Invoices ====================

pub fn handle_invoice_add(
    ledger: &Ledger,
    number: &str,
    amount: &str,
    provider: Option<i64>,
    date: Option<&str>,
    desc: Option<&str>,
) -> HandlerResult {
    let invoice = ledger.add_invoice(NewInvoice {
        provider_id: provider,
        number: number.to_string(),
        amount: parse_decimal("amount", amount)?,
        date: optional_date("date", date)?,
        description: desc.map(String::from),
    })?;

    println!(
        "Recorded invoice #{}: {} {} on {}",
        invoice.id,
        invoice.number,
        format_money(invoice.amount),
        invoice.date
    );

    Ok(())
}

pub fn handle_invoice_list(ledger: &Ledger, provider: Option<i64>) -> HandlerResult {
    let invoices = ledger.invoices(provider)?;

    if invoices.is_empty() {
        println!("No invoices found");
        return Ok(());
    }
    for invoice in &invoices {
        print_invoice(invoice);
    }

    Ok(())
}

pub fn handle_invoice_delete(ledger: &Ledger, id: i64) -> HandlerResult {
    ledger.delete_invoice(id)?;
    println!("Deleted invoice #{id}");
    Ok(())
}

pub fn handle_invoice_orphans(ledger: &Ledger) -> HandlerResult {
    let orphans = ledger.orphaned_invoices()?;

    if orphans.is_empty() {
        println!("No orphaned invoices");
        return Ok(());
    }
    println!("Invoices whose provider no longer exists:");
    for invoice in &orphans {
        print_invoice(invoice);
    }

    Ok(())
}

// ==================== Expenses / Income ====================

pub fn handle_entry_add(
    ledger: &Ledger,
    flow: Flow,
    category: &str,
    concept: &str,
    amount: &str,
    date: Option<&str>,
    desc: Option<&str>,
) -> HandlerResult {
    let entry = ledger.add_entry(
        flow,
        NewCashEntry {
            category: parse_category(category)?,
            concept: concept.to_string(),
            amount: parse_decimal("amount", amount)?,
            date: optional_date("date", date)?,
            description: desc.map(String::from),
        },
    )?;

    println!(
        "Recorded {} #{}: {} {} on {}",
        flow.entity().to_lowercase(),
        entry.id,
        entry.concept,
        format_money(entry.amount),
        entry.date
    );

    Ok(())
}

pub fn handle_entry_list(ledger: &Ledger, flow: Flow) -> HandlerResult {
    let entries = ledger.recent_entries(flow)?;

    if entries.is_empty() {
        println!("No {} found", flow.table());
        return Ok(());
    }
    for entry in &entries {
        print_entry(entry);
    }

    Ok(())
}

pub fn handle_entry_delete(ledger: &Ledger, flow: Flow, id: i64) -> HandlerResult {
    ledger.delete_entry(flow, id)?;
    println!("Deleted {} #{id}", flow.entity().to_lowercase());
    Ok(())
}

pub fn handle_entry_categories(ledger: &Ledger, flow: Flow) -> HandlerResult {
    let totals = ledger.category_totals(flow)?;

    if totals.is_empty() {
        println!("No {} found", flow.table());
        return Ok(());
    }
    for row in &totals {
        println!(
            "{:<10} | count {:>3} | total {:>16} | average {:>14}",
            row.category.as_str(),
            row.count,
            format_money(row.total),
            format_money(row.average)
        );
    }

    Ok(())
}

// ==================== Crops / Livestock ====================

pub fn handle_crop_add(
    ledger: &Ledger,
    crop: &str,
    hectares: &str,
    planted: Option<&str>,
    harvest: Option<&str>,
) -> HandlerResult {
    let area = ledger.add_crop_area(NewCropArea {
        crop: crop.to_string(),
        hectares: parse_f64("hectares", hectares)?,
        planting_date: optional_date("planting_date", planted)?,
        harvest_date: optional_date("harvest_date", harvest)?,
    })?;

    println!(
        "Added crop area #{}: {} ({:.2} ha)",
        area.id, area.crop, area.hectares
    );

    Ok(())
}

pub fn handle_crop_list(ledger: &Ledger) -> HandlerResult {
    let crops = ledger.crop_areas()?;

    if crops.is_empty() {
        println!("No crop areas found");
        return Ok(());
    }

    let total: f64 = crops.iter().map(|c| c.hectares).sum();
    for (crop, share) in crops.iter().zip(crop_shares(&crops)) {
        println!(
            "#{} {:<12} {:>10.2} ha {:>6.2}% | planted {} | harvest {}",
            crop.id,
            crop.crop,
            crop.hectares,
            share.percentage,
            or_dash(crop.planting_date),
            or_dash(crop.harvest_date),
        );
    }
    println!("Total: {total:.2} ha");

    Ok(())
}

pub fn handle_crop_delete(ledger: &Ledger, id: i64) -> HandlerResult {
    ledger.delete_crop_area(id)?;
    println!("Deleted crop area #{id}");
    Ok(())
}

pub fn handle_livestock_add(
    ledger: &Ledger,
    kind: &str,
    head_count: &str,
    category: Option<&str>,
) -> HandlerResult {
    let entry = ledger.add_livestock(NewLivestock {
        kind: kind.to_string(),
        head_count: parse_count("head_count", head_count)?,
        category: category.map(String::from),
    })?;

    println!(
        "Registered livestock #{}: {} head of {}",
        entry.id, entry.head_count, entry.kind
    );

    Ok(())
}

pub fn handle_livestock_list(ledger: &Ledger) -> HandlerResult {
    let herd = ledger.livestock()?;

    if herd.is_empty() {
        println!("No livestock found");
        return Ok(());
    }
    for entry in &herd {
        println!(
            "#{} {} | {} head | category {} | registered {}",
            entry.id,
            entry.kind,
            entry.head_count,
            or_dash(entry.category.as_deref()),
            entry.registered_at.format("%Y-%m-%d %H:%M"),
        );
    }

    Ok(())
}

pub fn handle_livestock_delete(ledger: &Ledger, id: i64) -> HandlerResult {
    ledger.delete_livestock(id)?;
    println!("Deleted livestock #{id}");
    Ok(())
}

// ==================== Dairy ====================

pub struct DairyArgs<'a> {
    pub liters: &'a str,
    pub date: Option<&'a str>,
    pub pregnancy: Option<&'a str>,
    pub calving: Option<&'a str>,
    pub weaning: Option<&'a str>,
    pub cows: Option<&'a str>,
    pub notes: Option<&'a str>,
}

pub fn handle_dairy_add(ledger: &Ledger, args: DairyArgs<'_>) -> HandlerResult {
    let record = ledger.add_dairy_record(NewDairyRecord {
        date: optional_date("date", args.date)?,
        liters: parse_f64("liters", args.liters)?,
        pregnancy_pct: optional_f64("pregnancy_pct", args.pregnancy)?,
        calving_pct: optional_f64("calving_pct", args.calving)?,
        weaning_pct: optional_f64("weaning_pct", args.weaning)?,
        lactating_cows: args
            .cows
            .map(|c| parse_count("lactating_cows", c))
            .transpose()?,
        notes: args.notes.map(String::from),
    })?;

    println!(
        "Recorded dairy record #{} for {}: {} l",
        record.id,
        record.date,
        or_dash(record.liters)
    );

    Ok(())
}

pub fn handle_dairy_list(ledger: &Ledger) -> HandlerResult {
    let records = ledger.recent_dairy_records()?;

    if records.is_empty() {
        println!("No dairy records found");
        return Ok(());
    }
    for r in &records {
        println!(
            "#{} {} | {} l | pregnancy {}% | calving {}% | weaning {}% | cows {}{}",
            r.id,
            r.date,
            or_dash(r.liters),
            or_dash(r.pregnancy_pct),
            or_dash(r.calving_pct),
            or_dash(r.weaning_pct),
            or_dash(r.lactating_cows),
            r.notes
                .as_deref()
                .map(|n| format!(" | {n}"))
                .unwrap_or_default(),
        );
    }

    Ok(())
}

pub fn handle_dairy_trend(ledger: &Ledger) -> HandlerResult {
    let trend = ledger.dairy_trend()?;

    if trend.points.is_empty() {
        println!("No dairy production recorded");
        return Ok(());
    }
    for (date, liters) in &trend.points {
        println!("{date} {liters:>10.1} l");
    }
    println!(
        "Average: {:.1} l over {} records",
        trend.average_liters,
        trend.points.len()
    );

    Ok(())
}

pub fn handle_dairy_delete(ledger: &Ledger, id: i64) -> HandlerResult {
    ledger.delete_dairy_record(id)?;
    println!("Deleted dairy record #{id}");
    Ok(())
}

// ==================== Margins ====================

pub fn handle_margin_summary(ledger: &Ledger) -> HandlerResult {
    let summary = ledger.margin_summary()?;

    println!("Total income:       {}", format_money(summary.total_income));
    println!("Total expenses:     {}", format_money(summary.total_expenses));
    println!("Margin:             {}", format_money(summary.margin));
    println!("Margin %:           {:.2}%", summary.margin_pct);
    println!("Farmed area:        {:.2} ha", summary.total_hectares);
    println!(
        "Margin per hectare: {}",
        format_money(summary.margin_per_hectare)
    );

    Ok(())
}

pub fn handle_margin_categories(ledger: &Ledger) -> HandlerResult {
    let rows = ledger.category_margins()?;

    if rows.is_empty() {
        println!("No income or expenses recorded");
        return Ok(());
    }
    for row in &rows {
        println!(
            "{:<10} | income {:>16} | expenses {:>16} | margin {:>16}",
            row.category.as_str(),
            format_money(row.income),
            format_money(row.expenses),
            format_money(row.margin)
        );
    }

    Ok(())
}

pub fn handle_margin_calc(
    ledger: &Ledger,
    product: &str,
    quantity: &str,
    cost: &str,
    income: &str,
) -> HandlerResult {
    let result = ledger.custom_margin(NewMargin {
        product: product.to_string(),
        quantity: parse_decimal("quantity", quantity)?,
        total_cost: parse_decimal("total_cost", cost)?,
        total_income: parse_decimal("total_income", income)?,
    })?;
    let record = &result.record;

    println!("Stored margin #{} for {}", record.id, record.product);
    println!("  Margin:   {}", format_money(record.margin));
    println!("  Per unit: {}", format_money(result.per_unit));

    Ok(())
}

pub fn handle_margin_list(ledger: &Ledger) -> HandlerResult {
    let margins = ledger.margins()?;

    if margins.is_empty() {
        println!("No margins stored");
        return Ok(());
    }
    for m in &margins {
        println!(
            "#{} {} | {} | {} | qty {} | cost {} | income {} | margin {}",
            m.id,
            m.date,
            m.kind,
            m.product,
            m.quantity,
            format_money(m.total_cost),
            format_money(m.total_income),
            format_money(m.margin),
        );
    }

    Ok(())
}

pub fn handle_margin_delete(ledger: &Ledger, id: i64) -> HandlerResult {
    ledger.delete_margin(id)?;
    println!("Deleted margin #{id}");
    Ok(())
}

// ==================== Maintenance ====================

pub fn handle_export(ledger: &Ledger, dir: &Path) -> HandlerResult {
    let files = ledger.export(dir)?;

    if files.is_empty() {
        println!("Nothing to export");
        return Ok(());
    }
    for file in &files {
        println!("Exported: {}", file.display());
    }
    println!("Exported {} tables", files.len());

    Ok(())
}

pub fn handle_backup(ledger: &Ledger, dir: &Path) -> HandlerResult {
    let path = ledger.backup(dir)?;
    println!("Backup created: {}", path.display());
    Ok(())
}

pub fn handle_report(ledger: &Ledger, dir: &Path) -> HandlerResult {
    let (report, path) = ledger.write_report(dir)?;
    println!("Report written to {}", path.display());
    println!();
    print!("{report}");
    Ok(())
}

/// Without confirmation nothing is deleted
pub fn handle_purge(ledger: &Ledger, days: i64, yes: bool) -> HandlerResult {
    if !yes {
        println!(
            "Purge would delete expenses, incomes and dairy records older than {days} days."
        );
        println!("Nothing deleted. Re-run with --yes to confirm.");
        return Ok(());
    }

    let summary = ledger.purge(days)?;
    println!("Deleted records older than {days} days:");
    println!("  - Expenses:      {}", summary.expenses);
    println!("  - Incomes:       {}", summary.incomes);
    println!("  - Dairy records: {}", summary.dairy_records);
    println!("  Total:           {}", summary.total());

    Ok(())
}

// ==================== Market ====================

fn print_quote(label: &str, quote: &Quote) {
    println!(
        "{label}: buy {} | sell {} ({})",
        format_money(quote.buy),
        format_money(quote.sell),
        quote.fetched_at.format("%Y-%m-%d %H:%M")
    );
}

/// A failed lookup is reported but does not fail the command
pub fn handle_quote(ledger: &Ledger, url: Option<String>, timeout_secs: u64) -> HandlerResult {
    let settings = ledger.settings()?.with_overrides(None, url);
    let outcome = match HttpQuoteSource::new(&settings.quote_url, Duration::from_secs(timeout_secs))
    {
        Ok(source) => ledger.currency_quote(&source)?,
        Err(error) => QuoteOutcome::Fallback {
            error,
            last_known: ledger.last_quote()?,
        },
    };

    match &outcome {
        QuoteOutcome::Live(quote) => print_quote("Dollar (blue)", quote),
        QuoteOutcome::Fallback { error, last_known } => {
            println!("Could not fetch dollar quote: {error}");
            match last_known {
                Some(quote) => print_quote("Last known", quote),
                None => println!("No previous quote available"),
            }
        }
    }

    println!();
    println!("Reference prices:");
    for price in REFERENCE_PRICES {
        println!("  {:<20} {:<12} {}", price.name, price.price, price.source);
    }

    Ok(())
}

// ==================== Config ====================

pub fn handle_config_get(ledger: &Ledger, key: &str) -> HandlerResult {
    println!("{}", ledger.get_setting(key)?);
    Ok(())
}

pub fn handle_config_set(ledger: &Ledger, key: &str, value: &str) -> HandlerResult {
    ledger.set_setting(key, value)?;
    println!("Set {key} = {}", value.trim());
    Ok(())
}

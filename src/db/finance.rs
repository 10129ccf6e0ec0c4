use super::{Store, decimal_col, decimal_to_sql, expect_row, money_col, query_all, timestamp_col};
use crate::error::{LedgerError, Result};
use crate::models::{
    CashEntry, Category, Check, CheckFilter, CheckStatus, Flow, Invoice, Margin, NewCashEntry,
    NewCheck, NewInvoice, NewMargin, NewProvider, Provider,
};
use chrono::{Datelike, Days, NaiveDate};
use rusqlite::{Connection, OptionalExtension, Row};
use tracing::info;

const CHECK_COLUMNS: &str = "id, number, bank, amount, due_date, status, created_at";
const PROVIDER_COLUMNS: &str = "id, name, sector, tax_id, phone, email, address, created_at";
const INVOICE_COLUMNS: &str = "id, provider_id, number, amount, date, description";
const ENTRY_COLUMNS: &str = "id, category, concept, amount, date, description";
const MARGIN_COLUMNS: &str =
    "id, kind, product, quantity, total_cost, total_income, margin, date";

/// Kind recorded for margins entered by hand
pub const CUSTOM_MARGIN_KIND: &str = "custom";

/// Last due date covered by a `days` horizon. `None` when the horizon runs
/// past year 9999, where stored date text stops sorting chronologically.
fn due_limit(today: NaiveDate, days: i64) -> Option<NaiveDate> {
    today
        .checked_add_days(Days::new(days.max(0) as u64))
        .filter(|limit| limit.year() <= 9999)
}

fn pending_checks(conn: &Connection) -> Result<Vec<Check>> {
    query_all(
        conn,
        &format!(
            "SELECT {CHECK_COLUMNS} FROM checks
             WHERE status = 'pending'
             ORDER BY due_date, id"
        ),
        [],
        check_from_row,
    )
}

impl Store {
    // ==================== Check Operations ====================

    pub fn create_check(&self, new: &NewCheck) -> Result<Check> {
        self.with_conn(|conn| {
            conn.execute(
                "INSERT INTO checks (number, bank, amount, due_date) VALUES (?1, ?2, ?3, ?4)",
                (
                    &new.number,
                    &new.bank,
                    decimal_to_sql(new.amount),
                    new.due_date,
                ),
            )?;
            let id = conn.last_insert_rowid();
            info!(id, number = %new.number, "created check");
            fetch_check(conn, id)?.ok_or(LedgerError::NotFound { entity: "Check", id })
        })
    }

    pub fn get_check(&self, id: i64) -> Result<Option<Check>> {
        self.with_conn(|conn| fetch_check(conn, id))
    }

    /// Checks ordered by due date, oldest first
    pub fn list_checks(&self, filter: CheckFilter, today: NaiveDate) -> Result<Vec<Check>> {
        self.with_conn(|conn| {
            match filter {
                CheckFilter::All => query_all(
                    conn,
                    &format!("SELECT {CHECK_COLUMNS} FROM checks ORDER BY due_date, id"),
                    [],
                    check_from_row,
                ),
                CheckFilter::DueWithin(days) => match due_limit(today, days) {
                    Some(limit) => query_all(
                        conn,
                        &format!(
                            "SELECT {CHECK_COLUMNS} FROM checks
                             WHERE due_date <= ?1 AND status = 'pending'
                             ORDER BY due_date, id"
                        ),
                        [limit],
                        check_from_row,
                    ),
                    None => pending_checks(conn),
                },
                CheckFilter::Pending => pending_checks(conn),
            }
        })
    }

    /// Pending -> paid. A paid check stays paid.
    pub fn mark_check_paid(&self, id: i64) -> Result<Check> {
        self.with_conn(|conn| {
            let rows = conn.execute(
                "UPDATE checks SET status = 'paid' WHERE id = ?1 AND status = 'pending'",
                [id],
            )?;
            let check = fetch_check(conn, id)?.ok_or(LedgerError::NotFound { entity: "Check", id })?;
            if rows == 0 {
                return Err(LedgerError::CheckAlreadyPaid(id));
            }
            info!(id, "check paid");
            Ok(check)
        })
    }

    /// Only pending checks can be deleted; paid checks are kept as history.
    pub fn delete_check(&self, id: i64) -> Result<()> {
        self.with_conn(|conn| {
            let check = fetch_check(conn, id)?.ok_or(LedgerError::NotFound { entity: "Check", id })?;
            if check.status == CheckStatus::Paid {
                return Err(LedgerError::CheckAlreadyPaid(id));
            }
            conn.execute("DELETE FROM checks WHERE id = ?1", [id])?;
            info!(id, "deleted check");
            Ok(())
        })
    }

    // ==================== Provider Operations ====================

    pub fn create_provider(&self, new: &NewProvider) -> Result<Provider> {
        self.with_conn(|conn| {
            conn.execute(
                "INSERT INTO providers (name, sector, tax_id, phone, email, address)
                 VALUES (?1, ?2, ?3, ?4, ?5, ?6)",
                (
                    &new.name,
                    &new.sector,
                    &new.tax_id,
                    &new.phone,
                    &new.email,
                    &new.address,
                ),
            )?;
            let id = conn.last_insert_rowid();
            info!(id, name = %new.name, "created provider");
            fetch_provider(conn, id)?.ok_or(LedgerError::NotFound { entity: "Provider", id })
        })
    }

    pub fn get_provider(&self, id: i64) -> Result<Option<Provider>> {
        self.with_conn(|conn| fetch_provider(conn, id))
    }

    /// Providers by name
    pub fn list_providers(&self) -> Result<Vec<Provider>> {
        self.with_conn(|conn| {
            query_all(
                conn,
                &format!("SELECT {PROVIDER_COLUMNS} FROM providers ORDER BY name, id"),
                [],
                provider_from_row,
            )
        })
    }

    /// Invoices pointing at the provider are left in place.
    pub fn delete_provider(&self, id: i64) -> Result<()> {
        self.with_conn(|conn| {
            let rows = conn.execute("DELETE FROM providers WHERE id = ?1", [id])?;
            expect_row(rows, "Provider", id)?;
            info!(id, "deleted provider");
            Ok(())
        })
    }

    // ==================== Invoice Operations ====================

    pub fn create_invoice(&self, new: &NewInvoice, date: NaiveDate) -> Result<Invoice> {
        self.with_conn(|conn| {
            if let Some(provider_id) = new.provider_id {
                if fetch_provider(conn, provider_id)?.is_none() {
                    return Err(LedgerError::ProviderNotFound(provider_id));
                }
            }
            conn.execute(
                "INSERT INTO invoices (provider_id, number, amount, date, description)
                 VALUES (?1, ?2, ?3, ?4, ?5)",
                (
                    new.provider_id,
                    &new.number,
                    decimal_to_sql(new.amount),
                    date,
                    &new.description,
                ),
            )?;
            let id = conn.last_insert_rowid();
            info!(id, number = %new.number, "created invoice");
            fetch_invoice(conn, id)?.ok_or(LedgerError::NotFound { entity: "Invoice", id })
        })
    }

    pub fn get_invoice(&self, id: i64) -> Result<Option<Invoice>> {
        self.with_conn(|conn| fetch_invoice(conn, id))
    }

    /// Invoices, newest first. `provider_id` narrows to one provider.
    pub fn list_invoices(&self, provider_id: Option<i64>) -> Result<Vec<Invoice>> {
        self.with_conn(|conn| {
            match provider_id {
                Some(provider_id) => query_all(
                    conn,
                    &format!(
                        "SELECT {INVOICE_COLUMNS} FROM invoices
                         WHERE provider_id = ?1
                         ORDER BY date DESC, id DESC"
                    ),
                    [provider_id],
                    invoice_from_row,
                ),
                None => query_all(
                    conn,
                    &format!("SELECT {INVOICE_COLUMNS} FROM invoices ORDER BY date DESC, id DESC"),
                    [],
                    invoice_from_row,
                ),
            }
        })
    }

    /// Invoices whose provider has since been deleted
    pub fn orphaned_invoices(&self) -> Result<Vec<Invoice>> {
        self.with_conn(|conn| {
            query_all(
                conn,
                "SELECT i.id, i.provider_id, i.number, i.amount, i.date, i.description
                 FROM invoices i
                 LEFT JOIN providers p ON p.id = i.provider_id
                 WHERE i.provider_id IS NOT NULL AND p.id IS NULL
                 ORDER BY i.id",
                [],
                invoice_from_row,
            )
        })
    }

    pub fn delete_invoice(&self, id: i64) -> Result<()> {
        self.with_conn(|conn| {
            let rows = conn.execute("DELETE FROM invoices WHERE id = ?1", [id])?;
            expect_row(rows, "Invoice", id)?;
            info!(id, "deleted invoice");
            Ok(())
        })
    }

    // ==================== Expense / Income Operations ====================

    pub fn create_entry(&self, flow: Flow, new: &NewCashEntry, date: NaiveDate) -> Result<CashEntry> {
        self.with_conn(|conn| {
            conn.execute(
                &format!(
                    "INSERT INTO {} (category, concept, amount, date, description)
                     VALUES (?1, ?2, ?3, ?4, ?5)",
                    flow.table()
                ),
                (
                    new.category.as_str(),
                    &new.concept,
                    decimal_to_sql(new.amount),
                    date,
                    &new.description,
                ),
            )?;
            let id = conn.last_insert_rowid();
            info!(id, table = flow.table(), category = %new.category, "created entry");
            fetch_entry(conn, flow, id)?.ok_or(LedgerError::NotFound {
                entity: flow.entity(),
                id,
            })
        })
    }

    pub fn get_entry(&self, flow: Flow, id: i64) -> Result<Option<CashEntry>> {
        self.with_conn(|conn| fetch_entry(conn, flow, id))
    }

    /// The `limit` most recent entries, newest first
    pub fn list_recent_entries(&self, flow: Flow, limit: usize) -> Result<Vec<CashEntry>> {
        self.with_conn(|conn| {
            query_all(
                conn,
                &format!(
                    "SELECT {ENTRY_COLUMNS} FROM {} ORDER BY date DESC, id DESC LIMIT ?1",
                    flow.table()
                ),
                [limit as i64],
                entry_from_row,
            )
        })
    }

    pub fn delete_entry(&self, flow: Flow, id: i64) -> Result<()> {
        self.with_conn(|conn| {
            let rows = conn.execute(&format!("DELETE FROM {} WHERE id = ?1", flow.table()), [id])?;
            expect_row(rows, flow.entity(), id)?;
            info!(id, table = flow.table(), "deleted entry");
            Ok(())
        })
    }

    // ==================== Margin Operations ====================

    /// Store a margin row. The margin column is always computed here as
    /// income minus cost.
    pub fn insert_margin(&self, kind: &str, new: &NewMargin, date: NaiveDate) -> Result<Margin> {
        let margin = new.total_income - new.total_cost;
        self.with_conn(|conn| {
            conn.execute(
                "INSERT INTO margins (kind, product, quantity, total_cost, total_income, margin, date)
                 VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7)",
                (
                    kind,
                    &new.product,
                    decimal_to_sql(new.quantity),
                    decimal_to_sql(new.total_cost),
                    decimal_to_sql(new.total_income),
                    decimal_to_sql(margin),
                    date,
                ),
            )?;
            let id = conn.last_insert_rowid();
            info!(id, product = %new.product, %margin, "stored margin");
            fetch_margin(conn, id)?.ok_or(LedgerError::NotFound { entity: "Margin", id })
        })
    }

    pub fn get_margin(&self, id: i64) -> Result<Option<Margin>> {
        self.with_conn(|conn| fetch_margin(conn, id))
    }

    /// Stored margins, newest first
    pub fn list_margins(&self) -> Result<Vec<Margin>> {
        self.with_conn(|conn| {
            query_all(
                conn,
                &format!("SELECT {MARGIN_COLUMNS} FROM margins ORDER BY date DESC, id DESC"),
                [],
                margin_from_row,
            )
        })
    }

    pub fn delete_margin(&self, id: i64) -> Result<()> {
        self.with_conn(|conn| {
            let rows = conn.execute("DELETE FROM margins WHERE id = ?1", [id])?;
            expect_row(rows, "Margin", id)?;
            info!(id, "deleted margin");
            Ok(())
        })
    }
}

// ==================== Fetch Helpers ====================

fn fetch_check(conn: &Connection, id: i64) -> Result<Option<Check>> {
    conn.query_row(
        &format!("SELECT {CHECK_COLUMNS} FROM checks WHERE id = ?1"),
        [id],
        check_from_row,
    )
    .optional()
    .map_err(|e| e.into())
}

fn fetch_provider(conn: &Connection, id: i64) -> Result<Option<Provider>> {
    conn.query_row(
        &format!("SELECT {PROVIDER_COLUMNS} FROM providers WHERE id = ?1"),
        [id],
        provider_from_row,
    )
    .optional()
    .map_err(|e| e.into())
}

fn fetch_invoice(conn: &Connection, id: i64) -> Result<Option<Invoice>> {
    conn.query_row(
        &format!("SELECT {INVOICE_COLUMNS} FROM invoices WHERE id = ?1"),
        [id],
        invoice_from_row,
    )
    .optional()
    .map_err(|e| e.into())
}

fn fetch_entry(conn: &Connection, flow: Flow, id: i64) -> Result<Option<CashEntry>> {
    conn.query_row(
        &format!("SELECT {ENTRY_COLUMNS} FROM {} WHERE id = ?1", flow.table()),
        [id],
        entry_from_row,
    )
    .optional()
    .map_err(|e| e.into())
}

fn fetch_margin(conn: &Connection, id: i64) -> Result<Option<Margin>> {
    conn.query_row(
        &format!("SELECT {MARGIN_COLUMNS} FROM margins WHERE id = ?1"),
        [id],
        margin_from_row,
    )
    .optional()
    .map_err(|e| e.into())
}

// ==================== Row Parsers ====================

fn check_from_row(row: &Row) -> rusqlite::Result<Check> {
    let status: String = row.get("status")?;
    let status = CheckStatus::try_from(status.as_str())
        .map_err(|e| super::conversion_error("status", e))?;

    Ok(Check {
        id: row.get("id")?,
        number: row.get("number")?,
        bank: row.get("bank")?,
        amount: money_col(row, "amount")?,
        due_date: row.get("due_date")?,
        status,
        created_at: timestamp_col(row, "created_at")?,
    })
}

fn provider_from_row(row: &Row) -> rusqlite::Result<Provider> {
    Ok(Provider {
        id: row.get("id")?,
        name: row.get("name")?,
        sector: row.get("sector")?,
        tax_id: row.get("tax_id")?,
        phone: row.get("phone")?,
        email: row.get("email")?,
        address: row.get("address")?,
        created_at: timestamp_col(row, "created_at")?,
    })
}

fn invoice_from_row(row: &Row) -> rusqlite::Result<Invoice> {
    Ok(Invoice {
        id: row.get("id")?,
        provider_id: row.get("provider_id")?,
        number: row.get("number")?,
        amount: money_col(row, "amount")?,
        date: row.get("date")?,
        description: row.get("description")?,
    })
}

pub(super) fn category_col(row: &Row, column: &str) -> rusqlite::Result<Category> {
    let raw: String = row.get(column)?;
    Category::try_from(raw.as_str()).map_err(|e| super::conversion_error(column, e))
}

fn entry_from_row(row: &Row) -> rusqlite::Result<CashEntry> {
    Ok(CashEntry {
        id: row.get("id")?,
        category: category_col(row, "category")?,
        concept: row.get("concept")?,
        amount: money_col(row, "amount")?,
        date: row.get("date")?,
        description: row.get("description")?,
    })
}

fn margin_from_row(row: &Row) -> rusqlite::Result<Margin> {
    Ok(Margin {
        id: row.get("id")?,
        kind: row.get("kind")?,
        product: row.get("product")?,
        quantity: decimal_col(row, "quantity", 4)?,
        total_cost: money_col(row, "total_cost")?,
        total_income: money_col(row, "total_income")?,
        margin: money_col(row, "margin")?,
        date: row.get("date")?,
    })
}

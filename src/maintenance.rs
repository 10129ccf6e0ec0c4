//! Export, backup, retention purge and the plain-text financial report.

use crate::analytics::{format_money, percentage};
use crate::db::Store;
use crate::error::{LedgerError, Result};
use crate::models::CategoryTotal;
use chrono::NaiveDateTime;
use rusqlite::types::ValueRef;
use rust_decimal::Decimal;
use std::fmt;
use std::fs;
use std::path::{Path, PathBuf};
use tracing::{debug, info, warn};

pub const DEFAULT_EXPORT_DIR: &str = "exports";
pub const DEFAULT_BACKUP_DIR: &str = "backups";
pub const DEFAULT_REPORT_DIR: &str = "reports";

/// `YYYYMMDD_HHMMSS`, used in every generated file name
pub fn file_stamp(now: NaiveDateTime) -> String {
    now.format("%Y%m%d_%H%M%S").to_string()
}

// ==================== Export ====================

/// Write one CSV per non-empty table into `dir`. Empty tables produce no file.
/// Returns the files written, in table order. Every file is staged under a
/// `.partial` name first, and a failed export removes what this run wrote.
pub fn export_tables(store: &Store, dir: &Path, stamp: &str) -> Result<Vec<PathBuf>> {
    fs::create_dir_all(dir)?;
    let mut staged = Vec::new();
    let mut renamed = 0;

    let outcome = stage_tables(store, dir, stamp, &mut staged).and_then(|()| {
        for (partial, target) in &staged {
            fs::rename(partial, target)?;
            renamed += 1;
        }
        Ok(())
    });
    if let Err(e) = outcome {
        for (i, (partial, target)) in staged.iter().enumerate() {
            let leftover = if i < renamed { target } else { partial };
            if leftover.exists() && fs::remove_file(leftover).is_err() {
                warn!(path = %leftover.display(), "could not remove export file");
            }
        }
        return Err(e);
    }

    info!(files = staged.len(), dir = %dir.display(), "export complete");
    Ok(staged.into_iter().map(|(_, target)| target).collect())
}

/// Write each non-empty table to its `.partial` file. A pair is recorded
/// before its file is created.
fn stage_tables(
    store: &Store,
    dir: &Path,
    stamp: &str,
    staged: &mut Vec<(PathBuf, PathBuf)>,
) -> Result<()> {
    for table in store.table_names()? {
        let (header, rows) = store.with_conn(|conn| read_table(conn, &table))?;
        if rows.is_empty() {
            debug!(%table, "skipping empty table");
            continue;
        }

        let target = dir.join(format!("{table}_{stamp}.csv"));
        let partial = dir.join(format!("{table}_{stamp}.csv.partial"));
        staged.push((partial.clone(), target));

        let mut writer = csv::Writer::from_path(&partial)?;
        writer.write_record(&header)?;
        for row in &rows {
            writer.write_record(row)?;
        }
        writer.flush()?;
        info!(%table, rows = rows.len(), "exported table");
    }
    Ok(())
}

type TableDump = (Vec<String>, Vec<Vec<String>>);

fn read_table(conn: &rusqlite::Connection, table: &str) -> Result<TableDump> {
    let mut stmt = conn.prepare(&format!("SELECT * FROM \"{table}\" ORDER BY rowid"))?;
    let header: Vec<String> = stmt.column_names().into_iter().map(String::from).collect();
    let width = header.len();

    let mut rows = Vec::new();
    let mut cursor = stmt.query([])?;
    while let Some(row) = cursor.next()? {
        let mut record = Vec::with_capacity(width);
        for i in 0..width {
            record.push(cell_text(row.get_ref(i)?));
        }
        rows.push(record);
    }
    Ok((header, rows))
}

fn cell_text(value: ValueRef<'_>) -> String {
    match value {
        ValueRef::Null => String::new(),
        ValueRef::Integer(i) => i.to_string(),
        ValueRef::Real(f) => f.to_string(),
        ValueRef::Text(t) | ValueRef::Blob(t) => String::from_utf8_lossy(t).into_owned(),
    }
}

// ==================== Backup ====================

/// Byte copy of `source` into `dir`. The copy is written under a `.partial`
/// name and only renamed once complete; a failed copy leaves nothing behind.
pub fn backup_file(source: &Path, dir: &Path, stamp: &str) -> Result<PathBuf> {
    if !source.is_file() {
        return Err(LedgerError::BackupSourceMissing(source.to_path_buf()));
    }
    fs::create_dir_all(dir)?;

    let target = dir.join(format!("agroledger_backup_{stamp}.db"));
    let partial = dir.join(format!("agroledger_backup_{stamp}.db.partial"));

    let copied = fs::copy(source, &partial).and_then(|bytes| {
        fs::rename(&partial, &target)?;
        Ok(bytes)
    });
    match copied {
        Ok(bytes) => {
            info!(path = %target.display(), bytes, "backup created");
            Ok(target)
        }
        Err(e) => {
            if partial.exists() && fs::remove_file(&partial).is_err() {
                warn!(path = %partial.display(), "could not remove partial backup");
            }
            Err(e.into())
        }
    }
}

// ==================== Financial Report ====================

#[derive(Debug, Clone)]
pub struct FinancialReport {
    pub generated_at: NaiveDateTime,
    pub income: Vec<CategoryTotal>,
    pub expenses: Vec<CategoryTotal>,
    pub total_income: Decimal,
    pub total_expenses: Decimal,
    /// Balance as a percentage of income, 0 without income
    pub profitability_pct: Decimal,
}

impl FinancialReport {
    pub fn new(
        generated_at: NaiveDateTime,
        income: Vec<CategoryTotal>,
        expenses: Vec<CategoryTotal>,
        total_income: Decimal,
        total_expenses: Decimal,
    ) -> Result<Self> {
        let profitability_pct = percentage(total_income - total_expenses, total_income)
            .ok_or(LedgerError::Overflow("profitability %"))?;
        Ok(FinancialReport {
            generated_at,
            income,
            expenses,
            total_income,
            total_expenses,
            profitability_pct,
        })
    }

    pub fn balance(&self) -> Decimal {
        self.total_income - self.total_expenses
    }
}

impl fmt::Display for FinancialReport {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let rule = "=".repeat(60);
        let thin = "-".repeat(60);

        writeln!(f, "{rule}")?;
        writeln!(f, "FINANCIAL REPORT - agroledger")?;
        writeln!(f, "Generated: {}", self.generated_at.format("%Y-%m-%d %H:%M"))?;
        writeln!(f, "{rule}")?;
        writeln!(f)?;

        for (title, rows) in [
            ("INCOME BY CATEGORY", &self.income),
            ("EXPENSES BY CATEGORY", &self.expenses),
        ] {
            writeln!(f, "{title}:")?;
            writeln!(f, "{thin}")?;
            for row in rows {
                writeln!(
                    f,
                    "  {:<15} | Count: {:>3} | Total: {:>15} | Average: {:>13}",
                    row.category.as_str(),
                    row.count,
                    format_money(row.total),
                    format_money(row.average),
                )?;
            }
            writeln!(f)?;
        }

        writeln!(f, "SUMMARY:")?;
        writeln!(f, "{thin}")?;
        writeln!(f, "  Total income:   {:>18}", format_money(self.total_income))?;
        writeln!(f, "  Total expenses: {:>18}", format_money(self.total_expenses))?;
        writeln!(f, "  Balance:        {:>18}", format_money(self.balance()))?;
        writeln!(f)?;
        writeln!(f, "  Profitability:  {:>17.2}%", self.profitability_pct)?;
        writeln!(f, "{rule}")
    }
}

/// Write the rendered report to `dir/financial_report_<stamp>.txt`
pub fn write_report(report: &FinancialReport, dir: &Path, stamp: &str) -> Result<PathBuf> {
    fs::create_dir_all(dir)?;
    let path = dir.join(format!("financial_report_{stamp}.txt"));
    fs::write(&path, report.to_string())?;
    info!(path = %path.display(), "financial report written");
    Ok(path)
}

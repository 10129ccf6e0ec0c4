use super::finance::category_col;
use super::{Store, conversion_error, decimal_from_f64, money_col, query_all};
use crate::error::Result;
use crate::models::{CategoryTotal, Flow, PurgeSummary};
use chrono::NaiveDate;
use rusqlite::Row;
use rust_decimal::Decimal;
use tracing::{debug, info};

/// Tables subject to the retention purge, keyed on their `date` column
const PURGEABLE: [&str; 3] = ["expenses", "incomes", "dairy_records"];

impl Store {
    /// Sum of amounts whose date string starts with `month_prefix` (`YYYY-MM`).
    /// Matching is a literal prefix match on the stored text.
    pub fn month_total(&self, flow: Flow, month_prefix: &str) -> Result<Decimal> {
        let pattern = format!("{month_prefix}%");
        self.with_conn(|conn| {
            let total: f64 = conn.query_row(
                &format!(
                    "SELECT COALESCE(SUM(amount), 0.0) FROM {} WHERE date LIKE ?1",
                    flow.table()
                ),
                [&pattern],
                |row| row.get(0),
            )?;
            debug!(table = flow.table(), %pattern, total, "month total");
            to_money(total)
        })
    }

    /// Sum of every amount ever recorded
    pub fn flow_total(&self, flow: Flow) -> Result<Decimal> {
        self.with_conn(|conn| {
            let total: f64 = conn.query_row(
                &format!("SELECT COALESCE(SUM(amount), 0.0) FROM {}", flow.table()),
                [],
                |row| row.get(0),
            )?;
            to_money(total)
        })
    }

    /// Count, total and average amount per category, ordered by category
    pub fn category_totals(&self, flow: Flow) -> Result<Vec<CategoryTotal>> {
        self.with_conn(|conn| {
            query_all(
                conn,
                &format!(
                    "SELECT category,
                            COUNT(*) AS count,
                            SUM(amount) AS total,
                            AVG(amount) AS average
                     FROM {}
                     GROUP BY category
                     ORDER BY category",
                    flow.table()
                ),
                [],
                category_total_from_row,
            )
        })
    }

    pub fn count_providers(&self) -> Result<i64> {
        self.with_conn(|conn| {
            conn.query_row("SELECT COUNT(*) FROM providers", [], |row| row.get(0))
                .map_err(|e| e.into())
        })
    }

    /// Sum of all crop hectares, 0 when there are none
    pub fn total_hectares(&self) -> Result<f64> {
        self.with_conn(|conn| {
            conn.query_row(
                "SELECT COALESCE(SUM(hectares), 0.0) FROM crop_areas",
                [],
                |row| row.get(0),
            )
            .map_err(|e| e.into())
        })
    }

    /// Delete expenses, incomes and dairy records dated strictly before
    /// `cutoff`, all in one transaction.
    pub fn purge_before(&self, cutoff: NaiveDate) -> Result<PurgeSummary> {
        self.with_conn(|conn| {
            let tx = conn.transaction()?;
            let mut removed = [0usize; PURGEABLE.len()];
            for (slot, table) in removed.iter_mut().zip(PURGEABLE) {
                *slot = tx.execute(&format!("DELETE FROM {table} WHERE date < ?1"), [cutoff])?;
            }
            tx.commit()?;

            let summary = PurgeSummary {
                expenses: removed[0],
                incomes: removed[1],
                dairy_records: removed[2],
            };
            info!(%cutoff, total = summary.total(), "purged old records");
            Ok(summary)
        })
    }
}

fn to_money(value: f64) -> Result<Decimal> {
    decimal_from_f64(value, 2).ok_or_else(|| conversion_error("amount", value.to_string()).into())
}

fn category_total_from_row(row: &Row) -> rusqlite::Result<CategoryTotal> {
    Ok(CategoryTotal {
        category: category_col(row, "category")?,
        count: row.get("count")?,
        total: money_col(row, "total")?,
        average: money_col(row, "average")?,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::{Category, NewCashEntry, NewDairyRecord, NewProvider};
    use tempfile::TempDir;

    fn setup() -> (Store, TempDir) {
        let temp_dir = TempDir::new().unwrap();
        let store = Store::open(temp_dir.path().join("test.db"));
        store.initialize().unwrap();
        (store, temp_dir)
    }

    fn date(y: i32, m: u32, d: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(y, m, d).unwrap()
    }

    fn add(store: &Store, flow: Flow, category: Category, amount: i64, on: NaiveDate) {
        store
            .create_entry(
                flow,
                &NewCashEntry {
                    category,
                    concept: "x".to_string(),
                    amount: Decimal::from(amount),
                    date: None,
                    description: None,
                },
                on,
            )
            .unwrap();
    }

    #[test]
    fn test_month_total_matches_prefix() {
        let (store, _temp) = setup();
        add(&store, Flow::Expense, Category::Agro, 100, date(2025, 3, 1));
        add(&store, Flow::Expense, Category::Other, 50, date(2025, 3, 31));
        add(&store, Flow::Expense, Category::Agro, 999, date(2025, 2, 28));

        assert_eq!(
            store.month_total(Flow::Expense, "2025-03").unwrap(),
            Decimal::from(150)
        );
        assert_eq!(
            store.month_total(Flow::Income, "2025-03").unwrap(),
            Decimal::ZERO
        );
    }

    #[test]
    fn test_month_total_uses_literal_prefix() {
        let (store, _temp) = setup();
        store
            .with_conn(|conn| {
                conn.execute(
                    "INSERT INTO incomes (category, concept, amount, date)
                     VALUES ('agro', 'odd', 70.0, '2025-03-99')",
                    [],
                )?;
                Ok(())
            })
            .unwrap();

        assert_eq!(
            store.month_total(Flow::Income, "2025-03").unwrap(),
            Decimal::from(70)
        );
    }

    #[test]
    fn test_category_totals_sum_to_flow_total() {
        let (store, _temp) = setup();
        add(&store, Flow::Income, Category::Agro, 2_500_000, date(2025, 1, 1));
        add(&store, Flow::Income, Category::Agro, 500_000, date(2025, 1, 2));
        add(&store, Flow::Income, Category::Livestock, 1_800_000, date(2025, 1, 3));

        let totals = store.category_totals(Flow::Income).unwrap();
        assert_eq!(totals.len(), 2);
        assert_eq!(totals[0].category, Category::Agro);
        assert_eq!(totals[0].count, 2);
        assert_eq!(totals[0].total, Decimal::from(3_000_000));
        assert_eq!(totals[0].average, Decimal::from(1_500_000));

        let grouped: Decimal = totals.iter().map(|t| t.total).sum();
        assert_eq!(grouped, store.flow_total(Flow::Income).unwrap());
    }

    #[test]
    fn test_counts() {
        let (store, _temp) = setup();
        assert_eq!(store.count_providers().unwrap(), 0);
        assert_eq!(store.total_hectares().unwrap(), 0.0);

        store
            .create_provider(&NewProvider {
                name: "Semillas".to_string(),
                ..Default::default()
            })
            .unwrap();
        assert_eq!(store.count_providers().unwrap(), 1);
    }

    #[test]
    fn test_purge_is_strictly_before_cutoff() {
        let (store, _temp) = setup();
        let cutoff = date(2024, 3, 15);
        add(&store, Flow::Expense, Category::Agro, 1, date(2024, 3, 14));
        add(&store, Flow::Expense, Category::Agro, 1, cutoff);
        add(&store, Flow::Income, Category::Agro, 1, date(2023, 1, 1));
        store
            .create_dairy_record(
                &NewDairyRecord {
                    liters: 10.0,
                    ..Default::default()
                },
                date(2024, 1, 1),
            )
            .unwrap();

        let summary = store.purge_before(cutoff).unwrap();
        assert_eq!(
            summary,
            PurgeSummary {
                expenses: 1,
                incomes: 1,
                dairy_records: 1,
            }
        );
        assert_eq!(summary.total(), 3);

        let left = store.list_recent_entries(Flow::Expense, 20).unwrap();
        assert_eq!(left.len(), 1);
        assert_eq!(left[0].date, cutoff);
    }
}

use crate::analytics;
use crate::config::{SettingKey, Settings};
use crate::db::{CUSTOM_MARGIN_KIND, Store};
use crate::error::{LedgerError, Result, ValidationError};
use crate::maintenance::{self, FinancialReport};
use crate::market::{Quote, QuoteOutcome, QuoteSource};
use crate::models::{
    CashEntry, Category, CategoryMargin, CategoryTotal, Check, CheckFilter, CheckView, CropArea,
    CropShare, CustomMargin, DairyRecord, DairyTrend, Dashboard, Flow, Invoice, Livestock, Margin,
    MarginSummary, MonthlyTotals, NewCashEntry, NewCheck, NewCropArea, NewDairyRecord, NewInvoice,
    NewLivestock, NewMargin, NewProvider, Provider, PurgeSummary,
};
use chrono::{Days, Local, NaiveDate, NaiveDateTime};
use rust_decimal::Decimal;
use std::path::{Path, PathBuf};
use std::str::FromStr;
use tracing::{debug, info, warn};

/// Recent expense / income rows shown in listings
pub const RECENT_ENTRIES_LIMIT: usize = 20;
/// Recent dairy records shown in listings
pub const RECENT_DAIRY_LIMIT: usize = 10;
/// Dairy records behind the production trend
pub const DAIRY_TREND_LIMIT: usize = 30;

fn local_today() -> NaiveDate {
    Local::now().date_naive()
}

fn local_now() -> NaiveDateTime {
    Local::now().naive_local()
}

/// Business logic over a [`Store`]. Every write is validated here before it
/// reaches the database.
pub struct Ledger {
    store: Store,
    today: fn() -> NaiveDate,
    now: fn() -> NaiveDateTime,
}

impl Ledger {
    /// Open the ledger at `path`. The file is not touched until first use.
    pub fn open<P: AsRef<Path>>(path: P) -> Self {
        Ledger {
            store: Store::open(path),
            today: local_today,
            now: local_now,
        }
    }

    /// Replace the clock used for "today" and report timestamps
    pub fn with_clock(mut self, today: fn() -> NaiveDate, now: fn() -> NaiveDateTime) -> Self {
        self.today = today;
        self.now = now;
        self
    }

    pub fn store(&self) -> &Store {
        &self.store
    }

    pub fn today(&self) -> NaiveDate {
        (self.today)()
    }

    /// Create the schema if needed
    pub fn initialize(&self) -> Result<()> {
        self.store.initialize()
    }

    /// Create the schema and load demonstration data into an empty ledger.
    /// Returns whether data was seeded.
    pub fn init(&self) -> Result<bool> {
        self.store.initialize()?;
        self.store.seed_if_empty(self.today())
    }

    pub fn settings(&self) -> Result<Settings> {
        Settings::load(&self.store)
    }

    // ==================== Check Operations ====================

    pub fn add_check(&self, new: NewCheck) -> Result<Check> {
        let new = NewCheck {
            number: required("number", &new.number)?,
            bank: required("bank", &new.bank)?,
            amount: positive_amount("amount", new.amount)?,
            due_date: new.due_date,
        };
        self.store.create_check(&new)
    }

    pub fn checks(&self, filter: CheckFilter) -> Result<Vec<CheckView>> {
        let today = self.today();
        let checks = self.store.list_checks(filter, today)?;
        Ok(checks
            .into_iter()
            .map(|c| analytics::check_view(c, today))
            .collect())
    }

    pub fn pay_check(&self, id: i64) -> Result<CheckView> {
        let check = self.store.mark_check_paid(id)?;
        Ok(analytics::check_view(check, self.today()))
    }

    pub fn delete_check(&self, id: i64) -> Result<()> {
        self.store.delete_check(id)
    }

    // ==================== Provider Operations ====================

    pub fn add_provider(&self, new: NewProvider) -> Result<Provider> {
        let new = NewProvider {
            name: required("name", &new.name)?,
            sector: optional_text(new.sector),
            tax_id: optional_text(new.tax_id),
            phone: optional_text(new.phone),
            email: optional_text(new.email),
            address: optional_text(new.address),
        };
        self.store.create_provider(&new)
    }

    pub fn providers(&self) -> Result<Vec<Provider>> {
        self.store.list_providers()
    }

    /// Invoices of the provider are kept and show up as orphans
    pub fn delete_provider(&self, id: i64) -> Result<()> {
        self.store.delete_provider(id)
    }

    // ==================== Invoice Operations ====================

    pub fn add_invoice(&self, new: NewInvoice) -> Result<Invoice> {
        let date = new.date.unwrap_or_else(|| self.today());
        let new = NewInvoice {
            provider_id: new.provider_id,
            number: required("number", &new.number)?,
            amount: positive_amount("amount", new.amount)?,
            date: Some(date),
            description: optional_text(new.description),
        };
        self.store.create_invoice(&new, date)
    }

    pub fn invoices(&self, provider_id: Option<i64>) -> Result<Vec<Invoice>> {
        self.store.list_invoices(provider_id)
    }

    pub fn orphaned_invoices(&self) -> Result<Vec<Invoice>> {
        self.store.orphaned_invoices()
    }

    pub fn delete_invoice(&self, id: i64) -> Result<()> {
        self.store.delete_invoice(id)
    }

    // ==================== Expense / Income Operations ====================

    pub fn add_entry(&self, flow: Flow, new: NewCashEntry) -> Result<CashEntry> {
        let date = new.date.unwrap_or_else(|| self.today());
        let new = NewCashEntry {
            category: new.category,
            concept: required("concept", &new.concept)?,
            amount: positive_amount("amount", new.amount)?,
            date: Some(date),
            description: optional_text(new.description),
        };
        self.store.create_entry(flow, &new, date)
    }

    pub fn recent_entries(&self, flow: Flow) -> Result<Vec<CashEntry>> {
        self.store.list_recent_entries(flow, RECENT_ENTRIES_LIMIT)
    }

    pub fn delete_entry(&self, flow: Flow, id: i64) -> Result<()> {
        self.store.delete_entry(flow, id)
    }

    pub fn category_totals(&self, flow: Flow) -> Result<Vec<CategoryTotal>> {
        self.store.category_totals(flow)
    }

    /// Expense and income totals of the month containing today
    pub fn monthly_totals(&self) -> Result<MonthlyTotals> {
        let prefix = self.today().format("%Y-%m").to_string();
        Ok(MonthlyTotals {
            expenses: self.store.month_total(Flow::Expense, &prefix)?,
            income: self.store.month_total(Flow::Income, &prefix)?,
        })
    }

    // ==================== Crop Area Operations ====================

    pub fn add_crop_area(&self, new: NewCropArea) -> Result<CropArea> {
        if !(new.hectares.is_finite() && new.hectares > 0.0) {
            return Err(ValidationError::OutOfRange {
                field: "hectares",
                reason: "must be greater than zero",
            }
            .into());
        }
        let new = NewCropArea {
            crop: required("crop", &new.crop)?,
            ..new
        };
        self.store.create_crop_area(&new)
    }

    pub fn crop_areas(&self) -> Result<Vec<CropArea>> {
        self.store.list_crop_areas()
    }

    pub fn delete_crop_area(&self, id: i64) -> Result<()> {
        self.store.delete_crop_area(id)
    }

    /// Each crop's share of the farmed area, largest first
    pub fn crop_distribution(&self) -> Result<Vec<CropShare>> {
        Ok(analytics::crop_shares(&self.store.list_crop_areas()?))
    }

    // ==================== Livestock Operations ====================

    pub fn add_livestock(&self, new: NewLivestock) -> Result<Livestock> {
        if new.head_count < 0 {
            return Err(ValidationError::OutOfRange {
                field: "head_count",
                reason: "must not be negative",
            }
            .into());
        }
        let new = NewLivestock {
            kind: required("kind", &new.kind)?,
            head_count: new.head_count,
            category: optional_text(new.category),
        };
        self.store.create_livestock(&new)
    }

    pub fn livestock(&self) -> Result<Vec<Livestock>> {
        self.store.list_livestock()
    }

    pub fn delete_livestock(&self, id: i64) -> Result<()> {
        self.store.delete_livestock(id)
    }

    // ==================== Dairy Operations ====================

    pub fn add_dairy_record(&self, new: NewDairyRecord) -> Result<DairyRecord> {
        if !(new.liters.is_finite() && new.liters >= 0.0) {
            return Err(ValidationError::OutOfRange {
                field: "liters",
                reason: "must not be negative",
            }
            .into());
        }
        if new.lactating_cows.is_some_and(|cows| cows < 0) {
            return Err(ValidationError::OutOfRange {
                field: "lactating_cows",
                reason: "must not be negative",
            }
            .into());
        }
        let date = new.date.unwrap_or_else(|| self.today());
        let new = NewDairyRecord {
            date: Some(date),
            liters: new.liters,
            pregnancy_pct: new.pregnancy_pct,
            calving_pct: new.calving_pct,
            weaning_pct: new.weaning_pct,
            lactating_cows: new.lactating_cows,
            notes: optional_text(new.notes),
        };
        self.store.create_dairy_record(&new, date)
    }

    pub fn latest_dairy_record(&self) -> Result<Option<DairyRecord>> {
        Ok(self.store.list_recent_dairy_records(1)?.into_iter().next())
    }

    pub fn recent_dairy_records(&self) -> Result<Vec<DairyRecord>> {
        self.store.list_recent_dairy_records(RECENT_DAIRY_LIMIT)
    }

    pub fn dairy_trend(&self) -> Result<DairyTrend> {
        let records = self.store.list_recent_dairy_records(DAIRY_TREND_LIMIT)?;
        Ok(analytics::dairy_trend(records))
    }

    pub fn delete_dairy_record(&self, id: i64) -> Result<()> {
        self.store.delete_dairy_record(id)
    }

    // ==================== Margin Operations ====================

    /// All-time income, expenses and the margin derived from them
    pub fn margin_summary(&self) -> Result<MarginSummary> {
        let income = self.store.flow_total(Flow::Income)?;
        let expenses = self.store.flow_total(Flow::Expense)?;
        let hectares = self.store.total_hectares()?;
        debug!(%income, %expenses, hectares, "margin summary");
        analytics::margin_summary(income, expenses, hectares)
    }

    pub fn category_margins(&self) -> Result<Vec<CategoryMargin>> {
        let income = self.store.category_totals(Flow::Income)?;
        let expenses = self.store.category_totals(Flow::Expense)?;
        Ok(analytics::merge_category_margins(&income, &expenses))
    }

    /// Compute and store a margin for one product. Quantity must be positive.
    pub fn custom_margin(&self, new: NewMargin) -> Result<CustomMargin> {
        let new = NewMargin {
            product: required("product", &new.product)?,
            quantity: new.quantity.round_dp(4),
            total_cost: new.total_cost.round_dp(2),
            total_income: new.total_income.round_dp(2),
        };
        if new.total_cost < Decimal::ZERO {
            return Err(ValidationError::OutOfRange {
                field: "total_cost",
                reason: "must not be negative",
            }
            .into());
        }
        if new.total_income < Decimal::ZERO {
            return Err(ValidationError::OutOfRange {
                field: "total_income",
                reason: "must not be negative",
            }
            .into());
        }
        let per_unit = analytics::per_unit_margin(new.total_income - new.total_cost, new.quantity)?;

        let record = self
            .store
            .insert_margin(CUSTOM_MARGIN_KIND, &new, self.today())?;
        Ok(CustomMargin { record, per_unit })
    }

    pub fn margins(&self) -> Result<Vec<Margin>> {
        self.store.list_margins()
    }

    pub fn delete_margin(&self, id: i64) -> Result<()> {
        self.store.delete_margin(id)
    }

    // ==================== Dashboard ====================

    /// Summary for the landing view. `horizon_days` overrides the stored
    /// `due_horizon_days` setting.
    pub fn dashboard(&self, horizon_days: Option<i64>) -> Result<Dashboard> {
        if horizon_days.is_some_and(|days| days < 0) {
            return Err(ValidationError::OutOfRange {
                field: "days",
                reason: "must not be negative",
            }
            .into());
        }
        let horizon = self
            .settings()?
            .with_overrides(horizon_days, None)
            .due_horizon_days;

        Ok(Dashboard {
            horizon_days: horizon,
            due_checks: self.checks(CheckFilter::DueWithin(horizon))?,
            provider_count: self.store.count_providers()?,
            total_hectares: self.store.total_hectares()?,
            month: self.monthly_totals()?,
        })
    }

    // ==================== Maintenance ====================

    pub fn export(&self, dir: &Path) -> Result<Vec<PathBuf>> {
        maintenance::export_tables(&self.store, dir, &self.stamp())
    }

    pub fn backup(&self, dir: &Path) -> Result<PathBuf> {
        self.store.close();
        maintenance::backup_file(self.store.path(), dir, &self.stamp())
    }

    /// Delete expenses, incomes and dairy records older than `days` days.
    /// A row dated exactly `days` ago is kept.
    pub fn purge(&self, days: i64) -> Result<PurgeSummary> {
        if days < 0 {
            return Err(ValidationError::OutOfRange {
                field: "days",
                reason: "must not be negative",
            }
            .into());
        }
        let cutoff = self
            .today()
            .checked_sub_days(Days::new(days as u64))
            .unwrap_or(NaiveDate::MIN);
        self.store.purge_before(cutoff)
    }

    pub fn financial_report(&self) -> Result<FinancialReport> {
        FinancialReport::new(
            (self.now)(),
            self.store.category_totals(Flow::Income)?,
            self.store.category_totals(Flow::Expense)?,
            self.store.flow_total(Flow::Income)?,
            self.store.flow_total(Flow::Expense)?,
        )
    }

    /// Build the report and write it into `dir`
    pub fn write_report(&self, dir: &Path) -> Result<(FinancialReport, PathBuf)> {
        let report = self.financial_report()?;
        let path = maintenance::write_report(&report, dir, &self.stamp())?;
        Ok((report, path))
    }

    fn stamp(&self) -> String {
        maintenance::file_stamp((self.now)())
    }

    // ==================== Market ====================

    /// Fetch a live quote and remember it. On failure the last remembered
    /// quote is returned alongside the error.
    pub fn currency_quote(&self, source: &dyn QuoteSource) -> Result<QuoteOutcome> {
        match source.fetch() {
            Ok(quote) => {
                let json = serde_json::to_string(&quote)?;
                self.store.set_setting(SettingKey::LastQuote.as_str(), &json)?;
                info!(buy = %quote.buy, sell = %quote.sell, "stored live quote");
                Ok(QuoteOutcome::Live(quote))
            }
            Err(error) => {
                warn!(%error, "quote fetch failed, using last known quote");
                Ok(QuoteOutcome::Fallback {
                    error,
                    last_known: self.last_quote()?,
                })
            }
        }
    }

    /// The last quote fetched successfully, if any is stored and readable
    pub fn last_quote(&self) -> Result<Option<Quote>> {
        let Some(raw) = self.store.get_setting(SettingKey::LastQuote.as_str())? else {
            return Ok(None);
        };
        match serde_json::from_str(&raw) {
            Ok(quote) => Ok(Some(quote)),
            Err(e) => {
                warn!(error = %e, "ignoring unreadable stored quote");
                Ok(None)
            }
        }
    }

    // ==================== Settings ====================

    /// Validate and store a user setting
    pub fn set_setting(&self, key: &str, value: &str) -> Result<()> {
        let key = SettingKey::parse_user_key(key)?;
        let value = key.validate(value)?;
        self.store.set_setting(key.as_str(), &value)?;
        info!(%key, %value, "setting updated");
        Ok(())
    }

    /// Effective value of a user setting
    pub fn get_setting(&self, key: &str) -> Result<String> {
        let key = SettingKey::parse_user_key(key)?;
        let settings = self.settings()?;
        settings.get(key).ok_or_else(|| {
            LedgerError::Validation(ValidationError::InvalidChoice {
                field: "key",
                value: key.to_string(),
                allowed: SettingKey::USER_KEYS,
            })
        })
    }
}

// ==================== Input Parsing ====================

/// Trimmed text, rejected when blank
pub fn required(field: &'static str, value: &str) -> std::result::Result<String, ValidationError> {
    let value = value.trim();
    if value.is_empty() {
        return Err(ValidationError::MissingField { field });
    }
    Ok(value.to_string())
}

/// Trimmed text, `None` when blank
pub fn optional_text(value: Option<String>) -> Option<String> {
    value
        .map(|v| v.trim().to_string())
        .filter(|v| !v.is_empty())
}

/// Parse a decimal amount typed by a user
pub fn parse_decimal(field: &'static str, raw: &str) -> std::result::Result<Decimal, ValidationError> {
    let raw = raw.trim();
    if raw.is_empty() {
        return Err(ValidationError::MissingField { field });
    }
    Decimal::from_str(raw).map_err(|_| ValidationError::InvalidNumber {
        field,
        value: raw.to_string(),
    })
}

/// Parse a floating point quantity such as hectares or liters
pub fn parse_f64(field: &'static str, raw: &str) -> std::result::Result<f64, ValidationError> {
    let raw = raw.trim();
    if raw.is_empty() {
        return Err(ValidationError::MissingField { field });
    }
    raw.parse::<f64>()
        .ok()
        .filter(|v| v.is_finite())
        .ok_or_else(|| ValidationError::InvalidNumber {
            field,
            value: raw.to_string(),
        })
}

/// Parse a whole number such as a head count
pub fn parse_count(field: &'static str, raw: &str) -> std::result::Result<i64, ValidationError> {
    let raw = raw.trim();
    if raw.is_empty() {
        return Err(ValidationError::MissingField { field });
    }
    raw.parse::<i64>().map_err(|_| ValidationError::InvalidNumber {
        field,
        value: raw.to_string(),
    })
}

pub fn parse_category(raw: &str) -> std::result::Result<Category, ValidationError> {
    Category::try_from(raw.trim().to_lowercase().as_str()).map_err(|_| {
        ValidationError::InvalidChoice {
            field: "category",
            value: raw.to_string(),
            allowed: Category::ALLOWED,
        }
    })
}

/// Parse a `YYYY-MM-DD` date
pub fn parse_date(field: &'static str, raw: &str) -> std::result::Result<NaiveDate, ValidationError> {
    let raw = raw.trim();
    if raw.is_empty() {
        return Err(ValidationError::MissingField { field });
    }
    NaiveDate::parse_from_str(raw, "%Y-%m-%d").map_err(|_| ValidationError::InvalidDate {
        field,
        value: raw.to_string(),
    })
}

/// Amounts must be positive and are kept to cents
fn positive_amount(field: &'static str, amount: Decimal) -> std::result::Result<Decimal, ValidationError> {
    if amount <= Decimal::ZERO {
        return Err(ValidationError::OutOfRange {
            field,
            reason: "must be greater than zero",
        });
    }
    Ok(amount.round_dp(2))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::market::QuoteError;
    use crate::models::{CheckStatus, DueBand};
    use tempfile::TempDir;

    fn fixed_today() -> NaiveDate {
        NaiveDate::from_ymd_opt(2025, 3, 5).unwrap()
    }

    fn fixed_now() -> NaiveDateTime {
        fixed_today().and_hms_opt(9, 15, 0).unwrap()
    }

    fn setup() -> (Ledger, TempDir) {
        let temp_dir = TempDir::new().unwrap();
        let ledger =
            Ledger::open(temp_dir.path().join("test.db")).with_clock(fixed_today, fixed_now);
        ledger.initialize().unwrap();
        (ledger, temp_dir)
    }

    fn days_ago(days: u64) -> NaiveDate {
        fixed_today() - Days::new(days)
    }

    fn entry(category: Category, amount: i64, date: NaiveDate) -> NewCashEntry {
        NewCashEntry {
            category,
            concept: "Entry".to_string(),
            amount: Decimal::from(amount),
            date: Some(date),
            description: None,
        }
    }

    struct StubSource(std::result::Result<(i64, i64), u16>);

    impl QuoteSource for StubSource {
        fn fetch(&self) -> std::result::Result<Quote, QuoteError> {
            match self.0 {
                Ok((buy, sell)) => Ok(Quote {
                    buy: Decimal::from(buy),
                    sell: Decimal::from(sell),
                    fetched_at: fixed_now(),
                }),
                Err(status) => Err(QuoteError::Status(status)),
            }
        }
    }

    #[test]
    fn test_init_seeds_once() {
        let (ledger, _temp) = setup();
        assert!(ledger.init().unwrap());
        assert!(!ledger.init().unwrap());
        assert_eq!(ledger.checks(CheckFilter::All).unwrap().len(), 3);
        assert_eq!(ledger.providers().unwrap().len(), 3);
    }

    #[test]
    fn test_all_time_margin_ignores_month() {
        let (ledger, _temp) = setup();
        ledger
            .add_entry(Flow::Expense, entry(Category::Agro, 800_000, days_ago(10)))
            .unwrap();
        ledger
            .add_entry(Flow::Income, entry(Category::Agro, 2_500_000, days_ago(20)))
            .unwrap();

        let month = ledger.monthly_totals().unwrap();
        assert_eq!(month.expenses, Decimal::ZERO);
        assert_eq!(month.income, Decimal::ZERO);

        let summary = ledger.margin_summary().unwrap();
        assert_eq!(summary.margin, Decimal::from(1_700_000));
        assert_eq!(summary.margin_per_hectare, Decimal::from(1_700_000));
    }

    #[test]
    fn test_monthly_totals_current_month() {
        let (ledger, _temp) = setup();
        ledger
            .add_entry(Flow::Expense, entry(Category::Other, 120_000, days_ago(2)))
            .unwrap();
        assert_eq!(
            ledger.monthly_totals().unwrap().expenses,
            Decimal::from(120_000)
        );
    }

    #[test]
    fn test_entry_validation() {
        let (ledger, _temp) = setup();

        let blank = NewCashEntry {
            concept: "   ".to_string(),
            ..entry(Category::Agro, 10, fixed_today())
        };
        assert!(matches!(
            ledger.add_entry(Flow::Expense, blank),
            Err(LedgerError::Validation(ValidationError::MissingField { field: "concept" }))
        ));

        let zero = entry(Category::Agro, 0, fixed_today());
        let err = ledger.add_entry(Flow::Income, zero).unwrap_err();
        assert!(err.is_validation());

        assert!(ledger.recent_entries(Flow::Expense).unwrap().is_empty());
        assert!(ledger.recent_entries(Flow::Income).unwrap().is_empty());
    }

    #[test]
    fn test_entry_defaults_to_today_and_trims() {
        let (ledger, _temp) = setup();
        let created = ledger
            .add_entry(
                Flow::Income,
                NewCashEntry {
                    category: Category::Livestock,
                    concept: "  Steer sale ".to_string(),
                    amount: Decimal::new(1_800_000_129, 3),
                    date: None,
                    description: Some(" ".to_string()),
                },
            )
            .unwrap();
        assert_eq!(created.date, fixed_today());
        assert_eq!(created.concept, "Steer sale");
        assert_eq!(created.amount, Decimal::new(180_000_013, 2));
        assert_eq!(created.description, None);
    }

    #[test]
    fn test_check_bands_and_payment() {
        let (ledger, _temp) = setup();
        let due = |d: NaiveDate| NewCheck {
            number: "1".to_string(),
            bank: "Banco".to_string(),
            amount: Decimal::from(1000),
            due_date: d,
        };
        let overdue = ledger.add_check(due(days_ago(1))).unwrap();
        ledger.add_check(due(fixed_today())).unwrap();
        ledger.add_check(due(fixed_today() + Days::new(8))).unwrap();

        let views = ledger.checks(CheckFilter::All).unwrap();
        let bands: Vec<DueBand> = views.iter().map(|v| v.band).collect();
        assert_eq!(
            bands,
            vec![DueBand::Overdue, DueBand::NearDue, DueBand::Comfortable]
        );

        let paid = ledger.pay_check(overdue.id).unwrap();
        assert_eq!(paid.check.status, CheckStatus::Paid);
        assert!(matches!(
            ledger.pay_check(overdue.id),
            Err(LedgerError::CheckAlreadyPaid(_))
        ));
        assert!(matches!(
            ledger.delete_check(overdue.id),
            Err(LedgerError::CheckAlreadyPaid(_))
        ));
    }

    #[test]
    fn test_check_requires_positive_amount() {
        let (ledger, _temp) = setup();
        let result = ledger.add_check(NewCheck {
            number: "1".to_string(),
            bank: "Banco".to_string(),
            amount: Decimal::from(-5),
            due_date: fixed_today(),
        });
        assert!(matches!(
            result,
            Err(LedgerError::Validation(ValidationError::OutOfRange { field: "amount", .. }))
        ));
    }

    #[test]
    fn test_dashboard_horizon() {
        let (ledger, _temp) = setup();
        ledger.init().unwrap();

        let default = ledger.dashboard(None).unwrap();
        assert_eq!(default.horizon_days, 7);
        assert_eq!(default.due_check_count(), 1);
        assert_eq!(default.provider_count, 3);
        assert_eq!(default.total_hectares, 330.0);

        ledger.set_setting("due_horizon_days", "15").unwrap();
        assert_eq!(ledger.dashboard(None).unwrap().due_check_count(), 2);
        assert_eq!(ledger.dashboard(Some(30)).unwrap().due_check_count(), 3);
        assert!(ledger.dashboard(Some(-1)).is_err());
    }

    #[test]
    fn test_dashboard_horizon_past_calendar_end() {
        let (ledger, _temp) = setup();
        ledger.init().unwrap();

        let far = ledger.dashboard(Some(3_000_000)).unwrap();
        assert_eq!(far.horizon_days, 3_000_000);
        assert_eq!(far.due_check_count(), 3);
        assert_eq!(ledger.dashboard(Some(i64::MAX)).unwrap().due_check_count(), 3);
    }

    #[test]
    fn test_crop_distribution() {
        let (ledger, _temp) = setup();
        for (crop, hectares) in [("Soja", 150.0), ("Trigo", 100.0), ("Maíz", 80.0)] {
            ledger
                .add_crop_area(NewCropArea {
                    crop: crop.to_string(),
                    hectares,
                    ..Default::default()
                })
                .unwrap();
        }
        let shares = ledger.crop_distribution().unwrap();
        assert_eq!(shares[0].crop, "Soja");
        assert_eq!(shares[0].percentage, 45.45);

        let rejected = ledger.add_crop_area(NewCropArea {
            crop: "Girasol".to_string(),
            hectares: 0.0,
            ..Default::default()
        });
        assert!(rejected.unwrap_err().is_validation());
    }

    #[test]
    fn test_custom_margin() {
        let (ledger, _temp) = setup();
        let result = ledger
            .custom_margin(NewMargin {
                product: "Soja".to_string(),
                quantity: Decimal::from(100),
                total_cost: Decimal::from(30_000),
                total_income: Decimal::from(45_000),
            })
            .unwrap();
        assert_eq!(result.per_unit, Decimal::from(150));
        assert_eq!(result.record.margin, Decimal::from(15_000));
        assert_eq!(result.record.kind, "custom");
        assert_eq!(result.record.date, fixed_today());

        let zero = ledger.custom_margin(NewMargin {
            product: "Soja".to_string(),
            quantity: Decimal::ZERO,
            total_cost: Decimal::from(1),
            total_income: Decimal::from(2),
        });
        assert!(matches!(
            zero,
            Err(LedgerError::Validation(ValidationError::OutOfRange { field: "quantity", .. }))
        ));
        assert_eq!(ledger.margins().unwrap().len(), 1);
    }

    #[test]
    fn test_custom_margin_rounds_before_validating() {
        let (ledger, _temp) = setup();
        let tiny = ledger.custom_margin(NewMargin {
            product: "Soja".to_string(),
            quantity: Decimal::new(1, 5),
            total_cost: Decimal::from(1),
            total_income: Decimal::from(2),
        });
        assert!(matches!(
            tiny,
            Err(LedgerError::Validation(ValidationError::OutOfRange { field: "quantity", .. }))
        ));

        let result = ledger
            .custom_margin(NewMargin {
                product: "Maíz".to_string(),
                quantity: Decimal::new(6, 5),
                total_cost: Decimal::ZERO,
                total_income: Decimal::new(994, 3),
            })
            .unwrap();
        // 0.99 over 0.0001 units
        assert_eq!(result.record.quantity, Decimal::new(1, 4));
        assert_eq!(result.record.margin, Decimal::new(99, 2));
        assert_eq!(result.per_unit, Decimal::from(9900));
        assert_eq!(ledger.margins().unwrap().len(), 1);
    }

    #[test]
    fn test_category_margins() {
        let (ledger, _temp) = setup();
        ledger.init().unwrap();
        let margins = ledger.category_margins().unwrap();
        assert_eq!(margins.len(), 3);
        assert_eq!(margins[0].category, Category::Agro);
        assert_eq!(margins[0].margin, Decimal::from(1_700_000));
    }

    #[test]
    fn test_invoice_provider_lifecycle() {
        let (ledger, _temp) = setup();
        let provider = ledger
            .add_provider(NewProvider {
                name: "Semillas".to_string(),
                email: Some("".to_string()),
                ..Default::default()
            })
            .unwrap();
        assert_eq!(provider.email, None);

        let invoice = ledger
            .add_invoice(NewInvoice {
                provider_id: Some(provider.id),
                number: "A-001".to_string(),
                amount: Decimal::from(5000),
                ..Default::default()
            })
            .unwrap();
        assert_eq!(invoice.date, fixed_today());

        assert!(matches!(
            ledger.add_invoice(NewInvoice {
                provider_id: Some(999),
                number: "A-002".to_string(),
                amount: Decimal::from(1),
                ..Default::default()
            }),
            Err(LedgerError::ProviderNotFound(999))
        ));

        ledger.delete_provider(provider.id).unwrap();
        let orphans = ledger.orphaned_invoices().unwrap();
        assert_eq!(orphans.len(), 1);
        assert_eq!(orphans[0].id, invoice.id);
    }

    #[test]
    fn test_livestock_and_dairy_validation() {
        let (ledger, _temp) = setup();
        assert!(
            ledger
                .add_livestock(NewLivestock {
                    kind: "Vacas".to_string(),
                    head_count: -1,
                    category: None,
                })
                .is_err()
        );
        assert!(
            ledger
                .add_dairy_record(NewDairyRecord {
                    liters: -5.0,
                    ..Default::default()
                })
                .is_err()
        );

        let record = ledger
            .add_dairy_record(NewDairyRecord {
                liters: 5000.0,
                lactating_cows: Some(250),
                ..Default::default()
            })
            .unwrap();
        assert_eq!(record.date, fixed_today());
        assert_eq!(ledger.latest_dairy_record().unwrap(), Some(record));
        assert_eq!(ledger.dairy_trend().unwrap().average_liters, 5000.0);
    }

    #[test]
    fn test_purge_keeps_boundary_row() {
        let (ledger, _temp) = setup();
        ledger
            .add_entry(Flow::Expense, entry(Category::Agro, 1, days_ago(31)))
            .unwrap();
        ledger
            .add_entry(Flow::Expense, entry(Category::Agro, 1, days_ago(30)))
            .unwrap();

        let summary = ledger.purge(30).unwrap();
        assert_eq!(summary.expenses, 1);
        assert_eq!(summary.total(), 1);
        assert_eq!(ledger.recent_entries(Flow::Expense).unwrap().len(), 1);
        assert!(ledger.purge(-1).is_err());
    }

    #[test]
    fn test_report_and_export() {
        let (ledger, temp) = setup();
        ledger.init().unwrap();

        let (report, path) = ledger.write_report(&temp.path().join("reports")).unwrap();
        assert!(path.ends_with("financial_report_20250305_091500.txt"));
        assert_eq!(report.total_income, Decimal::from(4_600_000));
        assert_eq!(report.total_expenses, Decimal::from(1_370_000));

        let files = ledger.export(&temp.path().join("exports")).unwrap();
        // seed data leaves invoices, livestock, margins and settings empty
        assert_eq!(files.len(), 6);

        let backup = ledger.backup(&temp.path().join("backups")).unwrap();
        assert!(backup.ends_with("agroledger_backup_20250305_091500.db"));
        assert_eq!(ledger.checks(CheckFilter::All).unwrap().len(), 3);
    }

    #[test]
    fn test_margin_overflow_is_reported() {
        let (ledger, _temp) = setup();
        ledger
            .add_entry(
                Flow::Income,
                NewCashEntry {
                    amount: Decimal::new(1, 2),
                    ..entry(Category::Agro, 1, days_ago(1))
                },
            )
            .unwrap();
        ledger
            .add_entry(
                Flow::Expense,
                NewCashEntry {
                    amount: Decimal::from_str("10000000000000000000000000").unwrap(),
                    ..entry(Category::Agro, 1, days_ago(1))
                },
            )
            .unwrap();

        assert!(matches!(
            ledger.margin_summary(),
            Err(LedgerError::Overflow(_))
        ));
        assert!(matches!(
            ledger.financial_report(),
            Err(LedgerError::Overflow(_))
        ));
    }

    #[test]
    fn test_quote_fallback_uses_last_known() {
        let (ledger, _temp) = setup();

        let failed = ledger.currency_quote(&StubSource(Err(503))).unwrap();
        assert!(matches!(
            failed,
            QuoteOutcome::Fallback {
                error: QuoteError::Status(503),
                last_known: None
            }
        ));

        let live = ledger.currency_quote(&StubSource(Ok((1180, 1200)))).unwrap();
        assert!(live.is_live());

        let fallback = ledger.currency_quote(&StubSource(Err(500))).unwrap();
        assert!(!fallback.is_live());
        assert_eq!(fallback.quote().unwrap().sell, Decimal::from(1200));
    }

    #[test]
    fn test_settings_round_trip() {
        let (ledger, _temp) = setup();
        assert_eq!(ledger.get_setting("due_horizon_days").unwrap(), "7");
        ledger.set_setting("due_horizon_days", "10").unwrap();
        assert_eq!(ledger.get_setting("due_horizon_days").unwrap(), "10");
        assert!(ledger.set_setting("due_horizon_days", "x").is_err());
        assert!(ledger.set_setting("last_quote", "{}").is_err());
    }

    #[test]
    fn test_parse_helpers() {
        assert_eq!(
            parse_decimal("amount", " 800000.50 ").unwrap(),
            Decimal::new(80_000_050, 2)
        );
        assert!(matches!(
            parse_decimal("amount", "abc"),
            Err(ValidationError::InvalidNumber { field: "amount", .. })
        ));
        assert!(matches!(
            parse_decimal("amount", ""),
            Err(ValidationError::MissingField { field: "amount" })
        ));
        assert!(matches!(
            parse_f64("hectares", "NaN"),
            Err(ValidationError::InvalidNumber { .. })
        ));
        assert_eq!(
            parse_date("due_date", "2025-03-15").unwrap(),
            NaiveDate::from_ymd_opt(2025, 3, 15).unwrap()
        );
        assert!(matches!(
            parse_date("due_date", "15/03/2025"),
            Err(ValidationError::InvalidDate { .. })
        ));
        assert_eq!(parse_count("head_count", "50").unwrap(), 50);
        assert_eq!(parse_category(" Livestock ").unwrap(), Category::Livestock);
        assert!(matches!(
            parse_category("crops"),
            Err(ValidationError::InvalidChoice { field: "category", .. })
        ));
    }
}

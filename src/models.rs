use chrono::{NaiveDate, NaiveDateTime};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use std::fmt;

/// Days ahead of today that still count as "near due"
pub const NEAR_DUE_DAYS: i64 = 7;

/// Check status. A check only ever moves from pending to paid.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum CheckStatus {
    Pending,
    Paid,
}

impl CheckStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            CheckStatus::Pending => "pending",
            CheckStatus::Paid => "paid",
        }
    }
}

impl fmt::Display for CheckStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

impl TryFrom<&str> for CheckStatus {
    type Error = String;

    fn try_from(s: &str) -> Result<Self, Self::Error> {
        match s {
            "pending" => Ok(CheckStatus::Pending),
            "paid" => Ok(CheckStatus::Paid),
            _ => Err(format!("Invalid check status: {s}")),
        }
    }
}

/// How close a check is to its due date
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum DueBand {
    Overdue,
    NearDue,
    Comfortable,
}

impl DueBand {
    /// A check due today is near-due, not overdue.
    pub fn from_days(days_remaining: i64) -> Self {
        if days_remaining < 0 {
            DueBand::Overdue
        } else if days_remaining <= NEAR_DUE_DAYS {
            DueBand::NearDue
        } else {
            DueBand::Comfortable
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            DueBand::Overdue => "overdue",
            DueBand::NearDue => "near-due",
            DueBand::Comfortable => "comfortable",
        }
    }

    pub fn icon(&self) -> &'static str {
        match self {
            DueBand::Overdue => "✗",
            DueBand::NearDue => "!",
            DueBand::Comfortable => "○",
        }
    }
}

impl fmt::Display for DueBand {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// Expense / income category
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Category {
    Agro,
    Livestock,
    Other,
}

impl Category {
    pub const ALLOWED: &'static str = "agro, livestock, other";

    pub fn as_str(&self) -> &'static str {
        match self {
            Category::Agro => "agro",
            Category::Livestock => "livestock",
            Category::Other => "other",
        }
    }
}

impl fmt::Display for Category {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

impl TryFrom<&str> for Category {
    type Error = String;

    fn try_from(s: &str) -> Result<Self, Self::Error> {
        match s {
            "agro" => Ok(Category::Agro),
            "livestock" => Ok(Category::Livestock),
            "other" => Ok(Category::Other),
            _ => Err(format!("Invalid category: {s}")),
        }
    }
}

/// Expenses and incomes share one row shape and differ only in their table
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Flow {
    Expense,
    Income,
}

impl Flow {
    pub fn table(&self) -> &'static str {
        match self {
            Flow::Expense => "expenses",
            Flow::Income => "incomes",
        }
    }

    pub fn entity(&self) -> &'static str {
        match self {
            Flow::Expense => "Expense",
            Flow::Income => "Income",
        }
    }
}

/// A post-dated check
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Check {
    pub id: i64,
    pub number: String,
    pub bank: String,
    pub amount: Decimal,
    pub due_date: NaiveDate,
    pub status: CheckStatus,
    pub created_at: NaiveDateTime,
}

/// A check together with its due-date classification
#[derive(Debug, Clone, Serialize)]
pub struct CheckView {
    #[serde(flatten)]
    pub check: Check,
    pub days_remaining: i64,
    pub band: DueBand,
}

/// Which checks a listing returns
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CheckFilter {
    All,
    Pending,
    /// Pending checks due on or before today + n days, overdue ones included
    DueWithin(i64),
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Provider {
    pub id: i64,
    pub name: String,
    pub sector: Option<String>,
    pub tax_id: Option<String>,
    pub phone: Option<String>,
    pub email: Option<String>,
    pub address: Option<String>,
    pub created_at: NaiveDateTime,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Invoice {
    pub id: i64,
    pub provider_id: Option<i64>,
    pub number: String,
    pub amount: Decimal,
    pub date: NaiveDate,
    pub description: Option<String>,
}

/// An expense or income row
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CashEntry {
    pub id: i64,
    pub category: Category,
    pub concept: String,
    pub amount: Decimal,
    pub date: NaiveDate,
    pub description: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CropArea {
    pub id: i64,
    pub crop: String,
    pub hectares: f64,
    pub planting_date: Option<NaiveDate>,
    pub harvest_date: Option<NaiveDate>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Livestock {
    pub id: i64,
    pub kind: String,
    pub head_count: i64,
    pub category: Option<String>,
    pub registered_at: NaiveDateTime,
}

/// Daily snapshot of dairy production and herd reproduction rates
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DairyRecord {
    pub id: i64,
    pub date: NaiveDate,
    pub liters: Option<f64>,
    pub pregnancy_pct: Option<f64>,
    pub calving_pct: Option<f64>,
    pub weaning_pct: Option<f64>,
    pub lactating_cows: Option<i64>,
    pub notes: Option<String>,
}

/// A stored margin calculation. `margin` is always `total_income - total_cost`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Margin {
    pub id: i64,
    pub kind: String,
    pub product: String,
    pub quantity: Decimal,
    pub total_cost: Decimal,
    pub total_income: Decimal,
    pub margin: Decimal,
    pub date: NaiveDate,
}

// ==================== Write Inputs ====================

#[derive(Debug, Clone, Default)]
pub struct NewCheck {
    pub number: String,
    pub bank: String,
    pub amount: Decimal,
    pub due_date: NaiveDate,
}

#[derive(Debug, Clone, Default)]
pub struct NewProvider {
    pub name: String,
    pub sector: Option<String>,
    pub tax_id: Option<String>,
    pub phone: Option<String>,
    pub email: Option<String>,
    pub address: Option<String>,
}

#[derive(Debug, Clone, Default)]
pub struct NewInvoice {
    pub provider_id: Option<i64>,
    pub number: String,
    pub amount: Decimal,
    pub date: Option<NaiveDate>,
    pub description: Option<String>,
}

#[derive(Debug, Clone)]
pub struct NewCashEntry {
    pub category: Category,
    pub concept: String,
    pub amount: Decimal,
    /// Defaults to today
    pub date: Option<NaiveDate>,
    pub description: Option<String>,
}

#[derive(Debug, Clone, Default)]
pub struct NewCropArea {
    pub crop: String,
    pub hectares: f64,
    pub planting_date: Option<NaiveDate>,
    pub harvest_date: Option<NaiveDate>,
}

#[derive(Debug, Clone, Default)]
pub struct NewLivestock {
    pub kind: String,
    pub head_count: i64,
    pub category: Option<String>,
}

#[derive(Debug, Clone, Default)]
pub struct NewDairyRecord {
    /// Defaults to today
    pub date: Option<NaiveDate>,
    pub liters: f64,
    pub pregnancy_pct: Option<f64>,
    pub calving_pct: Option<f64>,
    pub weaning_pct: Option<f64>,
    pub lactating_cows: Option<i64>,
    pub notes: Option<String>,
}

#[derive(Debug, Clone, Default)]
pub struct NewMargin {
    pub product: String,
    pub quantity: Decimal,
    pub total_cost: Decimal,
    pub total_income: Decimal,
}

// ==================== Aggregates ====================

/// One category's share of expenses or incomes
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct CategoryTotal {
    pub category: Category,
    pub count: i64,
    pub total: Decimal,
    pub average: Decimal,
}

/// Income and expenses of one category side by side
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct CategoryMargin {
    pub category: Category,
    pub income: Decimal,
    pub expenses: Decimal,
    pub margin: Decimal,
}

/// All-time margin figures
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct MarginSummary {
    pub total_income: Decimal,
    pub total_expenses: Decimal,
    pub margin: Decimal,
    pub margin_pct: Decimal,
    pub total_hectares: f64,
    pub margin_per_hectare: Decimal,
}

/// Result of a custom margin entry
#[derive(Debug, Clone, Serialize)]
pub struct CustomMargin {
    pub record: Margin,
    pub per_unit: Decimal,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct CropShare {
    pub crop: String,
    pub hectares: f64,
    pub percentage: f64,
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct MonthlyTotals {
    pub expenses: Decimal,
    pub income: Decimal,
}

#[derive(Debug, Clone, Serialize)]
pub struct Dashboard {
    pub horizon_days: i64,
    pub due_checks: Vec<CheckView>,
    pub provider_count: i64,
    pub total_hectares: f64,
    pub month: MonthlyTotals,
}

impl Dashboard {
    pub fn due_check_count(&self) -> usize {
        self.due_checks.len()
    }
}

/// Liters produced per day in chronological order
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct DairyTrend {
    pub points: Vec<(NaiveDate, f64)>,
    pub average_liters: f64,
}

/// Rows removed by a retention purge
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct PurgeSummary {
    pub expenses: usize,
    pub incomes: usize,
    pub dairy_records: usize,
}

impl PurgeSummary {
    pub fn total(&self) -> usize {
        self.expenses + self.incomes + self.dairy_records
    }
}

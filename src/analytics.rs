//! Derived figures computed from stored rows. Nothing here touches the database.

use crate::error::{LedgerError, Result, ValidationError};
use crate::models::{
    CategoryMargin, CategoryTotal, Check, CheckView, CropArea, CropShare, DairyRecord, DairyTrend,
    DueBand, MarginSummary,
};
use chrono::NaiveDate;
use rust_decimal::Decimal;
use std::collections::BTreeMap;

/// Whole days from `today` until `due`; negative once the date has passed
pub fn days_remaining(due: NaiveDate, today: NaiveDate) -> i64 {
    (due - today).num_days()
}

pub fn check_view(check: Check, today: NaiveDate) -> CheckView {
    let days = days_remaining(check.due_date, today);
    CheckView {
        check,
        days_remaining: days,
        band: DueBand::from_days(days),
    }
}

/// `part / whole * 100`, or 0 when `whole` is zero
pub fn percentage(part: Decimal, whole: Decimal) -> Option<Decimal> {
    if whole.is_zero() {
        return Some(Decimal::ZERO);
    }
    part.checked_div(whole)?
        .checked_mul(Decimal::ONE_HUNDRED)
        .map(|p| p.round_dp(2))
}

/// Margin spread over the farmed area. With no positive area on record the
/// divisor is 1, so the result equals the margin itself.
pub fn margin_per_hectare(margin: Decimal, hectares: f64) -> Option<Decimal> {
    let divisor = match Decimal::try_from(hectares) {
        Ok(h) if h > Decimal::ZERO => h,
        _ => Decimal::ONE,
    };
    margin.checked_div(divisor).map(|m| m.round_dp(2))
}

/// Margin per unit sold. Quantity must be positive.
pub fn per_unit_margin(margin: Decimal, quantity: Decimal) -> Result<Decimal> {
    if quantity <= Decimal::ZERO {
        return Err(ValidationError::OutOfRange {
            field: "quantity",
            reason: "must be greater than zero",
        }
        .into());
    }
    margin
        .checked_div(quantity)
        .map(|d| d.round_dp(2))
        .ok_or(LedgerError::Overflow("per-unit margin"))
}

pub fn margin_summary(
    total_income: Decimal,
    total_expenses: Decimal,
    hectares: f64,
) -> Result<MarginSummary> {
    let margin = total_income - total_expenses;
    Ok(MarginSummary {
        total_income,
        total_expenses,
        margin,
        margin_pct: percentage(margin, total_income).ok_or(LedgerError::Overflow("margin %"))?,
        total_hectares: hectares,
        margin_per_hectare: margin_per_hectare(margin, hectares)
            .ok_or(LedgerError::Overflow("margin per hectare"))?,
    })
}

/// Each crop's share of the total area, in input order
pub fn crop_shares(crops: &[CropArea]) -> Vec<CropShare> {
    let total: f64 = crops.iter().map(|c| c.hectares).sum();
    crops
        .iter()
        .map(|c| CropShare {
            crop: c.crop.clone(),
            hectares: c.hectares,
            percentage: if total > 0.0 {
                round2(c.hectares / total * 100.0)
            } else {
                0.0
            },
        })
        .collect()
}

/// Join income and expense rollups on category. A category present on only
/// one side gets zero for the other.
pub fn merge_category_margins(
    income: &[CategoryTotal],
    expenses: &[CategoryTotal],
) -> Vec<CategoryMargin> {
    let mut merged: BTreeMap<_, (Decimal, Decimal)> = BTreeMap::new();
    for row in income {
        merged.entry(row.category).or_default().0 += row.total;
    }
    for row in expenses {
        merged.entry(row.category).or_default().1 += row.total;
    }

    merged
        .into_iter()
        .map(|(category, (income, expenses))| CategoryMargin {
            category,
            income,
            expenses,
            margin: income - expenses,
        })
        .collect()
}

/// Liters per day, oldest first. Records without a liters reading are skipped.
pub fn dairy_trend(mut records: Vec<DairyRecord>) -> DairyTrend {
    records.sort_by_key(|r| (r.date, r.id));
    let points: Vec<(NaiveDate, f64)> = records
        .into_iter()
        .filter_map(|r| r.liters.map(|l| (r.date, l)))
        .collect();

    let average_liters = if points.is_empty() {
        0.0
    } else {
        round2(points.iter().map(|(_, l)| l).sum::<f64>() / points.len() as f64)
    };

    DairyTrend {
        points,
        average_liters,
    }
}

/// `$1,234,567.89`, with a leading minus for negative amounts
pub fn format_money(amount: Decimal) -> String {
    let fixed = format!("{:.2}", amount.abs().round_dp(2));
    let (whole, cents) = fixed.split_once('.').unwrap_or((&fixed, "00"));

    let mut grouped = String::with_capacity(whole.len() + whole.len() / 3);
    for (i, digit) in whole.chars().enumerate() {
        if i > 0 && (whole.len() - i) % 3 == 0 {
            grouped.push(',');
        }
        grouped.push(digit);
    }

    let sign = if amount.is_sign_negative() && !amount.round_dp(2).is_zero() {
        "-"
    } else {
        ""
    };
    format!("{sign}${grouped}.{cents}")
}

fn round2(value: f64) -> f64 {
    (value * 100.0).round() / 100.0
}

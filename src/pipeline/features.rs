//! KPI and calendar features for cleaned campaign rows.

use super::clean::{parse_date, parse_number};
use crate::constants::{
    COL_CAMPAIGN_ID, COL_CAMPAIGN_NAME, COL_CATEGORY, COL_CLICKS, COL_DATE, COL_ID,
    COL_IMPRESSIONS, COL_LEADS, COL_ORDERS, COL_REVENUE, COL_SPENT,
};
use crate::types::{FactRow, Table};
use chrono::{Datelike, NaiveDate, Weekday};

/// Division that yields `None` instead of dividing by zero or by a missing value.
pub fn safe_div(numer: Option<f64>, denom: Option<f64>) -> Option<f64> {
    match (numer, denom) {
        (Some(n), Some(d)) if d != 0.0 => Some(n / d),
        _ => None,
    }
}

/// Round to two decimals, ties to even.
pub fn round2(value: f64) -> f64 {
    (value * 100.0).round_ties_even() / 100.0
}

fn pct(ratio: Option<f64>) -> Option<f64> {
    ratio.map(|r| r * 100.0)
}

pub fn weekday_name(day: Weekday) -> &'static str {
    match day {
        Weekday::Mon => "Monday",
        Weekday::Tue => "Tuesday",
        Weekday::Wed => "Wednesday",
        Weekday::Thu => "Thursday",
        Weekday::Fri => "Friday",
        Weekday::Sat => "Saturday",
        Weekday::Sun => "Sunday",
    }
}

/// Derive a fact row from one cleaned table row.
pub fn enrich_row(table: &Table, row: usize) -> FactRow {
    let text = |col: &str| table.value(row, col).map(str::to_string);
    let num = |col: &str| table.value(row, col).and_then(parse_number);

    let impressions = num(COL_IMPRESSIONS);
    let clicks = num(COL_CLICKS);
    let spent = num(COL_SPENT);
    let leads = num(COL_LEADS);
    let orders = num(COL_ORDERS);
    let revenue = num(COL_REVENUE);
    let date: Option<NaiveDate> = table.value(row, COL_DATE).and_then(parse_date);

    let profit = match (revenue, spent) {
        (Some(r), Some(s)) => Some(r - s),
        _ => None,
    };

    FactRow {
        id: text(COL_ID),
        c_date: date.map(|d| d.format("%Y-%m-%d").to_string()),
        campaign_name: text(COL_CAMPAIGN_NAME),
        category: text(COL_CATEGORY),
        campaign_id: text(COL_CAMPAIGN_ID),
        impressions,
        mark_spent: spent,
        clicks,
        leads,
        orders,
        revenue,
        ctr_pct: pct(safe_div(clicks, impressions)).map(round2),
        cpc: safe_div(spent, clicks).map(round2),
        cpa: safe_div(spent, orders).map(round2),
        conversionrate_pct: pct(safe_div(orders, clicks)).map(round2),
        roas: safe_div(revenue, spent).map(round2),
        profit: profit.map(round2),
        leadrate_pct: pct(safe_div(leads, clicks)).map(round2),
        year: date.map(|d| d.year()),
        month: date.map(|d| d.month()),
        weekday: date.map(|d| weekday_name(d.weekday()).to_string()),
        is_weekend: date.map(|d| matches!(d.weekday(), Weekday::Sat | Weekday::Sun) as i32),
    }
}

pub fn engineer(cleaned: &Table) -> Vec<FactRow> {
    (0..cleaned.len()).map(|row| enrich_row(cleaned, row)).collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    fn single(columns: &[&str], values: &[&str]) -> FactRow {
        let table = Table::from_rows(columns, &[values]);
        engineer(&table).remove(0)
    }

    #[test]
    fn safe_div_handles_zero_and_missing() {
        assert_eq!(safe_div(Some(1.0), Some(4.0)), Some(0.25));
        assert_eq!(safe_div(Some(1.0), Some(0.0)), None);
        assert_eq!(safe_div(None, Some(2.0)), None);
        assert_eq!(safe_div(Some(2.0), None), None);
    }

    #[test]
    fn computes_marketing_kpis() {
        let row = single(
            &["c_date", "impressions", "clicks", "mark_spent", "orders", "leads", "revenue"],
            &["2024-03-01", "2000", "50", "125", "5", "10", "500"],
        );
        assert_eq!(row.ctr_pct, Some(2.5));
        assert_eq!(row.cpc, Some(2.5));
        assert_eq!(row.cpa, Some(25.0));
        assert_eq!(row.conversionrate_pct, Some(10.0));
        assert_eq!(row.roas, Some(4.0));
        assert_eq!(row.profit, Some(375.0));
        assert_eq!(row.leadrate_pct, Some(20.0));
    }

    #[test]
    fn zero_denominators_leave_kpis_empty() {
        let row = single(
            &["impressions", "clicks", "mark_spent", "orders", "revenue"],
            &["100", "0", "0", "0", "0"],
        );
        assert_eq!(row.ctr_pct, Some(0.0));
        assert_eq!(row.cpc, None);
        assert_eq!(row.cpa, None);
        assert_eq!(row.conversionrate_pct, None);
        assert_eq!(row.roas, None);
        assert_eq!(row.profit, Some(0.0));
        assert_eq!(row.leadrate_pct, None);
    }

    #[test]
    fn rounds_to_two_decimals() {
        let row = single(&["impressions", "clicks", "mark_spent"], &["3", "1", "10"]);
        assert_eq!(row.ctr_pct, Some(33.33));
        assert_eq!(row.cpc, Some(10.0));
        assert_eq!(round2(2.675000001), 2.68);
        assert_eq!(round2(-1.005000001), -1.01);
    }

    #[test]
    fn exact_ties_round_to_even() {
        let row = single(&["impressions", "clicks"], &["800", "1"]);
        assert_eq!(row.ctr_pct, Some(0.12));
        assert_eq!(round2(0.625), 0.62);
        assert_eq!(round2(0.375), 0.38);
    }

    #[test]
    fn calendar_features_from_date() {
        let saturday = single(&["c_date"], &["2024-03-02"]);
        assert_eq!(saturday.year, Some(2024));
        assert_eq!(saturday.month, Some(3));
        assert_eq!(saturday.weekday.as_deref(), Some("Saturday"));
        assert_eq!(saturday.is_weekend, Some(1));

        let monday = single(&["c_date"], &["2024-03-04"]);
        assert_eq!(monday.weekday.as_deref(), Some("Monday"));
        assert_eq!(monday.is_weekend, Some(0));
    }

    #[test]
    fn missing_columns_yield_empty_features() {
        let row = single(&["campaign_name"], &["only a name"]);
        assert_eq!(row.campaign_name.as_deref(), Some("only a name"));
        assert_eq!(row.ctr_pct, None);
        assert_eq!(row.year, None);
        assert_eq!(row.is_weekend, None);
    }
}

use serde::{Deserialize, Serialize};

/// A raw table of string cells as read from an upload or the staging table.
/// `None` marks a missing value.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Table {
    pub columns: Vec<String>,
    pub rows: Vec<Vec<Option<String>>>,
}

impl Table {
    pub fn new(columns: Vec<String>) -> Self {
        Self {
            columns,
            rows: Vec::new(),
        }
    }

    /// Build a table from string literals; empty strings become `None`. Handy in tests.
    pub fn from_rows(columns: &[&str], rows: &[&[&str]]) -> Self {
        Self {
            columns: columns.iter().map(|c| c.to_string()).collect(),
            rows: rows
                .iter()
                .map(|row| {
                    row.iter()
                        .map(|cell| {
                            if cell.is_empty() {
                                None
                            } else {
                                Some(cell.to_string())
                            }
                        })
                        .collect()
                })
                .collect(),
        }
    }

    pub fn column_index(&self, name: &str) -> Option<usize> {
        self.columns.iter().position(|c| c == name)
    }

    pub fn has_column(&self, name: &str) -> bool {
        self.column_index(name).is_some()
    }

    pub fn len(&self) -> usize {
        self.rows.len()
    }

    pub fn is_empty(&self) -> bool {
        self.rows.is_empty()
    }

    pub fn value(&self, row: usize, column: &str) -> Option<&str> {
        let idx = self.column_index(column)?;
        self.rows.get(row)?.get(idx)?.as_deref()
    }

    /// Project onto `columns` in the given order; names not in the table are skipped.
    pub fn select(&self, columns: &[String]) -> Table {
        let picks: Vec<(usize, String)> = columns
            .iter()
            .filter_map(|c| self.column_index(c).map(|i| (i, c.clone())))
            .collect();
        Table {
            columns: picks.iter().map(|(_, c)| c.clone()).collect(),
            rows: self
                .rows
                .iter()
                .map(|row| picks.iter().map(|(i, _)| row.get(*i).cloned().flatten()).collect())
                .collect(),
        }
    }

    pub fn drop_columns(&mut self, names: &[String]) {
        let keep: Vec<usize> = (0..self.columns.len())
            .filter(|i| !names.contains(&self.columns[*i]))
            .collect();
        self.columns = keep.iter().map(|i| self.columns[*i].clone()).collect();
        for row in &mut self.rows {
            *row = keep.iter().map(|i| row.get(*i).cloned().flatten()).collect();
        }
    }

    pub fn head(&self, n: usize) -> Table {
        Table {
            columns: self.columns.clone(),
            rows: self.rows.iter().take(n).cloned().collect(),
        }
    }
}

/// One cleaned campaign record with its derived KPIs and calendar features.
/// Field order is the column order of `fact_campaigns_clean` and the CSV export.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct FactRow {
    pub id: Option<String>,
    pub c_date: Option<String>,
    pub campaign_name: Option<String>,
    pub category: Option<String>,
    pub campaign_id: Option<String>,
    pub impressions: Option<f64>,
    pub mark_spent: Option<f64>,
    pub clicks: Option<f64>,
    pub leads: Option<f64>,
    pub orders: Option<f64>,
    pub revenue: Option<f64>,
    pub ctr_pct: Option<f64>,
    pub cpc: Option<f64>,
    pub cpa: Option<f64>,
    pub conversionrate_pct: Option<f64>,
    pub roas: Option<f64>,
    pub profit: Option<f64>,
    pub leadrate_pct: Option<f64>,
    pub year: Option<i32>,
    pub month: Option<u32>,
    pub weekday: Option<String>,
    pub is_weekend: Option<i32>,
}

impl FactRow {
    pub const COLUMNS: [&'static str; 22] = [
        "id",
        "c_date",
        "campaign_name",
        "category",
        "campaign_id",
        "impressions",
        "mark_spent",
        "clicks",
        "leads",
        "orders",
        "revenue",
        "ctr_pct",
        "cpc",
        "cpa",
        "conversionrate_pct",
        "roas",
        "profit",
        "leadrate_pct",
        "year",
        "month",
        "weekday",
        "is_weekend",
    ];

    /// Cell values rendered for display, in `COLUMNS` order.
    pub fn display_cells(&self) -> Vec<String> {
        fn text(v: &Option<String>) -> String {
            v.clone().unwrap_or_default()
        }
        fn num(v: &Option<f64>) -> String {
            v.map(|x| x.to_string()).unwrap_or_default()
        }
        vec![
            text(&self.id),
            text(&self.c_date),
            text(&self.campaign_name),
            text(&self.category),
            text(&self.campaign_id),
            num(&self.impressions),
            num(&self.mark_spent),
            num(&self.clicks),
            num(&self.leads),
            num(&self.orders),
            num(&self.revenue),
            num(&self.ctr_pct),
            num(&self.cpc),
            num(&self.cpa),
            num(&self.conversionrate_pct),
            num(&self.roas),
            num(&self.profit),
            num(&self.leadrate_pct),
            self.year.map(|v| v.to_string()).unwrap_or_default(),
            self.month.map(|v| v.to_string()).unwrap_or_default(),
            text(&self.weekday),
            self.is_weekend.map(|v| v.to_string()).unwrap_or_default(),
        ]
    }
}

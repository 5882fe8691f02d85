//! Table and column names shared by the pipeline stages and the warehouse.

pub const STAGING_TABLE: &str = "stg_campaigns_raw";
pub const FACT_TABLE: &str = "fact_campaigns_clean";

/// Upload position of each staged row; internal, never part of the staging schema.
pub const STAGING_ORDINAL: &str = "row_ordinal";

pub const COL_ID: &str = "id";
pub const COL_DATE: &str = "c_date";
pub const COL_CAMPAIGN_NAME: &str = "campaign_name";
pub const COL_CATEGORY: &str = "category";
pub const COL_CAMPAIGN_ID: &str = "campaign_id";
pub const COL_IMPRESSIONS: &str = "impressions";
pub const COL_SPENT: &str = "mark_spent";
pub const COL_CLICKS: &str = "clicks";
pub const COL_LEADS: &str = "leads";
pub const COL_ORDERS: &str = "orders";
pub const COL_REVENUE: &str = "revenue";

/// Staging schema used when the warehouse cannot be asked (dry runs, tests).
pub const DEFAULT_STAGING_COLUMNS: [&str; 11] = [
    COL_ID,
    COL_DATE,
    COL_CAMPAIGN_NAME,
    COL_CATEGORY,
    COL_CAMPAIGN_ID,
    COL_IMPRESSIONS,
    COL_SPENT,
    COL_CLICKS,
    COL_LEADS,
    COL_ORDERS,
    COL_REVENUE,
];

/// Rows missing any of these (when the column exists) are dropped.
pub const REQUIRED_COLUMNS: [&str; 6] = [
    COL_DATE,
    COL_CAMPAIGN_NAME,
    COL_IMPRESSIONS,
    COL_CLICKS,
    COL_SPENT,
    COL_REVENUE,
];

/// Columns that must hold a non-negative number.
pub const NUMERIC_COLUMNS: [&str; 6] = [
    COL_IMPRESSIONS,
    COL_CLICKS,
    COL_LEADS,
    COL_ORDERS,
    COL_SPENT,
    COL_REVENUE,
];

/// Suffix header mangling gives the first repeat of a column name.
pub const MIRROR_SUFFIX: &str = ".1";

pub const PROCESSED_CSV_NAME: &str = "processed_output.csv";

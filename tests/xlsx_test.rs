mod common;

use anyhow::Result;
use campaign_pipeline::ingest::{read_xlsx, SourceFormat, Upload};
use campaign_pipeline::storage::Warehouse;
use common::harness;
use rust_xlsxwriter::{ExcelDateTime, Format, Workbook};

const HEADERS: [&str; 7] = [
    "id",
    "c_date",
    "campaign_name",
    "impressions",
    "clicks",
    "mark_spent",
    "revenue",
];

/// Two campaign rows with numeric ids, date-formatted cells and float measures.
fn campaign_workbook() -> Result<Vec<u8>> {
    let mut workbook = Workbook::new();
    let date_format = Format::new().set_num_format("yyyy-mm-dd");
    let sheet = workbook.add_worksheet();

    for (col, header) in HEADERS.iter().enumerate() {
        sheet.write_string(0, col as u16, *header)?;
    }

    let rows: [(f64, (u16, u8, u8), &str, [f64; 4]); 2] = [
        (7.0, (2024, 3, 2), "spring", [1000.0, 12.5, 30.0, 90.5]),
        (8.0, (2024, 3, 3), "summer", [800.0, 1.0, 10.0, 0.0]),
    ];
    for (i, (id, (y, m, d), name, measures)) in rows.iter().enumerate() {
        let row = (i + 1) as u32;
        sheet.write_number(row, 0, *id)?;
        let date = ExcelDateTime::from_ymd(*y, *m, *d)?;
        sheet.write_datetime_with_format(row, 1, &date, &date_format)?;
        sheet.write_string(row, 2, *name)?;
        for (offset, value) in measures.iter().enumerate() {
            sheet.write_number(row, 3 + offset as u16, *value)?;
        }
    }

    Ok(workbook.save_to_buffer()?)
}

#[test]
fn test_workbook_cells_read_as_staging_text() -> Result<()> {
    let table = read_xlsx(&campaign_workbook()?)?;

    assert_eq!(table.columns, HEADERS.to_vec());
    assert_eq!(table.len(), 2);
    assert_eq!(
        table.rows[0],
        vec![
            Some("7".to_string()),
            Some("2024-03-02".to_string()),
            Some("spring".to_string()),
            Some("1000".to_string()),
            Some("12.5".to_string()),
            Some("30".to_string()),
            Some("90.5".to_string()),
        ]
    );
    assert_eq!(table.value(1, "revenue"), Some("0"));
    Ok(())
}

#[tokio::test]
async fn test_workbook_upload_runs_through_pipeline() -> Result<()> {
    let h = harness();
    let outcome = h
        .pipeline
        .run(Upload::new("campaigns.xlsx", campaign_workbook()?))
        .await?;

    assert_eq!(outcome.format, SourceFormat::Xlsx);
    assert_eq!(outcome.published_rows, 2);

    let spring = &outcome.facts[0];
    assert_eq!(spring.id.as_deref(), Some("7"));
    assert_eq!(spring.c_date.as_deref(), Some("2024-03-02"));
    assert_eq!(spring.ctr_pct, Some(1.25));
    assert_eq!(spring.cpc, Some(2.4));
    assert_eq!(spring.weekday.as_deref(), Some("Saturday"));

    // 1 click on 800 impressions is an exact tie at 0.125%
    let summer = &outcome.facts[1];
    assert_eq!(summer.ctr_pct, Some(0.12));
    assert_eq!(summer.roas, Some(0.0));
    assert_eq!(h.warehouse.fact_count().await?, 2);
    Ok(())
}

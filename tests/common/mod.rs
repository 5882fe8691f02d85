#![allow(dead_code)]
use campaign_pipeline::config::PipelineConfig;
use campaign_pipeline::ledger::RunLedger;
use campaign_pipeline::pipeline::Pipeline;
use campaign_pipeline::storage::InMemoryWarehouse;
use std::sync::Arc;

/// Nine rows: one exact duplicate, one row per rejection rule, one id seen twice
/// and three rows that survive cleaning.
pub const CAMPAIGN_CSV: &str = "\
id,c_date,campaign_name,category,campaign_id,impressions,mark_spent,clicks,leads,orders,revenue,notes
1,2024-03-01,facebook_spring,social,101,2000,125,50,10,5,500,first
1,2024-03-03,facebook_spring,social,101,4000,200,80,16,8,900,newer
2,2024-03-02,google_search,search,102,1000,50,0,0,0,0,zero clicks
2,2024-03-02,google_search,search,102,1000,50,0,0,0,0,zero clicks
3,2024-03-02,youtube_blog,media,103,0,10,0,0,0,0,no impressions
4,not a date,instagram_tier1,social,104,100,10,5,1,1,20,bad date
5,2024-03-04,,social,105,100,10,5,1,1,20,missing name
6,2024-03-05,tiktok_tier2,social,106,500,-3,5,1,1,20,negative spend
7,04.03.2024,banner_partner,media,107,300,30,12,3,2,90,dotted date
";

pub fn pipeline_config() -> PipelineConfig {
    PipelineConfig {
        preview_rows: 2,
        ..PipelineConfig::default()
    }
}

pub struct Harness {
    pub warehouse: Arc<InMemoryWarehouse>,
    pub ledger: Arc<RunLedger>,
    pub pipeline: Arc<Pipeline>,
}

pub fn harness() -> Harness {
    let warehouse = Arc::new(InMemoryWarehouse::new());
    let ledger = Arc::new(RunLedger::open_in_memory().expect("in-memory ledger"));
    let pipeline = Arc::new(Pipeline::new(
        warehouse.clone(),
        Some(ledger.clone()),
        pipeline_config(),
    ));
    Harness {
        warehouse,
        ledger,
        pipeline,
    }
}

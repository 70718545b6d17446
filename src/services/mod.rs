pub mod customer_metrics;
pub mod ingestion;
pub mod marketing_metrics;
pub mod report;
pub mod sales_metrics;

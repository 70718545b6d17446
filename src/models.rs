use chrono::{DateTime, Utc};
use serde::Serialize;
use sqlx::FromRow;

// Enum-like columns are stored as TEXT; these constants are the only
// accepted values and are enforced at the input boundary (schemas.rs).
pub const SALE_TYPES: &[&str] = &["PRODUCT", "SERVICE"];
pub const SALE_STATUSES: &[&str] = &["COMPLETED", "CANCELLED"];
pub const MARKETING_SOURCES: &[&str] = &["GOOGLE", "META"];

pub const SALE_TYPE_PRODUCT: &str = "PRODUCT";
pub const SALE_TYPE_SERVICE: &str = "SERVICE";
pub const SALE_STATUS_COMPLETED: &str = "COMPLETED";
pub const CUSTOMER_STATUS_ACTIVE: &str = "ACTIVE";

#[derive(Debug, Clone, FromRow, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Company {
    pub id: i64,
    pub name: String,
    pub created_at: DateTime<Utc>,
}

#[derive(Debug, Clone, FromRow, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct CompanyBranch {
    pub id: i64,
    pub name: String,
    pub code: String,
    pub company_id: i64,
    pub imported_spreadsheet_id: Option<i64>,
    pub created_at: DateTime<Utc>,
}

#[derive(Debug, Clone, FromRow, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Customer {
    pub id: i64,
    pub name: String,
    pub tax_id: Option<String>,
    pub status: String,
    pub company_branch_id: i64,
    pub imported_spreadsheet_id: Option<i64>,
    pub created_at: DateTime<Utc>,
}

#[derive(Debug, Clone, FromRow, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Sale {
    pub id: i64,
    pub sale_date: DateTime<Utc>,
    pub code: String,
    pub description: String,
    pub quantity: i32,
    pub unit_value: f64,
    pub total_value: f64,
    #[serde(rename = "type")]
    #[sqlx(rename = "type")]
    pub sale_type: String,
    pub status: String,
    pub customer_id: i64,
    pub company_branch_id: i64,
    pub imported_spreadsheet_id: Option<i64>,
    pub created_at: DateTime<Utc>,
}

/// Sale joined with its customer's name, for the paginated listing.
#[derive(Debug, Clone, FromRow, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct SaleWithCustomer {
    #[sqlx(flatten)]
    #[serde(flatten)]
    pub sale: Sale,
    pub customer_name: String,
}

#[derive(Debug, Clone, FromRow, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Goal {
    pub id: i64,
    pub company_branch_id: i64,
    pub year: i32,
    pub month: i32,
    pub product_revenue: f64,
    pub service_revenue: f64,
    pub ticket_average: f64,
    pub customers: i64,
    pub new_customers: i64,
    pub products_per_client: f64,
    pub services_per_client: f64,
    pub marketing: f64,
    pub leads_generated: i64,
    pub leads_meetings: i64,
    pub marketing_sales: i64,
    pub cpl: f64,
    pub lead_to_meeting_rate: f64,
    pub meeting_to_sale_rate: f64,
    pub roas: f64,
    pub created_at: DateTime<Utc>,
}

#[derive(Debug, Clone, FromRow, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct MarketingMetric {
    pub id: i64,
    pub date: DateTime<Utc>,
    pub source: String,
    pub investment: f64,
    pub leads_generated: i64,
    pub sales: i64,
    pub cpl: f64,
    pub meeting_to_sale_rate: f64,
    pub roas: f64,
    pub impressions: Option<i64>,
    pub clicks: Option<i64>,
    pub ctr: Option<f64>,
    pub cpc: Option<f64>,
    pub company_branch_id: i64,
    pub created_at: DateTime<Utc>,
}

#[derive(Debug, Clone, FromRow, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ImportedSpreadsheet {
    pub id: i64,
    pub file_name: String,
    pub company_id: i64,
    pub created_at: DateTime<Utc>,
}

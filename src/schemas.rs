use chrono::{DateTime, Utc};
use serde::Deserialize;
use validator::{Validate, ValidationError};

use crate::error::{AppError, AppResult};
use crate::models::{MARKETING_SOURCES, SALE_STATUSES, SALE_TYPES};

/// Validation failures are client errors: 400, per the API contract.
pub fn validate_input<T: Validate>(input: &T) -> AppResult<()> {
    input
        .validate()
        .map_err(|errors| AppError::BadRequest(format!("Validation failed: {errors}")))
}

/// Resolve 1-based page/limit into (offset, limit), rejecting out-of-range
/// values the way the original API did.
pub fn resolve_pagination(
    page: Option<i64>,
    limit: Option<i64>,
    default_limit: i64,
) -> AppResult<(i64, i64)> {
    let page = page.unwrap_or(1);
    let limit = limit.unwrap_or(default_limit);
    if page < 1 || limit < 1 || limit > 100 {
        return Err(AppError::BadRequest(
            "Invalid pagination parameters.".to_string(),
        ));
    }
    Ok(((page - 1) * limit, limit))
}

fn sale_type_valid(value: &str) -> Result<(), ValidationError> {
    if SALE_TYPES.contains(&value) {
        Ok(())
    } else {
        Err(ValidationError::new("sale_type"))
    }
}

fn sale_status_valid(value: &str) -> Result<(), ValidationError> {
    if SALE_STATUSES.contains(&value) {
        Ok(())
    } else {
        Err(ValidationError::new("sale_status"))
    }
}

fn marketing_source_valid(value: &str) -> Result<(), ValidationError> {
    if MARKETING_SOURCES.contains(&value) {
        Ok(())
    } else {
        Err(ValidationError::new("marketing_source"))
    }
}

#[derive(Debug, Clone, Deserialize, Validate)]
pub struct CreateCompanyInput {
    #[validate(length(min = 1, max = 255))]
    pub name: String,
}

#[derive(Debug, Clone, Deserialize, Validate)]
#[serde(rename_all = "camelCase")]
pub struct CreateSaleInput {
    pub sale_date: DateTime<Utc>,
    #[validate(length(min = 1))]
    pub code: String,
    #[validate(length(min = 1))]
    pub branch: String,
    #[validate(length(min = 1))]
    pub description: String,
    #[validate(range(min = 1))]
    pub quantity: i32,
    #[validate(range(exclusive_min = 0.0))]
    pub unit_value: f64,
    #[validate(range(exclusive_min = 0.0))]
    pub total_value: f64,
    #[serde(rename = "type")]
    #[validate(custom(function = sale_type_valid))]
    pub sale_type: String,
    #[validate(custom(function = sale_status_valid))]
    pub status: String,
    #[validate(length(min = 1))]
    pub customer: String,
    pub tax_id: Option<String>,
    #[validate(range(min = 1))]
    pub company_id: i64,
    #[validate(length(min = 1))]
    pub file_name: String,
}

#[derive(Debug, Clone, Deserialize, Validate)]
#[serde(rename_all = "camelCase")]
pub struct UpdateSaleInput {
    pub sale_date: Option<DateTime<Utc>>,
    #[validate(length(min = 1))]
    pub code: Option<String>,
    #[validate(length(min = 1))]
    pub description: Option<String>,
    #[validate(range(min = 1))]
    pub quantity: Option<i32>,
    #[validate(range(exclusive_min = 0.0))]
    pub unit_value: Option<f64>,
    #[validate(range(exclusive_min = 0.0))]
    pub total_value: Option<f64>,
    #[serde(rename = "type")]
    #[validate(custom(function = sale_type_valid))]
    pub sale_type: Option<String>,
    #[validate(custom(function = sale_status_valid))]
    pub status: Option<String>,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SalesListQuery {
    pub page: Option<i64>,
    pub limit: Option<i64>,
    pub customer_id: Option<i64>,
    pub status: Option<String>,
    #[serde(rename = "type")]
    pub sale_type: Option<String>,
    pub start_date: Option<String>,
    pub end_date: Option<String>,
    pub description: Option<String>,
    pub customer: Option<String>,
    pub export: Option<bool>,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CustomersQuery {
    pub name: Option<String>,
    pub tax_id: Option<String>,
    pub page: Option<i64>,
    pub per_page: Option<i64>,
}

/// Shared query for the three metrics endpoints.
#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct MetricsQuery {
    pub month_and_year: String,
    pub company_branch_id: i64,
}

#[derive(Debug, Clone, Deserialize, Validate)]
#[serde(rename_all = "camelCase")]
pub struct CreateGoalInput {
    #[validate(range(min = 1))]
    pub company_branch_id: i64,
    #[validate(range(min = 1, max = 12))]
    pub month: i32,
    #[validate(range(min = 1900))]
    pub year: i32,
    #[serde(default)]
    pub product_revenue: f64,
    #[serde(default)]
    pub service_revenue: f64,
    #[serde(default)]
    pub ticket_average: f64,
    #[serde(default)]
    #[validate(range(min = 0))]
    pub customers: i64,
    #[serde(default)]
    #[validate(range(min = 0))]
    pub new_customers: i64,
    #[serde(default)]
    #[validate(range(min = 0.0))]
    pub products_per_client: f64,
    #[serde(default)]
    #[validate(range(min = 0.0))]
    pub services_per_client: f64,
    #[serde(default)]
    pub marketing: f64,
    #[serde(default)]
    #[validate(range(min = 0))]
    pub leads_generated: i64,
    #[serde(default)]
    #[validate(range(min = 0))]
    pub leads_meetings: i64,
    #[serde(default)]
    #[validate(range(min = 0))]
    pub marketing_sales: i64,
    #[serde(default)]
    #[validate(range(min = 0.0))]
    pub cpl: f64,
    #[serde(default)]
    #[validate(range(min = 0.0, max = 100.0))]
    pub lead_to_meeting_rate: f64,
    #[serde(default)]
    #[validate(range(min = 0.0, max = 100.0))]
    pub meeting_to_sale_rate: f64,
    #[serde(default)]
    #[validate(range(min = 0.0))]
    pub roas: f64,
}

#[derive(Debug, Clone, Deserialize, Validate)]
#[serde(rename_all = "camelCase")]
pub struct UpdateGoalInput {
    #[validate(range(min = 1, max = 12))]
    pub month: Option<i32>,
    #[validate(range(min = 1900))]
    pub year: Option<i32>,
    pub product_revenue: Option<f64>,
    pub service_revenue: Option<f64>,
    pub ticket_average: Option<f64>,
    #[validate(range(min = 0))]
    pub customers: Option<i64>,
    #[validate(range(min = 0))]
    pub new_customers: Option<i64>,
    #[validate(range(min = 0.0))]
    pub products_per_client: Option<f64>,
    #[validate(range(min = 0.0))]
    pub services_per_client: Option<f64>,
    pub marketing: Option<f64>,
    #[validate(range(min = 0))]
    pub leads_generated: Option<i64>,
    #[validate(range(min = 0))]
    pub leads_meetings: Option<i64>,
    #[validate(range(min = 0))]
    pub marketing_sales: Option<i64>,
    #[validate(range(min = 0.0))]
    pub cpl: Option<f64>,
    #[validate(range(min = 0.0, max = 100.0))]
    pub lead_to_meeting_rate: Option<f64>,
    #[validate(range(min = 0.0, max = 100.0))]
    pub meeting_to_sale_rate: Option<f64>,
    #[validate(range(min = 0.0))]
    pub roas: Option<f64>,
}

#[derive(Debug, Clone, Deserialize, Validate)]
#[serde(rename_all = "camelCase")]
pub struct CreateMarketingMetricInput {
    #[validate(length(min = 10, max = 10))]
    pub date: String,
    #[validate(custom(function = marketing_source_valid))]
    pub source: String,
    #[validate(range(min = 0.0))]
    pub investment: f64,
    #[validate(range(min = 0))]
    pub leads_generated: i64,
    #[validate(range(min = 0))]
    pub sales: i64,
    #[validate(range(min = 0.0))]
    pub cpl: f64,
    #[validate(range(min = 0.0))]
    pub meeting_to_sale_rate: f64,
    #[validate(range(min = 0.0))]
    pub roas: f64,
    #[validate(range(min = 0))]
    pub impressions: Option<i64>,
    #[validate(range(min = 0))]
    pub clicks: Option<i64>,
    #[validate(range(min = 0.0))]
    pub ctr: Option<f64>,
    #[validate(range(min = 0.0))]
    pub cpc: Option<f64>,
}

#[derive(Debug, Clone, Deserialize, Validate)]
#[serde(rename_all = "camelCase")]
pub struct UpdateMarketingMetricInput {
    #[validate(length(min = 10, max = 10))]
    pub date: Option<String>,
    #[validate(custom(function = marketing_source_valid))]
    pub source: Option<String>,
    #[validate(range(min = 0.0))]
    pub investment: Option<f64>,
    #[validate(range(min = 0))]
    pub leads_generated: Option<i64>,
    #[validate(range(min = 0))]
    pub sales: Option<i64>,
    #[validate(range(min = 0.0))]
    pub cpl: Option<f64>,
    #[validate(range(min = 0.0))]
    pub meeting_to_sale_rate: Option<f64>,
    #[validate(range(min = 0.0))]
    pub roas: Option<f64>,
    #[validate(range(min = 0))]
    pub impressions: Option<i64>,
    #[validate(range(min = 0))]
    pub clicks: Option<i64>,
    #[validate(range(min = 0.0))]
    pub ctr: Option<f64>,
    #[validate(range(min = 0.0))]
    pub cpc: Option<f64>,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct MarketingListQuery {
    pub month_and_year: Option<String>,
    pub page: Option<i64>,
    pub limit: Option<i64>,
    pub source: Option<String>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct IdsInput {
    pub ids: Vec<i64>,
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sale_input() -> CreateSaleInput {
        CreateSaleInput {
            sale_date: Utc::now(),
            code: "V-001".to_string(),
            branch: "Centro".to_string(),
            description: "Corte".to_string(),
            quantity: 1,
            unit_value: 50.0,
            total_value: 50.0,
            sale_type: "SERVICE".to_string(),
            status: "COMPLETED".to_string(),
            customer: "Ana".to_string(),
            tax_id: None,
            company_id: 1,
            file_name: "vendas.xlsx".to_string(),
        }
    }

    #[test]
    fn accepts_a_well_formed_sale() {
        assert!(validate_input(&sale_input()).is_ok());
    }

    #[test]
    fn rejects_bad_quantity_and_type() {
        let mut input = sale_input();
        input.quantity = 0;
        assert!(validate_input(&input).is_err());

        let mut input = sale_input();
        input.sale_type = "RENTAL".to_string();
        assert!(validate_input(&input).is_err());

        let mut input = sale_input();
        input.total_value = 0.0;
        assert!(validate_input(&input).is_err());
    }

    #[test]
    fn pagination_bounds() {
        assert_eq!(resolve_pagination(None, None, 10).unwrap(), (0, 10));
        assert_eq!(resolve_pagination(Some(3), Some(20), 10).unwrap(), (40, 20));
        assert!(resolve_pagination(Some(0), None, 10).is_err());
        assert!(resolve_pagination(None, Some(101), 10).is_err());
    }
}

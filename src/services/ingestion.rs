use std::collections::HashMap;

use sqlx::PgPool;

use crate::error::{AppError, AppResult};
use crate::models::Sale;
use crate::repository::{branches, customers, sales, spreadsheets};
use crate::schemas::{validate_input, CreateSaleInput};

/// Resolution plan for one import batch: every branch and customer the
/// batch references, deduplicated so each unique key is looked up or
/// created once.
#[derive(Debug, Clone)]
pub struct BatchPlan {
    pub company_id: i64,
    pub file_name: String,
    pub branch_names: Vec<String>,
    pub customer_keys: Vec<CustomerKey>,
}

#[derive(Debug, Clone)]
pub struct CustomerKey {
    pub key: String,
    pub name: String,
    pub tax_id: Option<String>,
    pub branch_name: String,
}

fn tax_digits(tax_id: Option<&str>) -> Option<String> {
    let digits: String = tax_id?
        .chars()
        .filter(char::is_ascii_digit)
        .collect();
    if digits.is_empty() {
        None
    } else {
        Some(digits)
    }
}

/// Customers are keyed by document number when one exists, otherwise by
/// case-folded name.
fn customer_key(record: &CreateSaleInput) -> (String, Option<String>) {
    match tax_digits(record.tax_id.as_deref()) {
        Some(digits) => (format!("tax:{digits}"), Some(digits)),
        None => (
            format!("name:{}", record.customer.trim().to_lowercase()),
            None,
        ),
    }
}

fn branch_code(name: &str) -> String {
    name.trim().to_uppercase().replace(char::is_whitespace, "-")
}

pub fn plan_batch(records: &[CreateSaleInput]) -> AppResult<BatchPlan> {
    let first = records
        .first()
        .ok_or_else(|| AppError::BadRequest("No sale records provided.".to_string()))?;
    let company_id = first.company_id;
    if records.iter().any(|record| record.company_id != company_id) {
        return Err(AppError::BadRequest(
            "All sale records in a batch must belong to the same company.".to_string(),
        ));
    }

    let mut seen_codes: HashMap<&str, usize> = HashMap::new();
    for record in records {
        *seen_codes.entry(record.code.as_str()).or_insert(0) += 1;
    }
    let mut duplicates: Vec<&str> = seen_codes
        .iter()
        .filter(|(_, count)| **count > 1)
        .map(|(code, _)| *code)
        .collect();
    if !duplicates.is_empty() {
        duplicates.sort_unstable();
        return Err(AppError::BadRequest(format!(
            "Duplicate sale codes in batch: {}.",
            duplicates.join(", ")
        )));
    }

    let mut branch_names: Vec<String> = Vec::new();
    let mut customer_keys: Vec<CustomerKey> = Vec::new();
    for record in records {
        let branch_name = record.branch.trim().to_string();
        if !branch_names.contains(&branch_name) {
            branch_names.push(branch_name.clone());
        }
        let (key, tax_id) = customer_key(record);
        if !customer_keys.iter().any(|existing| existing.key == key) {
            customer_keys.push(CustomerKey {
                key,
                name: record.customer.trim().to_string(),
                tax_id,
                branch_name,
            });
        }
    }

    Ok(BatchPlan {
        company_id,
        file_name: first.file_name.clone(),
        branch_names,
        customer_keys,
    })
}

/// Bulk sale import. Validates the whole batch up front, rejects any code
/// already stored, records the spreadsheet, resolves branches and
/// customers once per unique key, then creates the sales one by one.
/// A failure mid-loop leaves earlier rows in place.
pub async fn create_sales(pool: &PgPool, records: &[CreateSaleInput]) -> AppResult<Vec<Sale>> {
    for record in records {
        validate_input(record)?;
    }
    let plan = plan_batch(records)?;

    let codes: Vec<String> = records.iter().map(|record| record.code.clone()).collect();
    let mut existing = sales::existing_codes(pool, &codes).await?;
    if !existing.is_empty() {
        existing.sort_unstable();
        return Err(AppError::BadRequest(format!(
            "Sale codes already imported: {}.",
            existing.join(", ")
        )));
    }

    let spreadsheet = spreadsheets::create(pool, &plan.file_name, plan.company_id).await?;

    let mut branch_ids: HashMap<String, i64> = HashMap::new();
    for name in &plan.branch_names {
        let branch = branches::upsert(
            pool,
            name,
            &branch_code(name),
            plan.company_id,
            Some(spreadsheet.id),
        )
        .await?;
        branch_ids.insert(name.clone(), branch.id);
    }

    let resolve_branch = |name: &str| -> AppResult<i64> {
        branch_ids.get(name.trim()).copied().ok_or_else(|| {
            AppError::BadRequest(format!("Sale references an unresolved branch '{name}'."))
        })
    };

    let mut customer_ids: HashMap<String, i64> = HashMap::new();
    for key in &plan.customer_keys {
        let branch_id = resolve_branch(&key.branch_name)?;
        let customer = match &key.tax_id {
            Some(tax_id) => {
                customers::upsert_by_tax_id(pool, &key.name, tax_id, branch_id, Some(spreadsheet.id))
                    .await?
            }
            None => {
                match customers::get_by_name_ci(pool, &key.name, plan.company_id).await? {
                    Some(found) => found,
                    None => {
                        customers::create(pool, &key.name, None, branch_id, Some(spreadsheet.id))
                            .await?
                    }
                }
            }
        };
        customer_ids.insert(key.key.clone(), customer.id);
    }

    let mut created = Vec::with_capacity(records.len());
    for record in records {
        let branch_id = resolve_branch(&record.branch)?;
        let (key, _) = customer_key(record);
        let customer_id = customer_ids.get(&key).copied().ok_or_else(|| {
            AppError::BadRequest(format!(
                "Sale '{}' references an unresolved customer.",
                record.code
            ))
        })?;
        let sale = sales::create(
            pool,
            record.sale_date,
            &record.code,
            &record.description,
            record.quantity,
            record.unit_value,
            record.total_value,
            &record.sale_type,
            &record.status,
            customer_id,
            branch_id,
            Some(spreadsheet.id),
        )
        .await?;
        created.push(sale);
    }
    Ok(created)
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Utc;

    fn record(code: &str, branch: &str, customer: &str, tax_id: Option<&str>) -> CreateSaleInput {
        CreateSaleInput {
            sale_date: Utc::now(),
            code: code.to_string(),
            branch: branch.to_string(),
            description: "item".to_string(),
            quantity: 1,
            unit_value: 10.0,
            total_value: 10.0,
            sale_type: "PRODUCT".to_string(),
            status: "COMPLETED".to_string(),
            customer: customer.to_string(),
            tax_id: tax_id.map(str::to_string),
            company_id: 1,
            file_name: "vendas.xlsx".to_string(),
        }
    }

    #[test]
    fn empty_batch_is_rejected() {
        assert!(plan_batch(&[]).is_err());
    }

    #[test]
    fn mixed_companies_are_rejected() {
        let mut other = record("B", "Centro", "Ana", None);
        other.company_id = 2;
        let batch = vec![record("A", "Centro", "Ana", None), other];
        assert!(plan_batch(&batch).is_err());
    }

    #[test]
    fn duplicate_codes_in_batch_are_rejected() {
        let batch = vec![
            record("A", "Centro", "Ana", None),
            record("A", "Centro", "Bia", None),
        ];
        let error = plan_batch(&batch).unwrap_err();
        assert!(error.to_string().contains('A'));
    }

    #[test]
    fn branches_and_customers_deduplicate() {
        let batch = vec![
            record("A", "Centro", "Ana", Some("123.456.789-00")),
            record("B", "Centro", "Ana Souza", Some("12345678900")),
            record("C", "Norte", "Bia", None),
            record("D", "Norte", "BIA", None),
        ];
        let plan = plan_batch(&batch).unwrap();
        assert_eq!(plan.branch_names, vec!["Centro", "Norte"]);
        // tax ids match on digits, names match case-insensitively
        assert_eq!(plan.customer_keys.len(), 2);
        assert_eq!(plan.customer_keys[0].tax_id.as_deref(), Some("12345678900"));
        assert_eq!(plan.customer_keys[1].name, "Bia");
    }

    #[test]
    fn padded_names_share_one_key() {
        let batch = vec![
            record("A", "Centro", " Ana", None),
            record("B", "Centro", "Ana", None),
        ];
        let plan = plan_batch(&batch).unwrap();
        assert_eq!(plan.customer_keys.len(), 1);
        assert_eq!(plan.customer_keys[0].name, "Ana");
    }

    #[test]
    fn blank_tax_id_falls_back_to_name_key() {
        let batch = vec![
            record("A", "Centro", "Ana", Some("--")),
            record("B", "Centro", "ana", None),
        ];
        let plan = plan_batch(&batch).unwrap();
        assert_eq!(plan.customer_keys.len(), 1);
        assert!(plan.customer_keys[0].tax_id.is_none());
    }
}

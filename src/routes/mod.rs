use axum::Router;

use crate::state::AppState;

pub mod branches;
pub mod companies;
pub mod customers;
pub mod goals;
pub mod health;
pub mod marketing;
pub mod sales;

pub fn router() -> Router<AppState> {
    Router::new()
        .merge(health::router())
        .merge(companies::router())
        .merge(branches::router())
        .merge(customers::router())
        .merge(goals::router())
        .merge(sales::router())
        .merge(marketing::router())
}

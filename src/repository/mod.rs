pub mod branches;
pub mod companies;
pub mod customers;
pub mod goals;
pub mod marketing;
pub mod sales;
pub mod spreadsheets;

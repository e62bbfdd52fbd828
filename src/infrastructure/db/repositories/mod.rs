pub mod permission_repository_sqlx;
pub mod update_store_sqlx;

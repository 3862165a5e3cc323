use sqlx::MySqlPool;

use crate::error::AppError;

/// Connects to MySQL and brings the schema up to date.
pub async fn init_db(database_url: &str) -> Result<MySqlPool, AppError> {
    let pool = MySqlPool::connect(database_url).await?;
    sqlx::migrate!("./migrations").run(&pool).await?;
    Ok(pool)
}

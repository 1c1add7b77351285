// Verify the chat schema is in place
use sqlx::postgres::PgPool;
use std::env;

#[tokio::main]
async fn main() -> Result<(), sqlx::Error> {
    dotenvy::dotenv().ok();

    let database_url = env::var("DATABASE_URL").expect("DATABASE_URL must be set");

    println!("Connecting to database...");
    let pool = PgPool::connect(&database_url).await?;

    let mut missing = false;
    for table in ["conversations", "messages"] {
        let count = sqlx::query_scalar::<_, i64>(&format!("SELECT COUNT(*) FROM {}", table))
            .fetch_one(&pool)
            .await;

        match count {
            Ok(count) => println!("✅ {} table EXISTS ({} rows)", table, count),
            Err(e) => {
                println!("❌ {} table NOT FOUND: {}", table, e);
                missing = true;
            }
        }
    }

    if missing {
        let tables = sqlx::query_as::<_, (String,)>(
            "SELECT tablename FROM pg_tables WHERE schemaname = 'public'",
        )
        .fetch_all(&pool)
        .await?;

        println!("Available tables:");
        for (table,) in tables {
            println!("  - {}", table);
        }
    }

    println!("\nApplied migrations:");
    let migrations = sqlx::query_as::<_, (i64, String, bool)>(
        "SELECT version, description, success FROM _sqlx_migrations ORDER BY version DESC",
    )
    .fetch_all(&pool)
    .await;

    match migrations {
        Ok(migrations) => {
            for (version, description, success) in migrations {
                println!("  - {} {} (success: {})", version, description, success);
            }
        }
        Err(e) => println!("❌ Error querying _sqlx_migrations: {}", e),
    }

    Ok(())
}

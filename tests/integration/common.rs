//! Shared fixtures: a seeded SQLite store and configs pointing at it.

use db_qa::config::{Config, ConnectionConfig};
use db_qa::db::DatabaseBackend;
use sqlx::sqlite::{SqliteConnectOptions, SqlitePoolOptions};
use tempfile::TempDir;

const SEED: &[&str] = &[
    "CREATE TABLE t_shirts (
        t_shirt_id INTEGER PRIMARY KEY,
        brand TEXT NOT NULL,
        color TEXT NOT NULL,
        size TEXT NOT NULL,
        price INTEGER,
        stock_quantity INTEGER NOT NULL
    )",
    "CREATE TABLE discounts (
        discount_id INTEGER PRIMARY KEY,
        t_shirt_id INTEGER NOT NULL,
        pct_discount REAL
    )",
    "INSERT INTO t_shirts VALUES
        (1, 'Nike', 'White', 'M', 25, 40),
        (2, 'Nike', 'White', 'L', 25, 12),
        (3, 'Adidas', 'Black', 'M', 30, 7),
        (4, 'Levi', 'White', 'M', 20, 55)",
    "INSERT INTO discounts VALUES (1, 3, 10.0)",
];

/// Creates a SQLite file holding the t-shirt store and returns its descriptor.
///
/// Keep the `TempDir` alive for as long as the file is needed.
pub async fn seeded_store() -> (TempDir, ConnectionConfig) {
    let dir = TempDir::new().unwrap();
    let path = dir.path().join("atliq_tshirts.db");

    let pool = SqlitePoolOptions::new()
        .max_connections(1)
        .connect_with(
            SqliteConnectOptions::new()
                .filename(&path)
                .create_if_missing(true),
        )
        .await
        .unwrap();
    for statement in SEED {
        sqlx::query(statement).execute(&pool).await.unwrap();
    }
    pool.close().await;

    let connection = ConnectionConfig {
        backend: DatabaseBackend::Sqlite,
        database: Some(path.to_string_lossy().into_owned()),
        ..Default::default()
    };
    (dir, connection)
}

/// Config using the mock model against `connection`.
pub fn mock_config(connection: ConnectionConfig) -> Config {
    let mut config = Config::default();
    config.llm.provider = "mock".to_string();
    config.database = connection;
    config
}

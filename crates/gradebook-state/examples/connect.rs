//! Quick connection check against the configured SurrealDB
//! Run with: cargo run --package gradebook-state --example connect

use gradebook_state::{DbConfig, SurrealHandle};

#[tokio::main]
async fn main() {
    // Load from environment
    dotenvy::dotenv().ok();

    println!("Testing SurrealDB connection...");

    match DbConfig::from_env() {
        Ok(config) => {
            println!("  Endpoint: {}", config.endpoint);
            println!("  Namespace: {}", config.namespace);
            println!("  Database: {}", config.database);
            println!("  User: {}", config.username);
            println!("  Is Root: {}", config.is_root);

            match SurrealHandle::connect(config).await {
                Ok(_handle) => {
                    println!("\n✓ Successfully connected to SurrealDB!");
                    println!("✓ Schema initialized!");
                }
                Err(e) => {
                    eprintln!("\n✗ Connection failed: {}", e);
                    std::process::exit(1);
                }
            }
        }
        Err(e) => {
            eprintln!("✗ Missing environment variables: {}", e);
            std::process::exit(1);
        }
    }
}

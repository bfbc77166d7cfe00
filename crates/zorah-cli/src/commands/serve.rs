//! Server command implementation

use std::path::Path;

use anyhow::{Context, Result};

use super::open_db;

/// Comma-separated list from an environment variable
fn env_list(name: &str) -> Vec<String> {
    std::env::var(name)
        .unwrap_or_default()
        .split(',')
        .map(|s| s.trim().to_string())
        .filter(|s| !s.is_empty())
        .collect()
}

pub async fn cmd_serve(
    db_path: &Path,
    host: &str,
    port: u16,
    no_auth: bool,
    no_encrypt: bool,
    static_dir: Option<&Path>,
) -> Result<()> {
    println!("🚀 Starting ZoraH web server...");
    println!("   Database: {}", db_path.display());
    println!("   Listening: http://{}:{}", host, port);
    if let Some(dir) = static_dir {
        println!("   Static files: {}", dir.display());
    }

    // API keys as "key:role:email" entries (comma-separated)
    let api_keys =
        zorah_server::parse_api_keys(&std::env::var("ZORAH_API_KEYS").unwrap_or_default());
    let allowed_origins = env_list("ZORAH_ALLOWED_ORIGINS");

    if no_auth {
        println!();
        println!("   ⚠️  Authentication DISABLED - do not expose to network!");
    } else if api_keys.is_empty() {
        println!("   ⚠️  No API keys configured (ZORAH_API_KEYS); all requests will be rejected");
    } else {
        println!(
            "   🔑 API keys: {} configured (ZORAH_API_KEYS)",
            api_keys.len()
        );
    }
    if !allowed_origins.is_empty() {
        println!("   🌐 CORS origins: {}", allowed_origins.join(", "));
    }
    if no_encrypt {
        println!("   ⚠️  Encryption DISABLED (--no-encrypt)");
    }
    println!();
    println!("   Press Ctrl+C to stop");

    let db = open_db(db_path, no_encrypt)?;

    let config = zorah_server::ServerConfig {
        require_auth: !no_auth,
        allowed_origins,
        api_keys,
    };

    let static_dir_str = match static_dir {
        Some(p) => Some(p.to_str().context("Static dir path must be valid UTF-8")?),
        None => None,
    };
    zorah_server::serve_with_config(db, host, port, static_dir_str, config).await?;

    Ok(())
}

//! Command implementations

use std::path::Path;
use std::sync::Arc;
use std::time::Duration;

use genesis_api::{run_server, ApiConfig};
use genesis_crypto::GenesisSigningKey;
use genesis_db::{Datastore, MemoryDatastore};
use genesis_smart::{ContractEngine, ExecPolicy};
use tracing::info;

use crate::config::Config;

type CmdResult = Result<(), Box<dyn std::error::Error + Send + Sync>>;

/// Builds the datastore named by the DSN.
async fn open_datastore(dsn: &str) -> Result<Arc<dyn Datastore>, Box<dyn std::error::Error + Send + Sync>> {
    if dsn.is_empty() || dsn.starts_with("mem://") {
        return Ok(Arc::new(MemoryDatastore::new()));
    }
    #[cfg(feature = "postgres")]
    if dsn.starts_with("postgres://") {
        let ds = genesis_db::PgDatastore::connect(dsn).await?;
        return Ok(Arc::new(ds));
    }
    Err(format!("unsupported DSN {:?}", dsn).into())
}

/// `generate-keys`: writes the hex private key and prints the wallet.
pub fn generate_keys(out: &Path) -> CmdResult {
    let key = GenesisSigningKey::generate();
    let key_file = out.join("PrivateKey");
    std::fs::write(&key_file, key.private_key_hex())?;

    println!("private key: {}", key_file.display());
    println!("public key:  {}", key.public_key_hex());
    println!("wallet:      {}", key.wallet_id());
    Ok(())
}

/// `init-database`: creates the schema and seeds the system ecosystem
/// with the founder account.
pub async fn init_database(config: &Config, key_file: &Path) -> CmdResult {
    let raw = std::fs::read_to_string(key_file)?;
    let key = GenesisSigningKey::from_hex(raw.trim())?;

    let datastore = open_datastore(&config.db.dsn).await?;
    datastore.init_schema().await?;

    let mut tx = datastore.begin().await?;
    genesis_db::seed::init_data(tx.as_mut(), key.wallet_id(), &key.public_key_hex()).await?;
    tx.commit().await?;

    info!(founder = key.wallet_id(), "database initialized");
    Ok(())
}

/// `start`: builds the engine and serves the API.
pub async fn start(config: &Config) -> CmdResult {
    let datastore = open_datastore(&config.db.dsn).await?;
    datastore.init_schema().await?;

    let engine = ContractEngine::new(datastore, ExecPolicy::consensus())
        .await?
        .with_wall_clock(Duration::from_millis(config.block.wall_clock_ms));

    let api_config = ApiConfig {
        host: config.api.host.clone(),
        port: config.api.port,
        enable_cors: config.api.enable_cors,
        jwt_secret: config.jwt_secret.clone(),
    };
    run_server(&api_config, Arc::new(engine)).await
}

//! `adminconsole-cli`: issue one authenticated GET and print its data.
//!
//! Restores the persisted session, logs in from `ADMINCONSOLE_USER` /
//! `ADMINCONSOLE_PASSWORD` when there is none, then fetches the path given
//! as the first argument.

use std::sync::Arc;

use anyhow::Context;

use adminconsole_client::{ApiClient, ClientConfig, LoginInput, SqliteStore};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    adminconsole_observability::init();

    let path = std::env::args()
        .nth(1)
        .context("usage: adminconsole-cli <path>")?;

    let config = ClientConfig::from_env();
    let store = SqliteStore::open_default()?;
    let client = ApiClient::builder(config).store(Arc::new(store)).build()?;

    if !client.restore_session().await? {
        let user = std::env::var("ADMINCONSOLE_USER").context("no stored session and ADMINCONSOLE_USER is not set")?;
        let password = std::env::var("ADMINCONSOLE_PASSWORD").context("ADMINCONSOLE_PASSWORD is not set")?;
        let identity = client
            .login(&LoginInput::new(user, password))
            .await
            .map_err(|err| anyhow::anyhow!(err.user_message()))?;
        tracing::info!(user = %identity.display_name, "session started");
    }

    let data: serde_json::Value = client
        .get(&path)
        .await
        .map_err(|err| anyhow::anyhow!("{}: {err}", err.user_message()))?;

    println!("{}", serde_json::to_string_pretty(&data)?);
    Ok(())
}

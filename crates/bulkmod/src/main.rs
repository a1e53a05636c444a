use std::sync::Arc;

use bulkmod_core::config::Config;

#[tokio::main]
async fn main() -> Result<(), bulkmod_core::Error> {
    bulkmod_core::logging::init("bulkmod")?;

    let cfg = Arc::new(Config::load()?);

    bulkmod_telegram::router::run_polling(cfg)
        .await
        .map_err(|e| bulkmod_core::Error::External(format!("telegram bot failed: {e}")))?;

    Ok(())
}

mod app;

use anyhow::Context;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    app::run().await.context("inventory sync failed")
}

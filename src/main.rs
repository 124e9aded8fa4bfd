use rolling_appender::app;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    app::main().await
}

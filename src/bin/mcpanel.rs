#[tokio::main]
async fn main() -> anyhow::Result<()> {
    mcpanel::panel::main().await
}

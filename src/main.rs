use anyhow::Result;
use split_bill_ocr::orchestrator::App;
use split_bill_ocr::{logger, Config};

#[tokio::main]
async fn main() -> Result<()> {
    // 初始化日志
    logger::init();

    // 加载配置（config.toml 可选，环境变量覆盖）
    let config = Config::load().await;

    // 初始化并运行应用
    App::initialize(config)?.run().await?;

    Ok(())
}

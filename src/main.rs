use anyhow::Result;
use clap::Parser;
use fntest::cli::{self, Cli};
use std::process::ExitCode;
use std::sync::Arc;

#[tokio::main]
async fn main() -> Result<ExitCode> {
    // 初始化日志系统
    fntest::logger::init_logger();

    let cli = Cli::parse();
    let status = cli::execute(cli, Arc::new(fntest::builtin::registry())).await?;
    Ok(ExitCode::from(status))
}

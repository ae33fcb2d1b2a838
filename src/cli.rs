use crate::handler::ModuleLoader;
use crate::project::{ProjectLoader, Selection, discover};
use crate::runner::{ConsoleReporter, HandlerInvoker, RunOptions, TestOrchestrator};
use clap::{Args, Parser, Subcommand};
use std::path::PathBuf;
use std::sync::Arc;

pub type Result<T> = std::result::Result<T, anyhow::Error>;

#[derive(Parser)]
#[command(author, version, about, long_about = None)]
pub struct Cli {
    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Subcommand)]
pub enum Commands {
    /// Run tests on the given functions
    Test(TestArgs),
}

#[derive(Args, Debug, Clone)]
pub struct TestArgs {
    /// One or more function paths (e.g. users/create, or users/ for a whole directory)
    pub paths: Vec<String>,

    /// Test all functions
    #[arg(short, long)]
    pub all: bool,

    /// JUnit output file
    #[arg(short, long)]
    pub out: Option<PathBuf>,

    /// Stage whose variables are passed to the handlers
    #[arg(short, long)]
    pub stage: Option<String>,

    /// Project directory (fntest.toml is searched upwards from here)
    #[arg(short, long, default_value = ".")]
    pub project: PathBuf,

    /// Show captured output of passing functions too
    #[arg(short, long)]
    pub verbose: bool,
}

/// 执行 CLI 命令，返回进程退出码
///
/// 宿主 crate 传入自己的模块加载器即可复用整个命令行。
pub async fn execute(cli: Cli, loader: Arc<dyn ModuleLoader>) -> Result<u8> {
    match cli.command {
        Commands::Test(args) => run_tests(args, loader).await,
    }
}

async fn run_tests(args: TestArgs, loader: Arc<dyn ModuleLoader>) -> Result<u8> {
    let project = ProjectLoader::find_from(&args.project, args.stage.as_deref())?;
    if let Some(stage) = &project.stage {
        tracing::info!(project = %project.name(), stage = %stage.name, "Using stage");
    }

    let selection = Selection::from_args(args.all, args.paths);
    let functions = discover(&project, &selection)?;

    let orchestrator = TestOrchestrator::new(HandlerInvoker::new(loader).with_stage(project.stage))
        .with_reporter(ConsoleReporter::new(args.verbose));
    let options = RunOptions {
        output_path: args.out,
    };

    Ok(orchestrator.run_to_status(&functions, &options).await?)
}

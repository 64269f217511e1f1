use anyhow::Result;
use clap::Parser;
use std::collections::BTreeMap;
use std::sync::Arc;
use tracing::{error, info};
use tracing_subscriber::{fmt, EnvFilter};

use deployer::config::options::OptionArgs;
use deployer::config::{keys, secrets, Action, CommandLineOptions, ConfigSources, ServiceConfig};
use deployer::constants::naming;
use deployer::remote::AwsCollaborators;
use deployer::{Materializer, ServiceOrchestrator};

/// Deploy and manage Fargate services behind a shared load balancer
#[derive(Debug, Parser)]
#[command(name = "fargate-helper", version)]
struct Cli {
    #[arg(value_enum)]
    action: Action,

    #[command(flatten)]
    options: OptionArgs,
}

#[tokio::main]
async fn main() -> Result<()> {
    // A missing .env file is not an error
    dotenvy::dotenv().ok();

    let env_filter = EnvFilter::from_default_env()
        .add_directive("deployer=info".parse()?)
        .add_directive("fargate_helper=info".parse()?)
        .add_directive("aws_config=warn".parse()?)
        .add_directive("aws_smithy_runtime=warn".parse()?)
        .add_directive("hyper=warn".parse()?);

    fmt().with_env_filter(env_filter).init();

    let cli = Cli::parse();

    if let Err(e) = run(cli).await {
        error!("{:#}", e);
        std::process::exit(1);
    }

    info!("DONE");
    Ok(())
}

async fn run(cli: Cli) -> Result<()> {
    let options = CommandLineOptions::from_args(cli.options)?;
    let environment: BTreeMap<String, String> = std::env::vars().collect();

    let region = environment
        .get(keys::REGION)
        .filter(|r| !r.is_empty())
        .map(String::as_str)
        .unwrap_or(naming::DEFAULT_REGION);
    let aws = AwsCollaborators::connect(region).await;

    let secret_name = secrets::secret_name(&options, &environment);
    let secret_defaults = secrets::load_defaults(aws.secrets.as_ref(), &secret_name).await?;

    let sources = ConfigSources::new(options, secret_defaults, environment);
    let config = Arc::new(ServiceConfig::resolve(cli.action, &sources)?);

    let orchestrator = ServiceOrchestrator::new(
        config,
        aws.containers,
        aws.load_balancer,
        aws.scheduler,
        Materializer::from_process_env(),
    );

    let outcome = orchestrator.run().await?;
    info!("{}", outcome);
    Ok(())
}

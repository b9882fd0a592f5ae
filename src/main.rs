use std::{path::PathBuf, process::ExitCode, sync::Arc};

use clap::Parser;
use saml_provider::{
    auth::{
        MemorySessionStore, SamaelClientFactory, SamlClientFactory, SamlProvider,
        SamlSettingsFormatter, SettingsFormatter, TracingLoginLogger,
    },
    config::AppConfig,
    db::{DbPool, memory::MemoryContactStore},
    observability::init_tracing,
};

/// CLI arguments for the SAML provider
#[derive(Parser, Debug)]
#[command(version, about = "SAML single-sign-on provider", long_about = None)]
struct Args {
    #[command(subcommand)]
    command: Command,

    /// Path to config file
    #[arg(short, long, global = true, default_value = "saml-provider.toml")]
    config: PathBuf,
}

#[derive(clap::Subcommand, Debug)]
enum Command {
    /// Print the SP metadata XML
    Metadata,
    /// Print the IdP redirect URL for a new login
    LoginUrl {
        /// Page to return to after login (sent as RelayState)
        #[arg(long, default_value = "")]
        return_to: String,
    },
    /// Validate the configuration and the generated SP metadata
    Check,
}

#[tokio::main(flavor = "current_thread")]
async fn main() -> ExitCode {
    let args = Args::parse();

    let config = match AppConfig::from_file(&args.config) {
        Ok(config) => config,
        Err(e) => {
            eprintln!("Error: {e}");
            return ExitCode::FAILURE;
        }
    };

    if let Err(e) = init_tracing(&config.observability.logging) {
        eprintln!("Error: {e}");
        return ExitCode::FAILURE;
    }

    match run(args.command, config).await {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            tracing::error!(error = %e, "Command failed");
            ExitCode::FAILURE
        }
    }
}

async fn run(command: Command, config: AppConfig) -> Result<(), Box<dyn std::error::Error>> {
    let settings = SamlSettingsFormatter.format(config.provider.custom())?;
    let client = SamaelClientFactory.build_client(settings)?;

    match command {
        Command::Metadata => {
            println!("{}", client.sp_metadata()?);
        }
        Command::LoginUrl { return_to } => {
            let provider = SamlProvider::new(
                config.provider,
                DbPool::from_memory(Arc::new(MemoryContactStore::new())),
                Arc::new(MemorySessionStore::new()),
                Arc::new(SamaelClientFactory),
                Arc::new(TracingLoginLogger),
            );
            let redirect = provider.login(&return_to).await?;
            println!("{}", redirect.location());
        }
        Command::Check => {
            let errors = client.validate_sp_metadata();
            if !errors.is_empty() {
                return Err(format!("invalid SP metadata: {}", errors.join(", ")).into());
            }
            tracing::info!(
                provider = %config.provider.name,
                active = config.provider.is_active,
                "Configuration is valid"
            );
        }
    }

    Ok(())
}

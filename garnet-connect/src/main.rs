mod cli;
mod interrupt;
mod paths;
mod settings;
mod shell;

use std::fs;
use std::fs::File;
use std::time::Duration;

use clap::Parser;
use garnet_azure::AzureServices;
use garnet_azure::ConnectionTree;
use garnet_azure::ResourceBrowser;
use garnet_azure::arm::ClusterResource;
use garnet_azure::arm::ResourceId;
use garnet_azure::auth::AuthConfig;
use garnet_azure::auth::AzureAuthService;
use garnet_azure::auth::DEFAULT_CLIENT_ID;
use garnet_azure::auth::DEFAULT_TENANT;
use garnet_azure::auth::TokenStore;
use garnet_azure::ipc::AuthIpcHandler;
use garnet_azure::ipc::IpcInvokeEvent;
use garnet_azure::tree::AzureBackend;
use simplelog::Config;
use simplelog::LevelFilter;
use simplelog::WriteLogger;
use thiserror::Error;

use crate::cli::Cli;
use crate::cli::Commands;
use crate::interrupt::LoginInterrupt;
use crate::settings::SettingsError;
use crate::settings::SettingsProvider;
use crate::shell::Shell;

#[derive(Debug, Error)]
pub enum AppError {
    #[error("settings error: {0}")]
    Settings(#[from] SettingsError),

    #[error(transparent)]
    Azure(#[from] garnet_azure::Error),

    #[error(transparent)]
    Ipc(#[from] garnet_azure::ipc::IpcError),

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),
}

/// Tenant and client id the services were built with.
pub struct Identity {
    pub tenant: String,
    pub client_id: String,
}

#[tokio::main]
async fn main() {
    let cli = Cli::parse();
    init_logging(cli.log_level);

    if let Err(e) = run(cli).await {
        log::error!("{}", e);
        eprintln!("Error: {}", e);
        std::process::exit(1);
    }
}

fn init_logging(level: LevelFilter) {
    paths::rotate_logs();

    let Some(path) = paths::log_file() else {
        eprintln!("Warning: no cache directory, logging disabled");
        return;
    };
    if let Some(dir) = path.parent() {
        let _ = fs::create_dir_all(dir);
    }

    match File::create(&path) {
        Ok(file) => {
            if let Err(e) = WriteLogger::init(level, Config::default(), file) {
                eprintln!("Warning: failed to initialize logger: {}", e);
            }
        }
        Err(e) => eprintln!("Warning: failed to create {}: {}", path.display(), e),
    }
}

async fn open_settings(no_persist: bool) -> Result<SettingsProvider, AppError> {
    let settings = match paths::settings_db() {
        Some(path) if !no_persist => {
            if let Some(dir) = path.parent() {
                fs::create_dir_all(dir)?;
            }
            SettingsProvider::open(&path).await?
        }
        _ => SettingsProvider::in_memory().await?,
    };
    Ok(settings)
}

/// Flags win over remembered settings, which win over the defaults.
async fn resolve_identity(cli: &Cli, settings: &SettingsProvider) -> Result<Identity, AppError> {
    let tenant = match &cli.tenant {
        Some(tenant) => tenant.clone(),
        None => settings
            .last_tenant()
            .await?
            .unwrap_or_else(|| DEFAULT_TENANT.to_string()),
    };
    let client_id = match &cli.client_id {
        Some(client_id) => client_id.clone(),
        None => settings
            .last_client_id()
            .await?
            .unwrap_or_else(|| DEFAULT_CLIENT_ID.to_string()),
    };
    Ok(Identity { tenant, client_id })
}

fn build_services(cli: &Cli, identity: &Identity) -> Result<AzureServices, AppError> {
    let mut config = AuthConfig::default()
        .with_tenant(&identity.tenant)
        .with_client_id(&identity.client_id)
        .with_login_timeout(Duration::from_secs(cli.login_timeout));
    if let Some(host) = &cli.authority_host {
        config = config.with_authority_host(host);
    }
    if let Some(port) = cli.redirect_port {
        config = config.with_redirect_port(port);
    }
    if let Some(uri) = &cli.deep_link_redirect_uri {
        config = config.with_deep_link_redirect_uri(uri);
    }

    let store = TokenStore::new();
    let auth = AzureAuthService::new(config, store.clone());

    let mut builder = ResourceBrowser::builder()
        .token_store(store)
        .token_provider(auth.clone())
        .timeout(Duration::from_secs(30))
        .connect_timeout(Duration::from_secs(10));
    if let Some(url) = &cli.management_url {
        builder = builder.management_url(url);
    }
    let browser = builder.build().map_err(garnet_azure::Error::from)?;

    Ok(AzureServices::new(auth, browser))
}

async fn run(cli: Cli) -> Result<(), AppError> {
    let settings = open_settings(cli.no_persist).await?;
    let identity = resolve_identity(&cli, &settings).await?;
    log::info!(
        "Starting garnet-connect (tenant {}, client {})",
        identity.tenant,
        identity.client_id
    );

    match cli.command.as_ref().unwrap_or(&Commands::Browse) {
        Commands::Browse => {
            let services = build_services(&cli, &identity)?;
            Shell::new(services, settings, identity).run().await
        }
        Commands::Login => {
            let services = build_services(&cli, &identity)?;
            let result = login(&services).await?;
            settings
                .remember_sign_in(&identity.tenant, &identity.client_id)
                .await?;
            println!("{}", serde_json::to_string_pretty(&result.account)?);
            Ok(())
        }
        Commands::Connect { resource_id } => {
            let services = build_services(&cli, &identity)?;
            login(&services).await?;
            settings
                .remember_sign_in(&identity.tenant, &identity.client_id)
                .await?;

            let resource = cluster_resource(resource_id)?;
            let mut tree = ConnectionTree::new(services);
            let descriptor = tree.connect(&resource).await?;
            println!("{}", serde_json::to_string_pretty(&descriptor)?);
            Ok(())
        }
        Commands::Invoke { channels } => {
            let services = build_services(&cli, &identity)?;
            let handler = AuthIpcHandler::new(services.auth().clone());
            let interrupt = LoginInterrupt::install({
                let handler = handler.clone();
                move || handler.cancel_login()
            });
            for channel in channels {
                let _guard = starts_login(channel).then(|| interrupt.begin());
                let reply = handler.handle(channel).await?;
                println!("{}", serde_json::to_string_pretty(&reply)?);
            }
            Ok(())
        }
        Commands::Settings { reset } => {
            if *reset {
                for key in settings.forget_sign_in().await? {
                    println!("removed {}", key);
                }
            } else {
                println!("tenant    = {}", identity.tenant);
                println!("client_id = {}", identity.client_id);
            }
            Ok(())
        }
    }
}

/// Interactive login that Ctrl+C abandons.
async fn login(
    services: &AzureServices,
) -> Result<garnet_azure::auth::AuthenticationResult, AppError> {
    let interrupt = LoginInterrupt::install({
        let services = services.clone();
        move || services.cancel_login()
    });

    println!("Opening the browser to sign in to Azure (Ctrl+C to cancel)...");
    let _guard = interrupt.begin();
    Ok(services.login().await?)
}

/// Whether answering `channel` runs an interactive login.
pub(crate) fn starts_login(channel: &str) -> bool {
    matches!(channel.parse::<IpcInvokeEvent>(), Ok(IpcInvokeEvent::StartDeviceLogin))
}

/// A cluster reference built from its resource id alone.
fn cluster_resource(resource_id: &str) -> Result<ClusterResource, AppError> {
    ResourceId::parse(resource_id).map_err(garnet_azure::Error::from)?;
    let name = resource_id
        .trim_end_matches('/')
        .rsplit('/')
        .next()
        .unwrap_or_default()
        .to_string();
    Ok(ClusterResource {
        id: resource_id.to_string(),
        name,
        resource_type: None,
        location: None,
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn cluster_name_comes_from_last_segment() {
        let resource = cluster_resource(
            "/subscriptions/s/resourceGroups/r/providers/Microsoft.DocumentDB/garnetClusters/cache",
        )
        .unwrap();
        assert_eq!(resource.name, "cache");
    }

    #[test]
    fn only_the_login_channel_starts_a_login() {
        assert!(starts_login("azure:start:device:login"));
        assert!(!starts_login("azure:get:cosmos:token"));
        assert!(!starts_login("azure:nope"));
    }

    #[test]
    fn rejects_ids_outside_a_resource_group() {
        assert!(cluster_resource("/subscriptions/s").is_err());
    }

    #[tokio::test]
    async fn flags_override_remembered_identity() {
        let settings = SettingsProvider::in_memory().await.unwrap();
        settings.remember_sign_in("remembered", "client-a").await.unwrap();

        let cli = Cli::try_parse_from(["garnet-connect", "--tenant", "flagged"]).unwrap();
        let identity = resolve_identity(&cli, &settings).await.unwrap();

        assert_eq!(identity.tenant, "flagged");
        assert_eq!(identity.client_id, "client-a");
    }
}

use clap::Parser;
use clap::Subcommand;
use simplelog::LevelFilter;

#[derive(Parser)]
#[command(name = "garnet-connect")]
#[command(about = "Sign in to Azure and resolve Garnet clusters into connection details")]
pub struct Cli {
    /// Azure AD tenant (id, domain, `common` or `organizations`)
    #[arg(long, global = true, env = "GARNET_TENANT")]
    pub tenant: Option<String>,

    /// Application (client) id registered for the redirect
    #[arg(long, global = true, env = "GARNET_CLIENT_ID")]
    pub client_id: Option<String>,

    /// Identity platform host
    #[arg(long, global = true, env = "GARNET_AUTHORITY_HOST")]
    pub authority_host: Option<String>,

    /// Resource Manager host
    #[arg(long, global = true, env = "GARNET_MANAGEMENT_URL")]
    pub management_url: Option<String>,

    /// Fixed port for the sign-in redirect listener (ephemeral by default)
    #[arg(long, global = true)]
    pub redirect_port: Option<u16>,

    /// Seconds to wait for the browser to redirect back
    #[arg(long, global = true, default_value_t = 300)]
    pub login_timeout: u64,

    /// Redirect URI registered for deep link sign-in
    #[arg(long, global = true)]
    pub deep_link_redirect_uri: Option<String>,

    /// Log level written to the log file
    #[arg(long, global = true, default_value = "info", env = "GARNET_LOG")]
    pub log_level: LevelFilter,

    /// Keep settings in memory only
    #[arg(long, global = true)]
    pub no_persist: bool,

    #[command(subcommand)]
    pub command: Option<Commands>,
}

#[derive(Subcommand)]
pub enum Commands {
    /// Browse subscriptions and clusters interactively (default)
    Browse,
    /// Sign in and print the account
    Login,
    /// Sign in and print connection details for a cluster resource id
    Connect {
        /// `/subscriptions/{sub}/resourceGroups/{rg}/providers/Microsoft.DocumentDB/garnetClusters/{name}`
        resource_id: String,
    },
    /// Answer request channels in order, printing each JSON reply
    Invoke {
        /// e.g. `azure:start:device:login azure:get:cosmos:token`
        #[arg(required = true)]
        channels: Vec<String>,
    },
    /// Show or reset remembered sign-in settings
    Settings {
        #[arg(long)]
        reset: bool,
    },
}

#[cfg(test)]
mod tests {
    use clap::CommandFactory;

    use super::*;

    #[test]
    fn definition_is_valid() {
        Cli::command().debug_assert();
    }

    #[test]
    fn defaults_to_browse_with_info_logging() {
        let cli = Cli::try_parse_from(["garnet-connect"]).unwrap();
        assert!(cli.command.is_none());
        assert_eq!(cli.log_level, LevelFilter::Info);
        assert_eq!(cli.login_timeout, 300);
    }

    #[test]
    fn parses_connect_with_overrides() {
        let cli = Cli::try_parse_from([
            "garnet-connect",
            "connect",
            "/subscriptions/s/resourceGroups/r/providers/Microsoft.DocumentDB/garnetClusters/c",
            "--tenant",
            "contoso.onmicrosoft.com",
            "--log-level",
            "debug",
        ])
        .unwrap();

        assert_eq!(cli.tenant.as_deref(), Some("contoso.onmicrosoft.com"));
        assert_eq!(cli.log_level, LevelFilter::Debug);
        assert!(matches!(cli.command, Some(Commands::Connect { .. })));
    }
}

//! Line-oriented front end for the connection tree.

use std::io::Write;

use garnet_azure::AzureServices;
use garnet_azure::ConnectionTree;
use garnet_azure::deep_link::DeepLinkHandler;
use garnet_azure::ipc::AuthIpcHandler;
use garnet_azure::tree::RowKind;
use garnet_azure::tree::Step;
use garnet_azure::tree::TreeRow;
use tokio::io::AsyncBufReadExt;
use tokio::io::BufReader;

use crate::AppError;
use crate::Identity;
use crate::interrupt::LoginInterrupt;
use crate::settings::SettingsProvider;
use crate::starts_login;

const HELP: &str = "\
Commands:
  login            sign in to Azure in the browser (Ctrl+C cancels)
  ls               show the tree
  <n>              expand/collapse row n, or connect if it is a cluster
  connect <n>      print connection details for cluster row n
  invoke <channel> answer a request channel (e.g. azure:get:cosmos:token)
  link <url>       handle a deep link redirect
  help             show this help
  quit             exit (also Ctrl+C or Ctrl+D when idle)";

#[derive(Debug, PartialEq, Eq)]
enum Command {
    Login,
    List,
    Select(usize),
    Connect(usize),
    Invoke(String),
    Link(String),
    Help,
    Quit,
    Unknown(String),
}

impl Command {
    fn parse(line: &str) -> Option<Self> {
        let line = line.trim();
        if line.is_empty() {
            return None;
        }

        let (head, rest) = match line.split_once(char::is_whitespace) {
            Some((head, rest)) => (head, rest.trim()),
            None => (line, ""),
        };

        let command = match head {
            "login" => Self::Login,
            "ls" | "list" => Self::List,
            "connect" | "c" => match rest.parse() {
                Ok(n) => Self::Connect(n),
                Err(_) => Self::Unknown(line.to_string()),
            },
            "invoke" if !rest.is_empty() => Self::Invoke(rest.to_string()),
            "link" if !rest.is_empty() => Self::Link(rest.to_string()),
            "help" | "?" => Self::Help,
            "quit" | "exit" | "q" => Self::Quit,
            _ => match head.parse() {
                Ok(n) if rest.is_empty() => Self::Select(n),
                _ => Self::Unknown(line.to_string()),
            },
        };
        Some(command)
    }
}

pub struct Shell {
    tree: ConnectionTree<AzureServices>,
    ipc: AuthIpcHandler,
    deep_links: DeepLinkHandler,
    settings: SettingsProvider,
    identity: Identity,
    interrupt: LoginInterrupt,
}

impl Shell {
    /// Builds the shell and takes over Ctrl+C for the session.
    pub fn new(services: AzureServices, settings: SettingsProvider, identity: Identity) -> Self {
        let ipc = AuthIpcHandler::new(services.auth().clone());
        let interrupt = LoginInterrupt::install({
            let services = services.clone();
            let ipc = ipc.clone();
            move || {
                services.cancel_login();
                ipc.cancel_login();
            }
        });

        Self {
            ipc,
            interrupt,
            deep_links: DeepLinkHandler::new(services.auth().clone()),
            tree: ConnectionTree::new(services),
            settings,
            identity,
        }
    }

    pub async fn run(mut self) -> Result<(), AppError> {
        self.tree.open().await;
        self.render();

        let mut lines = BufReader::new(tokio::io::stdin()).lines();
        loop {
            print!("> ");
            std::io::stdout().flush()?;

            let Some(line) = lines.next_line().await? else {
                break;
            };
            let Some(command) = Command::parse(&line) else {
                continue;
            };
            log::debug!("Shell command: {:?}", command);

            match command {
                Command::Quit => break,
                Command::Help => println!("{}", HELP),
                Command::List => self.render(),
                Command::Login => {
                    self.login().await?;
                    self.render();
                }
                Command::Select(n) => {
                    self.select(n).await?;
                    self.render();
                }
                Command::Connect(n) => self.connect(n).await?,
                Command::Invoke(channel) => {
                    let _guard = starts_login(&channel).then(|| self.interrupt.begin());
                    match self.ipc.handle(&channel).await {
                        Ok(reply) => println!("{}", serde_json::to_string_pretty(&reply)?),
                        Err(e) => println!("error: {}", e),
                    }
                }
                Command::Link(url) => match self.deep_links.handle(&url).await {
                    Some(event) => {
                        println!("{} {}", event.channel(), event.payload());
                        self.tree.open().await;
                        self.render();
                    }
                    None => println!("ignored"),
                },
                Command::Unknown(text) => println!("unknown command: {} (try `help`)", text),
            }
        }

        Ok(())
    }

    async fn login(&mut self) -> Result<(), AppError> {
        println!("Opening the browser to sign in to Azure (Ctrl+C to cancel)...");
        let guard = self.interrupt.begin();
        self.tree.login().await;
        drop(guard);

        if self.tree.step() == Step::Resources {
            self.settings
                .remember_sign_in(&self.identity.tenant, &self.identity.client_id)
                .await?;
        }
        Ok(())
    }

    async fn select(&mut self, n: usize) -> Result<(), AppError> {
        let Some(row) = self.row(n) else {
            return Ok(());
        };
        match row.kind {
            RowKind::Subscription { subscription_id } => {
                self.tree.toggle_subscription(&subscription_id).await;
            }
            RowKind::ResourceGroup {
                subscription_id,
                resource_group,
            } => {
                self.tree
                    .toggle_resource_group(&subscription_id, &resource_group)
                    .await;
            }
            RowKind::Cluster(_) => self.connect(n).await?,
            RowKind::Empty => {}
        }
        Ok(())
    }

    async fn connect(&mut self, n: usize) -> Result<(), AppError> {
        let Some(TreeRow {
            kind: RowKind::Cluster(resource),
            ..
        }) = self.row(n)
        else {
            println!("row {} is not a cluster", n);
            return Ok(());
        };

        self.tree.dismiss_error();
        if let Ok(descriptor) = self.tree.connect(&resource).await {
            println!("{}", serde_json::to_string_pretty(&descriptor)?);
        }
        if let Some(error) = self.tree.error() {
            println!("error: {}", error);
        }
        Ok(())
    }

    fn row(&self, n: usize) -> Option<TreeRow> {
        let row = self.tree.rows().into_iter().nth(n);
        if row.is_none() {
            println!("no row {}", n);
        }
        row
    }

    fn render(&self) {
        match self.tree.step() {
            Step::Login => println!("Not signed in. Type `login` to sign in to Azure."),
            Step::Loading => println!("Loading subscriptions..."),
            Step::Resources => {
                let rows = self.tree.rows();
                if rows.is_empty() {
                    println!("No subscriptions found");
                }
                for (i, row) in rows.iter().enumerate() {
                    println!("{}", format_row(i, row));
                }
            }
        }
        if let Some(error) = self.tree.error() {
            println!("error: {}", error);
        }
    }
}

fn format_row(index: usize, row: &TreeRow) -> String {
    let indent = "  ".repeat(row.depth);
    let marker = match row.kind {
        RowKind::Subscription { .. } | RowKind::ResourceGroup { .. } if row.expanded => "v ",
        RowKind::Subscription { .. } | RowKind::ResourceGroup { .. } => "> ",
        RowKind::Cluster(_) => "* ",
        RowKind::Empty => "",
    };
    match row.kind {
        RowKind::Empty => format!("     {}{}", indent, row.label),
        _ => format!("{:>3}  {}{}{}", index, indent, marker, row.label),
    }
}

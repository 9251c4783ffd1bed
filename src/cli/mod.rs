pub mod commands;
pub mod utils;

use std::sync::Arc;

use clap::{Parser, Subcommand};
use serde::{Deserialize, Serialize};

use crate::accesscontrol::{OrgRole, SignedInUser};
use crate::context::{RequestContext, RequestId};
use crate::database::DatabaseManager;
use crate::folder::{FolderTreeCache, PgFolderDirectory};
use crate::libraryelements::{LibraryElementService, PgLibraryElementStore};

#[derive(Parser)]
#[command(name = "libel")]
#[command(about = "Library elements - browse and manage reusable panels and variables")]
#[command(version)]
pub struct Cli {
    #[arg(long, global = true, help = "Output in human-readable text format")]
    pub text: bool,

    #[arg(long, global = true, help = "Output in JSON format")]
    pub json: bool,

    #[arg(long, global = true, default_value_t = 1, help = "Organization ID")]
    pub org: i64,

    #[arg(long, global = true, default_value_t = 1, help = "Acting user ID")]
    pub user_id: i64,

    #[arg(long, global = true, default_value = "admin", help = "Acting user UID")]
    pub user: String,

    #[arg(long, global = true, default_value = "viewer", help = "Acting user role (viewer, editor, admin)")]
    pub role: String,

    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Subcommand)]
pub enum Commands {
    #[command(about = "Create the library element tables")]
    Migrate,

    #[command(about = "Folder tree visible to the acting user")]
    Folders {
        #[command(subcommand)]
        cmd: commands::folders::FolderCommands,
    },

    #[command(about = "Search library elements the acting user can read")]
    Search(commands::elements::SearchArgs),

    #[command(about = "Show one library element")]
    Get {
        #[arg(help = "Library element UID")]
        uid: String,
    },

    #[command(about = "Delete a library element without connections")]
    Delete {
        #[arg(help = "Library element UID")]
        uid: String,
    },
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub enum OutputFormat {
    Text,
    Json,
}

impl OutputFormat {
    pub fn from_cli(cli: &Cli) -> Self {
        if cli.json {
            OutputFormat::Json
        } else {
            OutputFormat::Text
        }
    }
}

/// Everything a command needs to act as the user named on the command line
pub struct Session {
    pub ctx: RequestContext,
    pub folders: Arc<FolderTreeCache>,
    pub service: LibraryElementService,
}

impl Session {
    pub async fn connect(cli: &Cli) -> anyhow::Result<Self> {
        let role: OrgRole = cli.role.parse().map_err(|e: String| anyhow::anyhow!(e))?;
        let user = SignedInUser::new(cli.org, cli.user_id, cli.user.clone(), role).with_name(cli.user.clone());

        let pool = DatabaseManager::pool().await?;
        let folders = Arc::new(FolderTreeCache::new(Arc::new(PgFolderDirectory::new(pool.clone()))));
        let store = Arc::new(PgLibraryElementStore::new(pool));
        let service = LibraryElementService::with_scoped_access(store, Arc::clone(&folders));

        let request_id = RequestId::generate();
        tracing::debug!(request_id = %request_id, org_id = cli.org, user = %cli.user, "starting command");
        let ctx = RequestContext::new(user).with_request_id(request_id.as_str());

        Ok(Self { ctx, folders, service })
    }
}

pub async fn run(cli: Cli) -> anyhow::Result<()> {
    let output_format = OutputFormat::from_cli(&cli);

    let result = match &cli.command {
        Commands::Migrate => commands::migrate::handle(output_format).await,
        Commands::Folders { cmd } => {
            let session = Session::connect(&cli).await?;
            commands::folders::handle(cmd, &session, output_format).await
        }
        Commands::Search(args) => {
            let session = Session::connect(&cli).await?;
            commands::elements::search(args, &session, output_format).await
        }
        Commands::Get { uid } => {
            let session = Session::connect(&cli).await?;
            commands::elements::get(uid, &session, output_format).await
        }
        Commands::Delete { uid } => {
            let session = Session::connect(&cli).await?;
            commands::elements::delete(uid, &session, output_format).await
        }
    };

    DatabaseManager::close().await;
    result
}

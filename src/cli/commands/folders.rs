use clap::Subcommand;
use serde_json::json;

use crate::cli::utils::*;
use crate::cli::{OutputFormat, Session};
use crate::folder::{FolderTree, GENERAL_FOLDER_TITLE, GENERAL_FOLDER_UID};

#[derive(Subcommand)]
pub enum FolderCommands {
    #[command(about = "List visible folders")]
    List,

    #[command(about = "Print visible folders as a tree")]
    Tree,
}

pub async fn handle(cmd: &FolderCommands, session: &Session, output_format: OutputFormat) -> anyhow::Result<()> {
    let tree = session.folders.get(&session.ctx, session.ctx.user()).await?;

    match cmd {
        FolderCommands::List => {
            if tree.is_empty() {
                return output_empty(&output_format, "folders", "No visible folders");
            }

            let mut folders: Vec<_> = tree.folders().collect();
            folders.sort_by(|a, b| a.title.to_lowercase().cmp(&b.title.to_lowercase()));

            match output_format {
                OutputFormat::Json => {
                    let folders: Vec<_> = folders
                        .iter()
                        .map(|f| {
                            json!({
                                "uid": f.uid,
                                "title": f.title,
                                "parent_uid": tree.parent(&f.uid),
                            })
                        })
                        .collect();
                    print_json(&json!({ "folders": folders }))?;
                }
                OutputFormat::Text => {
                    println!("{:<25} {:<30} {}", "UID", "TITLE", "PARENT");
                    println!("{}", "-".repeat(70));
                    for folder in folders {
                        println!(
                            "{:<25} {:<30} {}",
                            folder.uid,
                            folder.title,
                            tree.parent(&folder.uid).unwrap_or(GENERAL_FOLDER_UID)
                        );
                    }
                }
            }
        }
        FolderCommands::Tree => match output_format {
            OutputFormat::Json => {
                print_json(&subtree(&tree, GENERAL_FOLDER_UID))?;
            }
            OutputFormat::Text => {
                println!("{}", GENERAL_FOLDER_TITLE);
                print_children(&tree, GENERAL_FOLDER_UID, 1);
            }
        },
    }

    Ok(())
}

fn subtree(tree: &FolderTree, uid: &str) -> serde_json::Value {
    let children: Vec<_> = tree.children(uid).iter().map(|c| subtree(tree, c)).collect();
    json!({
        "uid": uid,
        "title": tree.title(uid),
        "children": children,
    })
}

fn print_children(tree: &FolderTree, uid: &str, depth: usize) {
    for child in tree.children(uid) {
        println!("{}{}  ({})", "  ".repeat(depth), tree.title(child).unwrap_or_default(), child);
        print_children(tree, child, depth + 1);
    }
}

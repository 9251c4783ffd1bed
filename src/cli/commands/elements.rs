use clap::Args;
use serde_json::json;

use crate::cli::utils::*;
use crate::cli::{OutputFormat, Session};
use crate::error::ApiError;
use crate::libraryelements::{ElementKind, LibraryElementDto, SearchLibraryElementsQuery, SortDirection};

#[derive(Args, Debug)]
pub struct SearchArgs {
    #[arg(long, help = "Match against name or description")]
    pub query: Option<String>,

    #[arg(long, help = "Only panels (1) or variables (2)")]
    pub kind: Option<i64>,

    #[arg(long = "type", help = "Comma separated panel types")]
    pub type_filter: Option<String>,

    #[arg(long, help = "Comma separated folder UIDs; 'general' for the General folder")]
    pub folders: Option<String>,

    #[arg(long, help = "Skip the element with this UID")]
    pub exclude: Option<String>,

    #[arg(long, default_value = "alpha-asc", help = "alpha-asc or alpha-desc")]
    pub sort: String,

    #[arg(long, default_value_t = 1)]
    pub page: u32,

    #[arg(long, default_value_t = 0, help = "Page size; 0 uses the configured default")]
    pub per_page: u32,
}

impl SearchArgs {
    fn to_query(&self) -> Result<SearchLibraryElementsQuery, ApiError> {
        let kind = self
            .kind
            .map(ElementKind::try_from)
            .transpose()
            .map_err(ApiError::bad_request)?;
        let sort_direction: SortDirection = self.sort.parse().map_err(ApiError::bad_request)?;

        Ok(SearchLibraryElementsQuery {
            page: self.page,
            per_page: self.per_page,
            search_string: self.query.clone(),
            sort_direction,
            kind,
            type_filter: self.type_filter.clone(),
            exclude_uid: self.exclude.clone(),
            folder_filter_uids: self.folders.clone(),
        })
    }
}

fn kind_label(kind: ElementKind) -> &'static str {
    match kind {
        ElementKind::Panel => "panel",
        ElementKind::Variable => "variable",
    }
}

pub async fn search(args: &SearchArgs, session: &Session, output_format: OutputFormat) -> anyhow::Result<()> {
    let query = match args.to_query() {
        Ok(query) => query,
        Err(e) => return fail(&output_format, e),
    };
    let result = match session.service.get_all(&session.ctx, query).await {
        Ok(result) => result,
        Err(e) => return fail(&output_format, e),
    };

    if result.elements.is_empty() {
        return output_empty(&output_format, "elements", "No library elements found");
    }

    match output_format {
        OutputFormat::Json => {
            print_json(&result)?;
        }
        OutputFormat::Text => {
            println!("{:<25} {:<30} {:<10} {:<15} {}", "UID", "NAME", "KIND", "TYPE", "FOLDER");
            println!("{}", "-".repeat(95));
            for element in &result.elements {
                println!(
                    "{:<25} {:<30} {:<10} {:<15} {}",
                    element.uid,
                    element.name,
                    kind_label(element.kind),
                    element.element_type,
                    element.meta.folder_name
                );
            }
            println!(
                "\nPage {} ({} per page), {} total",
                result.page, result.per_page, result.total_count
            );
        }
    }
    Ok(())
}

pub async fn get(uid: &str, session: &Session, output_format: OutputFormat) -> anyhow::Result<()> {
    let element = match session.service.get(&session.ctx, uid).await {
        Ok(element) => element,
        Err(e) => return fail(&output_format, e),
    };

    match output_format {
        OutputFormat::Json => {
            print_json(&element)?;
        }
        OutputFormat::Text => print_element(&element),
    }
    Ok(())
}

pub async fn delete(uid: &str, session: &Session, output_format: OutputFormat) -> anyhow::Result<()> {
    let id = match session.service.delete(&session.ctx, uid).await {
        Ok(id) => id,
        Err(e) => return fail(&output_format, e),
    };

    output_success(
        &output_format,
        &format!("Library element '{}' deleted successfully", uid),
        Some(json!({ "id": id, "uid": uid })),
    )
}

fn print_element(element: &LibraryElementDto) {
    println!("UID: {}", element.uid);
    println!("Name: {}", element.name);
    println!("Kind: {}", kind_label(element.kind));
    if !element.element_type.is_empty() {
        println!("Type: {}", element.element_type);
    }
    if !element.description.is_empty() {
        println!("Description: {}", element.description);
    }
    println!("Folder: {}", element.meta.folder_name);
    println!("Version: {}", element.version);
    println!("Connected dashboards: {}", element.meta.connected_dashboards);
    println!(
        "Updated: {} by {}",
        element.meta.updated.format("%Y-%m-%d %H:%M"),
        element.meta.updated_by.name
    );
}

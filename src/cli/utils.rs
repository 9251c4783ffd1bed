use serde::Serialize;
use serde_json::{json, Value};

use crate::cli::OutputFormat;
use crate::error::ApiError;

/// Pretty JSON on stdout
pub fn print_json<T: Serialize>(value: &T) -> anyhow::Result<()> {
    println!("{}", serde_json::to_string_pretty(value)?);
    Ok(())
}

/// Confirmation line, or `{"success": true, "message": ..}` merged with `data`
pub fn output_success(output_format: &OutputFormat, message: &str, data: Option<Value>) -> anyhow::Result<()> {
    match output_format {
        OutputFormat::Json => {
            let mut response = json!({ "success": true, "message": message });
            if let (Some(target), Some(Value::Object(extra))) = (response.as_object_mut(), data) {
                target.extend(extra);
            }
            print_json(&response)
        }
        OutputFormat::Text => {
            println!("✓ {}", message);
            Ok(())
        }
    }
}

/// Reports a service failure and turns it into the command's error
pub fn fail(output_format: &OutputFormat, err: impl Into<ApiError>) -> anyhow::Result<()> {
    let err = err.into();
    match output_format {
        OutputFormat::Json => print_json(&err.to_json())?,
        OutputFormat::Text => eprintln!("Error: {} [{}]", err.message(), err.error_code()),
    }
    Err(anyhow::anyhow!("{} ({})", err.message(), err.status_code()))
}

/// `{"<collection>": []}` or a plain notice
pub fn output_empty(output_format: &OutputFormat, collection: &str, message: &str) -> anyhow::Result<()> {
    match output_format {
        OutputFormat::Json => print_json(&json!({ collection: [] })),
        OutputFormat::Text => {
            println!("{}", message);
            Ok(())
        }
    }
}

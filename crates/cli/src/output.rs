use crate::error::CliError;
use serde::Serialize;

fn to_json<T: Serialize>(value: &T) -> Result<String, CliError> {
    serde_json::to_string_pretty(value).map_err(CliError::JsonSerialize)
}

/// Pretty-prints `value` as JSON to `path` when given, stdout otherwise.
pub fn emit<T: Serialize>(value: &T, path: Option<&str>) -> Result<(), CliError> {
    let json = to_json(value)?;
    match path {
        Some(path) => std::fs::write(path, json)?,
        None => println!("{json}"),
    }
    Ok(())
}

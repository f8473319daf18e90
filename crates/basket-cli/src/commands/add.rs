use std::path::Path;

use crate::commands::common::{open_store, resolve_item_name};
use crate::error::CliError;

pub async fn run_add(name_parts: &[String], db_path: &Path) -> Result<(), CliError> {
    let name = resolve_item_name(name_parts)?;

    let store = open_store(db_path).await?;
    let item = store.create_item(&name).await?;

    println!("{}", item.id);
    Ok(())
}

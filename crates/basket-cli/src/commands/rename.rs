use std::path::Path;

use crate::commands::common::{
    normalize_item_identifier, open_store, resolve_item, resolve_item_name,
};
use crate::error::CliError;

pub async fn run_rename(id: &str, name_parts: &[String], db_path: &Path) -> Result<(), CliError> {
    let normalized_id = normalize_item_identifier(id)?;
    let name = resolve_item_name(name_parts)?;
    let store = open_store(db_path).await?;
    let item = resolve_item(&normalized_id, &store).await?;

    let renamed = store.rename_item(&item.id, &name).await?;
    println!("{}", renamed.id);
    Ok(())
}

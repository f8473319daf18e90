use std::path::Path;

use crate::commands::common::{normalize_item_identifier, open_store, resolve_item};
use crate::error::CliError;

pub async fn run_delete(id: &str, db_path: &Path) -> Result<(), CliError> {
    let normalized_id = normalize_item_identifier(id)?;
    let store = open_store(db_path).await?;
    let item = resolve_item(&normalized_id, &store).await?;

    store.remove_item(&item.id).await?;
    println!("{}", item.id);
    Ok(())
}

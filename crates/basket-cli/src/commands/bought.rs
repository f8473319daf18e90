use std::path::Path;

use crate::commands::common::{normalize_item_identifier, open_store, resolve_item};
use crate::error::CliError;

pub async fn run_bought(id: &str, bought: bool, db_path: &Path) -> Result<(), CliError> {
    let normalized_id = normalize_item_identifier(id)?;
    let store = open_store(db_path).await?;
    let item = resolve_item(&normalized_id, &store).await?;

    if item.is_bought() == bought {
        println!("{}", item.id);
        return Ok(());
    }

    let updated = store.set_item_bought(&item.id, bought).await?;
    println!("{}", updated.id);
    Ok(())
}

use std::path::Path;

use crate::commands::common::{format_item_lines, item_to_list_item, open_store, ItemListItem};
use crate::error::CliError;

pub async fn run_list(include_deleted: bool, as_json: bool, db_path: &Path) -> Result<(), CliError> {
    let store = open_store(db_path).await?;
    let items = store.list_items(include_deleted).await?;

    if as_json {
        let json_items = items
            .iter()
            .map(item_to_list_item)
            .collect::<Vec<ItemListItem>>();
        println!("{}", serde_json::to_string_pretty(&json_items)?);
    } else if items.is_empty() {
        println!("The list is empty.");
    } else {
        for line in format_item_lines(&items) {
            println!("{line}");
        }
    }

    Ok(())
}

use anyhow::Result;
use comfy_table::{ContentArrangement, Table, presets::UTF8_FULL};
use ledgerlab_deploy::DeploymentStore;

use super::session::Paths;

pub fn run(paths: &Paths, network: &str) -> Result<()> {
    paths.registry()?.network(network)?;
    let store = paths.store(network)?;

    if store.records().next().is_none() {
        tracing::info!(network, "No deployments recorded");
        return Ok(());
    }
    println!("{}", records_table(&store));
    Ok(())
}

fn records_table(store: &DeploymentStore) -> Table {
    let mut table = Table::new();
    table
        .load_preset(UTF8_FULL)
        .set_content_arrangement(ContentArrangement::Dynamic)
        .set_header(vec!["Contract", "Address", "Block", "Deployed at", "Arguments"]);

    for record in store.records() {
        let args = record
            .args
            .iter()
            .map(|arg| match arg {
                serde_json::Value::String(s) => s.clone(),
                other => other.to_string(),
            })
            .collect::<Vec<_>>()
            .join(", ");
        table.add_row(vec![
            record.name.clone(),
            record.address.to_string(),
            record.block_number.to_string(),
            record.deployed_at.format("%Y-%m-%d %H:%M:%S").to_string(),
            args,
        ]);
    }
    table
}

use std::path::Path;

use anyhow::Result;
use comfy_table::{ContentArrangement, Table, presets::UTF8_FULL};
use ledgerlab_deploy::NetworkRegistry;

use super::session::Paths;

pub fn run(paths: &Paths, write: Option<&Path>) -> Result<()> {
    let registry = paths.registry()?;

    let mut table = Table::new();
    table
        .load_preset(UTF8_FULL)
        .set_content_arrangement(ContentArrangement::Dynamic)
        .set_header(vec!["Network", "Chain id", "Confirmations", "Ephemeral", "RPC"]);

    for (name, network) in &registry.networks {
        let rpc = match (&network.url, &network.url_env) {
            (Some(url), _) => url.clone(),
            (None, Some(var)) => format!("${}", var),
            (None, None) => "in-process".to_string(),
        };
        table.add_row(vec![
            name.clone(),
            network.chain_id.to_string(),
            network.block_confirmations.to_string(),
            NetworkRegistry::is_ephemeral(name).to_string(),
            rpc,
        ]);
    }
    println!("{}", table);

    if let Some(path) = write {
        registry.save_to_file(path)?;
    }
    Ok(())
}

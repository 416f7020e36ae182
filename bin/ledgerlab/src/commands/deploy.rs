use std::path::PathBuf;

use anyhow::Result;
use comfy_table::{ContentArrangement, Table, presets::UTF8_FULL};
use ledgerlab_deploy::deployer::save_report;
use ledgerlab_deploy::{ArtifactStore, DeployEnv, DeployTag, DeploymentReport, Orchestrator};

use super::session::{Paths, Session, explorer_verifier};
use crate::cli::SignerArgs;

pub async fn run(
    paths: &Paths,
    network: &str,
    signer: &SignerArgs,
    tags: &[DeployTag],
    force: bool,
    etherscan_api_key: Option<String>,
    report_path: Option<PathBuf>,
) -> Result<()> {
    let session = Session::open(paths, network, signer).await?;
    let store = paths.store(network)?;

    let verifier = explorer_verifier(etherscan_api_key)?;

    let env = DeployEnv::new(
        session.ledger,
        session.registry,
        network,
        ArtifactStore::new(&paths.artifacts),
        store,
    )?
    .with_verifier(verifier)
    .with_force(force);

    let report = Orchestrator::standard().run_to_report(env, tags).await?;

    println!("{}", report_table(&report));
    if let Some(path) = report_path {
        save_report(&report, &path)?;
    }
    Ok(())
}

fn report_table(report: &DeploymentReport) -> Table {
    let mut table = Table::new();
    table
        .load_preset(UTF8_FULL)
        .set_content_arrangement(ContentArrangement::Dynamic)
        .set_header(vec!["Contract", "Address", "Block", "Reused", "Verification"]);

    for contract in &report.contracts {
        table.add_row(vec![
            contract.record.name.clone(),
            contract.record.address.to_string(),
            contract.record.block_number.to_string(),
            if contract.reused { "yes" } else { "no" }.to_string(),
            contract.verification.to_string(),
        ]);
    }
    table
}

use std::path::PathBuf;

use anyhow::Result;
use ledgerlab_deploy::{KeyProvisioner, ProvisionOutcome, TerminalPrompt};

pub fn run(output: PathBuf, max_attempts: usize) -> Result<()> {
    let provisioner = KeyProvisioner::new(output).with_max_attempts(max_attempts);

    match provisioner.provision(&mut TerminalPrompt)? {
        ProvisionOutcome::Written { path, address } => {
            tracing::info!(path = %path.display(), address = %address, "Credential ready");
            Ok(())
        }
        ProvisionOutcome::GaveUp { attempts } => {
            anyhow::bail!("Passwords did not match after {} attempts", attempts)
        }
    }
}

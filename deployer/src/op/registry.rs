use super::Session;
use crate::error::DeployError;
use anyhow::Result;
use deployer_tracing::{println_action_green, println_warning};

pub fn resolve(session: &Session, name: &str) -> Result<()> {
    let address = session.registry().resolve(session.network(), name)?;
    println!("{address}");
    Ok(())
}

pub fn list(session: &Session) -> Result<()> {
    let records = session.registry().list(session.network())?;
    if records.is_empty() {
        println_warning(&format!(
            "no contracts recorded on network `{}`",
            session.network()
        ));
    }
    for record in records {
        println_action_green(
            &record.name,
            &format!(
                "{} (revision {}, deployed {})",
                record.address,
                record.revision,
                record.metadata.deployed_at.to_rfc3339()
            ),
        );
    }
    Ok(())
}

pub fn history(session: &Session, name: &str) -> Result<()> {
    let network = session.network();
    let record = session
        .registry()
        .get(network, name)?
        .ok_or_else(|| DeployError::UnknownContract {
            network: network.to_string(),
            name: name.to_string(),
        })?;
    println_action_green(
        "Active",
        &format!("{} tx {}", record.address, record.metadata.transaction_hash),
    );
    for superseded in record.history.iter().rev() {
        println_action_green(
            "Superseded",
            &format!(
                "{} tx {} on {}",
                superseded.address,
                superseded.metadata.transaction_hash,
                superseded.superseded_at.to_rfc3339()
            ),
        );
    }
    Ok(())
}

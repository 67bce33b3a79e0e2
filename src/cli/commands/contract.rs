//! Research contract command handlers

use crate::config::Config;
use crate::db::Store;

pub async fn cmd_contract_list(config: &Config) -> anyhow::Result<()> {
    let store = Store::new(&config.general.database_path).await?;
    let pending = store.list_pending_research_contracts().await?;

    if pending.is_empty() {
        println!("No pending research requests.");
        return Ok(());
    }

    let base = config.base_url();
    println!("Pending research requests ({} total)", pending.len());
    println!("{:-<70}", "");
    for contract in pending {
        println!("{} <{}> - {}", contract.name, contract.email, contract.institution);
        println!("  {base}/user/research/approve/{}/", contract.id);
    }
    Ok(())
}

pub async fn cmd_contract_reset(config: &Config, id: i32) -> anyhow::Result<()> {
    let store = Store::new(&config.general.database_path).await?;
    if store.reset_research_contract(id).await? {
        println!("Contract {id} is pending again");
    } else {
        anyhow::bail!("Contract {id} not found");
    }
    Ok(())
}

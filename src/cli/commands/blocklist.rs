//! Email domain blocklist command handlers

use crate::config::Config;
use crate::db::Store;

pub async fn cmd_blocklist_add(config: &Config, domain: &str) -> anyhow::Result<()> {
    let store = Store::new(&config.general.database_path).await?;
    if store.block_domain(domain).await? {
        println!("Blocked {}", domain.trim().to_lowercase());
    } else {
        println!("{} is already blocked", domain.trim().to_lowercase());
    }
    Ok(())
}

pub async fn cmd_blocklist_remove(config: &Config, domain: &str) -> anyhow::Result<()> {
    let store = Store::new(&config.general.database_path).await?;
    if store.unblock_domain(domain).await? {
        println!("Unblocked {}", domain.trim().to_lowercase());
    } else {
        println!("{} was not blocked", domain.trim().to_lowercase());
    }
    Ok(())
}

pub async fn cmd_blocklist_list(config: &Config) -> anyhow::Result<()> {
    let store = Store::new(&config.general.database_path).await?;
    let domains = store.list_blocked_domains().await?;

    if domains.is_empty() {
        println!("No blocked domains.");
        return Ok(());
    }

    println!("Blocked domains ({} total)", domains.len());
    println!("{:-<40}", "");
    for domain in domains {
        println!("{domain}");
    }
    Ok(())
}

//! Bulk export command handlers

use chrono::Utc;
use std::path::Path;

use crate::cli::ExportAddArgs;
use crate::config::Config;
use crate::db::{NewCaseExport, Store};

pub async fn cmd_export_add(config: &Config, args: ExportAddArgs) -> anyhow::Result<()> {
    let store = Store::new(&config.general.database_path).await?;

    let full_path = Path::new(&config.bulk.exports_root).join(&args.file);
    if !full_path.is_file() {
        anyhow::bail!("{} does not exist", full_path.display());
    }

    let owner_id = match &args.owner {
        Some(email) => match store.get_user_by_email(email).await? {
            Some(user) => Some(user.id),
            None => anyhow::bail!("No user with email {email}"),
        },
        None => None,
    };

    let file_name = args.name.clone().unwrap_or_else(|| {
        Path::new(&args.file)
            .file_name()
            .map_or_else(|| args.file.clone(), |n| n.to_string_lossy().into_owned())
    });

    let export = store
        .add_case_export(NewCaseExport {
            file_name,
            file_path: args.file,
            export_date: Utc::now().date_naive(),
            body_format: args.body_format,
            filter_type: args.filter_type,
            filter_slug: args.filter_slug,
            public: !args.private,
            owner_id,
        })
        .await?;

    println!(
        "Registered export {} (ID: {}, {})",
        export.file_name,
        export.id,
        if export.public { "public" } else { "private" }
    );
    Ok(())
}

pub async fn cmd_export_list(config: &Config) -> anyhow::Result<()> {
    let store = Store::new(&config.general.database_path).await?;
    let exports = store.list_case_exports().await?;

    if exports.is_empty() {
        println!("No exports registered.");
        return Ok(());
    }

    println!("Exports ({} total)", exports.len());
    println!("{:-<70}", "");
    for export in exports {
        println!(
            "{:>4}  {:<8} {:<12} {:<20} {}{}",
            export.id,
            export.body_format,
            export.filter_type,
            export.filter_slug,
            export.file_path,
            if export.public { "" } else { "  [private]" }
        );
    }
    Ok(())
}

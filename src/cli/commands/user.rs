//! User account command handlers

use anyhow::Context;
use chrono::{Duration, Utc};

use crate::config::Config;
use crate::db::repositories::user::{generate_token, hash_password_blocking};
use crate::db::{NewUser, Store};
use crate::domain::email::{is_valid_email, normalize_email};

pub async fn cmd_user_create(
    config: &Config,
    email: &str,
    password: &str,
    approver: bool,
    verified: bool,
) -> anyhow::Result<()> {
    let email = email.trim().to_lowercase();
    if !is_valid_email(&email) {
        anyhow::bail!("'{email}' is not a valid email address");
    }

    let store = Store::new(&config.general.database_path).await?;
    let normalized = normalize_email(&email);
    if store.normalized_email_exists(&normalized).await? {
        anyhow::bail!("A user with the same email address has already registered");
    }

    let password_hash = hash_password_blocking(password, &config.security).await?;
    let user = store
        .create_user(
            NewUser {
                email: email.clone(),
                normalized_email: normalized,
                first_name: String::new(),
                last_name: String::new(),
                agreed_to_tos: true,
                activation_nonce: Some(generate_token()),
                nonce_expires: Some(
                    Utc::now() + Duration::hours(config.accounts.verification_nonce_hours),
                ),
            },
            password_hash,
        )
        .await
        .context("Failed to create user")?;

    if verified {
        store
            .mark_user_verified(user.id, config.accounts.daily_case_allowance)
            .await?;
        store.ensure_api_key(user.id).await?;
    }
    if approver {
        store.set_contract_approver(user.id, true).await?;
    }

    println!("Created user {} (ID: {})", email, user.id);
    if verified {
        println!("  verified, daily allowance {}", config.accounts.daily_case_allowance);
    }
    if approver {
        println!("  contract approver");
    }
    Ok(())
}

pub async fn cmd_user_approver(config: &Config, email: &str, grant: bool) -> anyhow::Result<()> {
    let store = Store::new(&config.general.database_path).await?;
    let Some(user) = store.get_user_by_email(email).await? else {
        anyhow::bail!("No user with email {email}");
    };

    store.set_contract_approver(user.id, grant).await?;
    if grant {
        println!("{} can now approve research requests", user.email);
    } else {
        println!("{} is no longer a contract approver", user.email);
    }
    Ok(())
}

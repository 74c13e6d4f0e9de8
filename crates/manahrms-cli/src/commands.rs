//! Command handlers.
//!
//! Each handler prints its result as JSON and returns whether it succeeded.

use std::io::{self, BufRead, Write};
use std::path::Path;

use anyhow::{Context, Result};
use manahrms_core::{AppContext, AvatarFile, Config, OperationResult, Profile, UserRecord};
use serde::Serialize;
use serde_json::{Map, Value};
use tracing::warn;

/// Parse one `key=value` profile field. Values that parse as JSON keep their
/// type; anything else is a string.
pub fn parse_field(raw: &str) -> Result<(String, Value), String> {
    let (key, value) = raw
        .split_once('=')
        .ok_or_else(|| format!("expected key=value, got `{}`", raw))?;
    if key.is_empty() {
        return Err(format!("missing field name in `{}`", raw));
    }
    let value = serde_json::from_str(value).unwrap_or_else(|_| Value::String(value.to_string()));
    Ok((key.to_string(), value))
}

fn emit<T: Serialize>(result: OperationResult<T>) -> Result<bool> {
    println!("{}", serde_json::to_string_pretty(&result)?);
    Ok(result.success)
}

fn prompt(label: &str) -> Result<String> {
    print!("{}", label);
    io::stdout().flush()?;
    let mut line = String::new();
    io::stdin().lock().read_line(&mut line)?;
    Ok(line.trim().to_string())
}

fn prompt_password(label: &str) -> Result<String> {
    rpassword::prompt_password(label).context("Failed to read password")
}

pub async fn status(context: &AppContext) -> Result<bool> {
    emit(OperationResult::ok(context.session.snapshot().await))
}

pub async fn login(
    context: &AppContext,
    config: &mut Config,
    email: Option<String>,
    password: Option<String>,
) -> Result<bool> {
    let email = match email.or_else(|| config.last_email.clone()) {
        Some(email) => email,
        None => prompt("Email: ")?,
    };
    let password = match password {
        Some(password) => password,
        None => prompt_password("Password: ")?,
    };

    let result = context.session.login(&email, &password).await;
    if result.is_ok() {
        config.last_email = Some(email);
        if let Err(e) = config.save() {
            warn!(error = %e, "Failed to save config");
        }
    }
    emit(result.into())
}

pub async fn logout(context: &AppContext) -> Result<bool> {
    let snapshot = context.session.logout().await;
    context.profile.reset().await;
    emit(OperationResult::ok(snapshot))
}

pub async fn show_profile(context: &AppContext) -> Result<bool> {
    emit(context.profile.fetch_profile().await.into())
}

pub async fn set_profile(context: &AppContext, fields: Vec<(String, Value)>) -> Result<bool> {
    let fields: Map<String, Value> = fields.into_iter().collect();

    let result = context.profile.update_profile(Profile::new(fields.clone())).await;
    if result.is_ok() {
        // Keep the session's user record in step with the accepted change
        if let Err(e) = context.session.update_user(UserRecord::new(fields)).await {
            warn!(error = %e, "Failed to update session user");
        }
    }
    emit(result.into())
}

pub async fn upload_avatar(context: &AppContext, path: &Path) -> Result<bool> {
    let file = AvatarFile::from_path(path)
        .await
        .with_context(|| format!("Failed to read {}", path.display()))?;
    emit(context.profile.upload_avatar(file).await.into())
}

pub async fn change_password(context: &AppContext) -> Result<bool> {
    let old = prompt_password("Current password: ")?;
    let new = prompt_password("New password: ")?;
    let confirm = prompt_password("Confirm new password: ")?;
    if new != confirm {
        return emit(OperationResult::<()>::failed("Passwords do not match"));
    }
    emit(context.profile.change_password(&old, &new).await.into())
}

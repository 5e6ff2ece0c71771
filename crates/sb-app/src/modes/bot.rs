//! Bot mode: a one-shot admin settings read/write, driven by a single
//! subcommand invocation rather than a long-running loop. A full
//! Telegram-bot-command surface (inline keyboards, chat routing) is a
//! separate front end out of scope for this binary; this mode exposes the
//! same underlying [`SettingsRepository`] operation it would call.

use std::sync::Arc;

use signalbrief_repository::SettingsRepository;
use tracing::info;

use crate::error::AppError;

pub async fn get(settings: Arc<dyn SettingsRepository>, key: String) -> Result<(), AppError> {
    match settings.get_setting(&key).await? {
        Some(setting) => println!("{}", serde_json::to_string_pretty(&setting)?),
        None => info!(key, "no setting recorded"),
    }
    Ok(())
}

pub async fn set(
    settings: Arc<dyn SettingsRepository>,
    key: String,
    value: String,
    user_id: String,
) -> Result<(), AppError> {
    let parsed: serde_json::Value = serde_json::from_str(&value)?;
    settings.save_setting_with_history(&key, parsed, &user_id).await?;
    info!(key, user_id, "setting updated");
    Ok(())
}

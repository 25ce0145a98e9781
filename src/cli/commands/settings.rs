use crate::config::Config;
use crate::db::{Store, SystemSettings};

pub async fn cmd_settings_show(config: &Config) -> anyhow::Result<()> {
    let store = Store::new(&config.general.database_path).await?;
    let row = store.get_system_settings().await?;

    println!("Loyalty settings:");
    println!("{:-<70}", "");

    match row {
        Some(settings) => {
            println!("Source: database");
            print_settings(&settings);
        }
        None => {
            println!("Source: config file (no database row)");
            println!("Stamps for reward:       {}", config.loyalty.stamps_for_reward);
            println!(
                "Code expiration (min):   {}",
                config.loyalty.code_expiration_minutes
            );
            println!(
                "Reward expiration (days): {}",
                config.loyalty.reward_expiration_days
            );
        }
    }

    println!("Reward policy:           {:?}", config.loyalty.reward_policy);
    Ok(())
}

pub async fn cmd_settings_set(
    config: &Config,
    stamps_for_reward: Option<i32>,
    code_expiration_minutes: Option<i32>,
    reward_expiration_days: Option<i32>,
    maintenance: Option<bool>,
) -> anyhow::Result<()> {
    for (label, value) in [
        ("stamps-for-reward", stamps_for_reward),
        ("code-expiration-minutes", code_expiration_minutes),
        ("reward-expiration-days", reward_expiration_days),
    ] {
        if value.is_some_and(|v| v <= 0) {
            anyhow::bail!("--{label} must be > 0");
        }
    }

    let store = Store::new(&config.general.database_path).await?;

    let current = store.get_system_settings().await?.unwrap_or(SystemSettings {
        stamps_for_reward: i32::try_from(config.loyalty.stamps_for_reward)?,
        code_expiration_minutes: i32::try_from(config.loyalty.code_expiration_minutes)?,
        reward_expiration_days: i32::try_from(config.loyalty.reward_expiration_days)?,
        is_maintenance_mode: false,
    });

    let updated = SystemSettings {
        stamps_for_reward: stamps_for_reward.unwrap_or(current.stamps_for_reward),
        code_expiration_minutes: code_expiration_minutes
            .unwrap_or(current.code_expiration_minutes),
        reward_expiration_days: reward_expiration_days.unwrap_or(current.reward_expiration_days),
        is_maintenance_mode: maintenance.unwrap_or(current.is_maintenance_mode),
    };

    store.save_system_settings(updated, chrono::Utc::now()).await?;

    println!("✓ Settings saved");
    print_settings(&updated);
    Ok(())
}

fn print_settings(settings: &SystemSettings) {
    println!("Stamps for reward:       {}", settings.stamps_for_reward);
    println!("Code expiration (min):   {}", settings.code_expiration_minutes);
    println!("Reward expiration (days): {}", settings.reward_expiration_days);
    println!("Maintenance mode:        {}", settings.is_maintenance_mode);
}

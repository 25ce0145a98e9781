use crate::config::Config;
use crate::domain::UserRole;
use crate::services::Registration;
use crate::state::SharedState;

pub async fn cmd_user_add(
    config: Config,
    phone: String,
    password: String,
    name: String,
    role: UserRole,
) -> anyhow::Result<()> {
    let state = SharedState::new(config).await?;

    let result = state
        .auth
        .create_user(
            Registration {
                phone,
                password,
                name,
            },
            role,
        )
        .await?;

    println!("Created {} account", result.user.role);
    println!("{:-<70}", "");
    println!("ID:      {}", result.user.id);
    println!("Phone:   {}", result.user.phone);
    println!("API key: {}", result.token);

    Ok(())
}

pub async fn cmd_user_reset(
    config: Config,
    phone: String,
    password: Option<String>,
) -> anyhow::Result<()> {
    let state = SharedState::new(config).await?;
    let password_changed = password.is_some();

    let result = state.auth.reset_credentials(&phone, password).await?;

    println!("Reset credentials for {}", result.user.phone);
    println!("{:-<70}", "");
    println!("API key: {}", result.token);
    if password_changed {
        println!("Password updated");
    }

    Ok(())
}

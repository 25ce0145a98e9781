mod settings;
mod user;

pub use settings::{cmd_settings_set, cmd_settings_show};
pub use user::{cmd_user_add, cmd_user_reset};

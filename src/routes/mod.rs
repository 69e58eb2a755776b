mod auth;
mod health_check;

pub use auth::{get_user_info, get_user_sessions, login, register, remove_session, update_tokens};
pub use health_check::health_check;

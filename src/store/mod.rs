/// Storage module
///
/// Persistence contracts consumed by the auth engine, with Postgres (users),
/// Redis (sessions) and in-memory implementations.

mod memory;
mod sessions;
mod users;

pub use memory::InMemorySessionStore;
pub use memory::InMemoryUserStore;
pub use sessions::RedisSessionStore;
pub use sessions::Session;
pub use sessions::SessionInfo;
pub use sessions::SessionStore;
pub use sessions::SESSION_NOT_FOUND;
pub use users::NewUser;
pub use users::PgUserStore;
pub use users::User;
pub use users::UserStore;

pub mod bounded;
pub mod memory;
pub mod redis;

pub use bounded::BoundedSessionStore;
pub use memory::InMemorySessionStore;
pub use self::redis::RedisSessionStore;

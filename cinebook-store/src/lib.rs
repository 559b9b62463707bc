pub mod app_config;
pub mod database;
pub mod memory;
pub mod redis_repo;
pub mod seat_repo;

pub use database::DbClient;
pub use memory::MemorySeatRepository;
pub use redis_repo::RedisClient;
pub use seat_repo::PostgresSeatRepository;

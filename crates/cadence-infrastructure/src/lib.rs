pub mod config_service;
pub mod dto;
pub mod event_bus;
pub mod memory_session_repository;
pub mod paths;
pub mod storage;
pub mod toml_session_repository;

pub use crate::config_service::ConfigService;
pub use crate::event_bus::BroadcastSessionEventBus;
pub use crate::memory_session_repository::InMemorySessionRepository;
pub use crate::paths::CadencePaths;
pub use crate::toml_session_repository::TomlSessionRepository;

// Application layer - Store facade and use-case services
pub mod alarm_service;
pub mod broadcast_service;
pub mod channel_service;
pub mod log_service;
pub mod store;

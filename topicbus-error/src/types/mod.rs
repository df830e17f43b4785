pub mod config;
pub mod pubsub;

// Публичный экспорт всех типов ошибок, чтобы упростить доступ к ним из
// внешнего кода.
pub use config::*;
pub use pubsub::*;

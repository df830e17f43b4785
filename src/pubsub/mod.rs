//! Подсистема Publish–Subscribe (pub/sub).
//!
//! Внутрипроцессная шина сообщений по топикам. Все изменения состояния
//! выполняет одна задача-сериализатор; вызывающие стороны только отправляют
//! ей команды и читают собственные очереди доставки:
//!
//! - `engine`: дескриптор движка, публичные операции и цикл сериализатора.
//! - `command` (приватный): команды сериализатору.
//! - `registry` (приватный): топик → очереди, разовые подписки.
//! - `dispatch` (приватный): рассылка с дедупликацией и обратным давлением.
//! - `inbox` (приватный): входящие команды и отложенные на время ожидания.
//! - `queue`: очередь доставки подписчика.
//! - `stats`: счётчики движка.

mod command;
mod dispatch;
pub mod engine;
mod inbox;
pub mod queue;
mod registry;
pub mod stats;

pub(crate) use command::{collect_topics, Command, DispatchMode, SubscriptionKind};
pub use command::Topic;
pub use engine::Engine;
pub use queue::{DeliveryQueue, QueueId};
pub use registry::RegistrySnapshot;
pub use stats::{EngineStats, StatsSnapshot};

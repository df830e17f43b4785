use std::sync::Arc;

use tokio::sync::{mpsc, oneshot};

use super::{QueueId, RegistrySnapshot};

/// Имя топика.
///
/// Топик не создаётся явно: он существует, пока на него подписана хотя бы
/// одна очередь.
pub type Topic = Arc<str>;

/// Вид подписки, создающей очередь.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum SubscriptionKind {
    /// Получать все сообщения до отписки.
    Every,
    /// Закрыться после первой доставки, через какой бы топик она ни пришла.
    Once,
    /// Одна доставка на каждый топик; закрыться, когда топиков не осталось.
    OnceEach,
}

/// Как вставлять сообщение в заполненную очередь.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum DispatchMode {
    /// Ждать освободившегося места (обратное давление на весь движок).
    Blocking,
    /// Пропустить очередь для этого сообщения.
    NonBlocking,
}

/// Команда сериализатору.
///
/// Все публичные операции движка превращаются в команды и
/// обрабатываются строго по одной, в порядке поступления.
pub(crate) enum Command<T> {
    Subscribe {
        id: QueueId,
        sender: mpsc::Sender<T>,
        topics: Vec<Topic>,
        kind: SubscriptionKind,
    },
    AddSubscription {
        id: QueueId,
        topics: Vec<Topic>,
        once_each: bool,
    },
    Unsubscribe {
        id: QueueId,
        topics: Vec<Topic>,
    },
    UnsubscribeAll {
        id: QueueId,
    },
    Publish {
        message: T,
        topics: Vec<Topic>,
        mode: DispatchMode,
    },
    CloseTopics {
        topics: Vec<Topic>,
    },
    Snapshot {
        reply: oneshot::Sender<RegistrySnapshot>,
    },
    Shutdown,
}

impl<T> Command<T> {
    /// Короткое имя команды для логов.
    pub(crate) fn name(&self) -> &'static str {
        match self {
            Self::Subscribe {
                kind: SubscriptionKind::Every,
                ..
            } => "subscribe",
            Self::Subscribe {
                kind: SubscriptionKind::Once,
                ..
            } => "subscribe_once",
            Self::Subscribe {
                kind: SubscriptionKind::OnceEach,
                ..
            } => "subscribe_once_each",
            Self::AddSubscription { .. } => "add_subscription",
            Self::Unsubscribe { .. } => "unsubscribe",
            Self::UnsubscribeAll { .. } => "unsubscribe_all",
            Self::Publish {
                mode: DispatchMode::Blocking,
                ..
            } => "publish",
            Self::Publish {
                mode: DispatchMode::NonBlocking,
                ..
            } => "try_publish",
            Self::CloseTopics { .. } => "close",
            Self::Snapshot { .. } => "snapshot",
            Self::Shutdown => "shutdown",
        }
    }
}

/// Собирает имена топиков из произвольного итератора.
pub(crate) fn collect_topics<I, S>(topics: I) -> Vec<Topic>
where
    I: IntoIterator<Item = S>,
    S: Into<Topic>,
{
    topics.into_iter().map(Into::into).collect()
}

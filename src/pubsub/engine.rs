use std::sync::Arc;

use tokio::{
    runtime::Handle,
    sync::{mpsc, oneshot},
};
use topicbus_error::EngineError;
use tracing::{debug, info};

use super::{
    collect_topics, dispatch::dispatch, inbox::Inbox, registry::Registry, Command, DeliveryQueue,
    DispatchMode, EngineStats, QueueId, RegistrySnapshot, StatsSnapshot, SubscriptionKind,
    Topic,
};
use crate::config::EngineConfig;

/// Движок Pub/Sub.
///
/// Лёгкий клонируемый дескриптор: все клоны отправляют команды одному
/// сериализатору. Сериализатор — единственная фоновая задача движка и
/// единственный владелец реестра подписок.
///
/// Все операции, кроме [`Engine::snapshot`] и [`Engine::stopped`],
/// синхронны: команда ставится в очередь и метод сразу возвращается.
/// Эффект (доставка) наблюдается через очереди доставки. Команды,
/// отправленные после остановки, молча отбрасываются.
pub struct Engine<T> {
    commands: mpsc::UnboundedSender<Command<T>>,
    capacity: usize,
    stats: Arc<EngineStats>,
}

////////////////////////////////////////////////////////////////////////////////
// Собственные методы
////////////////////////////////////////////////////////////////////////////////

impl<T> Engine<T>
where
    T: Clone + Send + 'static,
{
    /// Создаёт движок с заданной ёмкостью очередей доставки и запускает
    /// сериализатор в текущем рантайме Tokio.
    pub fn new(capacity: usize) -> Result<Self, EngineError> {
        Self::with_config(&EngineConfig::new(capacity))
    }

    /// Создаёт движок из конфигурации.
    pub fn with_config(config: &EngineConfig) -> Result<Self, EngineError> {
        config.validate()?;
        let runtime = Handle::try_current().map_err(|e| EngineError::NoRuntime {
            reason: e.to_string(),
        })?;

        let (commands, inbox) = mpsc::unbounded_channel();
        let stats = Arc::new(EngineStats::default());
        runtime.spawn(serve(inbox, stats.clone()));

        info!(capacity = config.capacity, "pub/sub engine started");
        Ok(Self {
            commands,
            capacity: config.capacity,
            stats,
        })
    }

    /// Создаёт движок из конфигурации окружения (`TOPICBUS_*`).
    pub fn from_env() -> Result<Self, EngineError> {
        let config = EngineConfig::load()?;
        Self::with_config(&config)
    }

    /// Создаёт новую очередь и подписывает её на `topics`.
    pub fn subscribe<I, S>(
        &self,
        topics: I,
    ) -> DeliveryQueue<T>
    where
        I: IntoIterator<Item = S>,
        S: Into<Topic>,
    {
        self.open(topics, SubscriptionKind::Every)
    }

    /// Как [`Engine::subscribe`], но очередь закрывается сразу после первого
    /// доставленного сообщения.
    pub fn subscribe_once<I, S>(
        &self,
        topics: I,
    ) -> DeliveryQueue<T>
    where
        I: IntoIterator<Item = S>,
        S: Into<Topic>,
    {
        self.open(topics, SubscriptionKind::Once)
    }

    /// Подписка, разовая для каждого топика: получив сообщение через
    /// топик, очередь отписывается от него. Очередь закрывается, когда
    /// топиков не осталось.
    pub fn subscribe_once_each<I, S>(
        &self,
        topics: I,
    ) -> DeliveryQueue<T>
    where
        I: IntoIterator<Item = S>,
        S: Into<Topic>,
    {
        self.open(topics, SubscriptionKind::OnceEach)
    }

    /// Подписывает выданную ранее очередь на дополнительные топики.
    pub fn add_subscription<I, S>(
        &self,
        queue: &DeliveryQueue<T>,
        topics: I,
    ) where
        I: IntoIterator<Item = S>,
        S: Into<Topic>,
    {
        self.submit(Command::AddSubscription {
            id: queue.id(),
            topics: collect_topics(topics),
            once_each: false,
        });
    }

    /// Как [`Engine::add_subscription`], но каждая новая подписка разовая.
    pub fn add_subscription_once_each<I, S>(
        &self,
        queue: &DeliveryQueue<T>,
        topics: I,
    ) where
        I: IntoIterator<Item = S>,
        S: Into<Topic>,
    {
        self.submit(Command::AddSubscription {
            id: queue.id(),
            topics: collect_topics(topics),
            once_each: true,
        });
    }

    /// Отписывает очередь от `topics`.
    ///
    /// Пустой список означает «от всех топиков» и закрывает очередь.
    /// Очередь, потерявшая последний топик, тоже закрывается.
    pub fn unsubscribe<I, S>(
        &self,
        queue: &DeliveryQueue<T>,
        topics: I,
    ) where
        I: IntoIterator<Item = S>,
        S: Into<Topic>,
    {
        let topics = collect_topics(topics);
        if topics.is_empty() {
            return self.unsubscribe_all(queue);
        }
        self.submit(Command::Unsubscribe {
            id: queue.id(),
            topics,
        });
    }

    /// Отписывает очередь от всех топиков и закрывает её.
    pub fn unsubscribe_all(
        &self,
        queue: &DeliveryQueue<T>,
    ) {
        self.submit(Command::UnsubscribeAll { id: queue.id() });
    }

    /// Закрывает топики: все их подписчики теряют эти топики, очереди без
    /// оставшихся топиков закрываются.
    pub fn close<I, S>(
        &self,
        topics: I,
    ) where
        I: IntoIterator<Item = S>,
        S: Into<Topic>,
    {
        self.submit(Command::CloseTopics {
            topics: collect_topics(topics),
        });
    }

    /// Публикует сообщение во все очереди, подписанные на `topics`.
    ///
    /// Каждая очередь получает сообщение один раз, даже если подписана на
    /// несколько из перечисленных топиков. Заполненная очередь блокирует
    /// сериализатор, пока подписчик не освободит место или пока следом не
    /// придёт команда, закрывающая эту очередь (тогда сообщение для неё
    /// отбрасывается).
    pub fn publish<I, S>(
        &self,
        message: T,
        topics: I,
    ) where
        I: IntoIterator<Item = S>,
        S: Into<Topic>,
    {
        self.submit(Command::Publish {
            message,
            topics: collect_topics(topics),
            mode: DispatchMode::Blocking,
        });
    }

    /// Как [`Engine::publish`], но заполненные очереди пропускаются.
    pub fn try_publish<I, S>(
        &self,
        message: T,
        topics: I,
    ) where
        I: IntoIterator<Item = S>,
        S: Into<Topic>,
    {
        self.submit(Command::Publish {
            message,
            topics: collect_topics(topics),
            mode: DispatchMode::NonBlocking,
        });
    }

    /// Закрывает все очереди и останавливает сериализатор.
    ///
    /// Повторный вызов ничего не делает.
    pub fn shutdown(&self) {
        self.submit(Command::Shutdown);
    }

    /// Снимок реестра, согласованный со всеми ранее отправленными
    /// командами. `None`, если движок остановлен.
    pub async fn snapshot(&self) -> Option<RegistrySnapshot> {
        let (reply, answer) = oneshot::channel();
        self.commands.send(Command::Snapshot { reply }).ok()?;
        answer.await.ok()
    }

    fn open<I, S>(
        &self,
        topics: I,
        kind: SubscriptionKind,
    ) -> DeliveryQueue<T>
    where
        I: IntoIterator<Item = S>,
        S: Into<Topic>,
    {
        let (sender, receiver) = mpsc::channel(self.capacity);
        let id = QueueId::next();
        self.submit(Command::Subscribe {
            id,
            sender,
            topics: collect_topics(topics),
            kind,
        });
        DeliveryQueue::new(id, receiver, self.commands.downgrade())
    }

    fn submit(
        &self,
        command: Command<T>,
    ) {
        if let Err(mpsc::error::SendError(command)) = self.commands.send(command) {
            debug!(command = command.name(), "engine stopped, command dropped");
        }
    }
}

impl<T> Engine<T> {
    /// Ёмкость очередей доставки.
    pub fn capacity(&self) -> usize {
        self.capacity
    }

    /// Работает ли ещё сериализатор.
    pub fn is_running(&self) -> bool {
        !self.commands.is_closed()
    }

    /// Дожидается остановки сериализатора.
    ///
    /// К моменту возврата все очереди движка уже закрыты.
    pub async fn stopped(&self) {
        self.commands.closed().await
    }

    /// Текущие значения счётчиков.
    pub fn stats(&self) -> StatsSnapshot {
        self.stats.snapshot()
    }
}

////////////////////////////////////////////////////////////////////////////////
// Общие реализации трейтов
////////////////////////////////////////////////////////////////////////////////

impl<T> Clone for Engine<T> {
    fn clone(&self) -> Self {
        Self {
            commands: self.commands.clone(),
            capacity: self.capacity,
            stats: self.stats.clone(),
        }
    }
}

impl<T> std::fmt::Debug for Engine<T> {
    fn fmt(
        &self,
        f: &mut std::fmt::Formatter<'_>,
    ) -> std::fmt::Result {
        f.debug_struct("Engine")
            .field("capacity", &self.capacity)
            .field("running", &self.is_running())
            .finish()
    }
}

////////////////////////////////////////////////////////////////////////////////
// Сериализатор
////////////////////////////////////////////////////////////////////////////////

/// Цикл сериализатора: обрабатывает команды по одной, в порядке
/// поступления.
///
/// Завершается по `Shutdown` или когда все дескрипторы движка сброшены.
/// Команды, оставшиеся в очереди после выхода, отбрасываются вместе с
/// каналом.
async fn serve<T: Clone>(
    commands: mpsc::UnboundedReceiver<Command<T>>,
    stats: Arc<EngineStats>,
) {
    let mut registry = Registry::new();
    let mut inbox = Inbox::new(commands);

    while let Some(command) = inbox.next().await {
        debug!(command = command.name(), "processing command");
        match command {
            Command::Subscribe {
                id,
                sender,
                topics,
                kind,
            } => registry.register(id, sender, topics, kind),
            Command::AddSubscription {
                id,
                topics,
                once_each,
            } => {
                if !registry.add(id, topics, once_each) {
                    debug!(queue = %id, "add_subscription on closed queue ignored");
                }
            }
            Command::Unsubscribe { id, topics } => {
                if registry.remove_topics(id, &topics) {
                    stats.record_closed(1);
                }
            }
            Command::UnsubscribeAll { id } => {
                if registry.remove_queue(id) {
                    stats.record_closed(1);
                }
            }
            Command::Publish {
                message,
                topics,
                mode,
            } => dispatch(&mut registry, &mut inbox, message, &topics, mode, &stats).await,
            Command::CloseTopics { topics } => {
                stats.record_closed(registry.close_topics(&topics));
            }
            Command::Snapshot { reply } => {
                let _ = reply.send(registry.snapshot());
            }
            Command::Shutdown => break,
        }
    }

    let closed = registry.clear();
    stats.record_closed(closed);
    inbox.close();
    info!(closed_queues = closed, "pub/sub engine stopped");
}

////////////////////////////////////////////////////////////////////////////////
// Тесты
////////////////////////////////////////////////////////////////////////////////

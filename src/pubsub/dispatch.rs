//! Алгоритм рассылки.
//!
//! Сообщение вставляется в каждую очередь-адресат ровно один раз. В режиме
//! `Blocking` заполненная очередь останавливает сериализатор до появления
//! места: один медленный подписчик тормозит все публикации, зато порядок в
//! очередях сохраняется. Ожидание прерывается, если следом пришла команда,
//! закрывающая эту очередь: вставка отменяется, а саму команду сериализатор
//! выполнит в свою очередь.

use tokio::sync::mpsc::{self, error::TrySendError};
use tracing::{debug, trace, warn};

use super::{inbox::Inbox, registry::Registry, DispatchMode, EngineStats, QueueId, Topic};

/// Результат вставки в одну очередь.
enum Outcome {
    Delivered,
    Full,
    Gone,
    Released,
}

/// Рассылает `message` всем очередям, подписанным на `topics`.
///
/// Публикация в топик без подписчиков ничего не делает.
pub(crate) async fn dispatch<T: Clone>(
    registry: &mut Registry<T>,
    inbox: &mut Inbox<T>,
    message: T,
    topics: &[Topic],
    mode: DispatchMode,
    stats: &EngineStats,
) {
    stats.record_publish();

    let targets = registry.targets(topics);
    if targets.is_empty() {
        trace!(?topics, "no subscribers, message discarded");
        return;
    }

    // Последней очереди отдаём само сообщение, остальным — клоны.
    let last = targets.len() - 1;
    let mut message = Some(message);

    for (pos, target) in targets.iter().enumerate() {
        let item = if pos == last {
            message.take()
        } else {
            message.clone()
        };
        let Some(item) = item else {
            break;
        };
        let Some(sender) = registry.sender(target.id) else {
            continue;
        };

        let outcome = match sender.try_send(item) {
            Ok(()) => Outcome::Delivered,
            Err(TrySendError::Closed(_)) => Outcome::Gone,
            Err(TrySendError::Full(item)) => match mode {
                DispatchMode::NonBlocking => Outcome::Full,
                DispatchMode::Blocking if inbox.releases(registry, target.id) => Outcome::Released,
                DispatchMode::Blocking => {
                    warn!(queue = %target.id, "delivery queue full, publishing blocked");
                    wait_for_space(sender, item, target.id, registry, inbox).await
                }
            },
        };

        match outcome {
            Outcome::Delivered => {
                trace!(queue = %target.id, "message delivered");
                stats.record_delivery();
                if registry.delivered(target) {
                    stats.record_closed(1);
                }
            }
            Outcome::Full => {
                debug!(queue = %target.id, "delivery queue full, message skipped");
                stats.record_drop();
            }
            Outcome::Gone => {
                // Подписчик бросил очередь, не дожидаясь закрытия.
                debug!(queue = %target.id, "delivery queue abandoned, pruning");
                if registry.remove_queue(target.id) {
                    stats.record_closed(1);
                }
            }
            Outcome::Released => {
                debug!(queue = %target.id, "delivery queue closing, blocked message discarded");
            }
        }
    }
}

/// Ждёт места в очереди `id`, параллельно принимая новые команды.
///
/// Команды откладываются в `inbox` и после каждой проверяется, не
/// закроет ли какая-нибудь из них эту очередь.
async fn wait_for_space<T>(
    sender: &mpsc::Sender<T>,
    item: T,
    id: QueueId,
    registry: &Registry<T>,
    inbox: &mut Inbox<T>,
) -> Outcome {
    let send = sender.send(item);
    tokio::pin!(send);

    loop {
        tokio::select! {
            sent = &mut send => {
                return match sent {
                    Ok(()) => Outcome::Delivered,
                    Err(_) => Outcome::Gone,
                };
            }
            () = inbox.stash() => {
                if inbox.releases(registry, id) {
                    return Outcome::Released;
                }
            }
        }
    }
}

////////////////////////////////////////////////////////////////////////////////
// Тесты
////////////////////////////////////////////////////////////////////////////////

#[cfg(test)]
mod tests {
    use std::time::Duration;

    use tokio::time::timeout;

    use super::*;
    use crate::pubsub::{command::collect_topics, Command, SubscriptionKind};

    fn inbox() -> (mpsc::UnboundedSender<Command<String>>, Inbox<String>) {
        let (tx, rx) = mpsc::unbounded_channel();
        (tx, Inbox::new(rx))
    }

    fn subscribe(
        registry: &mut Registry<String>,
        capacity: usize,
        topics: &[&str],
        kind: SubscriptionKind,
    ) -> (QueueId, mpsc::Receiver<String>) {
        let (tx, rx) = mpsc::channel(capacity);
        let id = QueueId::next();
        registry.register(id, tx, collect_topics(topics.iter().copied()), kind);
        (id, rx)
    }

    /// Тест проверяет широковещательную рассылку и однократную доставку
    /// при публикации в несколько топиков сразу.
    #[tokio::test]
    async fn test_fan_out_without_duplicates() {
        let stats = EngineStats::default();
        let (_commands, mut inbox) = inbox();
        let mut registry = Registry::new();
        let (_, mut both) = subscribe(&mut registry, 4, &["t1", "t2"], SubscriptionKind::Every);
        let (_, mut one) = subscribe(&mut registry, 4, &["t2"], SubscriptionKind::Every);

        let topics = collect_topics(["t1", "t2"]);
        dispatch(&mut registry, &mut inbox, "hi".to_string(), &topics, DispatchMode::Blocking, &stats).await;

        assert_eq!(both.recv().await.as_deref(), Some("hi"));
        assert!(both.try_recv().is_err());
        assert_eq!(one.recv().await.as_deref(), Some("hi"));

        let snap = stats.snapshot();
        assert_eq!(snap.published, 1);
        assert_eq!(snap.delivered, 2);
    }

    #[tokio::test]
    async fn test_publish_to_unknown_topic_is_noop() {
        let stats = EngineStats::default();
        let (_commands, mut inbox) = inbox();
        let mut registry: Registry<String> = Registry::new();
        let topics = collect_topics(["ghost"]);
        dispatch(&mut registry, &mut inbox, "x".into(), &topics, DispatchMode::Blocking, &stats).await;
        assert_eq!(stats.snapshot().published, 1);
        assert_eq!(stats.snapshot().delivered, 0);
    }

    /// Тест проверяет, что неблокирующая публикация пропускает
    /// заполненную очередь и не трогает её подписку.
    #[tokio::test]
    async fn test_non_blocking_skips_full_queue() {
        let stats = EngineStats::default();
        let (_commands, mut inbox) = inbox();
        let mut registry = Registry::new();
        let (_, mut rx) = subscribe(&mut registry, 1, &["t"], SubscriptionKind::Once);
        let (_, mut spare) = subscribe(&mut registry, 1, &["t"], SubscriptionKind::Every);
        let topics = collect_topics(["t"]);

        // Заполняем буфер `spare`, чтобы он был полон ко второй публикации.
        dispatch(&mut registry, &mut inbox, "a".into(), &topics, DispatchMode::NonBlocking, &stats).await;
        dispatch(&mut registry, &mut inbox, "b".into(), &topics, DispatchMode::NonBlocking, &stats).await;

        assert_eq!(rx.recv().await.as_deref(), Some("a"));
        assert_eq!(rx.recv().await, None);
        assert_eq!(spare.recv().await.as_deref(), Some("a"));
        assert!(spare.try_recv().is_err());

        let snap = stats.snapshot();
        assert_eq!(snap.delivered, 2);
        assert_eq!(snap.dropped, 1);
        assert_eq!(snap.closed_queues, 1);
        assert_eq!(registry.snapshot().subscribers("t"), 1);
    }

    /// Тест проверяет, что брошенная очередь вычищается из реестра
    /// при попытке доставки.
    #[tokio::test]
    async fn test_abandoned_queue_is_pruned() {
        let stats = EngineStats::default();
        let (_commands, mut inbox) = inbox();
        let mut registry = Registry::new();
        let (_, rx) = subscribe(&mut registry, 1, &["t"], SubscriptionKind::Every);
        drop(rx);

        let topics = collect_topics(["t"]);
        dispatch(&mut registry, &mut inbox, "x".into(), &topics, DispatchMode::Blocking, &stats).await;
        assert!(registry.snapshot().topics.is_empty());
        assert_eq!(stats.snapshot().delivered, 0);
        assert_eq!(stats.snapshot().closed_queues, 1);
    }

    /// Тест проверяет обратное давление: рассылка ждёт, пока подписчик
    /// не освободит место.
    #[tokio::test]
    async fn test_blocking_waits_for_space() {
        let stats = EngineStats::default();
        let (_commands, mut inbox) = inbox();
        let mut registry = Registry::new();
        let (_, mut rx) = subscribe(&mut registry, 1, &["t"], SubscriptionKind::Every);
        let topics = collect_topics(["t"]);

        dispatch(&mut registry, &mut inbox, "first".into(), &topics, DispatchMode::Blocking, &stats).await;

        let blocked = timeout(
            Duration::from_millis(20),
            dispatch(&mut registry, &mut inbox, "second".into(), &topics, DispatchMode::Blocking, &stats),
        )
        .await;
        assert!(blocked.is_err(), "publish must block on a full queue");

        assert_eq!(rx.recv().await.as_deref(), Some("first"));
        dispatch(&mut registry, &mut inbox, "third".into(), &topics, DispatchMode::Blocking, &stats).await;
        assert_eq!(rx.recv().await.as_deref(), Some("third"));
    }

    /// Тест проверяет, что остановка движка, пришедшая во время ожидания,
    /// отменяет вставку в заполненную очередь.
    #[tokio::test]
    async fn test_shutdown_releases_blocked_insertion() {
        let stats = EngineStats::default();
        let (commands, mut inbox) = inbox();
        let mut registry = Registry::new();
        let (_, mut rx) = subscribe(&mut registry, 1, &["t"], SubscriptionKind::Every);
        let topics = collect_topics(["t"]);

        dispatch(&mut registry, &mut inbox, "first".into(), &topics, DispatchMode::Blocking, &stats).await;

        let late = commands.clone();
        tokio::spawn(async move {
            tokio::task::yield_now().await;
            let _ = late.send(Command::Shutdown);
        });
        timeout(
            Duration::from_secs(1),
            dispatch(&mut registry, &mut inbox, "second".into(), &topics, DispatchMode::Blocking, &stats),
        )
        .await
        .expect("blocked insertion was not released");

        assert_eq!(rx.try_recv().as_deref(), Ok("first"));
        assert!(rx.try_recv().is_err());
        assert_eq!(stats.snapshot().delivered, 1);
        assert_eq!(inbox.next().await.map(|c| c.name()), Some("shutdown"));
        drop(commands);
    }

    /// Тест проверяет, что частичная отписка не отпускает вставку, а
    /// отписка от всех топиков отпускает.
    #[tokio::test]
    async fn test_only_closing_unsubscribe_releases() {
        let stats = EngineStats::default();
        let (commands, mut inbox) = inbox();
        let mut registry = Registry::new();
        let (id, mut rx) = subscribe(&mut registry, 1, &["a", "b"], SubscriptionKind::Every);
        let topics = collect_topics(["a"]);

        dispatch(&mut registry, &mut inbox, "first".into(), &topics, DispatchMode::Blocking, &stats).await;

        commands
            .send(Command::Unsubscribe {
                id,
                topics: collect_topics(["b"]),
            })
            .unwrap();
        let blocked = timeout(
            Duration::from_millis(50),
            dispatch(&mut registry, &mut inbox, "second".into(), &topics, DispatchMode::Blocking, &stats),
        )
        .await;
        assert!(blocked.is_err(), "partial unsubscribe must not release");

        commands
            .send(Command::Unsubscribe {
                id,
                topics: collect_topics(["a", "b"]),
            })
            .unwrap();
        timeout(
            Duration::from_secs(1),
            dispatch(&mut registry, &mut inbox, "third".into(), &topics, DispatchMode::Blocking, &stats),
        )
        .await
        .expect("closing unsubscribe must release");

        assert_eq!(rx.try_recv().as_deref(), Ok("first"));
        assert!(rx.try_recv().is_err());
        assert_eq!(inbox.next().await.map(|c| c.name()), Some("unsubscribe"));
        assert_eq!(inbox.next().await.map(|c| c.name()), Some("unsubscribe"));
    }
}

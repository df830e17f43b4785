use std::sync::atomic::{AtomicU64, Ordering};

/// Счётчики движка.
///
/// Обновляются только сериализатором, читаются из любых потоков.
#[derive(Debug, Default)]
pub struct EngineStats {
    /// Обработанные команды публикации (`publish` и `try_publish`).
    pub(crate) published: AtomicU64,
    /// Успешные вставки в очереди доставки.
    pub(crate) delivered: AtomicU64,
    /// Сообщения, пропущенные `try_publish` из-за заполненной очереди.
    pub(crate) dropped: AtomicU64,
    /// Закрытые движком очереди.
    pub(crate) closed_queues: AtomicU64,
}

/// Согласованная на момент чтения копия счётчиков.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct StatsSnapshot {
    pub published: u64,
    pub delivered: u64,
    pub dropped: u64,
    pub closed_queues: u64,
}

impl EngineStats {
    pub(crate) fn record_publish(&self) {
        self.published.fetch_add(1, Ordering::Relaxed);
    }

    pub(crate) fn record_delivery(&self) {
        self.delivered.fetch_add(1, Ordering::Relaxed);
    }

    pub(crate) fn record_drop(&self) {
        self.dropped.fetch_add(1, Ordering::Relaxed);
    }

    pub(crate) fn record_closed(
        &self,
        count: usize,
    ) {
        if count > 0 {
            self.closed_queues
                .fetch_add(count as u64, Ordering::Relaxed);
        }
    }

    pub fn snapshot(&self) -> StatsSnapshot {
        StatsSnapshot {
            published: self.published.load(Ordering::Relaxed),
            delivered: self.delivered.load(Ordering::Relaxed),
            dropped: self.dropped.load(Ordering::Relaxed),
            closed_queues: self.closed_queues.load(Ordering::Relaxed),
        }
    }
}

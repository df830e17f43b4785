use std::{
    fmt,
    sync::atomic::{AtomicU64, Ordering},
    time::Duration,
};

use tokio::{
    sync::mpsc::{self, WeakUnboundedSender},
    time::timeout,
};
use topicbus_error::{RecvError, TryRecvError};

use super::command::Command;

/// Счётчик для генерации уникальных идентификаторов очередей.
///
/// Общий для всех движков процесса: очередь, выданная одним движком,
/// никогда не совпадёт с очередью другого.
static QUEUE_ID_COUNTER: AtomicU64 = AtomicU64::new(0);

/// Идентификатор очереди доставки.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct QueueId(u64);

/// Очередь доставки подписчика.
///
/// Ограниченный буфер, который наполняет только движок. Подписчик читает
/// сообщения в порядке их доставки; после закрытия очереди движком уже
/// буферизованные сообщения можно дочитать, а затем чтение возвращает
/// признак конца потока.
///
/// При `Drop` очередь снимается со всех топиков.
pub struct DeliveryQueue<T> {
    id: QueueId,
    inner: mpsc::Receiver<T>,
    engine: WeakUnboundedSender<Command<T>>,
}

////////////////////////////////////////////////////////////////////////////////
// Собственные методы
////////////////////////////////////////////////////////////////////////////////

impl QueueId {
    pub(crate) fn next() -> Self {
        Self(QUEUE_ID_COUNTER.fetch_add(1, Ordering::Relaxed) + 1)
    }

    /// Числовое значение идентификатора.
    pub fn as_u64(&self) -> u64 {
        self.0
    }
}

impl<T> DeliveryQueue<T> {
    pub(crate) fn new(
        id: QueueId,
        inner: mpsc::Receiver<T>,
        engine: WeakUnboundedSender<Command<T>>,
    ) -> Self {
        Self { id, inner, engine }
    }

    /// Идентификатор очереди.
    pub fn id(&self) -> QueueId {
        self.id
    }

    /// Асинхронно ожидает следующее сообщение.
    ///
    /// # Возвращает
    /// - `Some(message)` — очередное сообщение
    /// - `None` — очередь закрыта и вычитана до конца
    pub async fn recv(&mut self) -> Option<T> {
        self.inner.recv().await
    }

    /// Блокирующее чтение для потоков вне асинхронного рантайма.
    ///
    /// # Panics
    /// Паникует при вызове из асинхронного контекста, как и
    /// [`mpsc::Receiver::blocking_recv`].
    pub fn blocking_recv(&mut self) -> Option<T> {
        self.inner.blocking_recv()
    }

    /// Пытается получить сообщение без ожидания.
    ///
    /// # Возвращает
    /// - `Ok(message)` если сообщение доступно немедленно
    /// - `Err(TryRecvError::Empty)` если буфер пуст, но очередь открыта
    /// - `Err(TryRecvError::Closed)` если очередь закрыта и пуста
    pub fn try_recv(&mut self) -> Result<T, TryRecvError> {
        self.inner.try_recv().map_err(Into::into)
    }

    /// Ожидает сообщение не дольше `limit`.
    pub async fn recv_timeout(
        &mut self,
        limit: Duration,
    ) -> Result<T, RecvError> {
        match timeout(limit, self.inner.recv()).await? {
            Some(message) => Ok(message),
            None => Err(RecvError::Closed),
        }
    }

    /// Закрыта ли очередь движком.
    ///
    /// Новых сообщений не будет, но в буфере ещё могут оставаться
    /// непрочитанные.
    pub fn is_closed(&self) -> bool {
        self.inner.is_closed()
    }

    /// Количество непрочитанных сообщений в буфере.
    pub fn len(&self) -> usize {
        self.inner.len()
    }

    /// Пуст ли буфер.
    pub fn is_empty(&self) -> bool {
        self.inner.is_empty()
    }
}

////////////////////////////////////////////////////////////////////////////////
// Общие реализации трейтов
////////////////////////////////////////////////////////////////////////////////

impl fmt::Display for QueueId {
    fn fmt(
        &self,
        f: &mut fmt::Formatter<'_>,
    ) -> fmt::Result {
        write!(f, "q{}", self.0)
    }
}

impl<T> fmt::Debug for DeliveryQueue<T> {
    fn fmt(
        &self,
        f: &mut fmt::Formatter<'_>,
    ) -> fmt::Result {
        f.debug_struct("DeliveryQueue")
            .field("id", &self.id)
            .field("len", &self.inner.len())
            .field("closed", &self.inner.is_closed())
            .finish()
    }
}

impl<T> Drop for DeliveryQueue<T> {
    fn drop(&mut self) {
        // Слабая ссылка: брошенная очередь не продлевает жизнь движка.
        let Some(engine) = self.engine.upgrade() else {
            return;
        };
        if !self.inner.is_closed() {
            let _ = engine.send(Command::UnsubscribeAll { id: self.id });
        }
    }
}

////////////////////////////////////////////////////////////////////////////////
// Тесты
////////////////////////////////////////////////////////////////////////////////

use std::collections::VecDeque;

use tokio::sync::mpsc;

use super::{registry::Registry, Command, QueueId};

/// Входящие команды сериализатора.
///
/// Пока рассылка ждёт места в заполненной очереди, новые команды
/// складываются в `backlog`, не нарушая порядка обработки: следующая
/// команда всегда берётся сначала из `backlog`, потом из канала.
pub(crate) struct Inbox<T> {
    rx: mpsc::UnboundedReceiver<Command<T>>,
    backlog: VecDeque<Command<T>>,
    ended: bool,
}

impl<T> Inbox<T> {
    pub(crate) fn new(rx: mpsc::UnboundedReceiver<Command<T>>) -> Self {
        Self {
            rx,
            backlog: VecDeque::new(),
            ended: false,
        }
    }

    /// Следующая команда по порядку поступления.
    ///
    /// `None`, когда все дескрипторы движка сброшены и команд не осталось.
    pub(crate) async fn next(&mut self) -> Option<Command<T>> {
        if let Some(command) = self.backlog.pop_front() {
            return Some(command);
        }
        if self.ended {
            return None;
        }
        self.rx.recv().await
    }

    /// Дожидается одной команды и откладывает её в `backlog`.
    ///
    /// Отмена безопасна: команда либо отложена, либо осталась в канале.
    pub(crate) async fn stash(&mut self) {
        match self.rx.recv().await {
            Some(command) => self.backlog.push_back(command),
            None => self.ended = true,
        }
    }

    /// Отпускает ли отложенная команда вставку в очередь `id`.
    ///
    /// Да, если среди отложенных команд есть остановка движка или
    /// команда, которая закроет эту очередь. Подписка на новые топики,
    /// пришедшая раньше, отменяет закрытие через потерю топиков.
    pub(crate) fn releases(
        &self,
        registry: &Registry<T>,
        id: QueueId,
    ) -> bool {
        if self.ended {
            return true;
        }
        let mut extended = false;
        for command in &self.backlog {
            match command {
                Command::Shutdown => return true,
                Command::UnsubscribeAll { id: target } if *target == id => return true,
                Command::AddSubscription { id: target, .. } if *target == id => {
                    extended = true;
                }
                Command::Unsubscribe { id: target, topics }
                    if *target == id && !extended && registry.loses_all(id, topics) =>
                {
                    return true;
                }
                Command::CloseTopics { topics } if !extended && registry.loses_all(id, topics) => {
                    return true;
                }
                _ => {}
            }
        }
        false
    }

    /// Закрывает канал: дальнейшие отправки команд отвергаются.
    pub(crate) fn close(&mut self) {
        self.rx.close();
    }
}

//! Реестр подписок.
//!
//! Принадлежит единственной задаче-сериализатору и меняется только из неё,
//! поэтому обходится без блокировок.

use std::collections::BTreeMap;

use rustc_hash::{FxHashMap, FxHashSet};
use tokio::sync::mpsc;

use super::{QueueId, SubscriptionKind, Topic};

/// Как очередь подписана на конкретный топик.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Edge {
    Every,
    OnceEach,
}

/// Зарегистрированная очередь: единственный `Sender` движка и обратный
/// индекс её топиков.
struct QueueSlot<T> {
    sender: mpsc::Sender<T>,
    topics: FxHashSet<Topic>,
}

/// Адресат рассылки: очередь и топики публикации, через которые она
/// совпала.
#[derive(Debug, Clone, PartialEq, Eq)]
pub(crate) struct Target {
    pub(crate) id: QueueId,
    pub(crate) via: Vec<Topic>,
}

/// Топик → множество очередей, плюс множество очередей с разовой доставкой.
pub(crate) struct Registry<T> {
    topics: FxHashMap<Topic, FxHashMap<QueueId, Edge>>,
    queues: FxHashMap<QueueId, QueueSlot<T>>,
    once: FxHashSet<QueueId>,
}

/// Снимок состояния реестра.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct RegistrySnapshot {
    /// Топик → количество подписанных очередей.
    pub topics: BTreeMap<String, usize>,
    /// Количество открытых очередей.
    pub queues: usize,
    /// Количество очередей с разовой доставкой.
    pub once: usize,
}

////////////////////////////////////////////////////////////////////////////////
// Собственные методы
////////////////////////////////////////////////////////////////////////////////

impl<T> Registry<T> {
    pub(crate) fn new() -> Self {
        Self {
            topics: FxHashMap::default(),
            queues: FxHashMap::default(),
            once: FxHashSet::default(),
        }
    }

    /// Регистрирует новую очередь и подписывает её на `topics`.
    ///
    /// Очередь без топиков остаётся открытой до `add`, отписки или
    /// остановки движка.
    pub(crate) fn register(
        &mut self,
        id: QueueId,
        sender: mpsc::Sender<T>,
        topics: Vec<Topic>,
        kind: SubscriptionKind,
    ) {
        self.queues.entry(id).or_insert_with(|| QueueSlot {
            sender,
            topics: FxHashSet::default(),
        });
        if kind == SubscriptionKind::Once {
            self.once.insert(id);
        }
        self.link(id, topics, kind == SubscriptionKind::OnceEach);
    }

    /// Подписывает уже выданную очередь на дополнительные топики.
    ///
    /// Неизвестная (или уже закрытая) очередь игнорируется.
    pub(crate) fn add(
        &mut self,
        id: QueueId,
        topics: Vec<Topic>,
        once_each: bool,
    ) -> bool {
        if !self.queues.contains_key(&id) {
            return false;
        }
        self.link(id, topics, once_each);
        true
    }

    fn link(
        &mut self,
        id: QueueId,
        topics: Vec<Topic>,
        once_each: bool,
    ) {
        let Some(slot) = self.queues.get_mut(&id) else {
            return;
        };
        let edge = if once_each { Edge::OnceEach } else { Edge::Every };
        for topic in topics {
            self.topics
                .entry(topic.clone())
                .or_default()
                .insert(id, edge);
            slot.topics.insert(topic);
        }
    }

    /// Снимает очередь с перечисленных топиков.
    ///
    /// Очередь, у которой не осталось топиков, закрывается.
    ///
    /// # Возвращает
    /// - `true`, если очередь была закрыта
    pub(crate) fn remove_topics(
        &mut self,
        id: QueueId,
        topics: &[Topic],
    ) -> bool {
        let Some(slot) = self.queues.get_mut(&id) else {
            return false;
        };
        let mut touched = false;
        for topic in topics {
            if !slot.topics.remove(topic) {
                continue;
            }
            touched = true;
            if let Some(members) = self.topics.get_mut(topic) {
                members.remove(&id);
                if members.is_empty() {
                    self.topics.remove(topic);
                }
            }
        }
        if touched && slot.topics.is_empty() {
            return self.remove_queue(id);
        }
        false
    }

    /// Потеряет ли очередь все свои топики, если снять её с `topics`.
    pub(crate) fn loses_all(
        &self,
        id: QueueId,
        topics: &[Topic],
    ) -> bool {
        self.queues.get(&id).is_some_and(|slot| {
            !slot.topics.is_empty() && slot.topics.iter().all(|topic| topics.contains(topic))
        })
    }

    /// Снимает очередь со всех топиков и закрывает её.
    pub(crate) fn remove_queue(
        &mut self,
        id: QueueId,
    ) -> bool {
        let Some(slot) = self.queues.remove(&id) else {
            return false;
        };
        for topic in &slot.topics {
            if let Some(members) = self.topics.get_mut(topic) {
                members.remove(&id);
                if members.is_empty() {
                    self.topics.remove(topic);
                }
            }
        }
        self.once.remove(&id);
        // Закрытие очереди = drop единственного `Sender`.
        drop(slot);
        true
    }

    /// Удаляет топики целиком.
    ///
    /// Каждая очередь теряет эти топики; очереди, у которых топиков не
    /// осталось, закрываются ровно один раз.
    ///
    /// # Возвращает
    /// - количество закрытых очередей
    pub(crate) fn close_topics(
        &mut self,
        topics: &[Topic],
    ) -> usize {
        let mut closed = 0;
        for topic in topics {
            let Some(members) = self.topics.remove(topic) else {
                continue;
            };
            for id in members.into_keys() {
                let Some(slot) = self.queues.get_mut(&id) else {
                    continue;
                };
                slot.topics.remove(topic);
                if slot.topics.is_empty() && self.remove_queue(id) {
                    closed += 1;
                }
            }
        }
        closed
    }

    /// Закрывает все очереди и очищает реестр.
    pub(crate) fn clear(&mut self) -> usize {
        let closed = self.queues.len();
        self.topics.clear();
        self.once.clear();
        self.queues.clear();
        closed
    }

    /// Вычисляет дедуплицированное множество адресатов публикации.
    ///
    /// Топики без подписчиков пропускаются. Порядок адресатов —
    /// порядок первого совпадения.
    pub(crate) fn targets(
        &self,
        topics: &[Topic],
    ) -> Vec<Target> {
        let mut order: Vec<Target> = Vec::new();
        let mut index: FxHashMap<QueueId, usize> = FxHashMap::default();
        for topic in topics {
            let Some(members) = self.topics.get(topic) else {
                continue;
            };
            for id in members.keys() {
                match index.get(id) {
                    Some(&pos) => {
                        let via = &mut order[pos].via;
                        if !via.contains(topic) {
                            via.push(topic.clone());
                        }
                    }
                    None => {
                        index.insert(*id, order.len());
                        order.push(Target {
                            id: *id,
                            via: vec![topic.clone()],
                        });
                    }
                }
            }
        }
        order
    }

    /// `Sender` очереди, если она ещё открыта.
    pub(crate) fn sender(
        &self,
        id: QueueId,
    ) -> Option<&mpsc::Sender<T>> {
        self.queues.get(&id).map(|slot| &slot.sender)
    }

    /// Учитывает успешную доставку: разовые очереди закрываются,
    /// разовые по топику подписки снимаются.
    ///
    /// # Возвращает
    /// - `true`, если очередь была закрыта
    pub(crate) fn delivered(
        &mut self,
        target: &Target,
    ) -> bool {
        if self.once.contains(&target.id) {
            return self.remove_queue(target.id);
        }
        let spent: Vec<Topic> = target
            .via
            .iter()
            .filter(|topic| {
                self.topics
                    .get(*topic)
                    .and_then(|members| members.get(&target.id))
                    == Some(&Edge::OnceEach)
            })
            .cloned()
            .collect();
        if spent.is_empty() {
            return false;
        }
        self.remove_topics(target.id, &spent)
    }

    pub(crate) fn snapshot(&self) -> RegistrySnapshot {
        RegistrySnapshot {
            topics: self
                .topics
                .iter()
                .map(|(topic, members)| (topic.to_string(), members.len()))
                .collect(),
            queues: self.queues.len(),
            once: self.once.len(),
        }
    }
}

impl RegistrySnapshot {
    /// Количество очередей, подписанных на `topic`.
    pub fn subscribers(
        &self,
        topic: &str,
    ) -> usize {
        self.topics.get(topic).copied().unwrap_or(0)
    }

    /// Существует ли топик (есть ли у него подписчики).
    pub fn has_topic(
        &self,
        topic: &str,
    ) -> bool {
        self.topics.contains_key(topic)
    }
}

////////////////////////////////////////////////////////////////////////////////
// Тесты
////////////////////////////////////////////////////////////////////////////////

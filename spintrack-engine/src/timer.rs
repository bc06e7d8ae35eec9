//! Tâches différées annulables, déclenchées par l'appelant.
//!
//! Rien ne s'exécute tout seul : le propriétaire appelle `pop_due` avec l'heure
//! courante et traite les tâches échues dans l'ordre chronologique.

use std::collections::{BTreeMap, HashMap};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct TaskId(u64);

pub struct TimerQueue<T> {
    next_id: u64,
    /// (échéance, id) -> tâche. L'id départage deux échéances identiques par ordre de programmation.
    pending: BTreeMap<(u64, TaskId), T>,
    due_at: HashMap<TaskId, u64>,
}

impl<T> TimerQueue<T> {
    pub fn new() -> Self {
        Self {
            next_id: 0,
            pending: BTreeMap::new(),
            due_at: HashMap::new(),
        }
    }

    pub fn schedule(&mut self, at_ms: u64, task: T) -> TaskId {
        let id = TaskId(self.next_id);
        self.next_id += 1;
        self.pending.insert((at_ms, id), task);
        self.due_at.insert(id, at_ms);
        id
    }

    /// Retire la tâche si elle est encore en attente.
    pub fn cancel(&mut self, id: TaskId) -> Option<T> {
        let at = self.due_at.remove(&id)?;
        self.pending.remove(&(at, id))
    }

    pub fn is_pending(&self, id: TaskId) -> bool {
        self.due_at.contains_key(&id)
    }

    pub fn due_at(&self, id: TaskId) -> Option<u64> {
        self.due_at.get(&id).copied()
    }

    pub fn next_due(&self) -> Option<u64> {
        self.pending.keys().next().map(|&(at, _)| at)
    }

    /// Prochaine tâche dont l'échéance est ≤ `now_ms`, avec son échéance.
    pub fn pop_due(&mut self, now_ms: u64) -> Option<(TaskId, u64, T)> {
        let &(at, id) = self.pending.keys().next()?;
        if at > now_ms {
            return None;
        }
        self.due_at.remove(&id);
        self.pending.remove(&(at, id)).map(|task| (id, at, task))
    }

    pub fn len(&self) -> usize {
        self.pending.len()
    }

    pub fn is_empty(&self) -> bool {
        self.pending.is_empty()
    }

    pub fn clear(&mut self) {
        self.pending.clear();
        self.due_at.clear();
    }
}

impl<T> Default for TimerQueue<T> {
    fn default() -> Self {
        Self::new()
    }
}

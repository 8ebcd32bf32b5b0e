//! Per-page shared/exclusive locking with polling acquisition and
//! wait-for-graph deadlock detection.
//!
//! A waiting transaction builds an edge into a shared wait-for graph
//! and aborts as soon as that graph shows a cycle back to itself. A
//! flat timeout remains as a backstop for waits the graph doesn't
//! catch quickly enough.

use std::{
    collections::{HashMap, HashSet},
    sync::Mutex,
    thread::sleep,
    time::{Duration, Instant},
};

use log::debug;

use crate::{error::SmallError, page_id::HeapPageId, transaction_id::TransactionId};

#[derive(Copy, Clone, PartialEq, Eq, Debug)]
pub enum LockKind {
    Shared,
    Exclusive,
}

const POLL_INTERVAL: Duration = Duration::from_millis(10);
const DEADLOCK_TIMEOUT: Duration = Duration::from_secs(3);

#[derive(Default)]
struct PageLockState {
    shared: HashSet<TransactionId>,
    exclusive: Option<TransactionId>,
}

struct WaitForGraph {
    graph: HashMap<TransactionId, HashSet<TransactionId>>,
}

impl WaitForGraph {
    fn new() -> Self {
        Self {
            graph: HashMap::new(),
        }
    }

    fn set_waiters(&mut self, from: TransactionId, waiting_on: HashSet<TransactionId>) {
        if waiting_on.is_empty() {
            self.graph.remove(&from);
        } else {
            self.graph.insert(from, waiting_on);
        }
    }

    fn remove(&mut self, tid: TransactionId) {
        self.graph.remove(&tid);
        for waiters in self.graph.values_mut() {
            waiters.remove(&tid);
        }
    }

    fn has_cycle_from(&self, start: TransactionId) -> bool {
        let mut stack = vec![start];
        let mut visited = HashSet::new();
        while let Some(tid) = stack.pop() {
            if let Some(next) = self.graph.get(&tid) {
                for &n in next {
                    if n == start {
                        return true;
                    }
                    if visited.insert(n) {
                        stack.push(n);
                    }
                }
            }
        }
        false
    }
}

pub struct LockManager {
    state: Mutex<HashMap<HeapPageId, PageLockState>>,
    wait_for: Mutex<WaitForGraph>,
}

impl LockManager {
    pub fn new() -> Self {
        Self {
            state: Mutex::new(HashMap::new()),
            wait_for: Mutex::new(WaitForGraph::new()),
        }
    }

    pub fn acquire_lock(
        &self,
        tid: TransactionId,
        pid: HeapPageId,
        kind: LockKind,
    ) -> Result<(), SmallError> {
        let start = Instant::now();
        loop {
            if self.try_grant(tid, pid, kind) {
                self.wait_for.lock().unwrap().remove(tid);
                return Ok(());
            }

            {
                let waiters = self.current_holders(pid, tid);
                let mut graph = self.wait_for.lock().unwrap();
                graph.set_waiters(tid, waiters);
                if graph.has_cycle_from(tid) {
                    graph.remove(tid);
                    drop(graph);
                    self.release_pages(tid);
                    return Err(SmallError::txn_aborted(format!(
                        "deadlock detected while {} waited for {:?}",
                        tid, pid
                    )));
                }
            }

            if start.elapsed() > DEADLOCK_TIMEOUT {
                self.wait_for.lock().unwrap().remove(tid);
                self.release_pages(tid);
                return Err(SmallError::txn_aborted(format!(
                    "{} timed out waiting for lock on {:?}",
                    tid, pid
                )));
            }

            sleep(POLL_INTERVAL);
        }
    }

    /// Transactions currently holding a lock on `pid` other than `tid`
    /// itself; used to build the wait-for graph edge for `tid`.
    fn current_holders(&self, pid: HeapPageId, tid: TransactionId) -> HashSet<TransactionId> {
        let state = self.state.lock().unwrap();
        match state.get(&pid) {
            Some(s) => {
                let mut holders: HashSet<TransactionId> =
                    s.shared.iter().copied().filter(|&h| h != tid).collect();
                if let Some(x) = s.exclusive {
                    if x != tid {
                        holders.insert(x);
                    }
                }
                holders
            }
            None => HashSet::new(),
        }
    }

    /// Idempotent: returns true if `tid` now holds (or already held) a
    /// lock at least as strong as `kind`.
    fn try_grant(&self, tid: TransactionId, pid: HeapPageId, kind: LockKind) -> bool {
        let mut state = self.state.lock().unwrap();
        let entry = state.entry(pid).or_default();

        match kind {
            LockKind::Shared => {
                if entry.exclusive == Some(tid) || entry.shared.contains(&tid) {
                    return true;
                }
                if entry.exclusive.is_some() {
                    return false;
                }
                entry.shared.insert(tid);
                debug!("{} acquired S on {:?}", tid, pid);
                true
            }
            LockKind::Exclusive => {
                if entry.exclusive == Some(tid) {
                    return true;
                }
                // Upgrade S -> X iff tid is the sole holder.
                let sole_shared_holder =
                    entry.shared.len() == 1 && entry.shared.contains(&tid);
                if entry.exclusive.is_none() && (entry.shared.is_empty() || sole_shared_holder) {
                    entry.shared.remove(&tid);
                    entry.exclusive = Some(tid);
                    debug!("{} acquired X on {:?}", tid, pid);
                    return true;
                }
                false
            }
        }
    }

    pub fn release_page(&self, tid: TransactionId, pid: HeapPageId) {
        let mut state = self.state.lock().unwrap();
        if let Some(entry) = state.get_mut(&pid) {
            entry.shared.remove(&tid);
            if entry.exclusive == Some(tid) {
                entry.exclusive = None;
            }
            if entry.shared.is_empty() && entry.exclusive.is_none() {
                state.remove(&pid);
            }
        }
    }

    pub fn release_pages(&self, tid: TransactionId) {
        let mut state = self.state.lock().unwrap();
        state.retain(|_, entry| {
            entry.shared.remove(&tid);
            if entry.exclusive == Some(tid) {
                entry.exclusive = None;
            }
            !(entry.shared.is_empty() && entry.exclusive.is_none())
        });
        self.wait_for.lock().unwrap().remove(tid);
    }

    pub fn holds_lock(&self, tid: TransactionId, pid: HeapPageId) -> bool {
        let state = self.state.lock().unwrap();
        match state.get(&pid) {
            Some(s) => s.exclusive == Some(tid) || s.shared.contains(&tid),
            None => false,
        }
    }
}

impl Default for LockManager {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn shared_locks_are_compatible() {
        let lm = LockManager::new();
        let pid = HeapPageId::new(1, 0);
        let t1 = TransactionId::new();
        let t2 = TransactionId::new();
        lm.acquire_lock(t1, pid, LockKind::Shared).unwrap();
        lm.acquire_lock(t2, pid, LockKind::Shared).unwrap();
        assert!(lm.holds_lock(t1, pid));
        assert!(lm.holds_lock(t2, pid));
    }

    #[test]
    fn upgrade_s_to_x_when_sole_holder() {
        let lm = LockManager::new();
        let pid = HeapPageId::new(1, 0);
        let t1 = TransactionId::new();
        lm.acquire_lock(t1, pid, LockKind::Shared).unwrap();
        lm.acquire_lock(t1, pid, LockKind::Exclusive).unwrap();
        assert!(lm.holds_lock(t1, pid));
    }

    #[test]
    fn release_pages_drops_every_lock_held_by_tid() {
        let lm = LockManager::new();
        let pid_a = HeapPageId::new(1, 0);
        let pid_b = HeapPageId::new(1, 1);
        let t1 = TransactionId::new();
        lm.acquire_lock(t1, pid_a, LockKind::Shared).unwrap();
        lm.acquire_lock(t1, pid_b, LockKind::Exclusive).unwrap();
        lm.release_pages(t1);
        assert!(!lm.holds_lock(t1, pid_a));
        assert!(!lm.holds_lock(t1, pid_b));
    }
}

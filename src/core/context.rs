//! Scoped context propagation
//!
//! Every logical task owns a stack of key/value entries. [`push`] adds an
//! entry and returns a [`ScopeGuard`] that removes it again on drop;
//! [`snapshot`] merges the stack bottom-to-top into a [`ContextSnapshot`]
//! where the most recently pushed value for a key wins.
//!
//! Inside a future run through [`scope`], [`inherit`] or [`spawn`] the
//! stack belongs to that future and travels with it across `.await` points
//! and worker threads. Any other tokio task gets a stack of its own, keyed
//! by its task id and starting empty. Outside of a task the stack belongs
//! to the current OS thread.
//!
//! # Example
//!
//! ```
//! use logflow::core::context;
//!
//! let _request = context::push("request_id", "abc-123");
//! {
//!     let _user = context::push("user_id", 42);
//!     assert_eq!(context::snapshot().len(), 2);
//! }
//! assert_eq!(context::snapshot().len(), 1);
//! ```

use super::log_context::{ContextSnapshot, FieldValue};
use parking_lot::Mutex;
use std::collections::HashMap;
use std::future::Future;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, OnceLock};
use tokio::task::Id as TaskId;

static NEXT_ENTRY_ID: AtomicU64 = AtomicU64::new(1);

#[derive(Debug, Clone)]
struct ContextEntry {
    id: u64,
    key: String,
    value: FieldValue,
}

/// Shared handle to one logical task's entry stack
#[derive(Debug, Clone, Default)]
struct ContextStack {
    entries: Arc<Mutex<Vec<ContextEntry>>>,
    /// Set when the stack lives in the per-task table
    task: Option<TaskId>,
}

impl ContextStack {
    fn for_task(task: TaskId) -> Self {
        Self {
            entries: Arc::default(),
            task: Some(task),
        }
    }

    /// Independent stack holding a copy of this one's entries
    fn fork(&self) -> Self {
        Self {
            entries: Arc::new(Mutex::new(self.entries.lock().clone())),
            task: None,
        }
    }

    fn push(&self, entry: ContextEntry) {
        self.entries.lock().push(entry);
    }

    /// Remove the top entry only when it is the one identified by `id`
    fn pop_if_top(&self, id: u64) -> bool {
        let popped = {
            let mut entries = self.entries.lock();
            match entries.last() {
                Some(top) if top.id == id => {
                    entries.pop();
                    true
                }
                _ => false,
            }
        };
        if popped {
            if let Some(task) = self.task {
                forget_if_empty(task, self);
            }
        }
        popped
    }

    fn snapshot(&self) -> ContextSnapshot {
        let entries = self.entries.lock();
        let mut snapshot = ContextSnapshot::new();
        for entry in entries.iter() {
            snapshot.insert(entry.key.clone(), entry.value.clone());
        }
        snapshot
    }

    fn clear(&self) {
        self.entries.lock().clear();
    }

    fn depth(&self) -> usize {
        self.entries.lock().len()
    }
}

tokio::task_local! {
    static TASK_STACK: ContextStack;
}

thread_local! {
    static THREAD_STACK: ContextStack = ContextStack::default();
}

/// Stacks of tokio tasks running outside [`scope`]; an entry is dropped
/// once its stack empties
fn task_stacks() -> &'static Mutex<HashMap<TaskId, ContextStack>> {
    static STACKS: OnceLock<Mutex<HashMap<TaskId, ContextStack>>> = OnceLock::new();
    STACKS.get_or_init(Mutex::default)
}

fn forget_if_empty(task: TaskId, stack: &ContextStack) {
    let mut stacks = task_stacks().lock();
    let emptied = stacks.get(&task).is_some_and(|held| {
        Arc::ptr_eq(&held.entries, &stack.entries) && held.entries.lock().is_empty()
    });
    if emptied {
        stacks.remove(&task);
    }
}

/// Where the caller's stack lives
enum Owner {
    Scoped(ContextStack),
    Task(TaskId),
    Thread,
}

fn owner() -> Owner {
    if let Ok(stack) = TASK_STACK.try_with(ContextStack::clone) {
        return Owner::Scoped(stack);
    }
    match tokio::task::try_id() {
        Some(task) => Owner::Task(task),
        None => Owner::Thread,
    }
}

/// The caller's stack for reading; a task that never pushed gets an
/// empty, untracked one
fn current() -> ContextStack {
    match owner() {
        Owner::Scoped(stack) => stack,
        Owner::Task(task) => task_stacks()
            .lock()
            .get(&task)
            .cloned()
            .unwrap_or_default(),
        Owner::Thread => THREAD_STACK.with(ContextStack::clone),
    }
}

/// Releases its entry when dropped.
///
/// The entry is removed only if it is still on top of the stack it was
/// pushed onto. Releasing guards out of LIFO order therefore leaves the
/// out-of-order entry in place rather than removing someone else's.
#[must_use = "the context entry is removed as soon as the guard is dropped"]
#[derive(Debug)]
pub struct ScopeGuard {
    stack: Option<ContextStack>,
    id: u64,
}

impl ScopeGuard {
    /// Release the entry now; returns whether it was removed
    pub fn release(mut self) -> bool {
        self.stack
            .take()
            .map(|stack| stack.pop_if_top(self.id))
            .unwrap_or(false)
    }
}

impl Drop for ScopeGuard {
    fn drop(&mut self) {
        if let Some(stack) = self.stack.take() {
            stack.pop_if_top(self.id);
        }
    }
}

/// Push `key = value` onto the current context
pub fn push<K, V>(key: K, value: V) -> ScopeGuard
where
    K: Into<String>,
    V: Into<FieldValue>,
{
    let id = NEXT_ENTRY_ID.fetch_add(1, Ordering::Relaxed);
    let entry = ContextEntry {
        id,
        key: key.into(),
        value: value.into(),
    };
    let stack = match owner() {
        Owner::Scoped(stack) => stack,
        Owner::Thread => THREAD_STACK.with(ContextStack::clone),
        Owner::Task(task) => {
            // pushed under the table lock so a concurrent release cannot
            // drop the stack between lookup and push
            let mut stacks = task_stacks().lock();
            let stack = stacks
                .entry(task)
                .or_insert_with(|| ContextStack::for_task(task))
                .clone();
            stack.push(entry);
            return ScopeGuard {
                stack: Some(stack),
                id,
            };
        }
    };
    stack.push(entry);
    ScopeGuard {
        stack: Some(stack),
        id,
    }
}

/// Independent copy of the current context, later entries winning
pub fn snapshot() -> ContextSnapshot {
    current().snapshot()
}

/// Empty the current context's stack.
///
/// Guards still alive for cleared entries become no-ops.
pub fn clear() {
    if let Owner::Task(task) = owner() {
        if let Some(stack) = task_stacks().lock().remove(&task) {
            stack.clear();
        }
        return;
    }
    current().clear();
}

/// Number of entries on the current stack, duplicates included
pub fn depth() -> usize {
    current().depth()
}

/// Run `future` with a fresh, empty context of its own
pub async fn scope<F: Future>(future: F) -> F::Output {
    TASK_STACK.scope(ContextStack::default(), future).await
}

/// Run `future` with a private copy of the caller's current context.
///
/// The copy is taken when `inherit` is called, so it reflects the
/// caller's entries at spawn time; pushes on either side afterwards stay
/// invisible to the other.
pub fn inherit<F: Future>(future: F) -> impl Future<Output = F::Output> {
    let stack = current().fork();
    TASK_STACK.scope(stack, future)
}

/// `tokio::spawn` a future that inherits the caller's context
pub fn spawn<F>(future: F) -> tokio::task::JoinHandle<F::Output>
where
    F: Future + Send + 'static,
    F::Output: Send + 'static,
{
    tokio::spawn(inherit(future))
}

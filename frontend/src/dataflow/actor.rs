//! Single-value reactive state owned by one processing task.

use std::future::Future;
use std::sync::Arc;

use zoon::{Mutable, Signal, Task, TaskHandle};

/// Reactive value whose writes all happen inside the processor task.
/// Dropping the last clone cancels the task.
#[derive(Clone, Debug)]
pub struct Actor<T>
where
    T: Clone + Send + Sync + 'static,
{
    state: Mutable<T>,
    #[allow(dead_code)]
    task_handle: Arc<TaskHandle>,
}

impl<T> Actor<T>
where
    T: Clone + Send + Sync + 'static,
{
    pub fn new<F, Fut>(initial_state: T, processor: F) -> Self
    where
        F: FnOnce(Mutable<T>) -> Fut + 'static,
        Fut: Future<Output = ()> + 'static,
    {
        let state = Mutable::new(initial_state);
        let task_handle = Arc::new(Task::start_droppable(processor(state.clone())));
        Self { state, task_handle }
    }

    pub fn signal(&self) -> impl Signal<Item = T> + use<T> {
        self.state.signal_cloned()
    }

    pub fn signal_ref<U, F>(&self, f: F) -> impl Signal<Item = U> + use<T, U, F>
    where
        F: FnMut(&T) -> U + 'static,
    {
        self.state.signal_ref(f)
    }

    pub fn get_cloned(&self) -> T {
        self.state.get_cloned()
    }
}

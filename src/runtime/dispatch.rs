//! A designated thread that owns thread-affine ("UI") state.
//!
//! Work is posted as closures that receive `&mut S`. The state is built on
//! the designated thread and never leaves it, so `S` does not have to be
//! `Send`. Results travel back over a oneshot channel and can be awaited
//! from async code or waited on from a plain thread.

use std::any::Any;
use std::future::Future;
use std::marker::PhantomData;
use std::panic::{self, AssertUnwindSafe};
use std::pin::Pin;
use std::task::{Context, Poll};
use std::thread::{JoinHandle, ThreadId};

use tokio::sync::{mpsc, oneshot};

type Job<S> = Box<dyn FnOnce(&mut S) + Send>;

#[derive(Debug, thiserror::Error)]
pub enum DispatchError {
    #[error("dispatch thread has shut down")]
    Closed,
    #[error("task panicked on the dispatch thread: {0}")]
    Panicked(String),
    #[error("blocking dispatch from the dispatch thread itself would deadlock")]
    Reentrant,
    #[error("failed to spawn dispatch thread: {0}")]
    Spawn(#[source] std::io::Error),
}

/// Handle to the designated thread. Dropping it drains the queue and joins.
pub struct UiThread<S> {
    tx: Option<mpsc::UnboundedSender<Job<S>>>,
    thread: Option<JoinHandle<()>>,
    id: ThreadId,
    _state: PhantomData<fn() -> S>,
}

impl<S: 'static> UiThread<S> {
    /// Start a thread called `name`, build the state on it with `init`, and
    /// serve posted tasks in order.
    pub fn spawn<F>(name: impl Into<String>, init: F) -> Result<Self, DispatchError>
    where
        F: FnOnce() -> S + Send + 'static,
    {
        let name = name.into();
        let (tx, mut rx) = mpsc::unbounded_channel::<Job<S>>();
        let thread = std::thread::Builder::new()
            .name(name.clone())
            .spawn(move || {
                let mut state = init();
                let mut served = 0u64;
                while let Some(job) = rx.blocking_recv() {
                    job(&mut state);
                    served += 1;
                }
                tracing::debug!(thread = %name, served, "dispatch queue closed");
            })
            .map_err(DispatchError::Spawn)?;
        let id = thread.thread().id();

        Ok(Self {
            tx: Some(tx),
            thread: Some(thread),
            id,
            _state: PhantomData,
        })
    }

    /// Queue `f` and return immediately.
    pub fn post<F, R>(&self, f: F) -> Dispatched<R>
    where
        F: FnOnce(&mut S) -> R + Send + 'static,
        R: Send + 'static,
    {
        let (reply, rx) = oneshot::channel();
        let job: Job<S> = Box::new(move |state: &mut S| {
            let outcome = panic::catch_unwind(AssertUnwindSafe(|| f(state)))
                .map_err(|payload| DispatchError::Panicked(panic_message(payload.as_ref())));
            let _ = reply.send(outcome);
        });
        // On failure the job, and with it `reply`, is dropped: the receiver
        // then resolves to `Closed`.
        if let Some(tx) = &self.tx {
            let _ = tx.send(job);
        }
        Dispatched { rx }
    }

    /// Queue `f` and block the calling thread until it has run.
    ///
    /// Must not be called from inside an async runtime; `.await` the result
    /// of [`post`](Self::post) there instead.
    pub fn run<F, R>(&self, f: F) -> Result<R, DispatchError>
    where
        F: FnOnce(&mut S) -> R + Send + 'static,
        R: Send + 'static,
    {
        if self.is_current() {
            return Err(DispatchError::Reentrant);
        }
        self.post(f).wait()
    }
}

impl<S> UiThread<S> {
    pub fn thread_id(&self) -> ThreadId {
        self.id
    }

    /// Whether the calling thread is this dispatcher's thread.
    pub fn is_current(&self) -> bool {
        std::thread::current().id() == self.id
    }

    /// Close the queue, let queued tasks finish, and join the thread.
    pub fn shutdown(mut self) {
        self.close();
    }

    fn close(&mut self) {
        self.tx.take();
        let Some(thread) = self.thread.take() else {
            return;
        };
        if self.is_current() {
            // Last handle dropped by one of our own tasks; the loop exits
            // once that task returns.
            return;
        }
        if thread.join().is_err() {
            tracing::warn!("dispatch thread panicked during start-up");
        }
    }
}

impl<S> Drop for UiThread<S> {
    fn drop(&mut self) {
        self.close();
    }
}

/// Pending result of a posted task.
#[must_use = "a dispatched task's result is only observed by waiting on it"]
pub struct Dispatched<R> {
    rx: oneshot::Receiver<Result<R, DispatchError>>,
}

impl<R> Dispatched<R> {
    /// Block the calling (non-async) thread until the task has run.
    pub fn wait(self) -> Result<R, DispatchError> {
        self.rx.blocking_recv().map_err(|_| DispatchError::Closed)?
    }
}

impl<R> Future for Dispatched<R> {
    type Output = Result<R, DispatchError>;

    fn poll(self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<Self::Output> {
        Pin::new(&mut self.get_mut().rx)
            .poll(cx)
            .map(|received| received.map_err(|_| DispatchError::Closed)?)
    }
}

fn panic_message(payload: &(dyn Any + Send)) -> String {
    if let Some(s) = payload.downcast_ref::<&str>() {
        (*s).to_string()
    } else if let Some(s) = payload.downcast_ref::<String>() {
        s.clone()
    } else {
        "non-string panic payload".to_string()
    }
}

#[cfg(test)]
mod tests {
    use std::cell::RefCell;
    use std::rc::Rc;
    use std::sync::Arc;

    use super::*;

    #[test]
    fn tasks_run_in_post_order_on_one_thread() {
        let ui = UiThread::spawn("ui-order", Vec::<u32>::new).unwrap();
        let pending: Vec<_> = (0..50).map(|i| ui.post(move |log| log.push(i))).collect();
        for p in pending {
            p.wait().unwrap();
        }
        let log = ui.run(|log| log.clone()).unwrap();
        assert_eq!(log, (0..50).collect::<Vec<_>>());
    }

    #[test]
    fn state_need_not_be_send() {
        let ui = UiThread::spawn("ui-rc", || Rc::new(RefCell::new(String::from("a")))).unwrap();
        ui.run(|s| s.borrow_mut().push('b')).unwrap();
        assert_eq!(ui.run(|s| s.borrow().clone()).unwrap(), "ab");
    }

    #[test]
    fn panicking_task_is_reported_and_thread_survives() {
        let ui = UiThread::spawn("ui-panic", || 1u8).unwrap();
        let err = ui.run(|_| -> u8 { panic!("boom") }).unwrap_err();
        assert!(matches!(&err, DispatchError::Panicked(m) if m == "boom"), "{err}");
        assert_eq!(ui.run(|s| *s).unwrap(), 1);
    }

    #[test]
    fn failed_start_up_closes_the_queue() {
        let ui = UiThread::<u8>::spawn("ui-dead", || panic!("no state")).unwrap();
        let err = ui.run(|s| *s).unwrap_err();
        assert!(matches!(err, DispatchError::Closed), "{err}");
    }

    #[test]
    fn blocking_from_inside_is_refused() {
        let ui = Arc::new(UiThread::spawn("ui-reentrant", || 0u32).unwrap());
        let inner = Arc::clone(&ui);
        let nested = ui.run(move |_| inner.run(|s| *s)).unwrap();
        assert!(matches!(nested, Err(DispatchError::Reentrant)));
    }

    #[test]
    fn shutdown_drains_queued_work() {
        let counter = Arc::new(std::sync::atomic::AtomicUsize::new(0));
        let ui = UiThread::spawn("ui-drain", || ()).unwrap();
        for _ in 0..10 {
            let counter = Arc::clone(&counter);
            let _ = ui.post(move |_| {
                counter.fetch_add(1, std::sync::atomic::Ordering::SeqCst);
            });
        }
        ui.shutdown();
        assert_eq!(counter.load(std::sync::atomic::Ordering::SeqCst), 10);
    }

    #[tokio::test]
    async fn results_can_be_awaited() {
        let ui = UiThread::spawn("ui-async", || 40u32).unwrap();
        let value = ui.post(|s| *s + 2).await.unwrap();
        assert_eq!(value, 42);
        assert_ne!(ui.thread_id(), std::thread::current().id());
    }
}

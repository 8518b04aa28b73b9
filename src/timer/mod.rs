
use std::io::Result;
use std::ops::ControlFlow;
use std::panic::{catch_unwind, AssertUnwindSafe};
use std::process;
use std::sync::Arc;
use std::thread::{self, JoinHandle};
use std::time::Duration;

use parking_lot::{Condvar, Mutex};
use tracing::error;

/// Fires a tick action on a dedicated background thread at a fixed
/// cadence.
///
/// The action runs outside the internal lock and is panic-isolated, so a
/// misbehaving tick never kills the loop. Returning
/// [`ControlFlow::Break`] from the action ends the loop without an
/// explicit shutdown.
pub(crate) struct Ticker {
    pid: u32,
    shared: Arc<Shared>,
    thread: Option<JoinHandle<()>>,
}

struct Shared {
    stopped: Mutex<bool>,
    wake: Condvar,
}

impl Ticker {
    pub fn spawn(
        name: &str,
        interval: Duration,
        mut tick: impl FnMut() -> ControlFlow<()> + Send + 'static,
    ) -> Result<Self> {
        let shared = Arc::new(Shared {
            stopped: Mutex::new(false),
            wake: Condvar::new(),
        });

        let loop_shared = Arc::clone(&shared);
        let thread = thread::Builder::new().name(name.to_owned()).spawn(move || {
            loop {
                {
                    let mut stopped = loop_shared.stopped.lock();
                    if *stopped {
                        break;
                    }
                    let wait = loop_shared.wake.wait_for(&mut stopped, interval);
                    if *stopped {
                        break;
                    }
                    if !wait.timed_out() {
                        // Spurious wake.
                        continue;
                    }
                }
                match catch_unwind(AssertUnwindSafe(|| tick())) {
                    Ok(ControlFlow::Continue(())) => {}
                    Ok(ControlFlow::Break(())) => break,
                    Err(_) => error!("tick action panicked; polling continues"),
                }
            }
        })?;

        Ok(Self {
            pid: process::id(),
            shared,
            thread: Some(thread),
        })
    }

    /// Process the ticker thread was spawned in.
    ///
    /// A mismatch with the current pid means the handle was inherited
    /// across `fork` and the thread only exists in the parent.
    pub fn owner_pid(&self) -> u32 {
        self.pid
    }

    /// Stops future ticks; an in-flight tick completes first.
    pub fn shutdown(mut self) {
        self.stop();
    }

    fn stop(&mut self) {
        if self.pid != process::id() {
            // Forked child: the thread and the state of its locks belong
            // to the parent. Do not touch them, do not join.
            self.thread.take();
            return;
        }

        *self.shared.stopped.lock() = true;
        self.shared.wake.notify_all();

        let Some(handle) = self.thread.take() else {
            return;
        };
        // The tick action may drop the last monitor handle, running this
        // from the ticker thread itself; joining there would deadlock.
        if handle.thread().id() != thread::current().id() {
            let _ = handle.join();
        }
    }
}

impl Drop for Ticker {
    fn drop(&mut self) {
        self.stop();
    }
}

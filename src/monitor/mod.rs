
mod cell;

use std::any::{type_name, Any};
use std::borrow::Borrow;
use std::fmt;
use std::io;
use std::ops::ControlFlow;
use std::panic::{catch_unwind, AssertUnwindSafe};
use std::process;
use std::sync::Arc;
use std::time::{Duration, SystemTime};

use parking_lot::Mutex;
use thiserror::Error as ThisError;
use tracing::{error, info};

use crate::config::{Executor, Opts, DEFAULT_POLLING_INTERVAL};
use crate::lock::ShareLock;
use crate::probe::{AlwaysActive, ZoneProbe};
use crate::timer::Ticker;
use cell::ZoneCell;

/// Where background failures are attributed when reported.
const ERROR_SOURCE: &str = "active_zone.monitor";

#[derive(Debug, ThisError)]
pub enum Error {
    /// The zone probe failed.
    #[error("active zone probe failed: {0}")]
    Probe(#[source] io::Error),

    /// The polling thread could not be spawned.
    #[error("could not spawn polling thread: {0}")]
    Spawn(#[source] io::Error),

    /// A hook panicked during transition dispatch.
    #[error("zone hook panicked: {0}")]
    Hook(String),
}

pub type Result<T> = std::result::Result<T, Error>;

type Hook<P> = Arc<dyn Fn(&ZoneMonitor<P>) + Send + Sync>;

/// Process-local monitor of whether this deployment zone is the active
/// (read/write authoritative) zone of a multi-zone replicated system.
///
/// The monitor samples a [`ZoneProbe`] on a periodic cadence, caches the
/// result for lock-free reads, and notifies registered hooks whenever the
/// cached state transitions. Any observation method lazily starts the
/// background sampler, so callers never have to sequence `start_monitoring`
/// themselves.
///
/// The monitor is a cheap handle: cloning it shares the underlying state,
/// and clones may be observed from any thread.
///
/// The monitor reports what its probe reports. It provides no distributed
/// agreement of any kind and no guarantee that only one zone considers
/// itself active at a time.
///
/// # Examples
///
/// ```rust
/// use active_zone::monitor::ZoneMonitor;
///
/// let monitor = ZoneMonitor::always_active();
///
/// assert!(monitor.active_zone().unwrap());
/// assert!(monitor.updated_at().is_some());
///
/// monitor.on_active_zone(|_| println!("this zone serves writes")).unwrap();
/// ```
pub struct ZoneMonitor<P: ZoneProbe> {
    inner: Arc<Inner<P>>,
}

struct Inner<P: ZoneProbe> {
    probe: P,
    polling_interval: Duration,
    executor: Option<Arc<dyn Executor>>,
    lock: ShareLock,
    cell: ZoneCell,
    active_hooks: Mutex<Vec<Hook<P>>>,
    passive_hooks: Mutex<Vec<Hook<P>>>,
    timer: Mutex<Option<Ticker>>,
    // False only for the always-active variant, which never polls.
    scheduling: bool,
}

impl<P: ZoneProbe> ZoneMonitor<P> {
    /// Creates a new monitor around `probe`.
    ///
    /// The probe is not invoked here; the first observation pays for the
    /// initial sample.
    pub fn new(probe: P, opts: impl Borrow<Opts>) -> Self {
        Self::with_scheduling(probe, opts.borrow(), true)
    }

    fn with_scheduling(probe: P, opts: &Opts, scheduling: bool) -> Self {
        let polling_interval = if opts.polling_interval.is_zero() {
            DEFAULT_POLLING_INTERVAL
        } else {
            opts.polling_interval
        };
        Self {
            inner: Arc::new(Inner {
                probe,
                polling_interval,
                executor: opts.executor.clone(),
                lock: ShareLock::new(),
                cell: ZoneCell::new(),
                active_hooks: Mutex::new(Vec::new()),
                passive_hooks: Mutex::new(Vec::new()),
                timer: Mutex::new(None),
                scheduling,
            }),
        }
    }

    /// Whether the current zone is active, from the cache.
    ///
    /// The first call (across all threads sharing this monitor) performs
    /// one probe invocation and starts the background sampler; later calls
    /// are lock-free reads. Concurrent first calls still produce exactly
    /// one probe invocation: the losers of the race block until the winner
    /// has populated the cache.
    pub fn active_zone(&self) -> Result<bool> {
        self.check(true)?;
        self.ensure_ticker()?;
        Ok(self.inner.cell.zone().unwrap_or(false))
    }

    /// When the cache was last refreshed; `None` if never sampled.
    pub fn updated_at(&self) -> Option<SystemTime> {
        self.inner.cell.updated_at()
    }

    /// Seeds the cache and starts the background sampler.
    ///
    /// Transitions caused by the seeding sample fire synchronously on the
    /// calling thread. Idempotent.
    pub fn start_monitoring(&self) -> Result<()> {
        self.check(true)?;
        self.ensure_ticker()
    }

    /// Stops the background sampler; an in-flight sample completes first.
    ///
    /// The cache and the registered hooks are untouched; the next
    /// observation restarts the sampler. Idempotent.
    pub fn stop_monitoring(&self) {
        let ticker = self.inner.timer.lock().take();
        if let Some(ticker) = ticker {
            ticker.shutdown();
        }
    }

    /// Registers `hook` to run on every transition to active.
    ///
    /// Starts monitoring. If the zone is currently active, `hook` is
    /// additionally invoked right away, exactly once, so late registrants
    /// learn the current state without waiting for a transition.
    pub fn on_active_zone(&self, hook: impl Fn(&Self) + Send + Sync + 'static) -> Result<()> {
        self.register(hook, true)
    }

    /// Registers `hook` to run on every transition to passive.
    ///
    /// The passive counterpart of [`on_active_zone`][Self::on_active_zone].
    pub fn on_passive_zone(&self, hook: impl Fn(&Self) + Send + Sync + 'static) -> Result<()> {
        self.register(hook, false)
    }

    /// Removes all registered hooks, of both polarities.
    ///
    /// A dispatch already in flight keeps its snapshot; the cache and the
    /// sampler are untouched.
    pub fn clear_hooks(&self) {
        self.inner.active_hooks.lock().clear();
        self.inner.passive_hooks.lock().clear();
    }

    pub fn polling_interval(&self) -> Duration {
        self.inner.polling_interval
    }

    /// Whether the background sampler is scheduled in this process.
    pub fn monitoring(&self) -> bool {
        self.inner
            .timer
            .lock()
            .as_ref()
            .is_some_and(|ticker| ticker.owner_pid() == process::id())
    }

    fn register(&self, hook: impl Fn(&Self) + Send + Sync + 'static, on_active: bool) -> Result<()> {
        self.start_monitoring()?;

        let hook: Hook<P> = Arc::new(hook);
        let list = if on_active {
            &self.inner.active_hooks
        } else {
            &self.inner.passive_hooks
        };
        list.lock().push(Arc::clone(&hook));

        if self.inner.cell.zone() == Some(on_active) {
            (*hook)(self);
        }
        Ok(())
    }

    /// Core state-update routine.
    ///
    /// With `skip_when_set`, a populated cache short-circuits the call;
    /// this is how every observation after the first becomes cheap. The
    /// periodic sampler passes `false` to force a fresh sample each tick.
    ///
    /// Exactly one thread at a time samples: the non-blocking exclusive
    /// acquire elects a winner, and losers stall on a momentary shared
    /// lease until the winner has published, so they return to a freshly
    /// populated cache.
    fn check(&self, skip_when_set: bool) -> Result<()> {
        if skip_when_set && self.inner.cell.zone().is_some() {
            return Ok(());
        }
        match self.inner.lock.start_exclusive(true) {
            Some(guard) => {
                let old = self.inner.cell.zone();
                // On a probe error the guard still releases the lock and
                // the cache keeps its previous value.
                let new = self.sample()?;
                self.inner.cell.publish(new, SystemTime::now());
                drop(guard);
                self.detect_transition(old, new);
                Ok(())
            }
            None => {
                self.inner.lock.sharing(|| ());
                Ok(())
            }
        }
    }

    fn sample(&self) -> Result<bool> {
        let probe = &self.inner.probe;
        let fetched = match &self.inner.executor {
            Some(executor) => executor.wrap(Box::new(|| probe.fetch_active_zone())),
            None => probe.fetch_active_zone(),
        };
        fetched.map_err(Error::Probe)
    }

    fn detect_transition(&self, old: Option<bool>, new: bool) {
        if old == Some(new) {
            return;
        }
        // Log first, then dispatch; log scrapers depend on this order.
        let pid = process::id();
        if new {
            info!("{}: pid {pid}: switching to active", self.name());
            self.dispatch(&self.inner.active_hooks);
        } else {
            info!("{}: pid {pid}: switching to passive", self.name());
            self.dispatch(&self.inner.passive_hooks);
        }
    }

    fn dispatch(&self, hooks: &Mutex<Vec<Hook<P>>>) {
        // The snapshot keeps dispatch order stable under concurrent
        // registration and lets hooks re-enter the registry.
        let snapshot = hooks.lock().clone();
        for hook in snapshot {
            if let Err(panic) = catch_unwind(AssertUnwindSafe(|| (*hook)(self))) {
                self.report(&Error::Hook(panic_message(panic.as_ref())));
            }
        }
    }

    fn ensure_ticker(&self) -> Result<()> {
        if !self.inner.scheduling {
            return Ok(());
        }

        let mut slot = self.inner.timer.lock();
        if let Some(ticker) = slot.as_ref() {
            if ticker.owner_pid() == process::id() {
                return Ok(());
            }
            // Inherited across fork; the thread only exists in the parent.
            // Dropping the stale handle neither signals nor joins it.
            slot.take();
        }

        let weak = Arc::downgrade(&self.inner);
        let ticker = Ticker::spawn("active-zone-poll", self.inner.polling_interval, move || {
            let Some(inner) = weak.upgrade() else {
                return ControlFlow::Break(());
            };
            let monitor = ZoneMonitor { inner };
            if let Err(err) = monitor.check(false) {
                monitor.report(&err);
                error!("{err}: could not check {} active zone", monitor.name());
            }
            ControlFlow::Continue(())
        })
        .map_err(Error::Spawn)?;
        *slot = Some(ticker);
        Ok(())
    }

    fn report(&self, error: &Error) {
        let Some(executor) = &self.inner.executor else {
            return;
        };
        // A missing reporter is a no-op sink.
        if let Some(reporter) = executor.error_reporter() {
            reporter.report(error, false, ERROR_SOURCE);
        }
    }

    fn name(&self) -> &'static str {
        let name = type_name::<P>();
        name.rsplit("::").next().unwrap_or(name)
    }
}

impl ZoneMonitor<AlwaysActive> {
    /// Monitor for deployments where this zone is always the active one.
    ///
    /// The probe reports active unconditionally and no polling thread is
    /// ever created. The unsampled-to-active transition still occurs on
    /// the first observation, so active hooks fire exactly once; passive
    /// hooks never fire.
    pub fn always_active() -> Self {
        Self::with_scheduling(AlwaysActive, &Opts::default(), false)
    }
}

impl<P: ZoneProbe> Clone for ZoneMonitor<P> {
    fn clone(&self) -> Self {
        Self {
            inner: Arc::clone(&self.inner),
        }
    }
}

impl<P: ZoneProbe> fmt::Debug for ZoneMonitor<P> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ZoneMonitor")
            .field("probe", &self.name())
            .field("active_zone", &self.inner.cell.zone())
            .field("polling_interval", &self.inner.polling_interval)
            .finish()
    }
}

fn panic_message(panic: &(dyn Any + Send)) -> String {
    if let Some(message) = panic.downcast_ref::<&str>() {
        (*message).to_owned()
    } else if let Some(message) = panic.downcast_ref::<String>() {
        message.clone()
    } else {
        "opaque panic payload".to_owned()
    }
}

use std::error::Error;
use std::fmt;
use std::io::Result;
use std::sync::Arc;
use std::time::Duration;

/// Default cadence of the periodic sampler.
pub const DEFAULT_POLLING_INTERVAL: Duration = Duration::from_secs(5);

/// Monitor options.
///
/// ```rust
/// use std::time::Duration;
///
/// use active_zone::config::Opts;
///
/// let mut opts = Opts::default();
/// opts.polling_interval = Duration::from_secs(1);
/// ```
#[derive(Clone)]
pub struct Opts {
    /// How often the background sampler re-evaluates the zone probe.
    ///
    /// Must be positive; a zero interval falls back to
    /// [`DEFAULT_POLLING_INTERVAL`].
    pub polling_interval: Duration,

    /// Wraps every probe invocation when present.
    ///
    /// Probes are typically request-scoped in the host application
    /// (database checkout, tracing span); the executor is where that
    /// setup and teardown lives.
    pub executor: Option<Arc<dyn Executor>>,
}

impl Default for Opts {
    fn default() -> Self {
        Self {
            polling_interval: DEFAULT_POLLING_INTERVAL,
            executor: None,
        }
    }
}

impl fmt::Debug for Opts {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Opts")
            .field("polling_interval", &self.polling_interval)
            .field("executor", &self.executor.is_some())
            .finish()
    }
}

/// One probe invocation, boxed for the executor seam.
pub type Thunk<'a> = Box<dyn FnOnce() -> Result<bool> + 'a>;

/// Wraps probe invocations with request-scoped setup and teardown.
pub trait Executor: Send + Sync {
    /// Runs one probe invocation.
    ///
    /// Implementations must call the thunk exactly once and return its
    /// result; anything else desynchronizes the cache from the probe.
    fn wrap(&self, thunk: Thunk<'_>) -> Result<bool>;

    /// Sink for background failures.
    ///
    /// `None` discards them.
    fn error_reporter(&self) -> Option<&dyn ErrorReporter> {
        None
    }
}

/// Receives failures the monitor could not surface to a caller.
pub trait ErrorReporter: Send + Sync {
    /// `handled` is false for failures no caller will ever observe, such
    /// as a probe error on a background tick. `source` attributes the
    /// failure to the subsystem that produced it.
    fn report(&self, error: &(dyn Error + 'static), handled: bool, source: &str);
}

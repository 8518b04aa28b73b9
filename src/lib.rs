//! Process-local monitoring of which deployment zone is the active
//! (read/write authoritative) site of a multi-zone replicated system.
//!
//! The [`ZoneMonitor`][monitor::ZoneMonitor] periodically samples a
//! caller-supplied [`ZoneProbe`][probe::ZoneProbe], caches the answer for
//! lock-free reads, and notifies registered hooks whenever the zone
//! switches between active and passive. The first observation performs
//! the initial sample (exactly once, however many threads race into it)
//! and lazily starts the background sampler; a forked child restarts the
//! sampler transparently on its first observation.
//!
//! ## Example
//!
//! Decide activeness from a topology file and react to switchovers:
//!
//! ```rust
//! use std::io;
//! use std::path::Path;
//! use std::time::Duration;
//!
//! use active_zone::config::Opts;
//! use active_zone::monitor::ZoneMonitor;
//!
//! let mut opts = Opts::default();
//! opts.polling_interval = Duration::from_secs(30);
//!
//! let monitor = ZoneMonitor::new(
//!     || -> io::Result<bool> { Ok(Path::new("/etc/topology/active").exists()) },
//!     opts,
//! );
//!
//! monitor.on_active_zone(|_| println!("this zone now serves writes")).unwrap();
//! monitor.on_passive_zone(|_| println!("writes moved elsewhere")).unwrap();
//!
//! let active = monitor.active_zone().unwrap();
//! println!("active zone: {active}");
//!
//! monitor.stop_monitoring();
//! ```
//!
//! ## Scope
//!
//! The monitor is strictly observational: it reports what its probe
//! reports. Leader election, quorum and fencing are somebody else's
//! problem.
//!
//! Transitions are logged through [`tracing`]; install any subscriber to
//! see them. Failures of background samples go to the
//! [`ErrorReporter`][config::ErrorReporter] exposed by the configured
//! executor, if any.

pub mod config;
pub mod lock;
pub mod monitor;
pub mod probe;
mod timer;

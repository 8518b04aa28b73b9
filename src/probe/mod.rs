use std::io::Result;

/// Decides whether the current deployment zone is the active one.
///
/// This is the expensive, externally defined part of the monitor: a
/// database probe, a topology-file lookup, a DNS trick. The monitor never
/// calls it concurrently with itself; invocations are serialized by the
/// monitor's exclusive lock.
///
/// Errors are surfaced to the caller on foreground checks and to the
/// configured error reporter on background ticks; in both cases the
/// cached state keeps its previous value.
///
/// # Examples
///
/// ```rust
/// use std::io::Result;
/// use std::path::Path;
///
/// use active_zone::probe::ZoneProbe;
///
/// struct TopologyFile;
///
/// impl ZoneProbe for TopologyFile {
///     fn fetch_active_zone(&self) -> Result<bool> {
///         Ok(Path::new("/etc/topology/active").exists())
///     }
/// }
/// ```
pub trait ZoneProbe: Send + Sync + 'static {
    fn fetch_active_zone(&self) -> Result<bool>;
}

/// Any matching closure or fn item works as a probe.
impl<F> ZoneProbe for F
where
    F: Fn() -> Result<bool> + Send + Sync + 'static,
{
    fn fetch_active_zone(&self) -> Result<bool> {
        self()
    }
}

/// Probe of the always-active variant.
///
/// Reports the current zone as active unconditionally; useful for
/// single-zone deployments where the replication question has a fixed
/// answer.
#[derive(Clone, Copy, Debug, Default)]
pub struct AlwaysActive;

impl ZoneProbe for AlwaysActive {
    fn fetch_active_zone(&self) -> Result<bool> {
        Ok(true)
    }
}

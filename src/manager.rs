//! Exception set lifecycle: publish, query, and periodic refresh.

use arc_swap::ArcSwapOption;
use std::net::IpAddr;
use std::sync::mpsc::{self, RecvTimeoutError, Sender};
use std::sync::Arc;
use std::thread::{self, JoinHandle};
use std::time::Duration;

use crate::error::{Error, Result};
use crate::set::ExceptionSet;
use crate::signal::ReadySignal;
use crate::source::{self, ExceptionSources};

/// Fixed period between refresh cycles.
pub const REFRESH_INTERVAL: Duration = Duration::from_secs(60 * 60);

/// ExceptionManager owns the currently published [`ExceptionSet`] and the
/// readiness signal, and runs the load-build-publish cycle.
///
/// The manager holds no global state: construct one per service (or per
/// test) and share it via [`Arc`]. Publication is an atomic pointer swap, so
/// queries never lock against a refresh; each query dereferences one
/// consistent snapshot, either the set published before the query began or a
/// later one.
///
/// # Example
///
/// ```no_run
/// use ipexempt::{ExceptionManager, ExceptionSources, RefreshHandle};
/// use std::sync::Arc;
///
/// # fn main() -> ipexempt::Result<()> {
/// let sources = ExceptionSources {
///     files: vec!["/etc/reputation/exceptions.txt".into()],
///     provider_feed: true,
/// };
/// let manager = Arc::new(ExceptionManager::new(sources));
///
/// // First refresh runs synchronously; readiness is signaled before this
/// // returns, so the service can start accepting traffic.
/// let refresher = RefreshHandle::start(Arc::clone(&manager))?;
///
/// assert!(manager.ready());
/// let exempt = manager.is_exception("10.1.2.3")?;
/// # let _ = (exempt, refresher);
/// # Ok(())
/// # }
/// ```
pub struct ExceptionManager {
    sources: ExceptionSources,
    refresh_interval: Duration,
    active: ArcSwapOption<ExceptionSet>,
    ready: ReadySignal,
}

impl ExceptionManager {
    /// Create a manager for the given sources. Nothing is loaded until the
    /// first [`refresh`](Self::refresh).
    pub fn new(sources: ExceptionSources) -> Self {
        Self {
            sources,
            refresh_interval: REFRESH_INTERVAL,
            active: ArcSwapOption::empty(),
            ready: ReadySignal::new(),
        }
    }

    /// Override the refresh period.
    ///
    /// Default is [`REFRESH_INTERVAL`] (one hour).
    pub fn with_refresh_interval(mut self, interval: Duration) -> Self {
        self.refresh_interval = interval;
        self
    }

    /// Run one load-build-publish cycle.
    ///
    /// Builds a brand-new set from all configured sources and atomically
    /// replaces the published one. On any load error nothing is published
    /// and the previously active set keeps serving queries.
    pub fn refresh(&self) -> Result<()> {
        log::info!("starting exception refresh");
        let prefixes = source::load_prefixes(&self.sources)?;
        let set = ExceptionSet::from_prefixes(prefixes);
        log::info!("completed exception refresh ({} ranges)", set.len());

        self.active.store(Some(Arc::new(set)));
        self.ready.notify();
        Ok(())
    }

    /// Report whether an address falls within any published range.
    ///
    /// Input containing both a colon and a dot (an IPv4-mapped IPv6 address
    /// in dotted notation) is never an exception; the lookup structure does
    /// not support that form, so it is answered `false` without error and
    /// without consulting the structure.
    pub fn is_exception(&self, addr: &str) -> Result<bool> {
        if addr.contains(':') && addr.contains('.') {
            return Ok(false);
        }

        let ip: IpAddr = addr
            .parse()
            .map_err(|_| Error::InvalidIpAddress(addr.to_string()))?;

        match self.active.load_full() {
            Some(set) => Ok(set.contains(ip)),
            None => Err(Error::NotReady),
        }
    }

    /// Check whether at least one refresh has completed, without blocking.
    pub fn ready(&self) -> bool {
        self.ready.is_notified()
    }

    /// Block until the first refresh completes.
    pub fn wait_ready(&self) {
        self.ready.wait()
    }

    /// Block until the first refresh completes or the timeout elapses.
    /// Returns `true` if the manager became ready within the timeout.
    pub fn wait_ready_timeout(&self, timeout: Duration) -> bool {
        self.ready.wait_timeout(timeout)
    }

    /// Number of ranges in the currently published set, if any.
    pub fn active_len(&self) -> Option<usize> {
        self.active.load().as_ref().map(|set| set.len())
    }
}

/// Handle to the background refresh task.
///
/// The task repeats the manager's refresh cycle on its configured interval
/// until [`stop`](Self::stop) is called or a refresh fails. A failed refresh
/// terminates the loop; the last published set stays active, and the error is
/// surfaced through [`stop`](Self::stop) so the host can decide to shut the
/// process down rather than run indefinitely on stale data.
pub struct RefreshHandle {
    shutdown: Sender<()>,
    thread: JoinHandle<Result<()>>,
}

impl RefreshHandle {
    /// Run the first refresh synchronously, then keep refreshing on the
    /// manager's interval from a dedicated background thread.
    ///
    /// An error from the first refresh is returned directly and no thread is
    /// spawned; the manager never becomes ready in that case.
    pub fn start(manager: Arc<ExceptionManager>) -> Result<Self> {
        manager.refresh()?;

        let (shutdown, ticks) = mpsc::channel();
        let interval = manager.refresh_interval;
        let thread = thread::Builder::new()
            .name("ipexempt-refresh".into())
            .spawn(move || loop {
                match ticks.recv_timeout(interval) {
                    Ok(()) | Err(RecvTimeoutError::Disconnected) => return Ok(()),
                    Err(RecvTimeoutError::Timeout) => {}
                }
                if let Err(e) = manager.refresh() {
                    log::error!("exception refresh failed: {}", e);
                    return Err(e);
                }
            })?;

        Ok(Self { shutdown, thread })
    }

    /// Check whether the background task has terminated, without blocking.
    ///
    /// The task only terminates on [`stop`](Self::stop) or after a failed
    /// refresh, so a finished task before any stop request means the loop
    /// died and the host should treat the exception data as going stale.
    pub fn is_finished(&self) -> bool {
        self.thread.is_finished()
    }

    /// Stop the background task and wait for it to terminate.
    ///
    /// Returns the error that killed the loop, if a refresh failed before
    /// the stop request arrived.
    pub fn stop(self) -> Result<()> {
        let _ = self.shutdown.send(());
        match self.thread.join() {
            Ok(result) => result,
            Err(_) => Err(Error::Refresh("refresh thread panicked".to_string())),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;
    use tempfile::NamedTempFile;

    fn manager_with_lines(lines: &str) -> (ExceptionManager, NamedTempFile) {
        let mut file = NamedTempFile::new().unwrap();
        write!(file, "{}", lines).unwrap();
        file.flush().unwrap();

        let manager = ExceptionManager::new(ExceptionSources {
            files: vec![file.path().to_path_buf()],
            provider_feed: false,
        });
        (manager, file)
    }

    #[test]
    fn test_refresh_and_query() {
        let (manager, _file) = manager_with_lines("10.0.0.0/8\n");
        manager.refresh().unwrap();

        assert!(manager.is_exception("10.1.2.3").unwrap());
        assert!(!manager.is_exception("8.8.8.8").unwrap());
        assert_eq!(manager.active_len(), Some(1));
    }

    #[test]
    fn test_query_before_publish() {
        let (manager, _file) = manager_with_lines("10.0.0.0/8\n");

        assert!(!manager.ready());
        assert!(matches!(
            manager.is_exception("10.1.2.3"),
            Err(Error::NotReady)
        ));
    }

    #[test]
    fn test_mapped_notation_is_never_an_exception() {
        let (manager, _file) = manager_with_lines("192.168.0.0/16\n");
        manager.refresh().unwrap();

        assert!(!manager.is_exception("::ffff:192.168.0.1").unwrap());

        // The carve-out applies even before the first publish: no error.
        let (unpublished, _file) = manager_with_lines("192.168.0.0/16\n");
        assert!(!unpublished.is_exception("::ffff:192.168.0.1").unwrap());
    }

    #[test]
    fn test_invalid_address_query() {
        let (manager, _file) = manager_with_lines("10.0.0.0/8\n");
        manager.refresh().unwrap();

        assert!(matches!(
            manager.is_exception("not-an-address"),
            Err(Error::InvalidIpAddress(_))
        ));
    }

    #[test]
    fn test_readiness_latches_on_first_refresh() {
        let (manager, _file) = manager_with_lines("10.0.0.0/8\n");
        assert!(!manager.ready());

        manager.refresh().unwrap();
        assert!(manager.ready());
        manager.wait_ready();
        assert!(manager.wait_ready_timeout(Duration::from_millis(0)));

        // A second refresh leaves readiness latched.
        manager.refresh().unwrap();
        assert!(manager.ready());
    }

    #[test]
    fn test_failed_refresh_keeps_previous_set() {
        let (manager, mut file) = manager_with_lines("10.0.0.0/8\n");
        manager.refresh().unwrap();

        // Corrupt the source; the next refresh must fail without touching
        // the published set.
        writeln!(file, "bogus").unwrap();
        file.flush().unwrap();

        assert!(manager.refresh().is_err());
        assert!(manager.is_exception("10.1.2.3").unwrap());
        assert_eq!(manager.active_len(), Some(1));
    }

    #[test]
    fn test_refresh_replaces_set() {
        let (manager, file) = manager_with_lines("10.0.0.0/8\n");
        manager.refresh().unwrap();
        assert!(!manager.is_exception("192.168.1.1").unwrap());

        std::fs::write(file.path(), "10.0.0.0/8\n192.168.0.0/16\n").unwrap();
        manager.refresh().unwrap();

        assert!(manager.is_exception("10.1.2.3").unwrap());
        assert!(manager.is_exception("192.168.1.1").unwrap());
        assert_eq!(manager.active_len(), Some(2));
    }

    #[test]
    fn test_concurrent_queries_during_swaps() {
        let (manager, file) = manager_with_lines("10.0.0.0/8\n");
        manager.refresh().unwrap();
        let manager = Arc::new(manager);

        let readers: Vec<_> = (0..4)
            .map(|_| {
                let manager = Arc::clone(&manager);
                thread::spawn(move || {
                    for _ in 0..2_000 {
                        // Present in every generation.
                        assert!(manager.is_exception("10.1.2.3").unwrap());
                        // Present only in even generations; either answer is
                        // fine, but it must never be an error.
                        manager.is_exception("192.168.1.1").unwrap();
                    }
                })
            })
            .collect();

        for i in 0..50 {
            let contents = if i % 2 == 0 {
                "10.0.0.0/8\n192.168.0.0/16\n"
            } else {
                "10.0.0.0/8\n"
            };
            std::fs::write(file.path(), contents).unwrap();
            manager.refresh().unwrap();
        }

        for reader in readers {
            reader.join().unwrap();
        }
    }
}

//! ipexempt - CIDR exception sets for IP reputation scoring.
//!
//! This crate is the exception-membership subsystem of an IP reputation
//! service: it decides whether an address belongs to a set of CIDR ranges
//! that are unconditionally exempt from reputation penalties (cloud provider
//! ranges, internal networks, and so on).
//!
//! # Features
//!
//! - **Longest-prefix membership**: IPv4 and IPv6 lookups bounded by address
//!   bit-length, independent of how many ranges are configured
//! - **File and feed sources**: local newline-delimited CIDR files plus an
//!   optional provider-published IP range feed
//! - **Hot publish**: each refresh builds a fresh immutable set and installs
//!   it with an atomic pointer swap; queries never lock against a refresh
//! - **Periodic refresh**: a dedicated background task rebuilds the set on a
//!   fixed interval, cancellable for clean shutdown
//! - **Readiness gating**: a one-shot signal fires once the first set is
//!   published, so the host can delay accepting traffic until then
//!
//! # Quick Start
//!
//! ```no_run
//! use ipexempt::{ExceptionManager, ExceptionSources, RefreshHandle};
//! use std::sync::Arc;
//!
//! # fn main() -> ipexempt::Result<()> {
//! let manager = Arc::new(ExceptionManager::new(ExceptionSources {
//!     files: vec!["exceptions.txt".into()],
//!     provider_feed: false,
//! }));
//!
//! // Loads once synchronously, then hourly in the background.
//! let refresher = RefreshHandle::start(Arc::clone(&manager))?;
//!
//! if manager.is_exception("10.1.2.3")? {
//!     // skip reputation scoring for this address
//! }
//!
//! refresher.stop()?;
//! # Ok(())
//! # }
//! ```
//!
//! # Failure posture
//!
//! A broken exception source is treated as unsafe to run with silently: any
//! unreadable file, malformed CIDR line, or feed failure aborts the whole
//! load cycle with no partial publish. At startup the error is returned from
//! [`RefreshHandle::start`]; during steady state it terminates the refresh
//! task, which [`RefreshHandle::stop`] reports so the host can fail the
//! process instead of serving from data that has quietly stopped updating.

mod error;
mod manager;
mod set;
mod signal;
mod source;

// Re-export core types
pub use error::{Error, Result};
pub use manager::{ExceptionManager, RefreshHandle, REFRESH_INTERVAL};
pub use set::ExceptionSet;
pub use signal::ReadySignal;
pub use source::{ExceptionSources, PROVIDER_RANGE_URL};

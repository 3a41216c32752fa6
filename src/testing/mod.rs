//! Testing infrastructure for devflow.
//!
//! In-memory implementations of the [`crate::ports`] traits with
//! controllable behavior, so the orchestrator, triage engine and fixer can
//! be exercised without a tracker, a repository host or an assistant binary.
//!
//! # Example
//!
//! ```rust,ignore
//! use devflow::testing::{MockHostClient, MockTrackerClient};
//!
//! let tracker = MockTrackerClient::new().with_task(task_data);
//! let host = MockHostClient::new().with_branch("main");
//! ```

pub mod mocks;

pub use mocks::{MockAssistant, MockHostClient, MockTrackerClient};

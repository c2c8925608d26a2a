//! Collection pipeline
//!
//! ```text
//! pre-flight ─► projects ─► branches ─► per-branch steps ─► merge ─► RunSnapshot
//!                   (paged)    (1 call)    (worker pool)      (barrier)
//! ```
//!
//! Branch collections are independent and run on a bounded rayon pool.
//! Project counters and score inputs are only touched after every branch
//! task of that project has finished.

mod branch;
mod enumerator;
mod outcome;
mod run;

pub use branch::{quality_gate_history, BranchCollector, BranchOutcome};
pub use enumerator::{Enumerator, Listing};
pub use outcome::{CollectError, RunError, StepContext};
pub use run::{CollectOptions, Collector, ProgressCallback};

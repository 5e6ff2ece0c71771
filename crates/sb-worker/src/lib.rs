//! Worker fabric: three cancellable loop primitives (poll, ticker,
//! single-ticker) sharing one cancellation/panic-recovery contract, plus
//! the three concrete patterns built from them — the queue claim/retry
//! loop, the weekly scheduler, and advisory-locked periodic jobs.

pub mod advisory;
pub mod guard;
pub mod loops;
pub mod queue_worker;
pub mod schedule;

pub use advisory::run_with_advisory_lock;
pub use guard::run_guarded;
pub use loops::{
    BoxFuture, PeriodicTask, TaskFn, TickerTask, poll_loop, single_ticker_loop, ticker_loop,
};
pub use queue_worker::{QueueWorkerConfig, run_queue_worker};
pub use schedule::{DEFAULT_GRACE, WeeklySchedule, should_run_weekly};

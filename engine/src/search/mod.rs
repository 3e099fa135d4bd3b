
pub mod calculator;
pub use self::calculator::{NodeCalculator, SearchStatus};

pub mod config;

pub mod pool;
pub use self::pool::WorkerPool;

pub mod sync;

pub mod worker;
pub use self::worker::{Interruption, Task, Worker, WorkerStatus};


use std::sync::{Arc, Mutex};

use super::worker::{Task, Worker, WorkerStatus};

use utils::log;
use utils::*;

///
/// A fixed set of workers behind a round-robin dispatcher. The pool can be
/// drained (wait for every queue to empty), swept (interrupt everything and
/// drop all queues) and resized; shrinking interrupts the workers about to
/// be removed before their threads are joined.
///
pub struct WorkerPool
{
    name: String,
    inner: Mutex<PoolInner>
}

struct PoolInner
{
    workers: Vec<Arc<Worker>>,
    rotation: usize
}

impl WorkerPool
{
    ///
    /// Returns the number of workers currently running a task.
    ///
    pub fn active_worker_count (& self) -> usize
    {
        self.snapshot().iter()
            .filter(|worker| worker.status() == WorkerStatus::Working)
            .count()
    }

    ///
    /// Interrupts every worker and drops every queued task. When this
    /// returns, every worker is idle and every queue is empty.
    ///
    pub fn interrupt_and_clear_queue (& self)
    {
        let workers = self.snapshot();

        for worker in & workers
        {
            worker.interrupt_and_clear_queue(false);
        }

        for worker in & workers
        {
            worker.wait();
        }
    }

    ///
    /// Returns a new pool of the given size.
    ///
    pub fn new (name: & str, size: usize) -> Result<WorkerPool>
    {
        let pool = WorkerPool
        {
            name: name.to_owned(),
            inner: Mutex::new(PoolInner { workers: Vec::new(), rotation: 0 })
        };
        pool.resize(size)?;
        Ok(pool)
    }

    ///
    /// Grows or shrinks the pool to the given size.
    ///
    pub fn resize (& self, size: usize) -> Result<()>
    {
        let mut inner = self.inner.lock().unwrap();

        if size > inner.workers.len()
        {
            while inner.workers.len() < size
            {
                let name = format!("{}{}", self.name, inner.workers.len());
                inner.workers.push(Arc::new(Worker::new(& name)?));
            }
        }
        else if size < inner.workers.len()
        {
            for worker in & inner.workers[size ..]
            {
                worker.interrupt_and_clear_queue(false);
            }
            inner.workers.truncate(size);
            inner.rotation = 0;
        }

        Ok(())
    }

    ///
    /// Hands a task to the next worker in the rotation.
    ///
    pub fn schedule (& self, task: Task)
    {
        let mut inner = self.inner.lock().unwrap();
        if inner.workers.is_empty()
        {
            log::error!("Pool '{}' has no workers; dropping a task.", self.name);
            return;
        }

        inner.rotation = (inner.rotation + 1) % inner.workers.len();
        let index = inner.rotation;
        inner.workers[index].schedule(task);
    }

    ///
    /// Returns the number of workers.
    ///
    pub fn size (& self) -> usize
    {
        self.inner.lock().unwrap().workers.len()
    }

    ///
    /// Blocks until every worker has drained its queue and become idle.
    ///
    pub fn wait (& self)
    {
        for worker in self.snapshot()
        {
            worker.wait();
        }
    }

    fn snapshot (& self) -> Vec<Arc<Worker>>
    {
        self.inner.lock().unwrap().workers.clone()
    }
}

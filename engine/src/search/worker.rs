
use std::collections::VecDeque;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Condvar, Mutex};
use std::thread;
use std::thread::JoinHandle;

use super::sync::Guard;

use utils::error::Interrupted;
use utils::log;
use utils::*;

///
/// A unit of work for a worker. Tasks receive the worker's interruption
/// token and are expected to call checkpoint() at loop boundaries; once the
/// worker is interrupted, the next checkpoint raises the cancellation
/// signal and the task unwinds by early return.
///
pub type Task = Box<dyn FnOnce (& Interruption) -> Result<()> + Send + 'static>;

///
/// The observable lifecycle of a worker. After the thread starts, the
/// worker settles in Idle; scheduling moves it through Scheduled and
/// Working, and every finished task passes through FinishedOne on the way
/// back to Idle.
///
#[derive(Clone, Copy, Debug, PartialEq, Eq, PartialOrd, Ord)]
pub enum WorkerStatus
{
    Initial,
    Idle,
    Scheduled,
    Working,
    FinishedOne
}

///
/// The cooperative cancellation token handed to every task.
///
#[derive(Clone, Debug)]
pub struct Interruption
{
    flag: Arc<AtomicBool>
}

impl Interruption
{
    ///
    /// Raises the cancellation signal if the owning worker has been
    /// interrupted, and returns cleanly otherwise.
    ///
    pub fn checkpoint (& self) -> Result<()>
    {
        match self.is_raised()
        {
            true  => Err(Interrupted.into()),
            false => Ok(())
        }
    }

    ///
    /// Determines whether an interrupt is pending.
    ///
    pub fn is_raised (& self) -> bool
    {
        self.flag.load(Ordering::SeqCst)
    }
}

struct WorkerShared
{
    name: String,
    queue: Mutex<VecDeque<Task>>,
    queue_signal: Condvar,
    status: Guard<WorkerStatus>,
    interrupt_flag: Arc<AtomicBool>,
    quit: AtomicBool
}

///
/// A single-threaded task executor: a FIFO queue drained by one background
/// thread, with a waitable status and cooperative interruption of the
/// running task. Destruction interrupts, wakes and joins the thread.
///
pub struct Worker
{
    shared: Arc<WorkerShared>,
    handle: Option<JoinHandle<()>>
}

impl Drop for Worker
{
    fn drop (& mut self)
    {
        self.shared.quit.store(true, Ordering::SeqCst);
        self.shared.interrupt_flag.store(true, Ordering::SeqCst);

        {
            let mut queue = self.shared.queue.lock().unwrap();
            queue.clear();
            self.shared.queue_signal.notify_all();
        }

        if let Some(handle) = self.handle.take()
        {
            let _ = handle.join();
        }
    }
}

impl Worker
{
    ///
    /// Interrupts the task currently being worked on, if any. Pending
    /// tasks stay queued. With join, blocks until the worker has left the
    /// Working status.
    ///
    pub fn interrupt (& self, join: bool)
    {
        if self.shared.status.get() == WorkerStatus::Working
        {
            self.shared.interrupt_flag.store(true, Ordering::SeqCst);
            if join
            {
                self.shared.status.wait_while(WorkerStatus::Working);
            }
        }
    }

    ///
    /// Interrupts the running task and drops everything still queued. With
    /// join, blocks until the worker has settled back in Idle.
    ///
    pub fn interrupt_and_clear_queue (& self, join: bool)
    {
        {
            let mut queue = self.shared.queue.lock().unwrap();
            queue.clear();
            self.shared.interrupt_flag.store(true, Ordering::SeqCst);
            self.shared.queue_signal.notify_all();
        }

        if join
        {
            self.shared.status.wait(WorkerStatus::Idle);
        }
    }

    ///
    /// Returns the worker's name.
    ///
    pub fn name (& self) -> & str
    {
        & self.shared.name
    }

    ///
    /// Spawns a new worker thread with the given name.
    ///
    pub fn new (name: & str) -> Result<Worker>
    {
        let shared = Arc::new(WorkerShared
        {
            name: name.to_owned(),
            queue: Mutex::new(VecDeque::new()),
            queue_signal: Condvar::new(),
            status: Guard::new(WorkerStatus::Initial),
            interrupt_flag: Arc::new(AtomicBool::new(false)),
            quit: AtomicBool::new(false)
        });

        let handle =
        {
            let shared = shared.clone();
            thread::Builder::new()
                .name(name.to_owned())
                .spawn(move || Worker::run(& shared))?
        };

        Ok(Worker { shared, handle: Some(handle) })
    }

    ///
    /// Enqueues a task and wakes the thread.
    ///
    pub fn schedule (& self, task: Task)
    {
        let mut queue = self.shared.queue.lock().unwrap();
        queue.push_back(task);

        if self.shared.status.get() <= WorkerStatus::Idle
        {
            self.shared.status.set(WorkerStatus::Scheduled);
        }

        self.shared.queue_signal.notify_all();
    }

    ///
    /// Returns the number of queued tasks, not counting the one being
    /// worked on.
    ///
    pub fn size (& self) -> usize
    {
        self.shared.queue.lock().unwrap().len()
    }

    ///
    /// Returns the current status.
    ///
    pub fn status (& self) -> WorkerStatus
    {
        self.shared.status.get()
    }

    ///
    /// Blocks until the queue is empty and the worker has become idle.
    ///
    pub fn wait (& self)
    {
        self.wait_for_status(WorkerStatus::Idle);
    }

    ///
    /// Blocks until the worker's status equals the given one.
    ///
    pub fn wait_for_status (& self, status: WorkerStatus)
    {
        self.shared.status.wait(status);
    }

    fn next_task (shared: & WorkerShared) -> Option<Task>
    {
        let mut queue = shared.queue.lock().unwrap();
        loop
        {
            if shared.quit.load(Ordering::SeqCst)
            {
                return None;
            }

            if let Some(task) = queue.pop_front()
            {
                shared.interrupt_flag.store(false, Ordering::SeqCst);
                return Some(task);
            }

            shared.status.set(WorkerStatus::Idle);
            queue = shared.queue_signal.wait(queue).unwrap();
        }
    }

    fn run (shared: & Arc<WorkerShared>)
    {
        while ! shared.quit.load(Ordering::SeqCst)
        {
            let task = match Worker::next_task(shared)
            {
                Some(task) => task,
                None       => break
            };

            shared.status.set(WorkerStatus::Working);

            let interruption = Interruption { flag: shared.interrupt_flag.clone() };
            match task(& interruption)
            {
                Ok(())                            => {},
                Err(err) if Interrupted::caused(& err) => {},
                Err(err)                          =>
                {
                    log::error!("Worker '{}' task failed: {:#}.", shared.name, err);
                }
            };

            shared.status.set(WorkerStatus::FinishedOne);
        }
    }
}

#[cfg(test)]
mod test
{
    use super::*;
    use std::time::{Duration, Instant};
    use utils::*;

    fn sleep_task (ms: u64) -> Task
    {
        Box::new(move |_interruption|
        {
            thread::sleep(Duration::from_millis(ms));
            Ok(())
        })
    }

    fn busy_task () -> Task
    {
        Box::new(|interruption|
        {
            loop
            {
                interruption.checkpoint()?;
                thread::sleep(Duration::from_millis(1));
            }
        })
    }

    #[test]
    fn fresh_worker_settles_idle ()
    {
        let worker = Worker::new("test-worker").unwrap();
        assert_eq!(worker.name(), "test-worker");
        worker.wait();
        worker.interrupt(false);
        worker.interrupt_and_clear_queue(true);
        assert_eq!(worker.size(), 0);
    }

    #[test]
    fn wait_blocks_until_the_task_is_done ()
    {
        let worker = Worker::new("test-worker").unwrap();
        let start = Instant::now();
        worker.schedule(sleep_task(100));
        worker.wait_for_status(WorkerStatus::Working);
        assert_eq!(worker.size(), 0);
        worker.wait();
        assert!(start.elapsed() < Duration::from_millis(400));
        assert!(start.elapsed() >= Duration::from_millis(100));
    }

    #[test]
    fn interrupt_cancels_only_the_running_task ()
    {
        let worker = Worker::new("test-worker").unwrap();
        for _ in 0 .. 5
        {
            worker.schedule(busy_task());
        }
        worker.wait_for_status(WorkerStatus::Working);
        assert_eq!(worker.size(), 4);

        worker.interrupt(true);
        assert!(worker.size() < 5);

        worker.interrupt_and_clear_queue(true);
        assert_eq!(worker.size(), 0);
        assert_eq!(worker.status(), WorkerStatus::Idle);
    }

    #[test]
    fn interrupt_twice_equals_interrupt_once ()
    {
        let worker = Worker::new("test-worker").unwrap();
        worker.schedule(busy_task());
        worker.wait_for_status(WorkerStatus::Working);
        worker.interrupt(true);
        worker.interrupt(true);
        worker.interrupt_and_clear_queue(true);
        worker.interrupt_and_clear_queue(true);
        assert_eq!(worker.size(), 0);
    }

    #[test]
    fn task_failures_do_not_kill_the_worker ()
    {
        let worker = Worker::new("test-worker").unwrap();
        worker.schedule(Box::new(|_| Err(error::error!("deliberate failure"))));
        worker.schedule(sleep_task(1));
        worker.wait();
        assert_eq!(worker.size(), 0);
    }
}

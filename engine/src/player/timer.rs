
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::Arc;
use std::thread;
use std::thread::JoinHandle;
use std::time::{Duration, Instant};

use utils::*;

///
/// A periodic task on its own named thread: the callback fires whenever the
/// configured interval has elapsed on the monotonic clock. The interval can
/// be changed while running; gravity does this when the level rises.
///
/// Each periodic concern owns its own ticker, so that a slow callback never
/// delays an unrelated one.
///
pub struct Ticker
{
    interval_ms: Arc<AtomicU64>,
    quit: Arc<AtomicBool>,
    handle: Option<JoinHandle<()>>
}

impl Drop for Ticker
{
    fn drop (& mut self)
    {
        self.quit.store(true, Ordering::SeqCst);
        if let Some(handle) = self.handle.take()
        {
            let _ = handle.join();
        }
    }
}

impl Ticker
{
    ///
    /// Returns the current firing interval.
    ///
    pub fn interval_ms (& self) -> u64
    {
        self.interval_ms.load(Ordering::SeqCst)
    }

    ///
    /// Changes the firing interval.
    ///
    pub fn set_interval_ms (& self, interval_ms: u64)
    {
        self.interval_ms.store(interval_ms.max(1), Ordering::SeqCst);
    }

    ///
    /// Spawns a ticker firing the callback every interval_ms milliseconds.
    /// The interval handle may be shared; writes through it take effect on
    /// the next firing.
    ///
    pub fn spawn (name: & str,
                  interval_ms: Arc<AtomicU64>,
                  mut tick: impl FnMut () + Send + 'static) -> Result<Ticker>
    {
        let quit = Arc::new(AtomicBool::new(false));

        let handle =
        {
            let quit = quit.clone();
            let interval_ms = interval_ms.clone();

            thread::Builder::new()
                .name(name.to_owned())
                .spawn(move ||
                {
                    let mut last_fired = Instant::now();
                    while ! quit.load(Ordering::SeqCst)
                    {
                        let interval = interval_ms.load(Ordering::SeqCst).max(1);
                        let base = (interval / 3).clamp(1, 10);
                        thread::sleep(Duration::from_millis(base));

                        if quit.load(Ordering::SeqCst)
                        {
                            break;
                        }

                        if last_fired.elapsed() >= Duration::from_millis(interval)
                        {
                            last_fired = Instant::now();
                            tick();
                        }
                    }
                })?
        };

        Ok(Ticker { interval_ms, quit, handle: Some(handle) })
    }

    ///
    /// Spawns a ticker with a fixed starting interval.
    ///
    pub fn with_interval (name: & str, interval_ms: u64, tick: impl FnMut () + Send + 'static) -> Result<Ticker>
    {
        Ticker::spawn(name, Arc::new(AtomicU64::new(interval_ms.max(1))), tick)
    }
}

#[cfg(test)]
mod test
{
    use super::*;
    use std::sync::atomic::AtomicUsize;

    #[test]
    fn fires_repeatedly ()
    {
        let count = Arc::new(AtomicUsize::new(0));
        let ticker =
        {
            let count = count.clone();
            Ticker::with_interval("ticker-test", 10, move || { count.fetch_add(1, Ordering::SeqCst); }).unwrap()
        };

        thread::sleep(Duration::from_millis(120));
        drop(ticker);

        let fired = count.load(Ordering::SeqCst);
        assert!(fired >= 3);
    }

    #[test]
    fn drop_stops_the_thread ()
    {
        let count = Arc::new(AtomicUsize::new(0));
        let ticker =
        {
            let count = count.clone();
            Ticker::with_interval("ticker-test", 5, move || { count.fetch_add(1, Ordering::SeqCst); }).unwrap()
        };

        thread::sleep(Duration::from_millis(50));
        drop(ticker);
        let after_drop = count.load(Ordering::SeqCst);

        thread::sleep(Duration::from_millis(50));
        assert_eq!(count.load(Ordering::SeqCst), after_drop);
    }
}

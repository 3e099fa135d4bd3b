
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, RwLock};

use tetris::{Direction, Game};

use super::timer::Ticker;

use utils::*;

///
/// Milliseconds between two forced drops, indexed by level.
///
const INTERVALS : [u64; 21] =
[
    887, 820, 753, 686, 619,
    552, 469, 368, 285, 184,
    167, 151, 134, 117, 100,
    100, 84, 84, 67, 67, 50
];

///
/// The highest level with its own drop interval.
///
pub const MAX_LEVEL : i32 = INTERVALS.len() as i32 - 1;

///
/// The gravity timer: a periodic writer that forces the active block one
/// row down at level-scaled intervals. Paused and finished games are left
/// alone. After each drop the level is re-read and the interval adjusted.
///
pub struct Gravity
{
    _ticker: Ticker
}

impl Gravity
{
    ///
    /// Attaches gravity to the given game.
    ///
    pub fn new<G> (game: & Arc<RwLock<G>>) -> Result<Gravity>
        where G: Game + 'static
    {
        let level = game.read().unwrap().level();
        let interval = Arc::new(AtomicU64::new(interval_for_level(level)));

        let ticker =
        {
            let game = game.clone();
            let interval = interval.clone();

            Ticker::spawn("gravity", interval.clone(), move ||
            {
                let mut locked = game.write().unwrap();
                if locked.is_game_over() || locked.is_paused()
                {
                    return;
                }

                locked.move_block(Direction::Down);
                let level = locked.level();
                drop(locked);

                interval.store(interval_for_level(level), Ordering::SeqCst);
            })?
        };

        Ok(Gravity { _ticker: ticker })
    }

    ///
    /// Returns the number of rows a block falls per second at the given
    /// level.
    ///
    pub fn speed_for_level (level: i32) -> f64
    {
        1000.0 / interval_for_level(level) as f64
    }
}

fn interval_for_level (level: i32) -> u64
{
    INTERVALS[level.clamp(0, MAX_LEVEL) as usize]
}

#[cfg(test)]
mod test
{
    use super::*;
    use std::thread;
    use std::time::Duration;
    use tetris::{BlockBag, ComputerGame};

    #[test]
    fn speed_rises_with_the_level ()
    {
        assert!(Gravity::speed_for_level(0) < Gravity::speed_for_level(9));
        assert!(Gravity::speed_for_level(9) < Gravity::speed_for_level(MAX_LEVEL));
        assert_eq!(Gravity::speed_for_level(MAX_LEVEL), Gravity::speed_for_level(MAX_LEVEL + 5));
        assert_eq!(Gravity::speed_for_level(-1), Gravity::speed_for_level(0));
    }

    #[test]
    fn gravity_pulls_the_active_block_down ()
    {
        let game = Arc::new(RwLock::new(ComputerGame::with_bag(20, 10, BlockBag::with_seed(1, 7))));
        game.write().unwrap().set_starting_level(MAX_LEVEL);

        let gravity = Gravity::new(& game).unwrap();
        thread::sleep(Duration::from_millis(400));
        drop(gravity);

        let moved = game.read().unwrap().active_block().row() > 0
            || game.read().unwrap().current_node().lock().unwrap().depth() > 0;
        assert!(moved);
    }

    #[test]
    fn paused_games_do_not_fall ()
    {
        let game = Arc::new(RwLock::new(ComputerGame::with_bag(20, 10, BlockBag::with_seed(1, 7))));
        game.write().unwrap().set_starting_level(MAX_LEVEL);
        game.write().unwrap().set_paused(true);

        let gravity = Gravity::new(& game).unwrap();
        thread::sleep(Duration::from_millis(200));
        drop(gravity);

        assert_eq!(game.read().unwrap().active_block().row(), 0);
        assert_eq!(game.read().unwrap().current_node().lock().unwrap().depth(), 0);
    }
}

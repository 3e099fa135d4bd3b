
use std::collections::VecDeque;
use std::sync::{Arc, Mutex, RwLock};
use std::time::{Duration, Instant};

use tetris::{Block, ComputerGame, Direction, Game};

use super::timer::Ticker;

use utils::*;

///
/// What the actuator does when the active block already matches the planned
/// rotation and column.
///
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum DownBehavior
{
    Step,
    Drop
}

///
/// One steering decision: what to do to bring the active block closer to
/// its planned landing.
///
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum MoverStep
{
    Rotate,
    MoveLeft,
    MoveRight,
    Descend
}

///
/// Compares the active block against the planned one and picks the next
/// steering step: rotation first, then column, then descent.
///
pub fn plan_step (active: & Block, target: & Block) -> MoverStep
{
    if active.rotation() != target.rotation()
    {
        MoverStep::Rotate
    }
    else if active.column() < target.column()
    {
        MoverStep::MoveRight
    }
    else if active.column() > target.column()
    {
        MoverStep::MoveLeft
    }
    else
    {
        MoverStep::Descend
    }
}

struct MoverShared
{
    game: Arc<RwLock<ComputerGame>>,
    interval_ms: Mutex<f64>,
    behavior: Mutex<DownBehavior>,
    last_moved: Mutex<Instant>,
    history: Mutex<VecDeque<Instant>>
}

///
/// The actuator that walks the live active block toward the first planned
/// child: a periodic task firing at the configured move rate, issuing one
/// rotate/shift/descend per firing. A rotate or shift that fails gives up
/// on steering and drops the block where it is.
///
pub struct BlockMover
{
    shared: Arc<MoverShared>,
    _ticker: Ticker
}

impl BlockMover
{
    ///
    /// Returns the measured move rate over the last four seconds.
    ///
    pub fn actual_speed (& self) -> f64
    {
        let mut history = self.shared.history.lock().unwrap();
        let horizon = Instant::now() - Duration::from_secs(4);
        while history.front().map_or(false, |& fired| fired < horizon)
        {
            history.pop_front();
        }
        history.len() as f64 / 4.0
    }

    ///
    /// Returns the down behavior.
    ///
    pub fn down_behavior (& self) -> DownBehavior
    {
        * self.shared.behavior.lock().unwrap()
    }

    ///
    /// Returns the time between two moves.
    ///
    pub fn interval_ms (& self) -> u64
    {
        (0.5 + * self.shared.interval_ms.lock().unwrap()) as u64
    }

    ///
    /// Attaches a new mover to the given game.
    ///
    pub fn new (game: & Arc<RwLock<ComputerGame>>) -> Result<BlockMover>
    {
        let shared = Arc::new(MoverShared
        {
            game: game.clone(),
            interval_ms: Mutex::new(50.0),
            behavior: Mutex::new(DownBehavior::Step),
            last_moved: Mutex::new(Instant::now()),
            history: Mutex::new(VecDeque::new())
        });

        let ticker =
        {
            let shared = shared.clone();
            Ticker::with_interval("block-mover", 10, move || BlockMover::tick(& shared))?
        };

        Ok(BlockMover { shared, _ticker: ticker })
    }

    ///
    /// Changes the down behavior.
    ///
    pub fn set_down_behavior (& self, behavior: DownBehavior)
    {
        * self.shared.behavior.lock().unwrap() = behavior;
    }

    ///
    /// Sets the move rate, clamped to 1..=1000 moves per second.
    ///
    pub fn set_speed (& self, moves_per_second: u64)
    {
        let moves_per_second = moves_per_second.clamp(1, 1000);
        * self.shared.interval_ms.lock().unwrap() = 1000.0 / moves_per_second as f64;
    }

    ///
    /// Returns the configured move rate in moves per second.
    ///
    pub fn speed (& self) -> u64
    {
        (0.5 + 1000.0 / * self.shared.interval_ms.lock().unwrap()) as u64
    }

    fn tick (shared: & MoverShared)
    {
        let due =
        {
            let interval = Duration::from_micros((1000.0 * * shared.interval_ms.lock().unwrap()) as u64);
            let mut last_moved = shared.last_moved.lock().unwrap();
            if last_moved.elapsed() < interval
            {
                false
            }
            else
            {
                * last_moved = Instant::now();
                true
            }
        };

        if ! due
        {
            return;
        }

        if BlockMover::advance(shared)
        {
            shared.history.lock().unwrap().push_back(Instant::now());
        }
    }

    ///
    /// Performs one steering action. Returns whether anything was done.
    ///
    fn advance (shared: & MoverShared) -> bool
    {
        let mut game = shared.game.write().unwrap();

        if game.is_paused() || game.is_game_over()
        {
            return false;
        }

        let planned = match game.current_node().lock().unwrap().first_child()
        {
            Some(planned) => planned,
            None          => return false
        };

        let target = match planned.lock().unwrap().state().original_block()
        {
            Some(target) => target.clone(),
            None         => return false
        };

        let active = game.active_block();
        if active.block_type() != target.block_type()
        {
            // The plan no longer matches what is falling.
            game.clear_precalculated_nodes();
            return false;
        }

        match plan_step(& active, & target)
        {
            MoverStep::Rotate =>
            {
                if ! game.rotate()
                {
                    game.drop_and_commit();
                }
            },
            MoverStep::MoveRight =>
            {
                if ! game.move_block(Direction::Right)
                {
                    game.drop_and_commit();
                }
            },
            MoverStep::MoveLeft =>
            {
                if ! game.move_block(Direction::Left)
                {
                    game.drop_and_commit();
                }
            },
            MoverStep::Descend =>
            {
                match * shared.behavior.lock().unwrap()
                {
                    DownBehavior::Step => { game.move_block(Direction::Down); },
                    DownBehavior::Drop => game.drop_and_commit()
                };
            }
        };

        true
    }
}

#[cfg(test)]
mod test
{
    use super::*;
    use std::thread;
    use tetris::node::SearchNode;
    use tetris::BlockBag;

    #[test]
    fn steering_prefers_rotation_then_column ()
    {
        let active = Block::new(tetris::BlockType::T, 0, 0, 4);

        let rotated = Block::new(tetris::BlockType::T, 1, 10, 4);
        assert_eq!(plan_step(& active, & rotated), MoverStep::Rotate);

        let right = Block::new(tetris::BlockType::T, 0, 10, 7);
        assert_eq!(plan_step(& active, & right), MoverStep::MoveRight);

        let left = Block::new(tetris::BlockType::T, 0, 10, 1);
        assert_eq!(plan_step(& active, & left), MoverStep::MoveLeft);

        let aligned = Block::new(tetris::BlockType::T, 0, 10, 4);
        assert_eq!(plan_step(& active, & aligned), MoverStep::Descend);
    }

    #[test]
    fn mover_follows_the_plan_to_commit ()
    {
        let game = Arc::new(RwLock::new(ComputerGame::with_bag(20, 10, BlockBag::with_seed(1, 11))));

        // Plan the active block two columns to the right, rotated once.
        let planned =
        {
            let locked = game.read().unwrap();
            let current = locked.current_node();
            let state =
            {
                let node = current.lock().unwrap();
                let mut block = locked.active_block();
                block.rotate();
                block.set_column(block.column() + 2);
                let mut row = 0;
                while node.state().check_position_valid(& block, row, block.column())
                {
                    row += 1;
                }
                block.set_row(row - 1);
                node.state().commit(& block, false)
            };
            SearchNode::offspring(& current, state)
        };
        game.write().unwrap().append_precalculated_node(planned.clone()).unwrap();

        let mover = BlockMover::new(& game).unwrap();
        mover.set_speed(500);
        mover.set_down_behavior(DownBehavior::Drop);

        let deadline = Instant::now() + Duration::from_secs(5);
        while Instant::now() < deadline
        {
            if Arc::ptr_eq(& game.read().unwrap().current_node(), & planned)
            {
                break;
            }
            thread::sleep(Duration::from_millis(5));
        }
        drop(mover);

        assert!(Arc::ptr_eq(& game.read().unwrap().current_node(), & planned));
        assert_eq!(game.read().unwrap().num_precalculated_moves(), 0);
    }

    #[test]
    fn paused_games_are_left_alone ()
    {
        let game = Arc::new(RwLock::new(ComputerGame::with_bag(20, 10, BlockBag::with_seed(1, 11))));
        game.write().unwrap().set_paused(true);

        let mover = BlockMover::new(& game).unwrap();
        mover.set_speed(1000);
        thread::sleep(Duration::from_millis(100));

        assert_eq!(game.read().unwrap().active_block().row(), 0);
        assert_eq!(mover.actual_speed(), 0.0);
    }

    #[test]
    fn speed_is_clamped ()
    {
        let game = Arc::new(RwLock::new(ComputerGame::with_bag(20, 10, BlockBag::with_seed(1, 11))));
        let mover = BlockMover::new(& game).unwrap();

        mover.set_speed(0);
        assert_eq!(mover.speed(), 1);
        mover.set_speed(5000);
        assert_eq!(mover.speed(), 1000);
    }
}

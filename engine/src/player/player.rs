
use std::sync::{Arc, Mutex, RwLock};

use tetris::node::{self, NodePtr};
use tetris::{ComputerGame, Evaluator, Game, GameState};

use crate::search::{NodeCalculator, SearchStatus, Worker, WorkerPool};

use super::gravity::Gravity;
use super::mover::{BlockMover, DownBehavior};
use super::timer::Ticker;

use utils::log;
use utils::*;

///
/// The search hyper-parameters a tweaker may override before each round.
///
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct SearchSettings
{
    pub search_depth: usize,
    pub search_width: usize,
    pub worker_count: usize,
    pub move_speed: u64
}

///
/// An injected strategy consulted before each search round. It sees the
/// state the search will start from, may adjust the settings in place, and
/// returns the evaluator to score the round with.
///
pub trait Tweaker : Send
{
    ///
    /// Picks the evaluator and settings for the next search round.
    ///
    fn update_parameters (& mut self, state: & GameState, settings: & mut SearchSettings) -> Evaluator;
}

struct PlayerShared
{
    calculator: Option<NodeCalculator>,
    game: Arc<RwLock<ComputerGame>>,
    mover: BlockMover,
    pool: Arc<WorkerPool>,
    main_worker: Arc<Worker>,
    evaluator: Evaluator,
    tweaker: Option<Box<dyn Tweaker>>,
    search_depth: usize,
    search_width: usize,
    worker_count: usize
}

///
/// The planning loop: decides when to start a search from the tail of the
/// precomputed chain, when to stop it early to beat the falling block, and
/// splices finished results back into the live timeline. Owns the worker
/// pool, the dedicated main worker hosting the search loop, and the block
/// mover executing the plan.
///
pub struct ComputerPlayer
{
    ticker: Option<Ticker>,
    shared: Arc<Mutex<PlayerShared>>
}

impl Drop for ComputerPlayer
{
    fn drop (& mut self)
    {
        self.ticker.take();

        let mut shared = self.shared.lock().unwrap();
        if let Some(calculator) = shared.calculator.take()
        {
            calculator.stop();
        }
        shared.pool.interrupt_and_clear_queue();
    }
}

impl ComputerPlayer
{
    ///
    /// Returns the highest completed ply of the running search, or zero.
    ///
    pub fn current_search_depth (& self) -> usize
    {
        let shared = self.shared.lock().unwrap();
        shared.calculator.as_ref().map_or(0, |calculator| calculator.current_search_depth())
    }

    ///
    /// Returns the configured move rate of the block mover.
    ///
    pub fn move_speed (& self) -> u64
    {
        self.shared.lock().unwrap().mover.speed()
    }

    ///
    /// Attaches a new computer player to the given game. A worker count of
    /// zero picks the default of roughly three quarters of the CPUs.
    ///
    pub fn new (game: & Arc<RwLock<ComputerGame>>,
                evaluator: Evaluator,
                search_depth: usize,
                search_width: usize,
                worker_count: usize) -> Result<ComputerPlayer>
    {
        validate_depth(search_depth)?;
        validate_width(search_width)?;
        validate_worker_count(worker_count)?;

        let workers = if worker_count == 0 { default_worker_count() } else { worker_count };
        let pool = Arc::new(WorkerPool::new("planner", workers)?);
        let main_worker = Arc::new(Worker::new("planner-main")?);
        let mover = BlockMover::new(game)?;

        log::info!("Computer player started with {} worker threads.", pool.size());

        let shared = Arc::new(Mutex::new(PlayerShared
        {
            calculator: None,
            game: game.clone(),
            mover,
            pool,
            main_worker,
            evaluator,
            tweaker: None,
            search_depth,
            search_width,
            worker_count: workers
        }));

        let ticker =
        {
            let shared = shared.clone();
            Ticker::with_interval("computer-player", 10, move || ComputerPlayer::tick(& shared))?
        };

        Ok(ComputerPlayer { ticker: Some(ticker), shared })
    }

    ///
    /// Returns the configured search depth.
    ///
    pub fn search_depth (& self) -> usize
    {
        self.shared.lock().unwrap().search_depth
    }

    ///
    /// Returns the configured search width.
    ///
    pub fn search_width (& self) -> usize
    {
        self.shared.lock().unwrap().search_width
    }

    ///
    /// Changes the down behavior of the block mover.
    ///
    pub fn set_down_behavior (& self, behavior: DownBehavior)
    {
        self.shared.lock().unwrap().mover.set_down_behavior(behavior);
    }

    ///
    /// Replaces the evaluator used for future rounds.
    ///
    pub fn set_evaluator (& self, evaluator: Evaluator)
    {
        self.shared.lock().unwrap().evaluator = evaluator;
    }

    ///
    /// Changes the move rate of the block mover.
    ///
    pub fn set_move_speed (& self, moves_per_second: u64)
    {
        self.shared.lock().unwrap().mover.set_speed(moves_per_second);
    }

    ///
    /// Changes the search depth for future rounds.
    ///
    pub fn set_search_depth (& self, search_depth: usize) -> Result<()>
    {
        validate_depth(search_depth)?;
        self.shared.lock().unwrap().search_depth = search_depth;
        Ok(())
    }

    ///
    /// Changes the search width for future rounds.
    ///
    pub fn set_search_width (& self, search_width: usize) -> Result<()>
    {
        validate_width(search_width)?;
        self.shared.lock().unwrap().search_width = search_width;
        Ok(())
    }

    ///
    /// Installs the strategy hook consulted before each round.
    ///
    pub fn set_tweaker (& self, tweaker: Box<dyn Tweaker>)
    {
        self.shared.lock().unwrap().tweaker = Some(tweaker);
    }

    ///
    /// Changes the worker count for future rounds; zero restores the
    /// default.
    ///
    pub fn set_worker_count (& self, worker_count: usize) -> Result<()>
    {
        validate_worker_count(worker_count)?;
        let mut shared = self.shared.lock().unwrap();
        shared.worker_count = if worker_count == 0 { default_worker_count() } else { worker_count };
        Ok(())
    }

    ///
    /// Returns the configured worker count.
    ///
    pub fn worker_count (& self) -> usize
    {
        self.shared.lock().unwrap().worker_count
    }

    fn tick (shared: & Arc<Mutex<PlayerShared>>)
    {
        let mut shared = shared.lock().unwrap();

        let status = shared.calculator.as_ref().map(|calculator| calculator.status());
        match status
        {
            Some(status) if ! status.is_terminal() =>
            {
                if let Some(calculator) = & shared.calculator
                {
                    ComputerPlayer::check_deadline(& shared, calculator);
                }
            },
            Some(SearchStatus::Error) =>
            {
                log::error!("Search round failed; retrying on a later tick.");
                shared.calculator = None;
            },
            Some(_) =>
            {
                let calculator = shared.calculator.take().unwrap();
                match calculator.result()
                {
                    Some(result) => { ComputerPlayer::splice_result(& shared.game, & result); },
                    None         => log::error!("The search did not produce any results.")
                };
            },
            None =>
            {
                ComputerPlayer::start_round(& mut shared);
            }
        };
    }

    ///
    /// While a search runs and the mover has nothing left to execute, stop
    /// the search once the falling block gets close to landing.
    ///
    fn check_deadline (shared: & PlayerShared, calculator: & NodeCalculator)
    {
        let (precalculated, remaining_ms) =
        {
            let game = shared.game.read().unwrap();
            let precalculated = game.num_precalculated_moves();
            let remaining_ms = match precalculated
            {
                0 => calculate_remaining_time_ms(& game, shared.mover.speed()),
                _ => i64::MAX
            };
            (precalculated, remaining_ms)
        };

        if precalculated == 0 && remaining_ms <= 1000
        {
            calculator.stop();
        }
    }

    ///
    /// Splices a search result onto the live timeline. The result must
    /// continue the precomputed chain exactly; anything else means the game
    /// moved on while the search was running.
    ///
    pub fn splice_result (game: & Arc<RwLock<ComputerGame>>, result: & NodePtr) -> bool
    {
        if result.lock().unwrap().state().is_game_over()
        {
            return false;
        }

        let mut game = game.write().unwrap();

        let end_depth = game.end_node().lock().unwrap().depth();
        let result_depth = result.lock().unwrap().depth();

        if result_depth != end_depth + 1
        {
            log::warn!("The computer is too slow: got a plan for depth {}, but the game sits at depth {}.",
                       result_depth, end_depth);
            return false;
        }

        match game.append_precalculated_node(result.clone())
        {
            Ok(())   => true,
            Err(err) =>
            {
                log::warn!("Discarding a search result: {:#}.", err);
                false
            }
        }
    }

    fn start_round (shared: & mut PlayerShared)
    {
        let (root, state, block_types) =
        {
            let mut game = shared.game.write().unwrap();

            let end = game.end_node();
            let end_locked = end.lock().unwrap();
            if end_locked.state().is_game_over()
            {
                return;
            }

            let end_depth = end_locked.depth();
            let current_depth = game.current_node().lock().unwrap().depth();
            if end_depth - current_depth >= 8
            {
                return;
            }

            let state = end_locked.state().clone();
            drop(end_locked);

            let block_types = game.get_future_blocks_with_offset(end_depth, shared.search_depth);
            (node::clone_tree(& end), state, block_types)
        };

        let mut settings = SearchSettings
        {
            search_depth: shared.search_depth,
            search_width: shared.search_width,
            worker_count: shared.worker_count,
            move_speed: shared.mover.speed()
        };

        let evaluator = match & mut shared.tweaker
        {
            Some(tweaker) =>
            {
                let evaluator = tweaker.update_parameters(& state, & mut settings);
                settings.search_depth = settings.search_depth.clamp(1, 100);
                settings.search_width = settings.search_width.clamp(1, 100);
                settings.worker_count = settings.worker_count.clamp(1, 128);
                evaluator
            },
            None => shared.evaluator.clone()
        };

        shared.mover.set_speed(settings.move_speed);

        if shared.pool.size() != settings.worker_count
        {
            if let Err(err) = shared.pool.resize(settings.worker_count)
            {
                log::error!("Resizing the worker pool failed: {:#}.", err);
                return;
            }
        }

        let block_types = block_types.into_iter().take(settings.search_depth).collect::<Vec<_>>();
        let widths = vec![settings.search_width; block_types.len()];

        match NodeCalculator::new(root, block_types, widths, evaluator,
                                  shared.main_worker.clone(), shared.pool.clone())
        {
            Ok(calculator) =>
            {
                calculator.start();
                shared.calculator = Some(calculator);
            },
            Err(err) =>
            {
                log::error!("Starting a search round failed: {:#}.", err);
            }
        };
    }
}

///
/// Estimates how long the falling block still has before it reaches the
/// stack under gravity alone, minus the time the mover needs for a worst
/// case steering sequence.
///
fn calculate_remaining_time_ms (game: & ComputerGame, move_speed: u64) -> i64
{
    let first_occupied = game.current_node().lock().unwrap().state().first_occupied_row() as i64;

    let block = game.active_block();
    let block_rows = block.row_count().max(block.column_count()) as i64;
    let remaining_rows = first_occupied - (block.row() as i64 + block_rows);
    if remaining_rows <= 2
    {
        return 0;
    }

    let rows_per_second = Gravity::speed_for_level(game.level());
    let remaining_time = 1000.0 * remaining_rows as f64 / rows_per_second;

    let max_required_moves = (block.num_rotations() + game.column_count() / 2) as f64;
    let steering_time = 1000.0 * max_required_moves / move_speed.max(1) as f64;

    (0.5 + remaining_time - steering_time) as i64
}

fn default_worker_count () -> usize
{
    let cpus = num_cpus::get();
    match cpus > 1
    {
        true  => (0.5 + 0.75 * cpus as f64) as usize,
        false => 1
    }
}

fn validate_depth (search_depth: usize) -> Result<()>
{
    match (1 ..= 100).contains(& search_depth)
    {
        true  => Ok(()),
        false => Err(error::error!("Search depth {} is out of range 1..=100.", search_depth))
    }
}

fn validate_width (search_width: usize) -> Result<()>
{
    match (1 ..= 100).contains(& search_width)
    {
        true  => Ok(()),
        false => Err(error::error!("Search width {} is out of range 1..=100.", search_width))
    }
}

fn validate_worker_count (worker_count: usize) -> Result<()>
{
    match worker_count <= 128
    {
        true  => Ok(()),
        false => Err(error::error!("Worker count {} is out of range 0..=128.", worker_count))
    }
}

#[cfg(test)]
mod test
{
    use super::*;
    use std::thread;
    use std::time::{Duration, Instant};
    use tetris::node::SearchNode;
    use tetris::{Block, BlockBag, BlockType, Direction};

    fn game () -> Arc<RwLock<ComputerGame>>
    {
        Arc::new(RwLock::new(ComputerGame::with_bag(20, 10, BlockBag::with_seed(1, 23))))
    }

    #[test]
    fn construction_validates_its_arguments ()
    {
        let game = game();
        assert!(ComputerPlayer::new(& game, Evaluator::balanced(), 0, 1, 1).is_err());
        assert!(ComputerPlayer::new(& game, Evaluator::balanced(), 1, 0, 1).is_err());
        assert!(ComputerPlayer::new(& game, Evaluator::balanced(), 101, 1, 1).is_err());
        assert!(ComputerPlayer::new(& game, Evaluator::balanced(), 1, 101, 1).is_err());
        assert!(ComputerPlayer::new(& game, Evaluator::balanced(), 1, 1, 129).is_err());
    }

    #[test]
    fn mismatched_results_are_discarded ()
    {
        let game = game();

        // Fabricate a result two plies below the live end node.
        let detached = SearchNode::create_root(20, 10, Evaluator::balanced());
        let child =
        {
            let state = detached.lock().unwrap().state().commit(& Block::spawn(BlockType::O, 10), false);
            SearchNode::offspring(& detached, state)
        };
        let grandchild =
        {
            let state = child.lock().unwrap().state().clone();
            SearchNode::offspring(& child, state)
        };

        assert!(! ComputerPlayer::splice_result(& game, & grandchild));
        assert_eq!(game.read().unwrap().num_precalculated_moves(), 0);
    }

    #[test]
    fn matching_results_are_spliced ()
    {
        let game = game();

        let current = game.read().unwrap().current_node();
        let planned =
        {
            let state =
            {
                let locked = current.lock().unwrap();
                let mut block = game.read().unwrap().active_block();
                block.set_row(20 - block.row_count());
                locked.state().commit(& block, false)
            };
            SearchNode::offspring(& current, state)
        };

        assert!(ComputerPlayer::splice_result(& game, & planned));
        assert_eq!(game.read().unwrap().num_precalculated_moves(), 1);
    }

    #[test]
    fn game_over_results_are_skipped ()
    {
        let game = game();
        let current = game.read().unwrap().current_node();
        let broken =
        {
            let state =
            {
                let locked = current.lock().unwrap();
                locked.state().commit(& Block::spawn(BlockType::I, 10), true)
            };
            SearchNode::offspring(& current, state)
        };

        assert!(! ComputerPlayer::splice_result(& game, & broken));
        assert_eq!(game.read().unwrap().num_precalculated_moves(), 0);
    }

    #[test]
    fn the_player_extends_the_plan ()
    {
        let game = game();
        let player = ComputerPlayer::new(& game, Evaluator::balanced(), 2, 2, 2).unwrap();

        let deadline = Instant::now() + Duration::from_secs(10);
        while Instant::now() < deadline
        {
            if game.read().unwrap().num_precalculated_moves() >= 2
            {
                break;
            }
            thread::sleep(Duration::from_millis(10));
        }

        assert!(game.read().unwrap().num_precalculated_moves() >= 2);
        drop(player);
    }

    #[test]
    fn deadline_estimate_shrinks_with_a_lower_board ()
    {
        let game = game();
        let far = calculate_remaining_time_ms(& game.read().unwrap(), 20);
        assert!(far > 0);

        {
            let mut locked = game.write().unwrap();
            for _ in 0 .. 14
            {
                locked.move_block(Direction::Down);
            }
        }
        let near = calculate_remaining_time_ms(& game.read().unwrap(), 20);
        assert!(near < far);
    }
}

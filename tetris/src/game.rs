
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};

use std::sync::Arc;

use super::bag::BlockBag;
use super::block::{Block, BlockType};
use super::events::{EventHandler, EventQueue, GameEvent};
use super::evaluator::Evaluator;
use super::grid::Grid;
use super::node::{self, NodePtr, SearchNode};
use super::state::GameState;

use utils::error::Context;
use utils::log;
use utils::*;

///
/// A direction the active block can be asked to move in. Up is accepted and
/// ignored in standard play.
///
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Direction
{
    Up,
    Down,
    Left,
    Right
}

impl Direction
{
    ///
    /// Returns the column displacement of this direction.
    ///
    pub fn column_delta (& self) -> i32
    {
        match self
        {
            Direction::Left  => -1,
            Direction::Right => 1,
            _                => 0
        }
    }

    ///
    /// Returns the row displacement of this direction.
    ///
    pub fn row_delta (& self) -> i32
    {
        match self
        {
            Direction::Up   => -1,
            Direction::Down => 1,
            _               => 0
        }
    }
}

///
/// The live-game surface shared by the human and the computer variants.
///
/// A game owns the playing field, the active block, the lazily extended
/// buffer of upcoming block types, and the pending-event queue. It is meant
/// to be shared as Arc<RwLock<...>>: gravity, the block mover and the
/// computer player write, the UI reads.
///
pub trait Game : Send + Sync
{
    ///
    /// Returns a copy of the active block.
    ///
    fn active_block (& self) -> Block;

    ///
    /// Applies a multiplayer line penalty: the field shifts up and the
    /// freed bottom rows fill with garbage. Penalties below two lines and
    /// penalties on a finished game are no-ops.
    ///
    fn apply_line_penalty (& mut self, count: usize);

    ///
    /// Returns the number of columns.
    ///
    fn column_count (& self) -> usize;

    ///
    /// Drops the active block to its resting row and commits it.
    ///
    fn drop_and_commit (& mut self);

    ///
    /// Drops the active block to its resting row without committing.
    ///
    fn drop_block (& mut self);

    ///
    /// Returns the registered observers.
    ///
    fn event_handlers (& self) -> & [Arc<dyn EventHandler>];

    ///
    /// Returns the pending-event queue.
    ///
    fn event_queue (& self) -> & EventQueue;

    ///
    /// Returns a copy of the playing field.
    ///
    fn game_grid (& self) -> Grid;

    ///
    /// Returns a copy of the current game state.
    ///
    fn game_state (& self) -> GameState;

    ///
    /// Returns the next count upcoming block types, extending the buffer as
    /// needed. Index i is stable once read.
    ///
    fn get_future_blocks (& mut self, count: usize) -> Vec<BlockType>;

    ///
    /// As get_future_blocks, but starting at an absolute index into the
    /// block sequence rather than at the current block.
    ///
    fn get_future_blocks_with_offset (& mut self, offset: usize, count: usize) -> Vec<BlockType>;

    ///
    /// Determines whether the game has ended.
    ///
    fn is_game_over (& self) -> bool;

    ///
    /// Determines whether the game is paused.
    ///
    fn is_paused (& self) -> bool;

    ///
    /// Returns the current level: one level per ten cleared lines, floored
    /// by the starting level.
    ///
    fn level (& self) -> i32;

    ///
    /// Moves the active block one cell. Returns true when the block moved.
    /// A failing Down commits the block and returns false; all other
    /// failures leave the game unchanged.
    ///
    fn move_block (& mut self, direction: Direction) -> bool;

    ///
    /// Registers an observer.
    ///
    fn register_event_handler (& mut self, handler: Arc<dyn EventHandler>);

    ///
    /// Removes a previously registered observer.
    ///
    fn unregister_event_handler (& mut self, handler: & Arc<dyn EventHandler>);

    ///
    /// Rotates the active block to its next rotation. Returns false and
    /// leaves the block unchanged when the rotated shape does not fit.
    ///
    fn rotate (& mut self) -> bool;

    ///
    /// Returns the number of rows.
    ///
    fn row_count (& self) -> usize;

    ///
    /// Overwrites the playing field wholesale, tainting the state and
    /// discarding any precomputed plan.
    ///
    fn set_grid (& mut self, grid: Grid);

    ///
    /// Pauses or resumes the game.
    ///
    fn set_paused (& mut self, paused: bool);

    ///
    /// Sets the floor for the level.
    ///
    fn set_starting_level (& mut self, level: i32);
}

///
/// State shared by both game variants.
///
struct GameBase
{
    rows: usize,
    columns: usize,
    active_block: Block,
    bag: BlockBag,
    garbage_bag: BlockBag,
    garbage_rng: StdRng,
    blocks: Vec<BlockType>,
    current_block_index: usize,
    starting_level: i32,
    paused: bool,
    handlers: Vec<Arc<dyn EventHandler>>,
    events: EventQueue,
    mute_events: bool
}

impl GameBase
{
    fn new (rows: usize, columns: usize, bag: BlockBag) -> GameBase
    {
        let first = bag.next();
        GameBase
        {
            rows,
            columns,
            active_block: Block::spawn(first, columns),
            bag,
            garbage_bag: BlockBag::new(1),
            garbage_rng: StdRng::seed_from_u64(rand::random()),
            blocks: vec![first],
            current_block_index: 0,
            starting_level: 0,
            paused: false,
            handlers: Vec::new(),
            events: EventQueue::new(),
            mute_events: false
        }
    }

    ///
    /// Builds one penalty row: between four and eight cells filled with
    /// types drawn from the garbage bag.
    ///
    fn garbage_row (& mut self) -> Vec<BlockType>
    {
        let mut row = vec![BlockType::Nil; self.columns];
        let mut count = 0;

        while count < 4
        {
            for index in 0 .. self.columns
            {
                if row[index] == BlockType::Nil && self.garbage_rng.gen_bool(0.5)
                {
                    row[index] = self.garbage_bag.next();
                    count += 1;
                    if count >= 8
                    {
                        break;
                    }
                }
            }
        }

        row
    }

    fn post_changed (& self)
    {
        if ! self.mute_events
        {
            self.events.post(GameEvent::Changed);
        }
    }

    fn post_lines_cleared (& self, count: usize)
    {
        if ! self.mute_events
        {
            self.events.post(GameEvent::LinesCleared(count));
        }
    }

    ///
    /// Respawns the active block for the current block index.
    ///
    fn respawn (& mut self)
    {
        self.supply_blocks(self.current_block_index + 1);
        self.active_block = Block::spawn(self.blocks[self.current_block_index], self.columns);
    }

    ///
    /// Extends the upcoming-block buffer to at least the given length.
    ///
    fn supply_blocks (& mut self, length: usize)
    {
        while self.blocks.len() < length
        {
            self.blocks.push(self.bag.next());
        }
    }

    fn future_blocks (& mut self, offset: usize, count: usize) -> Vec<BlockType>
    {
        self.supply_blocks(offset + count);
        self.blocks[offset .. offset + count].to_vec()
    }
}

///
/// Computes the shifted-plus-garbage grid of a line penalty, or None when
/// the penalty is too small to act on.
///
fn penalty_grid (base: & mut GameBase, state: & GameState, count: usize) -> Option<Grid>
{
    if count < 2
    {
        return None;
    }

    let shift = if count < 4 { count - 1 } else { count };

    let first_occupied = state.first_occupied_row();
    let new_first_occupied = first_occupied.saturating_sub(shift);

    let mut grid = state.grid().clone();
    let rows = grid.row_count();
    let garbage_start = rows.saturating_sub(shift);

    for row in new_first_occupied .. rows
    {
        if row < garbage_start
        {
            for column in 0 .. grid.column_count()
            {
                let below = grid.get(row + shift, column);
                grid.set(row, column, below);
            }
        }
        else
        {
            let garbage = base.garbage_row();
            for column in 0 .. grid.column_count()
            {
                grid.set(row, column, garbage[column]);
            }
        }
    }

    Some(grid)
}

///
/// The variant driven by a human: the playing field lives in a plain game
/// state and every commit replaces it.
///
pub struct HumanGame
{
    base: GameBase,
    state: GameState
}

impl HumanGame
{
    ///
    /// Returns a new game over an empty field.
    ///
    pub fn new (rows: usize, columns: usize) -> HumanGame
    {
        HumanGame::with_bag(rows, columns, BlockBag::new(1))
    }

    ///
    /// Returns a new game dealing from the given bag.
    ///
    pub fn with_bag (rows: usize, columns: usize, bag: BlockBag) -> HumanGame
    {
        HumanGame
        {
            base: GameBase::new(rows, columns, bag),
            state: GameState::new(rows, columns)
        }
    }

    fn commit_active (& mut self)
    {
        let block = self.base.active_block.clone();
        let old_lines = self.state.stats().num_lines;

        self.state = self.state.commit(& block, block.row() == 0);

        let cleared = self.state.stats().num_lines - old_lines;
        if cleared > 0
        {
            self.base.post_lines_cleared(cleared);
        }

        self.base.current_block_index += 1;
        self.base.respawn();
        self.base.post_changed();
    }
}

impl Game for HumanGame
{
    fn active_block (& self) -> Block
    {
        self.base.active_block.clone()
    }

    fn apply_line_penalty (& mut self, count: usize)
    {
        if self.is_game_over()
        {
            return;
        }

        let grid = match penalty_grid(& mut self.base, & self.state, count)
        {
            Some(grid) => grid,
            None       => return
        };

        self.set_grid(grid);

        let block = self.base.active_block.clone();
        if ! self.state.check_position_valid(& block, block.row(), block.column())
        {
            self.move_block(Direction::Down);
        }

        self.base.post_changed();
    }

    fn column_count (& self) -> usize
    {
        self.base.columns
    }

    fn drop_and_commit (& mut self)
    {
        let muted = self.base.mute_events;
        self.base.mute_events = true;
        self.drop_block();
        self.move_block(Direction::Down);
        self.base.mute_events = muted;
        self.base.post_changed();
    }

    fn drop_block (& mut self)
    {
        let muted = self.base.mute_events;
        self.base.mute_events = true;
        loop
        {
            let block = self.base.active_block.clone();
            let below = block.row() + 1;
            if ! self.state.check_position_valid(& block, below, block.column())
            {
                break;
            }
            self.base.active_block.set_row(below);
        }
        self.base.mute_events = muted;
        self.base.post_changed();
    }

    fn event_handlers (& self) -> & [Arc<dyn EventHandler>]
    {
        & self.base.handlers
    }

    fn event_queue (& self) -> & EventQueue
    {
        & self.base.events
    }

    fn game_grid (& self) -> Grid
    {
        self.state.grid().clone()
    }

    fn game_state (& self) -> GameState
    {
        self.state.clone()
    }

    fn get_future_blocks (& mut self, count: usize) -> Vec<BlockType>
    {
        let offset = self.base.current_block_index;
        self.base.future_blocks(offset, count)
    }

    fn get_future_blocks_with_offset (& mut self, offset: usize, count: usize) -> Vec<BlockType>
    {
        self.base.future_blocks(offset, count)
    }

    fn is_game_over (& self) -> bool
    {
        self.state.is_game_over()
    }

    fn is_paused (& self) -> bool
    {
        self.base.paused
    }

    fn level (& self) -> i32
    {
        ((self.state.stats().num_lines / 10) as i32).max(self.base.starting_level)
    }

    fn move_block (& mut self, direction: Direction) -> bool
    {
        if self.is_game_over()
        {
            return false;
        }

        let block = self.base.active_block.clone();
        let new_row = block.row() as i32 + direction.row_delta();
        let new_column = block.column() as i32 + direction.column_delta();

        if new_row >= 0 && new_column >= 0
            && self.state.check_position_valid(& block, new_row as usize, new_column as usize)
        {
            self.base.active_block.set_row(new_row as usize);
            self.base.active_block.set_column(new_column as usize);
            self.base.post_changed();
            return true;
        }

        if direction != Direction::Down
        {
            return false;
        }

        self.commit_active();
        false
    }

    fn register_event_handler (& mut self, handler: Arc<dyn EventHandler>)
    {
        self.base.handlers.push(handler);
    }

    fn unregister_event_handler (& mut self, handler: & Arc<dyn EventHandler>)
    {
        self.base.handlers.retain(|existing| ! Arc::ptr_eq(existing, handler));
    }

    fn rotate (& mut self) -> bool
    {
        if self.is_game_over()
        {
            return false;
        }

        let mut block = self.base.active_block.clone();
        block.rotate();
        if ! self.state.check_position_valid(& block, block.row(), block.column())
        {
            return false;
        }

        self.base.active_block = block;
        self.base.post_changed();
        true
    }

    fn row_count (& self) -> usize
    {
        self.base.rows
    }

    fn set_grid (& mut self, grid: Grid)
    {
        self.state.set_grid(grid);
        self.base.post_changed();
    }

    fn set_paused (& mut self, paused: bool)
    {
        log::info!("Game paused: {}.", paused);
        self.base.paused = paused;
    }

    fn set_starting_level (& mut self, level: i32)
    {
        self.base.starting_level = level;
        self.base.post_changed();
    }
}

///
/// The variant driven by the computer player. The live timeline is a chain
/// of search nodes: the current node plus the precomputed first-child chain
/// spliced in by the planner.
///
pub struct ComputerGame
{
    base: GameBase,
    current: NodePtr
}

impl ComputerGame
{
    ///
    /// Returns a new game over an empty field.
    ///
    pub fn new (rows: usize, columns: usize) -> ComputerGame
    {
        ComputerGame::with_bag(rows, columns, BlockBag::new(1))
    }

    ///
    /// Returns a new game dealing from the given bag.
    ///
    pub fn with_bag (rows: usize, columns: usize, bag: BlockBag) -> ComputerGame
    {
        ComputerGame
        {
            base: GameBase::new(rows, columns, bag),
            current: SearchNode::create_root(rows, columns, Evaluator::balanced())
        }
    }

    ///
    /// Splices a search result onto the tail of the precomputed chain. The
    /// node must sit exactly one ply below the current end node.
    ///
    pub fn append_precalculated_node (& mut self, node: NodePtr) -> Result<()>
    {
        let end = self.end_node();
        let end_depth = end.lock().unwrap().depth();
        let node_depth = node.lock().unwrap().depth();

        if node_depth != end_depth + 1
        {
            return Err(error::error!("Expected a node at depth {}, got depth {}.", end_depth + 1, node_depth))
                .context("Failed to append a precalculated node.");
        }

        end.lock().unwrap().add_child(node);
        Ok(())
    }

    ///
    /// Discards the precomputed chain.
    ///
    pub fn clear_precalculated_nodes (& mut self)
    {
        self.current.lock().unwrap().clear_children();
    }

    ///
    /// Returns the node the live game sits at.
    ///
    pub fn current_node (& self) -> NodePtr
    {
        self.current.clone()
    }

    ///
    /// Returns the tail of the precomputed chain.
    ///
    pub fn end_node (& self) -> NodePtr
    {
        node::end_node(& self.current)
    }

    ///
    /// Advances the live game onto the first precomputed child. Returns
    /// false when there is none.
    ///
    pub fn navigate_node_down (& mut self) -> bool
    {
        let next = match self.current.lock().unwrap().first_child()
        {
            Some(next) => next,
            None       => return false
        };

        let line_difference =
        {
            let current = self.current.lock().unwrap();
            let next = next.lock().unwrap();
            next.state().stats().num_lines - current.state().stats().num_lines
        };

        if line_difference > 0
        {
            self.base.post_lines_cleared(line_difference);
        }

        self.set_current_node(next);
        true
    }

    ///
    /// Returns the length of the precomputed chain below the current node.
    ///
    pub fn num_precalculated_moves (& self) -> usize
    {
        let end_depth = self.end_node().lock().unwrap().depth();
        let current_depth = self.current.lock().unwrap().depth();
        end_depth - current_depth
    }

    fn commit_fresh (& mut self)
    {
        let block = self.base.active_block.clone();
        let state = self.current.lock().unwrap().state().commit(& block, block.row() == 0);

        let cleared = state.stats().num_lines - self.current.lock().unwrap().state().stats().num_lines;
        if cleared > 0
        {
            self.base.post_lines_cleared(cleared);
        }

        let child = SearchNode::offspring(& self.current, state);
        self.current.lock().unwrap().add_child(child.clone());
        self.set_current_node(child);
    }

    fn set_current_node (& mut self, node: NodePtr)
    {
        self.current = node;
        self.base.current_block_index = self.current.lock().unwrap().depth();
        self.base.respawn();
        self.base.post_changed();
    }
}

impl Game for ComputerGame
{
    fn active_block (& self) -> Block
    {
        self.base.active_block.clone()
    }

    fn apply_line_penalty (& mut self, count: usize)
    {
        if self.is_game_over()
        {
            return;
        }

        let state = self.current.lock().unwrap().state().clone();
        let grid = match penalty_grid(& mut self.base, & state, count)
        {
            Some(grid) => grid,
            None       => return
        };

        self.set_grid(grid);

        let block = self.base.active_block.clone();
        let valid = self.current.lock().unwrap().state().check_position_valid(& block, block.row(), block.column());
        if ! valid
        {
            self.move_block(Direction::Down);
        }

        self.base.post_changed();
    }

    fn column_count (& self) -> usize
    {
        self.base.columns
    }

    fn drop_and_commit (& mut self)
    {
        let muted = self.base.mute_events;
        self.base.mute_events = true;
        self.drop_block();
        self.move_block(Direction::Down);
        self.base.mute_events = muted;
        self.base.post_changed();
    }

    fn drop_block (& mut self)
    {
        let muted = self.base.mute_events;
        self.base.mute_events = true;
        loop
        {
            let block = self.base.active_block.clone();
            let below = block.row() + 1;
            let fits = self.current.lock().unwrap().state().check_position_valid(& block, below, block.column());
            if ! fits
            {
                break;
            }
            self.base.active_block.set_row(below);
        }
        self.base.mute_events = muted;
        self.base.post_changed();
    }

    fn event_handlers (& self) -> & [Arc<dyn EventHandler>]
    {
        & self.base.handlers
    }

    fn event_queue (& self) -> & EventQueue
    {
        & self.base.events
    }

    fn game_grid (& self) -> Grid
    {
        self.current.lock().unwrap().state().grid().clone()
    }

    fn game_state (& self) -> GameState
    {
        self.current.lock().unwrap().state().clone()
    }

    fn get_future_blocks (& mut self, count: usize) -> Vec<BlockType>
    {
        let offset = self.base.current_block_index;
        self.base.future_blocks(offset, count)
    }

    fn get_future_blocks_with_offset (& mut self, offset: usize, count: usize) -> Vec<BlockType>
    {
        self.base.future_blocks(offset, count)
    }

    fn is_game_over (& self) -> bool
    {
        self.current.lock().unwrap().state().is_game_over()
    }

    fn is_paused (& self) -> bool
    {
        self.base.paused
    }

    fn level (& self) -> i32
    {
        let lines = self.current.lock().unwrap().state().stats().num_lines;
        ((lines / 10) as i32).max(self.base.starting_level)
    }

    fn move_block (& mut self, direction: Direction) -> bool
    {
        if self.is_game_over()
        {
            return false;
        }

        let block = self.base.active_block.clone();
        let new_row = block.row() as i32 + direction.row_delta();
        let new_column = block.column() as i32 + direction.column_delta();

        let fits = new_row >= 0 && new_column >= 0
            && self.current.lock().unwrap().state()
                .check_position_valid(& block, new_row as usize, new_column as usize);

        if fits
        {
            self.base.active_block.set_row(new_row as usize);
            self.base.active_block.set_column(new_column as usize);
            self.base.post_changed();
            return true;
        }

        if direction != Direction::Down
        {
            return false;
        }

        // The block hit the bottom. If the landing spot matches the head of
        // the precomputed plan, advance along the plan; otherwise the plan
        // is stale and has to go.
        let planned = self.current.lock().unwrap().first_child();
        if let Some(planned) = planned
        {
            let tainted = self.current.lock().unwrap().state().tainted();
            let matches = match planned.lock().unwrap().state().original_block()
            {
                Some(next) => ! tainted
                    && next.column() == block.column()
                    && next.identification() == block.identification(),
                None => false
            };

            if matches
            {
                if self.navigate_node_down()
                {
                    return false;
                }
                log::error!("Navigating onto the precalculated node failed.");
                self.clear_precalculated_nodes();
            }
            else
            {
                self.clear_precalculated_nodes();
            }
        }

        self.commit_fresh();
        false
    }

    fn register_event_handler (& mut self, handler: Arc<dyn EventHandler>)
    {
        self.base.handlers.push(handler);
    }

    fn unregister_event_handler (& mut self, handler: & Arc<dyn EventHandler>)
    {
        self.base.handlers.retain(|existing| ! Arc::ptr_eq(existing, handler));
    }

    fn rotate (& mut self) -> bool
    {
        if self.is_game_over()
        {
            return false;
        }

        let mut block = self.base.active_block.clone();
        block.rotate();
        let fits = self.current.lock().unwrap().state().check_position_valid(& block, block.row(), block.column());
        if ! fits
        {
            return false;
        }

        self.base.active_block = block;
        self.base.post_changed();
        true
    }

    fn row_count (& self) -> usize
    {
        self.base.rows
    }

    fn set_grid (& mut self, grid: Grid)
    {
        let mut current = self.current.lock().unwrap();
        current.clear_children();
        current.state_mut().set_grid(grid);
        drop(current);
        self.base.post_changed();
    }

    fn set_paused (& mut self, paused: bool)
    {
        log::info!("Game paused: {}.", paused);
        self.base.paused = paused;
    }

    fn set_starting_level (& mut self, level: i32)
    {
        self.base.starting_level = level;
        self.base.post_changed();
    }
}

#[cfg(test)]
mod test
{
    use super::*;
    use crate::node;

    fn computer_game () -> ComputerGame
    {
        ComputerGame::with_bag(20, 10, BlockBag::with_seed(1, 42))
    }

    #[test]
    fn drop_without_commit_keeps_the_block_active ()
    {
        let mut game = computer_game();
        let before = game.active_block();
        game.drop_block();
        let after = game.active_block();
        assert_eq!(before.block_type(), after.block_type());
        assert!(after.row() > before.row());
        assert_eq!(game.current_node().lock().unwrap().depth(), 0);
    }

    #[test]
    fn drop_and_commit_advances_the_timeline ()
    {
        let mut game = computer_game();
        game.drop_and_commit();
        assert_eq!(game.current_node().lock().unwrap().depth(), 1);
        assert_eq!(game.num_precalculated_moves(), 0);
    }

    #[test]
    fn future_blocks_are_stable ()
    {
        let mut game = computer_game();
        let first = game.get_future_blocks(4);
        let second = game.get_future_blocks(6);
        assert_eq!(first[..], second[.. 4]);
    }

    #[test]
    fn up_is_a_no_op ()
    {
        let mut game = computer_game();
        let before = game.active_block();
        assert!(! game.move_block(Direction::Up));
        assert_eq!(game.active_block(), before);
    }

    #[test]
    fn level_follows_lines_and_starting_floor ()
    {
        let mut game = computer_game();
        assert_eq!(game.level(), 0);
        game.set_starting_level(5);
        assert_eq!(game.level(), 5);
    }

    #[test]
    fn penalty_of_one_line_is_ignored ()
    {
        let mut game = computer_game();
        let before = game.game_grid();
        game.apply_line_penalty(1);
        assert_eq!(game.game_grid(), before);
        assert!(! game.game_state().tainted());
    }

    fn garbage_rows_at_bottom (game: & ComputerGame, count: usize) -> bool
    {
        let grid = game.game_grid();
        (grid.row_count() - count .. grid.row_count()).all(
            |row|
            {
                let filled = (0 .. grid.column_count())
                    .filter(|& c| grid.get(row, c) != BlockType::Nil)
                    .count();
                (4 ..= 8).contains(& filled)
            }
        )
    }

    #[test]
    fn penalty_shifts_by_count_minus_one_below_four ()
    {
        for (count, shift) in [(2, 1), (3, 2), (4, 4)]
        {
            let mut game = computer_game();
            game.drop_and_commit();
            let before = game.game_grid();
            let first_occupied = game.game_state().first_occupied_row();

            game.apply_line_penalty(count);

            let after = game.game_state();
            assert!(after.tainted());
            assert_eq!(after.first_occupied_row(), first_occupied - shift);
            assert!(garbage_rows_at_bottom(& game, shift));

            // The stack itself moved up intact.
            for row in first_occupied .. before.row_count() - shift
            {
                for column in 0 .. before.column_count()
                {
                    assert_eq!(after.grid().get(row - shift, column), before.get(row, column));
                }
            }
        }
    }

    #[test]
    fn penalty_clears_the_precomputed_plan ()
    {
        let mut game = computer_game();
        let current = game.current_node();
        let landed =
        {
            let locked = current.lock().unwrap();
            let mut block = Block::spawn(game.get_future_blocks(1)[0], 10);
            block.set_row(20 - block.row_count());
            locked.state().commit(& block, false)
        };
        game.append_precalculated_node(SearchNode::offspring(& current, landed)).unwrap();
        assert_eq!(game.num_precalculated_moves(), 1);

        game.apply_line_penalty(3);
        assert_eq!(game.num_precalculated_moves(), 0);
    }

    #[test]
    fn append_rejects_depth_mismatches ()
    {
        let mut game = computer_game();
        let root = SearchNode::create_root(20, 10, Evaluator::balanced());
        let child = SearchNode::offspring(& root, GameState::new(20, 10));
        let grandchild = SearchNode::offspring(& child, GameState::new(20, 10));

        assert!(game.append_precalculated_node(grandchild).is_err());
        assert_eq!(game.num_precalculated_moves(), 0);
    }

    #[test]
    fn committing_on_the_planned_spot_follows_the_plan ()
    {
        let mut game = computer_game();
        let current = game.current_node();

        // Plan the spawned block straight down at its spawn column.
        let planned_state =
        {
            let locked = current.lock().unwrap();
            let mut block = game.active_block();
            let mut row = 0;
            while locked.state().check_position_valid(& block, row, block.column())
            {
                row += 1;
            }
            block.set_row(row - 1);
            locked.state().commit(& block, false)
        };
        let planned = SearchNode::offspring(& current, planned_state);
        game.append_precalculated_node(planned.clone()).unwrap();

        game.drop_and_commit();

        assert!(std::sync::Arc::ptr_eq(& game.current_node(), & planned));
        assert_eq!(game.num_precalculated_moves(), 0);
    }

    #[test]
    fn committing_off_plan_discards_the_plan ()
    {
        let mut game = computer_game();
        let current = game.current_node();

        // Plan the block one column to the right of where it will land.
        let planned_state =
        {
            let locked = current.lock().unwrap();
            let mut block = game.active_block();
            block.set_column(block.column() + 1);
            let mut row = 0;
            while locked.state().check_position_valid(& block, row, block.column())
            {
                row += 1;
            }
            block.set_row(row - 1);
            locked.state().commit(& block, false)
        };
        game.append_precalculated_node(SearchNode::offspring(& current, planned_state)).unwrap();

        game.drop_and_commit();

        let node = game.current_node();
        assert_eq!(node.lock().unwrap().depth(), 1);
        assert_eq!(node::end_node(& node).lock().unwrap().depth(), 1);
        assert!(! std::sync::Arc::ptr_eq(& node, & current));
    }

    #[test]
    fn human_game_commits_when_down_fails ()
    {
        let mut game = HumanGame::with_bag(20, 10, BlockBag::with_seed(1, 42));
        let first_type = game.active_block().block_type();

        game.drop_block();
        let landed = game.active_block();
        assert!(! game.move_block(Direction::Down));

        let grid = game.game_grid();
        let shape = landed.grid();
        for r in 0 .. shape.row_count()
        {
            for c in 0 .. shape.column_count()
            {
                if shape.get(r, c) != BlockType::Nil
                {
                    assert_eq!(grid.get(landed.row() + r, landed.column() + c), first_type);
                }
            }
        }

        // A fresh block spawned at the top.
        assert_eq!(game.active_block().row(), 0);
    }

    #[test]
    fn human_game_spawning_into_the_stack_ends_the_game ()
    {
        let mut game = HumanGame::with_bag(6, 4, BlockBag::with_seed(1, 42));
        for _ in 0 .. 200
        {
            if game.is_game_over()
            {
                break;
            }
            game.drop_and_commit();
        }
        assert!(game.is_game_over());
        assert!(! game.move_block(Direction::Down));
    }

    #[test]
    fn dispatch_delivers_pending_events ()
    {
        use std::sync::atomic::{AtomicUsize, Ordering};
        use std::sync::RwLock;

        struct Counter
        {
            changes: AtomicUsize,
            lines: AtomicUsize
        }

        impl EventHandler for Counter
        {
            fn on_game_state_changed (& self, _game: & dyn Game)
            {
                self.changes.fetch_add(1, Ordering::SeqCst);
            }

            fn on_lines_cleared (& self, _game: & dyn Game, count: usize)
            {
                self.lines.fetch_add(count, Ordering::SeqCst);
            }
        }

        let counter = Arc::new(Counter { changes: AtomicUsize::new(0), lines: AtomicUsize::new(0) });
        let game = Arc::new(RwLock::new(computer_game()));
        game.write().unwrap().register_event_handler(counter.clone());

        game.write().unwrap().move_block(Direction::Down);
        game.read().unwrap().event_queue().post(GameEvent::LinesCleared(2));

        crate::events::dispatch_events(& game);
        assert_eq!(counter.changes.load(Ordering::SeqCst), 1);
        assert_eq!(counter.lines.load(Ordering::SeqCst), 2);

        // The queue drained; dispatching again delivers nothing.
        crate::events::dispatch_events(& game);
        assert_eq!(counter.changes.load(Ordering::SeqCst), 1);
    }
}


use super::block::{Block, BlockType};
use super::grid::Grid;

use utils::*;

///
/// Cumulative line-clear counters for a game state. Every commit increments
/// at most one of the per-size buckets, and num_lines by the number of rows
/// removed.
///
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Stats
{
    pub num_singles: usize,
    pub num_doubles: usize,
    pub num_triples: usize,
    pub num_tetrises: usize,
    pub num_lines: usize
}

impl Stats
{
    ///
    /// Records a clear of the given number of rows.
    ///
    pub fn record_clear (& mut self, rows: usize)
    {
        match rows
        {
            0 => {},
            1 => self.num_singles += 1,
            2 => self.num_doubles += 1,
            3 => self.num_triples += 1,
            _ => self.num_tetrises += 1
        };
        self.num_lines += rows;
    }
}

///
/// A snapshot of the playing field together with the block whose commit
/// produced it and the line-clear counters accumulated so far.
///
/// The tainted flag marks a state whose grid was overwritten from outside
/// the normal commit flow (a line penalty); any precomputed descendants of a
/// tainted state are stale and must be discarded.
///
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct GameState
{
    grid: Grid,
    original_block: Option<Block>,
    stats: Stats,
    game_over: bool,
    tainted: bool
}

impl std::fmt::Display for GameState
{
    fn fmt (& self, f: & mut std::fmt::Formatter<'_>) -> std::fmt::Result
    {
        write!(f, "{}", self.grid)
    }
}

impl GameState
{
    ///
    /// Determines whether the given block can sit at the given position:
    /// every occupied cell of its shape must lie inside the grid and overlap
    /// only empty cells.
    ///
    pub fn check_position_valid (& self, block: & Block, row: usize, column: usize) -> bool
    {
        let shape = block.grid();

        if row + shape.row_count() > self.grid.row_count()
            || column + shape.column_count() > self.grid.column_count()
        {
            return false;
        }

        for r in 0 .. shape.row_count()
        {
            for c in 0 .. shape.column_count()
            {
                if shape.get(r, c) != BlockType::Nil && self.grid.get(row + r, column + c) != BlockType::Nil
                {
                    return false;
                }
            }
        }
        true
    }

    ///
    /// Commits the given block at its current position, producing the
    /// successor state: the shape is stamped into the grid, full rows are
    /// removed (everything above shifts down, the top fills with empty
    /// rows), and the clear counters are updated.
    ///
    /// Commit is total. A commit with the game-over flag raised still
    /// produces a valid state; searches treat such a state as a leaf.
    ///
    pub fn commit (& self, block: & Block, game_over: bool) -> GameState
    {
        let mut grid = self.grid.clone();

        let shape = block.grid();
        for r in 0 .. shape.row_count()
        {
            for c in 0 .. shape.column_count()
            {
                if shape.get(r, c) != BlockType::Nil
                {
                    grid.set(block.row() + r, block.column() + c, block.block_type());
                }
            }
        }

        let cleared = clear_full_rows(& mut grid);

        let mut stats = self.stats;
        stats.record_clear(cleared);

        GameState
        {
            grid,
            original_block: Some(block.clone()),
            stats,
            game_over,
            tainted: false
        }
    }

    ///
    /// Returns the stack height: the number of rows from the first occupied
    /// row down to the floor.
    ///
    pub fn current_height (& self) -> usize
    {
        self.grid.row_count() - self.first_occupied_row()
    }

    ///
    /// Returns the smallest row index holding any filled cell, or the row
    /// count when the grid is empty.
    ///
    pub fn first_occupied_row (& self) -> usize
    {
        for row in 0 .. self.grid.row_count()
        {
            for column in 0 .. self.grid.column_count()
            {
                if self.grid.get(row, column) != BlockType::Nil
                {
                    return row;
                }
            }
        }
        self.grid.row_count()
    }

    ///
    /// Returns the playing field.
    ///
    pub fn grid (& self) -> & Grid
    {
        & self.grid
    }

    ///
    /// Determines whether this state is terminal.
    ///
    pub fn is_game_over (& self) -> bool
    {
        self.game_over
    }

    ///
    /// Returns a fresh empty state.
    ///
    pub fn new (rows: usize, columns: usize) -> GameState
    {
        GameState
        {
            grid: Grid::new(rows, columns, BlockType::Nil),
            original_block: None,
            stats: Stats::default(),
            game_over: false,
            tainted: false
        }
    }

    ///
    /// Returns the block whose commit produced this state, or None for a
    /// root state.
    ///
    pub fn original_block (& self) -> Option<& Block>
    {
        self.original_block.as_ref()
    }

    ///
    /// Overwrites the grid wholesale and marks this state as tainted.
    ///
    pub fn set_grid (& mut self, grid: Grid)
    {
        self.grid = grid;
        self.tainted = true;
    }

    ///
    /// Returns the line-clear counters.
    ///
    pub fn stats (& self) -> & Stats
    {
        & self.stats
    }

    ///
    /// Determines whether the grid was overwritten from outside the commit
    /// flow.
    ///
    pub fn tainted (& self) -> bool
    {
        self.tainted
    }
}

fn clear_full_rows (grid: & mut Grid) -> usize
{
    let rows = grid.row_count();
    let columns = grid.column_count();

    let mut cleared = 0;
    for row in 0 .. rows
    {
        let full = (0 .. columns).all(|c| grid.get(row, c) != BlockType::Nil);
        if full
        {
            for r in (1 ..= row).rev()
            {
                for c in 0 .. columns
                {
                    let above = grid.get(r - 1, c);
                    grid.set(r, c, above);
                }
            }
            for c in 0 .. columns
            {
                grid.set(0, c, BlockType::Nil);
            }
            cleared += 1;
        }
    }
    cleared
}

#[cfg(test)]
mod test
{
    use super::*;

    fn fill_row_except (state: & mut GameState, row: usize, skip: usize)
    {
        let mut grid = state.grid().clone();
        for c in 0 .. grid.column_count()
        {
            if c != skip
            {
                grid.set(row, c, BlockType::J);
            }
        }
        state.grid = grid;
    }

    fn drop_row (state: & GameState, block: & Block) -> usize
    {
        let mut row = 0;
        while state.check_position_valid(block, row, block.column())
        {
            row += 1;
        }
        row - 1
    }

    #[test]
    fn horizontal_bar_lands_on_the_floor ()
    {
        let state = GameState::new(20, 10);
        let mut block = Block::spawn(BlockType::I, 10);
        assert_eq!(block.column(), 3);

        block.set_row(drop_row(& state, & block));
        assert_eq!(block.row(), 19);

        let next = state.commit(& block, false);
        for c in 3 ..= 6
        {
            assert_eq!(next.grid().get(19, c), BlockType::I);
        }
        assert_eq!(next.stats().num_lines, 0);
        assert_eq!(next.first_occupied_row(), 19);
        assert_eq!(next.current_height(), 1);
    }

    #[test]
    fn single_clear_shifts_rows_down ()
    {
        let mut state = GameState::new(20, 10);
        fill_row_except(& mut state, 19, 9);
        state.grid.set(18, 0, BlockType::L);

        let mut block = Block::new(BlockType::I, 1, 0, 9);
        block.set_row(drop_row(& state, & block));
        assert_eq!(block.row(), 16);

        let next = state.commit(& block, false);
        assert_eq!(next.stats().num_singles, 1);
        assert_eq!(next.stats().num_lines, 1);

        // The stray cell above the cleared row dropped by one.
        assert_eq!(next.grid().get(19, 0), BlockType::L);

        // Three cells of the vertical bar survive the clear.
        for r in 17 ..= 19
        {
            assert_eq!(next.grid().get(r, 9), BlockType::I);
        }
        assert_eq!(next.grid().get(16, 9), BlockType::Nil);
    }

    #[test]
    fn four_rows_clear_as_one_tetris ()
    {
        let mut state = GameState::new(20, 10);
        for row in 16 .. 20
        {
            fill_row_except(& mut state, row, 9);
        }

        let mut block = Block::new(BlockType::I, 1, 0, 9);
        block.set_row(drop_row(& state, & block));
        assert_eq!(block.row(), 16);

        let next = state.commit(& block, false);
        assert_eq!(next.stats().num_tetrises, 1);
        assert_eq!(next.stats().num_lines, 4);
        assert_eq!(next.first_occupied_row(), 20);
    }

    #[test]
    fn committed_grids_hold_no_full_row ()
    {
        let mut state = GameState::new(8, 4);
        for row in 5 .. 8
        {
            fill_row_except(& mut state, row, 3);
        }

        let block = Block::new(BlockType::I, 1, 4, 3);
        let next = state.commit(& block, false);

        for row in 0 .. 8
        {
            let full = (0 .. 4).all(|c| next.grid().get(row, c) != BlockType::Nil);
            assert!(! full);
        }
        assert_eq!(next.stats().num_triples, 1);
    }

    #[test]
    fn line_total_matches_buckets ()
    {
        let mut stats = Stats::default();
        stats.record_clear(1);
        stats.record_clear(2);
        stats.record_clear(2);
        stats.record_clear(4);
        assert_eq!(stats.num_lines,
                   stats.num_singles + 2 * stats.num_doubles + 3 * stats.num_triples + 4 * stats.num_tetrises);
    }

    #[test]
    fn commit_with_game_over_still_produces_a_state ()
    {
        let state = GameState::new(20, 10);
        let block = Block::spawn(BlockType::O, 10);
        let next = state.commit(& block, true);
        assert!(next.is_game_over());
        assert_eq!(next.grid().get(0, 4), BlockType::O);
    }

    #[test]
    fn set_grid_taints_the_state ()
    {
        let mut state = GameState::new(20, 10);
        assert!(! state.tainted());
        state.set_grid(Grid::new(20, 10, BlockType::Nil));
        assert!(state.tainted());

        let next = state.commit(& Block::spawn(BlockType::T, 10), false);
        assert!(! next.tainted());
    }
}

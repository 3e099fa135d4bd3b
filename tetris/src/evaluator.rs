
use super::block::BlockType;
use super::state::GameState;

use utils::*;

///
/// Scores a game state as a linear combination of board features: stack
/// height, landing height of the last committed block, covered holes, and
/// the per-size line-clear counters. Higher is better.
///
/// An evaluator is an immutable bundle of integer weights plus a recommended
/// search depth and width; named presets select different weight vectors.
/// The tetris-chasing preset additionally keeps the rightmost column free as
/// a well for vertical bars.
///
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct Evaluator
{
    name: String,
    game_height_factor: i32,
    last_block_height_factor: i32,
    num_holes_factor: i32,
    num_singles_factor: i32,
    num_doubles_factor: i32,
    num_triples_factor: i32,
    num_tetrises_factor: i32,
    recommended_depth: usize,
    recommended_width: usize,
    reserve_tetris_column: bool
}

impl Evaluator
{
    ///
    /// The all-round preset.
    ///
    pub fn balanced () -> Evaluator
    {
        Evaluator::custom("Balanced", -2, -1, -4, 1, 2, 4, 8, 6, 6)
    }

    ///
    /// Returns a fully explicit evaluator.
    ///
    pub fn custom (name: & str,
                   game_height_factor: i32,
                   last_block_height_factor: i32,
                   num_holes_factor: i32,
                   num_singles_factor: i32,
                   num_doubles_factor: i32,
                   num_triples_factor: i32,
                   num_tetrises_factor: i32,
                   recommended_depth: usize,
                   recommended_width: usize) -> Evaluator
    {
        Evaluator
        {
            name: name.to_owned(),
            game_height_factor,
            last_block_height_factor,
            num_holes_factor,
            num_singles_factor,
            num_doubles_factor,
            num_triples_factor,
            num_tetrises_factor,
            recommended_depth,
            recommended_width,
            reserve_tetris_column: false
        }
    }

    ///
    /// The do-nothing preset: every weight is zero.
    ///
    pub fn depressed () -> Evaluator
    {
        Evaluator::custom("Depressed", 0, 0, 0, 0, 0, 0, 0, 1, 1)
    }

    ///
    /// Scores the given state.
    ///
    pub fn evaluate (& self, state: & GameState) -> i32
    {
        let grid = state.grid();
        let rows = grid.row_count();
        let columns = grid.column_count();

        let mut top = rows;
        let mut found_top = false;
        let mut num_holes = 0;

        for row in 0 .. rows
        {
            for column in 0 .. columns
            {
                if grid.get(row, column) != BlockType::Nil
                {
                    if ! found_top
                    {
                        top = row;
                        found_top = true;
                    }
                }
                else if found_top && row > 0 && grid.get(row - 1, column) != BlockType::Nil
                {
                    num_holes += 1;
                }
            }
        }

        let game_height = (rows - top) as i32;
        let last_block_height = match state.original_block()
        {
            Some(block) => (rows - block.row()) as i32,
            None        => 0
        };

        let stats = state.stats();
        let mut score = game_height * self.game_height_factor
            + last_block_height * self.last_block_height_factor
            + num_holes * self.num_holes_factor
            + stats.num_singles as i32 * self.num_singles_factor
            + stats.num_doubles as i32 * self.num_doubles_factor
            + stats.num_triples as i32 * self.num_triples_factor
            + stats.num_tetrises as i32 * self.num_tetrises_factor;

        if self.reserve_tetris_column && rows >= 4
        {
            let well = columns - 1;
            for row in rows - 4 .. rows
            {
                if grid.get(row, well) != BlockType::Nil
                {
                    score -= 4;
                    break;
                }
            }
        }

        score
    }

    ///
    /// The tetris-chasing preset: smaller clears are penalized and the
    /// rightmost column is kept free for vertical bars.
    ///
    pub fn make_tetrises () -> Evaluator
    {
        let mut evaluator = Evaluator::custom("Make Tetrises", -2, -1, -4, -4, -8, -8, 16, 8, 5);
        evaluator.reserve_tetris_column = true;
        evaluator
    }

    ///
    /// Returns the name of this evaluator.
    ///
    pub fn name (& self) -> & str
    {
        & self.name
    }

    ///
    /// Returns the preset with the given case-insensitive name.
    ///
    pub fn preset (name: & str) -> Result<Evaluator>
    {
        match name.to_lowercase().replace(' ', "").as_str()
        {
            "balanced"     => Ok(Evaluator::balanced()),
            "survival"     => Ok(Evaluator::survival()),
            "maketetrises" => Ok(Evaluator::make_tetrises()),
            "depressed"    => Ok(Evaluator::depressed()),
            _              => Err(error::error!("Unknown evaluator preset '{}'.", name))
        }
    }

    ///
    /// Returns the search depth this evaluator was tuned for.
    ///
    pub fn recommended_depth (& self) -> usize
    {
        self.recommended_depth
    }

    ///
    /// Returns the search width this evaluator was tuned for.
    ///
    pub fn recommended_width (& self) -> usize
    {
        self.recommended_width
    }

    ///
    /// The keep-the-stack-low preset.
    ///
    pub fn survival () -> Evaluator
    {
        Evaluator::custom("Survival", -2, -6, -3, 1, 2, 4, 8, 5, 5)
    }
}

#[cfg(test)]
mod test
{
    use super::*;
    use crate::block::Block;
    use crate::grid::Grid;

    fn state_with_cells (cells: & [(usize, usize)]) -> GameState
    {
        let mut grid = Grid::new(20, 10, BlockType::Nil);
        for & (row, column) in cells
        {
            grid.set(row, column, BlockType::J);
        }
        let mut state = GameState::new(20, 10);
        state.set_grid(grid);
        state
    }

    #[test]
    fn empty_board_scores_zero ()
    {
        let state = GameState::new(20, 10);
        assert_eq!(Evaluator::balanced().evaluate(& state), 0);
    }

    #[test]
    fn evaluate_is_pure ()
    {
        let state = state_with_cells(& [(19, 0), (19, 1), (17, 4)]);
        let evaluator = Evaluator::survival();
        assert_eq!(evaluator.evaluate(& state), evaluator.evaluate(& state));
    }

    #[test]
    fn holes_are_covered_empty_cells ()
    {
        // One filled cell on top of an empty one: a single hole, height 2.
        let state = state_with_cells(& [(18, 3)]);
        let evaluator = Evaluator::custom("holes", 0, 0, -1, 0, 0, 0, 0, 1, 1);
        assert_eq!(evaluator.evaluate(& state), -1);

        // A column of two filled cells covers one empty cell.
        let state = state_with_cells(& [(17, 3), (18, 3)]);
        assert_eq!(evaluator.evaluate(& state), -1);

        // Side-by-side filled cells on the floor cover nothing.
        let state = state_with_cells(& [(19, 3), (19, 4)]);
        assert_eq!(evaluator.evaluate(& state), 0);
    }

    #[test]
    fn height_counts_from_first_occupied_row ()
    {
        let state = state_with_cells(& [(15, 0)]);
        let evaluator = Evaluator::custom("height", -1, 0, 0, 0, 0, 0, 0, 1, 1);
        assert_eq!(evaluator.evaluate(& state), -5);
    }

    #[test]
    fn landing_height_uses_the_committed_block ()
    {
        let state = GameState::new(20, 10);
        let mut block = Block::spawn(BlockType::O, 10);
        block.set_row(18);
        let next = state.commit(& block, false);

        let evaluator = Evaluator::custom("landing", 0, -1, 0, 0, 0, 0, 0, 1, 1);

        // The shape occupies the two bottom rows; height is taken from the
        // top-left corner of the shape.
        assert_eq!(evaluator.evaluate(& next), -2);
    }

    #[test]
    fn tetris_well_penalty_applies_to_the_last_column ()
    {
        let occupied = state_with_cells(& [(19, 9)]);
        let free = state_with_cells(& [(19, 0)]);

        let chasing = Evaluator::make_tetrises();
        let difference = chasing.evaluate(& free) - chasing.evaluate(& occupied);
        assert_eq!(difference, 4);

        let balanced = Evaluator::balanced();
        assert_eq!(balanced.evaluate(& free), balanced.evaluate(& occupied));
    }

    #[test]
    fn presets_resolve_by_name ()
    {
        assert_eq!(Evaluator::preset("balanced").unwrap(), Evaluator::balanced());
        assert_eq!(Evaluator::preset("Make Tetrises").unwrap(), Evaluator::make_tetrises());
        assert!(Evaluator::preset("bogus").is_err());
    }
}


use lazy_static::lazy_static;
use regex::Regex;

use super::grid::Grid;

use utils::error::Context;
use utils::hash::IntMap;
use utils::*;

///
/// A tetromino type. Grid cells reuse the same enum, with Nil marking an
/// empty cell.
///
#[derive(Clone, Copy, Debug, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub enum BlockType
{
    I,
    J,
    L,
    O,
    S,
    T,
    Z,
    Nil
}

///
/// The number of playable block types.
///
pub const BLOCK_TYPE_COUNT : usize = 7;

impl std::fmt::Display for BlockType
{
    fn fmt (& self, f: & mut std::fmt::Formatter<'_>) -> std::fmt::Result
    {
        let token = match self
        {
            BlockType::I   => "🟦".to_string(),
            BlockType::J   => "🟫".to_string(),
            BlockType::L   => "🟧".to_string(),
            BlockType::O   => "🟨".to_string(),
            BlockType::S   => "🟩".to_string(),
            BlockType::T   => "🟪".to_string(),
            BlockType::Z   => "🟥".to_string(),
            BlockType::Nil => "⬛".to_string()
        };
        write!(f, "{}", token)
    }
}

impl std::str::FromStr for BlockType
{
    type Err = Error;

    fn from_str (s: & str) -> Result<BlockType>
    {
        match s
        {
            "I" | "i" => Ok(BlockType::I),
            "J" | "j" => Ok(BlockType::J),
            "L" | "l" => Ok(BlockType::L),
            "O" | "o" => Ok(BlockType::O),
            "S" | "s" => Ok(BlockType::S),
            "T" | "t" => Ok(BlockType::T),
            "Z" | "z" => Ok(BlockType::Z),
            "_" | "-" | "." => Ok(BlockType::Nil),
            _               => Err(error::error!("'{}' names no block type.", s))
        }
    }
}

impl BlockType
{
    ///
    /// The playable types, in identifier order.
    ///
    pub fn all () -> [BlockType; BLOCK_TYPE_COUNT]
    {
        [BlockType::I, BlockType::J, BlockType::L, BlockType::O, BlockType::S, BlockType::T, BlockType::Z]
    }

    ///
    /// Returns the index of this type into the shape tables.
    ///
    pub fn as_index (& self) -> usize
    {
        match self
        {
            BlockType::I => 0,
            BlockType::J => 1,
            BlockType::L => 2,
            BlockType::O => 3,
            BlockType::S => 4,
            BlockType::T => 5,
            BlockType::Z => 6,
            _            => panic!("Can't take the index of the nil block type.")
        }
    }

    ///
    /// Returns the single-letter form used in block notation and logs; the
    /// board rendering in Display stays separate.
    ///
    pub fn letter (& self) -> char
    {
        match self
        {
            BlockType::I   => 'I',
            BlockType::J   => 'J',
            BlockType::L   => 'L',
            BlockType::O   => 'O',
            BlockType::S   => 'S',
            BlockType::T   => 'T',
            BlockType::Z   => 'Z',
            BlockType::Nil => '-'
        }
    }

    ///
    /// Returns the number of distinct rotations for this type.
    ///
    pub fn rotation_count (& self) -> usize
    {
        match self
        {
            BlockType::I => 2,
            BlockType::J => 4,
            BlockType::L => 4,
            BlockType::O => 1,
            BlockType::S => 2,
            BlockType::T => 4,
            BlockType::Z => 2,
            _            => panic!("Can't take the rotation count of the nil block type.")
        }
    }
}

///
/// Returns the stable integer key of a (type, rotation) pair. Four slots are
/// reserved per type, whether the type uses them or not.
///
pub fn block_identifier (block_type: & BlockType, rotation: usize) -> usize
{
    4 * block_type.as_index() + rotation % block_type.rotation_count()
}

///
/// Returns the shape grid of a (type, rotation) pair. Rotations wrap around
/// the type's rotation count.
///
pub fn shape (block_type: & BlockType, rotation: usize) -> & 'static Grid
{
    SHAPE_TABLE.get(& block_identifier(block_type, rotation)).unwrap()
}

///
/// Returns the column at which a freshly spawned block of the given type is
/// centered on a board with the given number of columns.
///
pub fn spawn_column (block_type: & BlockType, columns: usize) -> usize
{
    divide_by_two(columns - shape(block_type, 0).column_count())
}

fn divide_by_two (value: usize) -> usize
{
    (value + 1) / 2
}

lazy_static!
{
    static ref SHAPE_TABLE : IntMap<usize, Grid> = build_shape_table();
}

fn build_shape_table () -> IntMap<usize, Grid>
{
    let mut table : IntMap<usize, Grid> = IntMap::default();

    for block_type in BlockType::all()
    {
        for rotation in 0 .. block_type.rotation_count()
        {
            table.insert(block_identifier(& block_type, rotation), build_shape(& block_type, rotation));
        }
    }

    table
}

fn build_shape (block_type: & BlockType, rotation: usize) -> Grid
{
    let (rows, columns, cells) : (usize, usize, Vec<(usize, usize)>) = match (block_type, rotation)
    {
        (BlockType::I, 0) => (1, 4, vec![(0, 0), (0, 1), (0, 2), (0, 3)]),
        (BlockType::I, _) => (4, 1, vec![(0, 0), (1, 0), (2, 0), (3, 0)]),

        (BlockType::J, 0) => (2, 3, vec![(0, 0), (1, 0), (1, 1), (1, 2)]),
        (BlockType::J, 1) => (3, 2, vec![(0, 0), (0, 1), (1, 0), (2, 0)]),
        (BlockType::J, 2) => (2, 3, vec![(0, 0), (0, 1), (0, 2), (1, 2)]),
        (BlockType::J, _) => (3, 2, vec![(0, 1), (1, 1), (2, 0), (2, 1)]),

        (BlockType::L, 0) => (2, 3, vec![(0, 2), (1, 0), (1, 1), (1, 2)]),
        (BlockType::L, 1) => (3, 2, vec![(0, 0), (1, 0), (2, 0), (2, 1)]),
        (BlockType::L, 2) => (2, 3, vec![(0, 0), (0, 1), (0, 2), (1, 0)]),
        (BlockType::L, _) => (3, 2, vec![(0, 0), (0, 1), (1, 1), (2, 1)]),

        (BlockType::O, _) => (2, 2, vec![(0, 0), (0, 1), (1, 0), (1, 1)]),

        (BlockType::S, 0) => (2, 3, vec![(0, 1), (0, 2), (1, 0), (1, 1)]),
        (BlockType::S, _) => (3, 2, vec![(0, 0), (1, 0), (1, 1), (2, 1)]),

        (BlockType::T, 0) => (2, 3, vec![(0, 1), (1, 0), (1, 1), (1, 2)]),
        (BlockType::T, 1) => (3, 2, vec![(0, 0), (1, 0), (1, 1), (2, 0)]),
        (BlockType::T, 2) => (2, 3, vec![(0, 0), (0, 1), (0, 2), (1, 1)]),
        (BlockType::T, _) => (3, 2, vec![(0, 1), (1, 0), (1, 1), (2, 1)]),

        (BlockType::Z, 0) => (2, 3, vec![(0, 0), (0, 1), (1, 1), (1, 2)]),
        (BlockType::Z, _) => (3, 2, vec![(0, 1), (1, 0), (1, 1), (2, 0)]),

        _                 => panic!("Can't build a shape for the nil block type.")
    };

    let mut grid = Grid::new(rows, columns, BlockType::Nil);
    for (row, column) in cells
    {
        grid.set(row, column, * block_type);
    }
    grid
}

///
/// A piece on the board that has not been committed yet: a type, a rotation,
/// and the position of the shape's top-left corner.
///
/// For a valid active block every occupied cell of its shape lies within the
/// playing field and overlaps no filled cell; validity is checked against a
/// GameState, not here.
///
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct Block
{
    block_type: BlockType,
    rotation: usize,
    row: usize,
    column: usize
}

///
/// Block notation: `<letter>:r<rotation>:<row>,<column>`, e.g. `T:r1:7,2`.
/// Display writes it and FromStr reads it back.
///
impl std::fmt::Display for Block
{
    fn fmt (& self, f: & mut std::fmt::Formatter<'_>) -> std::fmt::Result
    {
        write!(f, "{}:r{}:{},{}", self.block_type.letter(), self.rotation, self.row, self.column)
    }
}

impl std::str::FromStr for Block
{
    type Err = Error;

    fn from_str (s: & str) -> Result<Block>
    {
        lazy_static!
        {
            static ref BLOCK_RE : Regex = Regex::new(r"^([IJLOSTZ]):r(\d+):(\d+),(\d+)$").unwrap();
        }

        let context = format!("Invalid notation '{}' for block.", s);

        match BLOCK_RE.captures(s)
        {
            Some(capture) =>
            {
                let block_type = capture.get(1).unwrap().as_str().parse::<BlockType>().context(context.clone())?;
                let rotation = capture.get(2).unwrap().as_str().parse::<usize>().context(context.clone())?;
                let row = capture.get(3).unwrap().as_str().parse::<usize>().context(context.clone())?;
                let column = capture.get(4).unwrap().as_str().parse::<usize>().context(context.clone())?;
                Ok(Block::new(block_type, rotation, row, column))
            },
            None =>
            {
                Err(error::error!("No capture found.")).context(context.clone())
            }
        }
    }
}

impl Block
{
    ///
    /// Returns the type of this block.
    ///
    pub fn block_type (& self) -> BlockType
    {
        self.block_type
    }

    ///
    /// Returns the column of the shape's top-left corner.
    ///
    pub fn column (& self) -> usize
    {
        self.column
    }

    ///
    /// Returns the column extent of the current shape.
    ///
    pub fn column_count (& self) -> usize
    {
        self.grid().column_count()
    }

    ///
    /// Returns the shape grid for the current rotation.
    ///
    pub fn grid (& self) -> & 'static Grid
    {
        shape(& self.block_type, self.rotation)
    }

    ///
    /// Returns the stable key of this block's (type, rotation) pair.
    ///
    pub fn identification (& self) -> usize
    {
        block_identifier(& self.block_type, self.rotation)
    }

    ///
    /// Returns a new block at the given position.
    ///
    pub fn new (block_type: BlockType, rotation: usize, row: usize, column: usize) -> Block
    {
        Block { block_type, rotation: rotation % block_type.rotation_count(), row, column }
    }

    ///
    /// Returns the number of distinct rotations of this block's type.
    ///
    pub fn num_rotations (& self) -> usize
    {
        self.block_type.rotation_count()
    }

    ///
    /// Advances this block to its next rotation.
    ///
    pub fn rotate (& mut self)
    {
        self.set_rotation(self.rotation + 1);
    }

    ///
    /// Returns the current rotation.
    ///
    pub fn rotation (& self) -> usize
    {
        self.rotation
    }

    ///
    /// Returns the row of the shape's top-left corner.
    ///
    pub fn row (& self) -> usize
    {
        self.row
    }

    ///
    /// Returns the row extent of the current shape.
    ///
    pub fn row_count (& self) -> usize
    {
        self.grid().row_count()
    }

    ///
    /// Moves this block to the given column.
    ///
    pub fn set_column (& mut self, column: usize)
    {
        self.column = column;
    }

    ///
    /// Sets the rotation, wrapping around the type's rotation count.
    ///
    pub fn set_rotation (& mut self, rotation: usize)
    {
        self.rotation = rotation % self.block_type.rotation_count();
    }

    ///
    /// Moves this block to the given row.
    ///
    pub fn set_row (& mut self, row: usize)
    {
        self.row = row;
    }

    ///
    /// Returns the block of the given type freshly spawned at the top of a
    /// board with the given number of columns.
    ///
    pub fn spawn (block_type: BlockType, columns: usize) -> Block
    {
        Block::new(block_type, 0, 0, spawn_column(& block_type, columns))
    }
}

#[cfg(test)]
mod test
{
    use super::*;

    #[test]
    fn rotation_counts ()
    {
        assert_eq!(BlockType::I.rotation_count(), 2);
        assert_eq!(BlockType::J.rotation_count(), 4);
        assert_eq!(BlockType::L.rotation_count(), 4);
        assert_eq!(BlockType::O.rotation_count(), 1);
        assert_eq!(BlockType::S.rotation_count(), 2);
        assert_eq!(BlockType::T.rotation_count(), 4);
        assert_eq!(BlockType::Z.rotation_count(), 2);
    }

    #[test]
    fn shapes_wrap_around_rotation_count ()
    {
        for block_type in BlockType::all()
        {
            for rotation in 0 .. 4
            {
                let wrapped = rotation % block_type.rotation_count();
                assert_eq!(shape(& block_type, rotation), shape(& block_type, wrapped));
            }
        }
    }

    #[test]
    fn every_shape_has_four_cells ()
    {
        for block_type in BlockType::all()
        {
            for rotation in 0 .. block_type.rotation_count()
            {
                let grid = shape(& block_type, rotation);
                let mut count = 0;
                for row in 0 .. grid.row_count()
                {
                    for column in 0 .. grid.column_count()
                    {
                        if grid.get(row, column) != BlockType::Nil
                        {
                            count += 1;
                        }
                    }
                }
                assert_eq!(count, 4);
            }
        }
    }

    #[test]
    fn identifiers_are_distinct ()
    {
        let mut seen = std::collections::BTreeSet::new();
        for block_type in BlockType::all()
        {
            for rotation in 0 .. block_type.rotation_count()
            {
                assert!(seen.insert(block_identifier(& block_type, rotation)));
            }
        }
    }

    #[test]
    fn spawn_is_centered ()
    {
        assert_eq!(Block::spawn(BlockType::I, 10).column(), 3);
        assert_eq!(Block::spawn(BlockType::O, 10).column(), 4);
        assert_eq!(Block::spawn(BlockType::T, 10).column(), 4);
    }

    #[test]
    fn rotation_advances_and_wraps ()
    {
        let mut block = Block::spawn(BlockType::S, 10);
        block.rotate();
        assert_eq!(block.rotation(), 1);
        block.rotate();
        assert_eq!(block.rotation(), 0);
    }

    #[test]
    fn notation_roundtrip ()
    {
        let block = Block::new(BlockType::T, 3, 7, 2);
        assert_eq!(block.to_string(), "T:r3:7,2");
        let parsed = block.to_string().parse::<Block>().unwrap();
        assert_eq!(parsed, block);

        assert!("T:r1:7".parse::<Block>().is_err());
        assert_eq!("z".parse::<BlockType>().unwrap(), BlockType::Z);
        assert!("Q".parse::<BlockType>().is_err());
    }
}

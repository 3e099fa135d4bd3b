
pub mod bag;
pub use self::bag::BlockBag;

pub mod block;
pub use self::block::{Block, BlockType};

pub mod evaluator;
pub use self::evaluator::Evaluator;

pub mod events;
pub use self::events::{EventHandler, GameEvent};

pub mod game;
pub use self::game::{ComputerGame, Direction, Game, HumanGame};

pub mod grid;
pub use self::grid::Grid;

pub mod multiplayer;
pub use self::multiplayer::{MultiplayerGame, Participant};

pub mod node;
pub use self::node::{NodePtr, SearchNode};

pub mod state;
pub use self::state::{GameState, Stats};


use utils::{Serialize, Deserialize};

///
/// A configuration object for the planner and its search.
///
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct Config
{
    #[serde(default = "search_depth")]
    pub search_depth: usize,

    #[serde(default = "search_width")]
    pub search_width: usize,

    #[serde(default = "worker_count")]
    pub worker_count: usize,

    #[serde(default = "move_speed")]
    pub move_speed: u64,

    #[serde(default = "drop_to_commit")]
    pub drop_to_commit: bool,

    #[serde(default = "evaluator")]
    pub evaluator: String,

    #[serde(default)]
    pub weights: Option<Weights>
}

///
/// Explicit weights for the custom evaluator.
///
#[derive(Clone, Copy, Debug, Serialize, Deserialize)]
pub struct Weights
{
    pub game_height: i32,
    pub last_block_height: i32,
    pub holes: i32,
    pub singles: i32,
    pub doubles: i32,
    pub triples: i32,
    pub tetrises: i32
}

impl Default for Config
{
    fn default () -> Config
    {
        Config
        {
            search_depth: search_depth(),
            search_width: search_width(),
            worker_count: worker_count(),
            move_speed: move_speed(),
            drop_to_commit: drop_to_commit(),
            evaluator: evaluator(),
            weights: None
        }
    }
}

fn search_depth () -> usize
{
    6
}

fn search_width () -> usize
{
    6
}

fn worker_count () -> usize
{
    0
}

fn move_speed () -> u64
{
    20
}

fn drop_to_commit () -> bool
{
    false
}

fn evaluator () -> String
{
    "balanced".to_owned()
}


use utils::{Serialize, Deserialize};

pub use crate::search::config::Config as SearchConfig;

///
/// Represents a full configuration.
///
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct Config
{
    #[serde(default)]
    pub game: GameConfig,

    #[serde(default)]
    pub search: SearchConfig,

    #[serde(default)]
    pub benchmark: BenchmarkConfig,

    #[serde(default)]
    pub duel: DuelConfig,

    #[serde(default = "log_path")]
    pub log_path: String,

    #[serde(default = "log_spec")]
    pub log_spec: String
}

impl Default for Config
{
    fn default () -> Config
    {
        Config
        {
            game: GameConfig::default(),
            search: SearchConfig::default(),
            benchmark: BenchmarkConfig::default(),
            duel: DuelConfig::default(),
            log_path: log_path(),
            log_spec: log_spec()
        }
    }
}

///
/// Represents the live-game configuration.
///
#[derive(Clone, Copy, Debug, Serialize, Deserialize)]
pub struct GameConfig
{
    #[serde(default = "rows")]
    pub rows: usize,

    #[serde(default = "columns")]
    pub columns: usize,

    #[serde(default = "starting_level")]
    pub starting_level: i32,

    #[serde(default = "bag_size")]
    pub bag_size: usize
}

impl Default for GameConfig
{
    fn default () -> GameConfig
    {
        GameConfig
        {
            rows: rows(),
            columns: columns(),
            starting_level: starting_level(),
            bag_size: bag_size()
        }
    }
}

///
/// Represents the duel-mode configuration.
///
#[derive(Clone, Copy, Debug, Serialize, Deserialize)]
pub struct DuelConfig
{
    #[serde(default = "time_limit_seconds")]
    pub time_limit_seconds: u64
}

impl Default for DuelConfig
{
    fn default () -> DuelConfig
    {
        DuelConfig { time_limit_seconds: time_limit_seconds() }
    }
}

///
/// Represents the benchmark-mode configuration.
///
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct BenchmarkConfig
{
    #[serde(default = "rounds")]
    pub rounds: usize,

    #[serde(default = "worker_counts")]
    pub worker_counts: Vec<usize>
}

impl Default for BenchmarkConfig
{
    fn default () -> BenchmarkConfig
    {
        BenchmarkConfig { rounds: rounds(), worker_counts: worker_counts() }
    }
}

fn log_path () -> String
{
    "logs".to_owned()
}

fn log_spec () -> String
{
    "info".to_owned()
}

fn rows () -> usize
{
    20
}

fn columns () -> usize
{
    10
}

fn starting_level () -> i32
{
    0
}

fn bag_size () -> usize
{
    1
}

fn rounds () -> usize
{
    3
}

fn time_limit_seconds () -> u64
{
    300
}

fn worker_counts () -> Vec<usize>
{
    vec![1, 2, 4]
}

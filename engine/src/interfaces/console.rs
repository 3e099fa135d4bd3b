
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, RwLock};

use tetris::events::dispatch_events;
use tetris::{BlockBag, ComputerGame, Evaluator, EventHandler, Game};

use crate::config::Config;
use crate::player::{ComputerPlayer, DownBehavior, Gravity, Ticker};

use utils::error::Context;
use utils::log;
use utils::*;

///
/// Logs line clears as they are delivered by the event queue.
///
struct ScoreLogger;

impl EventHandler for ScoreLogger
{
    fn on_game_state_changed (& self, _game: & dyn Game)
    {
    }

    fn on_lines_cleared (& self, game: & dyn Game, count: usize)
    {
        let stats = game.game_state().stats().clone();
        log::info!("Cleared {} lines ({} total, level {}).", count, stats.num_lines, game.level());
    }
}

///
/// Runs a self-playing game and interfaces with an operator over stdin.
///
pub struct Console
{
    game: Arc<RwLock<ComputerGame>>,
    player: ComputerPlayer,
    _gravity: Gravity,
    _ui: Ticker
}

impl Console
{
    ///
    /// Builds the evaluator selected by the configuration.
    ///
    pub fn configured_evaluator (config: & Config) -> Result<Evaluator>
    {
        match config.search.evaluator.to_lowercase().as_str()
        {
            "custom" =>
            {
                let weights = config.search.weights
                    .ok_or_else(|| error::error!("The custom evaluator needs a [search.weights] table."))?;
                Ok(Evaluator::custom(
                    "Custom",
                    weights.game_height,
                    weights.last_block_height,
                    weights.holes,
                    weights.singles,
                    weights.doubles,
                    weights.triples,
                    weights.tetrises,
                    config.search.search_depth,
                    config.search.search_width))
            },
            name => Evaluator::preset(name)
        }
    }

    ///
    /// Creates a new console over a fresh game.
    ///
    pub fn new (config: & Config) -> Result<Console>
    {
        let context = "Failed to set up the console.";

        let game = Arc::new(RwLock::new(ComputerGame::with_bag(
            config.game.rows, config.game.columns, BlockBag::new(config.game.bag_size))));

        {
            let mut locked = game.write().unwrap();
            locked.set_starting_level(config.game.starting_level);
            locked.register_event_handler(Arc::new(ScoreLogger));
        }

        let evaluator = Console::configured_evaluator(config).context(context)?;

        let player = ComputerPlayer::new(
            & game,
            evaluator,
            config.search.search_depth,
            config.search.search_width,
            config.search.worker_count).context(context)?;

        player.set_move_speed(config.search.move_speed);
        player.set_down_behavior(match config.search.drop_to_commit
        {
            true  => DownBehavior::Drop,
            false => DownBehavior::Step
        });

        let gravity = Gravity::new(& game).context(context)?;

        // The UI tick: deliver pending events and notice the game ending.
        let ui =
        {
            let game = game.clone();
            let reported_over = AtomicBool::new(false);
            Ticker::with_interval("console-ui", 50, move ||
            {
                dispatch_events(& game);

                if game.read().unwrap().is_game_over() && ! reported_over.swap(true, Ordering::SeqCst)
                {
                    let stats = game.read().unwrap().game_state().stats().clone();
                    match serde_json::to_string(& stats)
                    {
                        Ok(summary) => log::info!("Game over. Summary: {}", summary),
                        Err(err)    => log::error!("Serializing the summary failed: {}.", err)
                    };
                }
            })?
        };

        Ok(Console { game, player, _gravity: gravity, _ui: ui })
    }

    ///
    /// Runs the operator loop until quit.
    ///
    pub fn run_loop (& mut self)
    {
        let mut cmdline = String::new();
        loop
        {
            cmdline.clear();
            if std::io::stdin().read_line(& mut cmdline).is_err()
            {
                break;
            }
            let args : Vec<& str> = cmdline.split_whitespace().collect();
            let cmd : & str = args.first().unwrap_or(& "");

            match cmd
            {
                "" => continue,

                "board" =>
                {
                    let locked = self.game.read().unwrap();
                    log::info!("Board:\n{}", locked.game_grid());
                },

                "stats" =>
                {
                    let locked = self.game.read().unwrap();
                    let state = locked.game_state();
                    log::info!("Level {}, precalculated {}, search depth {}/{}, stats {:?}.",
                               locked.level(),
                               locked.num_precalculated_moves(),
                               self.player.current_search_depth(),
                               self.player.search_depth(),
                               state.stats());
                },

                "pause" =>
                {
                    self.game.write().unwrap().set_paused(true);
                },

                "resume" =>
                {
                    self.game.write().unwrap().set_paused(false);
                },

                "speed" =>
                {
                    match args.get(1).and_then(|raw| raw.parse::<u64>().ok())
                    {
                        Some(speed) => self.player.set_move_speed(speed),
                        None        => log::error!("Usage: speed <moves-per-second>.")
                    };
                },

                "penalty" =>
                {
                    match args.get(1).and_then(|raw| raw.parse::<usize>().ok())
                    {
                        Some(count) => self.game.write().unwrap().apply_line_penalty(count),
                        None        => log::error!("Usage: penalty <lines>.")
                    };
                },

                "quit" | "shutdown" =>
                {
                    break;
                },

                _ =>
                {
                    log::error!("Unknown command '{}'.", cmd)
                }
            };
        }
    }
}

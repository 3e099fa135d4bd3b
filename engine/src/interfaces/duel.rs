
use std::thread;
use std::time::{Duration, Instant};

use tetris::events::dispatch_events;
use tetris::{Game, MultiplayerGame};

use crate::config::Config;
use crate::interfaces::console::Console;
use crate::player::{ComputerPlayer, DownBehavior, Gravity};

use utils::log;
use utils::*;

///
/// Runs a computer-versus-computer match: two seats on opposing teams, each
/// with its own planner and gravity, connected through the line-penalty
/// protocol. The loop dispatches both games' events from this thread until
/// one side tops out or the time limit passes.
///
pub fn run (config: & Config) -> Result<()>
{
    let evaluator = Console::configured_evaluator(config)?;

    let multiplayer = MultiplayerGame::new(config.game.rows, config.game.columns);
    let white = multiplayer.add_player("white", "white");
    let black = multiplayer.add_player("black", "black");

    let mut players = Vec::new();
    let mut gravities = Vec::new();

    for seat in [& white, & black]
    {
        seat.game().write().unwrap().set_starting_level(config.game.starting_level);

        let player = ComputerPlayer::new(
            seat.game(),
            evaluator.clone(),
            config.search.search_depth,
            config.search.search_width,
            config.search.worker_count)?;

        player.set_move_speed(config.search.move_speed);
        player.set_down_behavior(match config.search.drop_to_commit
        {
            true  => DownBehavior::Drop,
            false => DownBehavior::Step
        });

        players.push(player);
        gravities.push(Gravity::new(seat.game())?);
    }

    log::info!("Duel started: white vs black on a {}x{} field.",
               config.game.rows, config.game.columns);

    let deadline = Instant::now() + Duration::from_secs(config.duel.time_limit_seconds);
    loop
    {
        dispatch_events(white.game());
        dispatch_events(black.game());

        let white_over = white.game().read().unwrap().is_game_over();
        let black_over = black.game().read().unwrap().is_game_over();

        if white_over || black_over
        {
            let verdict = match (white_over, black_over)
            {
                (true, true)  => "draw: both sides topped out".to_owned(),
                (true, false) => "black wins".to_owned(),
                _             => "white wins".to_owned()
            };
            log::info!("Duel over, {}.", verdict);
            break;
        }

        if Instant::now() >= deadline
        {
            let white_lines = white.game().read().unwrap().game_state().stats().num_lines;
            let black_lines = black.game().read().unwrap().game_state().stats().num_lines;
            log::info!("Duel time limit reached: white {} lines, black {} lines.",
                       white_lines, black_lines);
            break;
        }

        thread::sleep(Duration::from_millis(50));
    }

    for seat in [& white, & black]
    {
        let stats = seat.game().read().unwrap().game_state().stats().clone();
        match serde_json::to_string(& stats)
        {
            Ok(summary) => log::info!("Final stats for {}: {}", seat.name(), summary),
            Err(err)    => log::error!("Serializing duel stats failed: {}.", err)
        };
    }

    Ok(())
}

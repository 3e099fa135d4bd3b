
use std::sync::{Arc, Mutex, RwLock, Weak};

use super::bag::BlockBag;
use super::events::EventHandler;
use super::game::{ComputerGame, Game};

use utils::log;
use utils::*;

///
/// One seat in a multiplayer match: a named participant on a team, with its
/// own live game.
///
pub struct Participant
{
    name: String,
    team: String,
    game: Arc<RwLock<ComputerGame>>,
    penalty_handler: Arc<dyn EventHandler>
}

impl Participant
{
    ///
    /// Returns this participant's live game.
    ///
    pub fn game (& self) -> & Arc<RwLock<ComputerGame>>
    {
        & self.game
    }

    ///
    /// Returns this participant's name.
    ///
    pub fn name (& self) -> & str
    {
        & self.name
    }

    ///
    /// Returns this participant's team.
    ///
    pub fn team (& self) -> & str
    {
        & self.team
    }
}

///
/// Wires the line-penalty protocol between a participant's clears and every
/// opposing game. The handler runs on the dispatching thread, which holds
/// only a read lock on the clearing game; opposing games are write-locked
/// one at a time.
///
struct PenaltyHandler
{
    team: String,
    roster: Weak<Mutex<Vec<Arc<Participant>>>>
}

impl EventHandler for PenaltyHandler
{
    fn on_game_state_changed (& self, _game: & dyn Game)
    {
    }

    fn on_lines_cleared (& self, _game: & dyn Game, count: usize)
    {
        let roster = match self.roster.upgrade()
        {
            Some(roster) => roster,
            None         => return
        };

        let opponents : Vec<Arc<Participant>> = roster.lock().unwrap().iter()
            .filter(|participant| participant.team != self.team)
            .cloned()
            .collect();

        for opponent in opponents
        {
            opponent.game.write().unwrap().apply_line_penalty(count);
        }
    }
}

///
/// A local multiplayer match: a set of participants whose games run side by
/// side, with line clears of two or more rows turning into garbage-row
/// penalties for every player outside the clearing team.
///
/// Events must be delivered by a single dispatching thread; the penalty
/// handlers take write locks on the opposing games while it runs.
///
pub struct MultiplayerGame
{
    rows: usize,
    columns: usize,
    roster: Arc<Mutex<Vec<Arc<Participant>>>>
}

impl MultiplayerGame
{
    ///
    /// Adds a participant with a fresh game and returns its seat.
    ///
    pub fn add_player (& self, team: & str, name: & str) -> Arc<Participant>
    {
        self.add_player_with_bag(team, name, BlockBag::new(1))
    }

    ///
    /// Adds a participant dealing from the given bag.
    ///
    pub fn add_player_with_bag (& self, team: & str, name: & str, bag: BlockBag) -> Arc<Participant>
    {
        let game = Arc::new(RwLock::new(ComputerGame::with_bag(self.rows, self.columns, bag)));

        let penalty_handler : Arc<dyn EventHandler> = Arc::new(PenaltyHandler
        {
            team: team.to_owned(),
            roster: Arc::downgrade(& self.roster)
        });
        game.write().unwrap().register_event_handler(penalty_handler.clone());

        let participant = Arc::new(Participant
        {
            name: name.to_owned(),
            team: team.to_owned(),
            game,
            penalty_handler
        });

        log::info!("Player '{}' joined team '{}'.", name, team);
        self.roster.lock().unwrap().push(participant.clone());
        participant
    }

    ///
    /// Returns a new match over empty fields of the given size.
    ///
    pub fn new (rows: usize, columns: usize) -> MultiplayerGame
    {
        MultiplayerGame { rows, columns, roster: Arc::new(Mutex::new(Vec::new())) }
    }

    ///
    /// Returns the current participants.
    ///
    pub fn players (& self) -> Vec<Arc<Participant>>
    {
        self.roster.lock().unwrap().clone()
    }

    ///
    /// Removes a participant and unhooks its penalty wiring.
    ///
    pub fn remove_player (& self, participant: & Arc<Participant>)
    {
        participant.game.write().unwrap().unregister_event_handler(& participant.penalty_handler);
        self.roster.lock().unwrap().retain(|existing| ! Arc::ptr_eq(existing, participant));
        log::info!("Player '{}' left the game.", participant.name);
    }
}

#[cfg(test)]
mod test
{
    use super::*;
    use crate::events::{dispatch_events, GameEvent};

    fn match_with_three_seats () -> (MultiplayerGame, Arc<Participant>, Arc<Participant>, Arc<Participant>)
    {
        let multiplayer = MultiplayerGame::new(20, 10);
        let left = multiplayer.add_player_with_bag("left", "alpha", BlockBag::with_seed(1, 1));
        let ally = multiplayer.add_player_with_bag("left", "beta", BlockBag::with_seed(1, 2));
        let right = multiplayer.add_player_with_bag("right", "gamma", BlockBag::with_seed(1, 3));
        (multiplayer, left, ally, right)
    }

    #[test]
    fn clears_penalize_only_the_opposing_team ()
    {
        let (_multiplayer, left, ally, right) = match_with_three_seats();

        left.game().read().unwrap().event_queue().post(GameEvent::LinesCleared(2));
        dispatch_events(left.game());

        let penalized = right.game().read().unwrap().game_state();
        assert!(penalized.tainted());
        assert_eq!(penalized.first_occupied_row(), 19);

        let spared = ally.game().read().unwrap().game_state();
        assert!(! spared.tainted());
        assert_eq!(spared.first_occupied_row(), 20);

        let own = left.game().read().unwrap().game_state();
        assert!(! own.tainted());
    }

    #[test]
    fn single_line_clears_carry_no_penalty ()
    {
        let (_multiplayer, left, _ally, right) = match_with_three_seats();

        left.game().read().unwrap().event_queue().post(GameEvent::LinesCleared(1));
        dispatch_events(left.game());

        assert!(! right.game().read().unwrap().game_state().tainted());
    }

    #[test]
    fn removed_players_stop_both_giving_and_taking ()
    {
        let (multiplayer, left, _ally, right) = match_with_three_seats();
        assert_eq!(multiplayer.players().len(), 3);

        multiplayer.remove_player(& right);
        assert_eq!(multiplayer.players().len(), 2);

        left.game().read().unwrap().event_queue().post(GameEvent::LinesCleared(4));
        dispatch_events(left.game());
        assert!(! right.game().read().unwrap().game_state().tainted());

        right.game().read().unwrap().event_queue().post(GameEvent::LinesCleared(4));
        dispatch_events(right.game());
        assert!(! left.game().read().unwrap().game_state().tainted());
    }
}


use std::collections::VecDeque;
use std::sync::{Arc, Mutex, RwLock};

use super::game::Game;

///
/// A notification produced by a game mutation.
///
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum GameEvent
{
    Changed,
    LinesCleared(usize)
}

///
/// An observer of game notifications. Handlers are never called from the
/// mutating thread; the game posts events into its pending queue and a
/// UI-owned tick delivers them through dispatch_events.
///
pub trait EventHandler : Send + Sync
{
    ///
    /// Called after any observable mutation of the game.
    ///
    fn on_game_state_changed (& self, game: & dyn Game);

    ///
    /// Called after a commit removed the given number of rows.
    ///
    fn on_lines_cleared (& self, game: & dyn Game, count: usize);
}

///
/// The post-to-main channel: mutations enqueue events here under the game's
/// write lock, and whichever thread owns the UI drains them later.
///
#[derive(Debug, Default)]
pub struct EventQueue
{
    pending: Mutex<VecDeque<GameEvent>>
}

impl EventQueue
{
    ///
    /// Takes all pending events.
    ///
    pub fn drain (& self) -> Vec<GameEvent>
    {
        self.pending.lock().unwrap().drain(..).collect()
    }

    ///
    /// Returns an empty queue.
    ///
    pub fn new () -> EventQueue
    {
        EventQueue::default()
    }

    ///
    /// Appends an event.
    ///
    pub fn post (& self, event: GameEvent)
    {
        self.pending.lock().unwrap().push_back(event);
    }
}

///
/// Delivers the game's pending events to its registered handlers. Meant to
/// be called from the thread that owns the UI; the game is only read-locked
/// while handlers run.
///
pub fn dispatch_events<G> (game: & Arc<RwLock<G>>)
    where G: Game + 'static
{
    let events =
    {
        let locked = game.read().unwrap();
        locked.event_queue().drain()
    };

    if events.is_empty()
    {
        return;
    }

    let locked = game.read().unwrap();
    for event in events
    {
        for handler in locked.event_handlers()
        {
            match event
            {
                GameEvent::Changed             => handler.on_game_state_changed(& * locked),
                GameEvent::LinesCleared(count) => handler.on_lines_cleared(& * locked, count)
            };
        }
    }
}

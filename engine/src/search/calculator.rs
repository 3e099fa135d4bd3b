
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};

use tetris::block::{Block, BlockType};
use tetris::node::{self, NodePtr, SearchNode};
use tetris::Evaluator;

use super::pool::WorkerPool;
use super::sync::Guard;
use super::worker::{Interruption, Worker};

use utils::error::Interrupted;
use utils::log;
use utils::*;

///
/// The lifecycle of a search. Statuses only ever advance, except that
/// Working repeats across plies; Finished, Stopped and Error are terminal.
///
#[derive(Clone, Copy, Debug, PartialEq, Eq, PartialOrd, Ord)]
pub enum SearchStatus
{
    Idle,
    Started,
    Working,
    Finished,
    Stopped,
    Error
}

impl SearchStatus
{
    ///
    /// Determines whether this status ends the search.
    ///
    pub fn is_terminal (& self) -> bool
    {
        matches!(self, SearchStatus::Finished | SearchStatus::Stopped | SearchStatus::Error)
    }
}

///
/// Per-ply bookkeeping: the best node registered so far, how many parents
/// registered their offspring, and whether the ply has been published.
///
struct TreeRowInfo
{
    best: Option<NodePtr>,
    best_score: i32,
    best_path: Vec<usize>,
    node_count: u64,
    finished: bool
}

struct TreeRowInfos
{
    infos: Mutex<Vec<TreeRowInfo>>,
    current_depth: AtomicUsize
}

impl TreeRowInfos
{
    fn best_node (& self) -> Option<NodePtr>
    {
        match self.current_depth.load(Ordering::SeqCst)
        {
            0     => None,
            depth => self.best_node_at(depth)
        }
    }

    fn best_node_at (& self, depth: usize) -> Option<NodePtr>
    {
        let infos = self.infos.lock().unwrap();
        infos.get(depth.wrapping_sub(1)).and_then(|info| info.best.clone())
    }

    fn current_depth (& self) -> usize
    {
        self.current_depth.load(Ordering::SeqCst)
    }

    fn new (max_depth: usize) -> TreeRowInfos
    {
        let mut infos = Vec::with_capacity(max_depth);
        for _ in 0 .. max_depth
        {
            infos.push(TreeRowInfo { best: None, best_score: 0, best_path: Vec::new(), node_count: 0, finished: false });
        }
        TreeRowInfos { infos: Mutex::new(infos), current_depth: AtomicUsize::new(0) }
    }

    fn node_count_at (& self, depth: usize) -> u64
    {
        let infos = self.infos.lock().unwrap();
        infos.get(depth.wrapping_sub(1)).map_or(0, |info| info.node_count)
    }

    ///
    /// Records a candidate best node for a ply. Score ties are broken by
    /// the node's identifier path so that the outcome does not depend on
    /// which worker registered first.
    ///
    fn register_node (& self, node: & NodePtr, depth: usize)
    {
        let score = node.lock().unwrap().score();
        let path = identifier_path(node);

        let mut infos = self.infos.lock().unwrap();
        let info = & mut infos[depth - 1];
        if info.best.is_none() || score > info.best_score
            || (score == info.best_score && path < info.best_path)
        {
            info.best = Some(node.clone());
            info.best_score = score;
            info.best_path = path;
        }
        info.node_count += 1;
    }

    ///
    /// Publishes a ply. Fails when nothing was registered for it, which
    /// means a fan-out produced no children on a live state.
    ///
    fn set_finished (& self, depth: usize) -> Result<()>
    {
        let mut infos = self.infos.lock().unwrap();
        let info = & mut infos[depth - 1];

        if info.best.is_none()
        {
            return Err(error::error!("Search ply {} completed without any nodes.", depth));
        }

        info.finished = true;
        self.current_depth.store(depth, Ordering::SeqCst);
        Ok(())
    }
}

struct CalculatorShared
{
    root: Mutex<NodePtr>,
    block_types: Vec<BlockType>,
    widths: Vec<usize>,
    evaluator: Evaluator,
    quit: AtomicBool,
    status: Guard<SearchStatus>,
    rows_info: TreeRowInfos
}

///
/// Pre-computes a multi-ply placement plan: an iterative-deepening,
/// best-first population of a game-state tree, with the per-leaf fan-outs
/// spread over a worker pool and the outer loop hosted on a dedicated main
/// worker.
///
/// Per target depth the tree is descended; every leaf one ply short of the
/// target schedules one fan-out task that generates all legal landings of
/// the ply's block, scores them, and keeps the best `width`. After the pool
/// drains, the ply is published. A stop request interrupts all workers at
/// their next checkpoint and keeps every ply published so far; the tree is
/// then carved down to the single best path, whose head result() hands out.
///
pub struct NodeCalculator
{
    shared: Arc<CalculatorShared>,
    main_worker: Arc<Worker>,
    pool: Arc<WorkerPool>
}

impl Drop for NodeCalculator
{
    fn drop (& mut self)
    {
        self.stop();
    }
}

impl NodeCalculator
{
    ///
    /// Returns the best node of the given completed ply.
    ///
    pub fn best_node_at (& self, depth: usize) -> Option<NodePtr>
    {
        self.shared.rows_info.best_node_at(depth)
    }

    ///
    /// Returns the highest completed ply.
    ///
    pub fn current_search_depth (& self) -> usize
    {
        self.shared.rows_info.current_depth()
    }

    ///
    /// Returns the number of plies the search may look ahead.
    ///
    pub fn max_search_depth (& self) -> usize
    {
        self.shared.block_types.len()
    }

    ///
    /// Returns a new calculator over the given root. The root is typically
    /// a clone of the live game's end node; block_types lists the future
    /// pieces the search may see and widths the fan-out kept per ply.
    ///
    pub fn new (root: NodePtr,
                block_types: Vec<BlockType>,
                widths: Vec<usize>,
                evaluator: Evaluator,
                main_worker: Arc<Worker>,
                pool: Arc<WorkerPool>) -> Result<NodeCalculator>
    {
        if block_types.is_empty()
        {
            return Err(error::error!("A search needs at least one future block."));
        }
        if block_types.len() != widths.len()
        {
            return Err(error::error!("Got {} future blocks but {} widths.", block_types.len(), widths.len()));
        }
        if widths.iter().any(|& width| width == 0)
        {
            return Err(error::error!("Search widths must be at least 1."));
        }
        if pool.size() == 0
        {
            return Err(error::error!("Can't search on an empty worker pool."));
        }

        let max_depth = block_types.len();
        let shared = Arc::new(CalculatorShared
        {
            root: Mutex::new(root),
            block_types,
            widths,
            evaluator,
            quit: AtomicBool::new(false),
            status: Guard::new(SearchStatus::Idle),
            rows_info: TreeRowInfos::new(max_depth)
        });

        Ok(NodeCalculator { shared, main_worker, pool })
    }

    ///
    /// Returns the number of nodes registered at the given completed ply.
    ///
    pub fn node_count_at (& self, depth: usize) -> u64
    {
        self.shared.rows_info.node_count_at(depth)
    }

    ///
    /// Returns the head of the carved best path: a node one ply below the
    /// root whose single-child chain ends at the best node of the highest
    /// completed ply. None when no ply completed or the search errored.
    ///
    pub fn result (& self) -> Option<NodePtr>
    {
        if self.status() == SearchStatus::Error || self.current_search_depth() == 0
        {
            return None;
        }

        let root = self.shared.root.lock().unwrap();
        let head = root.lock().unwrap().first_child();
        head
    }

    ///
    /// Schedules the search on the main worker and returns immediately.
    ///
    pub fn start (& self)
    {
        if self.shared.status.get() != SearchStatus::Idle
        {
            log::warn!("Search started twice; ignoring.");
            return;
        }

        self.shared.status.set(SearchStatus::Started);

        let shared = self.shared.clone();
        let pool = self.pool.clone();
        self.main_worker.schedule(Box::new(move |interruption|
        {
            NodeCalculator::populate(& shared, & pool, interruption);
            Ok(())
        }));
    }

    ///
    /// Returns the current status.
    ///
    pub fn status (& self) -> SearchStatus
    {
        self.shared.status.get()
    }

    ///
    /// Requests the search to stop, interrupts all workers, and drains.
    /// Idempotent; every ply completed before the stop stays available.
    ///
    pub fn stop (& self)
    {
        if self.status().is_terminal()
        {
            return;
        }

        self.shared.quit.store(true, Ordering::SeqCst);
        self.main_worker.interrupt_and_clear_queue(false);
        self.pool.interrupt_and_clear_queue();
        self.main_worker.wait();

        if ! self.status().is_terminal()
        {
            self.shared.status.set(SearchStatus::Stopped);
        }
    }

    ///
    /// Blocks until the search reaches a terminal status.
    ///
    pub fn wait (& self)
    {
        self.shared.status.wait_for(|status| status.is_terminal());
    }

    fn populate (shared: & Arc<CalculatorShared>, pool: & Arc<WorkerPool>, interruption: & Interruption)
    {
        shared.status.set(SearchStatus::Working);

        let outcome = NodeCalculator::populate_plies(shared, pool, interruption);

        pool.interrupt_and_clear_queue();

        if let Some(best) = shared.rows_info.best_node()
        {
            let root = shared.root.lock().unwrap();
            node::carve_best_path(& * root, & best);
            best.lock().unwrap().clear_children();
        }

        match outcome
        {
            Ok(())                                 => shared.status.set(SearchStatus::Finished),
            Err(err) if Interrupted::caused(& err) => shared.status.set(SearchStatus::Stopped),
            Err(err)                               =>
            {
                log::error!("Search failed: {:#}.", err);
                shared.status.set(SearchStatus::Error);
            }
        };
    }

    fn populate_plies (shared: & Arc<CalculatorShared>,
                       pool: & Arc<WorkerPool>,
                       interruption: & Interruption) -> Result<()>
    {
        let max_depth = shared.block_types.len();

        for target_depth in 1 ..= max_depth
        {
            {
                let root = shared.root.lock().unwrap();
                NodeCalculator::populate_nodes(shared, pool, & * root, 0, target_depth, interruption)?;
            }

            pool.wait();

            if target_depth > 1 && shared.quit.load(Ordering::SeqCst)
            {
                return Err(Interrupted.into());
            }

            shared.rows_info.set_finished(target_depth)?;

            interruption.checkpoint()?;
            if shared.quit.load(Ordering::SeqCst)
            {
                return Err(Interrupted.into());
            }
        }

        Ok(())
    }

    fn populate_nodes (shared: & Arc<CalculatorShared>,
                       pool: & Arc<WorkerPool>,
                       node: & NodePtr,
                       index: usize,
                       target_depth: usize,
                       interruption: & Interruption) -> Result<()>
    {
        // A search of depth one always completes; interrupts only take
        // hold beyond the first ply.
        if index > 0
        {
            interruption.checkpoint()?;
        }

        if node.lock().unwrap().state().is_game_over()
        {
            return Ok(());
        }

        if index + 1 == target_depth
        {
            let shared = shared.clone();
            let parent = node.clone();
            let block_type = shared.block_types[index];
            let width = shared.widths[index];
            let child_depth = index + 1;

            pool.schedule(Box::new(move |interruption|
            {
                NodeCalculator::generate_child_nodes(& shared, & parent, block_type, child_depth, width, interruption)
            }));
        }
        else
        {
            let children = node.lock().unwrap().children().to_vec();
            if children.is_empty()
            {
                log::warn!("A non-leaf node at ply {} has no children.", index);
            }

            for child in & children
            {
                NodeCalculator::populate_nodes(shared, pool, child, index + 1, target_depth, interruption)?;
            }
        }

        Ok(())
    }

    fn generate_child_nodes (shared: & CalculatorShared,
                             parent: & NodePtr,
                             block_type: BlockType,
                             depth: usize,
                             width: usize,
                             interruption: & Interruption) -> Result<()>
    {
        if depth > 1
        {
            interruption.checkpoint()?;
        }

        let children = generate_offspring(parent, block_type, if depth > 1 { Some(interruption) } else { None })?;
        if children.is_empty()
        {
            return Err(error::error!("Generating offspring produced zero children on a live state."));
        }

        {
            let mut parent = parent.lock().unwrap();
            for child in children.into_iter().take(width)
            {
                parent.add_child(child);
            }
        }

        let best = parent.lock().unwrap().first_child();
        if let Some(best) = best
        {
            shared.rows_info.register_node(& best, depth);
        }

        Ok(())
    }
}

///
/// Returns the identifiers along the path from the root down to the given
/// node; the lexicographic order of these paths is the deterministic
/// tie-break between equally scored nodes of one ply.
///
fn identifier_path (node: & NodePtr) -> Vec<usize>
{
    let mut path = Vec::new();
    let mut cursor = node.clone();
    loop
    {
        let (identifier, parent) =
        {
            let locked = cursor.lock().unwrap();
            (locked.identifier(), locked.parent())
        };
        path.push(identifier);

        match parent
        {
            Some(parent) => cursor = parent,
            None         => break
        }
    }
    path.reverse();
    path
}

///
/// Generates every legal landing of the given block type below the parent:
/// one child per (rotation, column) pair whose gravity drop comes to rest,
/// ordered best first. When the block cannot even spawn, the only child is
/// the committed spawn position with the game-over flag raised.
///
pub fn generate_offspring (parent: & NodePtr,
                           block_type: BlockType,
                           interruption: Option<& Interruption>) -> Result<Vec<NodePtr>>
{
    let state = parent.lock().unwrap().state().clone();
    let columns = state.grid().column_count();

    let spawn = Block::spawn(block_type, columns);
    if ! state.check_position_valid(& spawn, spawn.row(), spawn.column())
    {
        let broken = state.commit(& spawn, true);
        return Ok(vec![SearchNode::offspring(parent, broken)]);
    }

    let mut children = Vec::new();

    for column in 0 .. columns
    {
        for rotation in 0 .. block_type.rotation_count()
        {
            if let Some(interruption) = interruption
            {
                interruption.checkpoint()?;
            }

            let mut block = Block::new(block_type, rotation, 0, column);
            if column + block.column_count() > columns
            {
                continue;
            }

            let mut row = 0;
            while state.check_position_valid(& block, row, column)
            {
                row += 1;
            }

            if row > 0
            {
                block.set_row(row - 1);
                let landed = state.commit(& block, false);
                children.push(SearchNode::offspring(parent, landed));
            }
        }
    }

    children.sort_by(
        |a, b|
        {
            let a = a.lock().unwrap();
            let b = b.lock().unwrap();
            b.score().cmp(& a.score()).then(a.identifier().cmp(& b.identifier()))
        }
    );

    Ok(children)
}

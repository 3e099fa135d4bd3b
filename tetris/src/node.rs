
use std::sync::{Arc, Mutex, Weak};

use super::evaluator::Evaluator;
use super::state::GameState;

use utils::log;

///
/// A shared handle on a search-tree node.
///
pub type NodePtr = Arc<Mutex<SearchNode>>;

///
/// A node of the search tree: a game state, the evaluator that scored it,
/// an ordered set of children and a weak back-reference to the parent.
///
/// A node exclusively owns its children; the parent link is non-owning and
/// is only followed where the caller guarantees the parent is still alive
/// (carving a finished search tree). Children are kept ordered by
/// descending score, ties broken by the originating block's identifier so
/// that sibling order is deterministic.
///
#[derive(Debug)]
pub struct SearchNode
{
    state: GameState,
    evaluator: Evaluator,
    parent: Weak<Mutex<SearchNode>>,
    children: Vec<NodePtr>,
    depth: usize,
    score: i32,
    identifier: usize
}

impl SearchNode
{
    ///
    /// Inserts a child, keeping the children ordered by descending score
    /// and ascending identifier. The child must sit one ply below this
    /// node.
    ///
    pub fn add_child (& mut self, child: NodePtr)
    {
        let (score, identifier, depth) =
        {
            let locked = child.lock().unwrap();
            (locked.score, locked.identifier, locked.depth)
        };
        debug_assert!(depth == self.depth + 1);

        let position = self.children.iter()
            .position(
                |existing|
                {
                    let existing = existing.lock().unwrap();
                    score > existing.score || (score == existing.score && identifier < existing.identifier)
                }
            )
            .unwrap_or(self.children.len());

        self.children.insert(position, child);
    }

    ///
    /// Returns the ordered children.
    ///
    pub fn children (& self) -> & [NodePtr]
    {
        & self.children
    }

    ///
    /// Drops all children.
    ///
    pub fn clear_children (& mut self)
    {
        self.children.clear();
    }

    ///
    /// Returns a new root node over an empty playing field.
    ///
    pub fn create_root (rows: usize, columns: usize, evaluator: Evaluator) -> NodePtr
    {
        SearchNode::new_root(GameState::new(rows, columns), evaluator)
    }

    ///
    /// Returns this node's depth; roots sit at zero.
    ///
    pub fn depth (& self) -> usize
    {
        self.depth
    }

    ///
    /// Returns the evaluator that scored this node.
    ///
    pub fn evaluator (& self) -> & Evaluator
    {
        & self.evaluator
    }

    ///
    /// Returns the best child, if any.
    ///
    pub fn first_child (& self) -> Option<NodePtr>
    {
        self.children.first().cloned()
    }

    ///
    /// Returns the identifier of the block whose commit produced this
    /// node's state; roots identify as zero.
    ///
    pub fn identifier (& self) -> usize
    {
        self.identifier
    }

    ///
    /// Returns a new parentless node holding the given state.
    ///
    pub fn new_root (state: GameState, evaluator: Evaluator) -> NodePtr
    {
        let score = evaluator.evaluate(& state);
        let identifier = identifier_of(& state);

        Arc::new(Mutex::new(SearchNode
        {
            state,
            evaluator,
            parent: Weak::new(),
            children: Vec::new(),
            depth: 0,
            score,
            identifier
        }))
    }

    ///
    /// Returns a new node one ply below the given parent, scored with the
    /// parent's evaluator. The node is not attached; see add_child.
    ///
    pub fn offspring (parent: & NodePtr, state: GameState) -> NodePtr
    {
        let (evaluator, depth) =
        {
            let locked = parent.lock().unwrap();
            (locked.evaluator.clone(), locked.depth + 1)
        };

        let score = evaluator.evaluate(& state);
        let identifier = identifier_of(& state);

        Arc::new(Mutex::new(SearchNode
        {
            state,
            evaluator,
            parent: Arc::downgrade(parent),
            children: Vec::new(),
            depth,
            score,
            identifier
        }))
    }

    ///
    /// Returns the parent, provided it is still alive.
    ///
    pub fn parent (& self) -> Option<NodePtr>
    {
        self.parent.upgrade()
    }

    ///
    /// Returns the cached evaluation score.
    ///
    pub fn score (& self) -> i32
    {
        self.score
    }

    ///
    /// Returns the game state.
    ///
    pub fn state (& self) -> & GameState
    {
        & self.state
    }

    ///
    /// Returns the game state for mutation (the line-penalty path).
    ///
    pub fn state_mut (& mut self) -> & mut GameState
    {
        & mut self.state
    }
}

fn identifier_of (state: & GameState) -> usize
{
    match state.original_block()
    {
        Some(block) => block.num_rotations() * block.column() + block.rotation(),
        None        => 0
    }
}

///
/// Reduces a fan-out tree to a single path: walking up from dst, every
/// ancestor strictly below src keeps exactly the child on the path and
/// frees its siblings. dst must be a descendant of src.
///
pub fn carve_best_path (src: & NodePtr, dst: & NodePtr)
{
    let src_depth = src.lock().unwrap().depth;

    let mut cursor = dst.clone();
    loop
    {
        let (depth, parent) =
        {
            let locked = cursor.lock().unwrap();
            (locked.depth, locked.parent.upgrade())
        };

        if depth <= src_depth
        {
            break;
        }

        match parent
        {
            Some(parent) =>
            {
                {
                    let mut locked = parent.lock().unwrap();
                    locked.children = vec![cursor.clone()];
                }
                cursor = parent;
            },
            None =>
            {
                log::warn!("Node at depth {} lost its parent while carving.", depth);
                break;
            }
        }
    }
}

///
/// Deep-copies a node and its descendants, preserving depths, scores and
/// child order. The copy's parent link is empty.
///
pub fn clone_tree (node: & NodePtr) -> NodePtr
{
    let (copy, children) =
    {
        let locked = node.lock().unwrap();
        let copy = Arc::new(Mutex::new(SearchNode
        {
            state: locked.state.clone(),
            evaluator: locked.evaluator.clone(),
            parent: Weak::new(),
            children: Vec::new(),
            depth: locked.depth,
            score: locked.score,
            identifier: locked.identifier
        }));
        (copy, locked.children.clone())
    };

    for child in & children
    {
        let child_copy = clone_tree(child);
        child_copy.lock().unwrap().parent = Arc::downgrade(& copy);
        copy.lock().unwrap().children.push(child_copy);
    }

    copy
}

///
/// Follows first children down from the given node and returns the tail of
/// the chain.
///
pub fn end_node (node: & NodePtr) -> NodePtr
{
    let mut cursor = node.clone();
    loop
    {
        let next = cursor.lock().unwrap().first_child();
        match next
        {
            Some(child) => cursor = child,
            None        => return cursor
        }
    }
}


use std::sync::Arc;
use std::time::Instant;

use tabled::{Table, Tabled};

use tetris::node::SearchNode;
use tetris::{BlockBag, Evaluator};

use crate::config::Config;
use crate::interfaces::console::Console;
use crate::search::{NodeCalculator, Worker, WorkerPool};

use utils::log;
use utils::*;

///
/// One benchmark measurement that is printed into the summary table.
///
#[derive(Clone, Debug, Tabled)]
pub struct BenchmarkRow
{
    pub workers: usize,
    pub round: usize,
    pub depth: String,
    pub nodes: u64,
    pub best_score: i32,
    pub millis: u128
}

///
/// Runs full searches over the configured worker counts and logs a summary
/// table: per round the reached depth, the number of registered nodes, the
/// best score and the wall-clock time.
///
pub fn run (config: & Config) -> Result<()>
{
    let evaluator = Console::configured_evaluator(config)?;
    let depth = config.search.search_depth;
    let width = config.search.search_width;

    let mut results : Vec<BenchmarkRow> = Vec::new();

    for & workers in & config.benchmark.worker_counts
    {
        let pool = Arc::new(WorkerPool::new("benchmark", workers)?);
        let main_worker = Arc::new(Worker::new("benchmark-main")?);

        for round in 0 .. config.benchmark.rounds
        {
            let bag = BlockBag::with_seed(config.game.bag_size, round as u64);
            let block_types = (0 .. depth).map(|_| bag.next()).collect::<Vec<_>>();
            let widths = vec![width; depth];

            let root = SearchNode::create_root(config.game.rows, config.game.columns, Evaluator::balanced());
            let calculator = NodeCalculator::new(
                root, block_types, widths, evaluator.clone(), main_worker.clone(), pool.clone())?;

            let started = Instant::now();
            calculator.start();
            calculator.wait();
            let elapsed = started.elapsed();

            let reached = calculator.current_search_depth();
            let nodes = (1 ..= reached).map(|ply| calculator.node_count_at(ply)).sum();
            let best_score = match reached
            {
                0 => 0,
                _ => calculator.best_node_at(reached)
                         .map_or(0, |node| node.lock().unwrap().score())
            };

            results.push(BenchmarkRow
            {
                workers,
                round,
                depth: format!("{}/{}", reached, calculator.max_search_depth()),
                nodes,
                best_score,
                millis: elapsed.as_millis()
            });
        }
    }

    log::info!("Benchmark ({} rounds per worker count):\n{}",
               config.benchmark.rounds,
               Table::new(results).with(tabled::Style::psql()).to_string());

    Ok(())
}

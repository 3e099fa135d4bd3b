
use rand::rngs::StdRng;
use rand::seq::SliceRandom;
use rand::SeedableRng;

use std::sync::Mutex;
use std::time::{SystemTime, UNIX_EPOCH};

use super::block::{BlockType, BLOCK_TYPE_COUNT};

///
/// A deterministic-bag source of future blocks: the bag holds a fixed number
/// of copies of every type, deals them out in shuffled order, and reshuffles
/// once exhausted. Dealing is guarded by the bag's own mutex so that a bag
/// can be shared across threads.
///
/// The default seed is taken from the wall clock; tests construct bags with
/// an explicit seed to get reproducible sequences.
///
#[derive(Debug)]
pub struct BlockBag
{
    inner: Mutex<BagInner>
}

#[derive(Debug)]
struct BagInner
{
    rng: StdRng,
    bag: Vec<BlockType>,
    index: usize
}

impl BagInner
{
    fn reshuffle (& mut self)
    {
        self.bag.shuffle(& mut self.rng);
        self.index = 0;
    }
}

impl BlockBag
{
    ///
    /// Returns a new bag holding the given number of copies of each type,
    /// seeded from the wall clock.
    ///
    pub fn new (bag_size: usize) -> BlockBag
    {
        let clock = SystemTime::now().duration_since(UNIX_EPOCH).unwrap_or_default();
        BlockBag::with_seed(bag_size, clock.as_micros() as u64)
    }

    ///
    /// Deals the next block type, reshuffling first if the bag is empty.
    ///
    pub fn next (& self) -> BlockType
    {
        let mut inner = self.inner.lock().unwrap();
        if inner.index >= inner.bag.len()
        {
            inner.reshuffle();
        }
        let block_type = inner.bag[inner.index];
        inner.index += 1;
        block_type
    }

    ///
    /// Returns a new bag with an explicit seed.
    ///
    pub fn with_seed (bag_size: usize, seed: u64) -> BlockBag
    {
        let bag_size = bag_size.max(1);
        let mut bag = Vec::with_capacity(bag_size * BLOCK_TYPE_COUNT);
        for _ in 0 .. bag_size
        {
            bag.extend(BlockType::all());
        }

        let mut inner = BagInner { rng: StdRng::seed_from_u64(seed), bag, index: 0 };
        inner.reshuffle();

        BlockBag { inner: Mutex::new(inner) }
    }
}

#[cfg(test)]
mod test
{
    use super::*;

    #[test]
    fn seeded_bags_deal_identically ()
    {
        let a = BlockBag::with_seed(1, 17);
        let b = BlockBag::with_seed(1, 17);
        for _ in 0 .. 3 * BLOCK_TYPE_COUNT
        {
            assert_eq!(a.next(), b.next());
        }
    }

    #[test]
    fn every_type_appears_once_per_cycle ()
    {
        let bag = BlockBag::with_seed(1, 5);
        for _ in 0 .. 4
        {
            let mut dealt : Vec<BlockType> = (0 .. BLOCK_TYPE_COUNT).map(|_| bag.next()).collect();
            dealt.sort();
            assert_eq!(dealt, BlockType::all().to_vec());
        }
    }

    #[test]
    fn larger_bags_hold_multiple_copies ()
    {
        let bag = BlockBag::with_seed(3, 99);
        let dealt : Vec<BlockType> = (0 .. 3 * BLOCK_TYPE_COUNT).map(|_| bag.next()).collect();
        for block_type in BlockType::all()
        {
            assert_eq!(dealt.iter().filter(|& & t| t == block_type).count(), 3);
        }
    }
}

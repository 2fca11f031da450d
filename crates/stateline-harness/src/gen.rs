//! The generator monad.

use crate::seed::{Seed, Size};
use crate::tree::{interleave, Tree};
use rand::Rng;
use std::sync::Arc;

/// How many fresh seeds [`Gen::such_that`] tries before giving up.
const SUCH_THAT_ATTEMPTS: usize = 100;

/// A generator of shrinkable values.
///
/// Running a generator with a [`Seed`] and a [`Size`] produces a [`Tree`]:
/// the root is the generated value, the children are its shrinks. All
/// randomness flows through the seed, so generation is pure.
pub struct Gen<T>(Arc<dyn Fn(Seed, Size) -> Tree<T> + Send + Sync>);

impl<T> Clone for Gen<T> {
    fn clone(&self) -> Self {
        Gen(self.0.clone())
    }
}

impl<T: Clone + Send + Sync + 'static> Gen<T> {
    pub fn from_fn<F>(f: F) -> Self
    where
        F: Fn(Seed, Size) -> Tree<T> + Send + Sync + 'static,
    {
        Gen(Arc::new(f))
    }

    /// Run the generator, producing a value and its shrink tree.
    pub fn run(&self, seed: Seed, size: Size) -> Tree<T> {
        (self.0)(seed, size)
    }

    /// Generate the same value every time, with no shrinks.
    pub fn constant(value: T) -> Self {
        Gen::from_fn(move |_, _| Tree::leaf(value.clone()))
    }

    pub fn map<U, F>(&self, f: F) -> Gen<U>
    where
        U: Clone + Send + Sync + 'static,
        F: Fn(&T) -> U + Send + Sync + Clone + 'static,
    {
        let g = self.clone();
        Gen::from_fn(move |seed, size| g.run(seed, size).map(f.clone()))
    }

    /// Monadic bind. The second generator's shrinks follow the first's:
    /// shrinking the bound value re-runs `f` on each shrunk root with the
    /// same seed, so the whole composite stays reproducible.
    pub fn bind<U, F>(&self, f: F) -> Gen<U>
    where
        U: Clone + Send + Sync + 'static,
        F: Fn(&T) -> Gen<U> + Send + Sync + Clone + 'static,
    {
        let g = self.clone();
        Gen::from_fn(move |seed, size| {
            let (s1, s2) = seed.split();
            bind_tree(g.run(s1, size), s2, size, f.clone())
        })
    }

    /// Make the size parameter explicit.
    pub fn sized<F>(f: F) -> Gen<T>
    where
        F: Fn(Size) -> Gen<T> + Send + Sync + 'static,
    {
        Gen::from_fn(move |seed, size| f(size).run(seed, size))
    }

    /// Retry with fresh seeds (and gently growing size) until the
    /// predicate holds. Only the root is filtered; shrink candidates
    /// that fail the predicate are rejected by the caller's own checks.
    ///
    /// Panics after a fixed attempt budget; a generator that cannot
    /// satisfy its own filter is a bug in the caller's spec.
    pub fn such_that<P>(&self, pred: P) -> Gen<T>
    where
        P: Fn(&T) -> bool + Send + Sync + 'static,
    {
        let g = self.clone();
        Gen::from_fn(move |seed, size| {
            let mut seed = seed;
            for attempt in 0..SUCH_THAT_ATTEMPTS {
                let (s, rest) = seed.split();
                seed = rest;
                let tree = g.run(s, Size(size.0 + attempt));
                if pred(tree.root()) {
                    return tree;
                }
            }
            panic!("such_that: no satisfying value after {SUCH_THAT_ATTEMPTS} attempts");
        })
    }

    /// Pick a generator with probability proportional to its weight.
    ///
    /// Shrinking stays within the chosen alternative. Panics if the
    /// weights sum to zero.
    pub fn frequency(choices: Vec<(u64, Gen<T>)>) -> Gen<T> {
        let total: u64 = choices.iter().map(|(w, _)| w).sum();
        assert!(total > 0, "frequency: weights sum to zero");
        Gen::from_fn(move |seed, size| {
            let (s1, s2) = seed.split();
            let mut pick = s1.rng().gen_range(0..total);
            for (w, g) in &choices {
                if pick < *w {
                    return g.run(s2, size);
                }
                pick -= w;
            }
            unreachable!("frequency: pick exceeded total weight")
        })
    }

    /// Pick uniformly from a non-empty list. No shrinking.
    pub fn element(items: Vec<T>) -> Gen<T> {
        assert!(!items.is_empty(), "element: empty choice list");
        Gen::from_fn(move |seed, _| {
            let idx = seed.rng().gen_range(0..items.len());
            Tree::leaf(items[idx].clone())
        })
    }

    /// Run each generator with an independent seed and collect the
    /// results; shrinks replace one element at a time.
    pub fn sequence(gens: Vec<Gen<T>>) -> Gen<Vec<T>> {
        Gen::from_fn(move |seed, size| {
            let mut seed = seed;
            let trees: Vec<Tree<T>> = gens
                .iter()
                .map(|g| {
                    let (s, rest) = seed.split();
                    seed = rest;
                    g.run(s, size)
                })
                .collect();
            interleave(trees)
        })
    }
}

fn bind_tree<T, U, F>(first: Tree<T>, seed: Seed, size: Size, f: F) -> Tree<U>
where
    T: Clone + Send + Sync + 'static,
    U: Clone + Send + Sync + 'static,
    F: Fn(&T) -> Gen<U> + Send + Sync + Clone + 'static,
{
    let second = f(first.root()).run(seed, size);
    let root = second.root().clone();
    Tree::with_children(root, move || {
        let mut out: Vec<Tree<U>> = first
            .children()
            .into_iter()
            .map(|c| bind_tree(c, seed, size, f.clone()))
            .collect();
        out.extend(second.children());
        out
    })
}

impl Gen<i64> {
    /// Uniform integer in `lo..=hi`, shrinking towards `lo`.
    pub fn int_range(lo: i64, hi: i64) -> Gen<i64> {
        assert!(lo <= hi, "int_range: lo > hi");
        Gen::from_fn(move |seed, _| {
            let v = seed.rng().gen_range(lo..=hi);
            int_tree(lo, v)
        })
    }
}

fn int_tree(dest: i64, v: i64) -> Tree<i64> {
    Tree::unfold(v, move |n| shrink_towards(dest, *n))
}

/// Shrink candidates for an integer: the destination itself, then the
/// binary search points between destination and value.
fn shrink_towards(dest: i64, v: i64) -> Vec<i64> {
    if dest == v {
        return Vec::new();
    }
    let mut out = vec![dest];
    let mut diff = (v as i128 - dest as i128) / 2;
    while diff != 0 {
        let c = (v as i128 - diff) as i64;
        if c != dest && !out.contains(&c) {
            out.push(c);
        }
        diff /= 2;
    }
    out
}

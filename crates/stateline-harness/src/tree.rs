//! Lazy rose trees: a value plus its shrink candidates.

use std::sync::Arc;

type Thunk<T> = Arc<dyn Fn() -> Vec<Tree<T>> + Send + Sync>;

/// A rose tree whose children are computed on demand.
///
/// The root is the generated value; each child is a smaller variant of it,
/// itself carrying further shrinks. Children are behind a thunk so that
/// building a tree never forces the (potentially large) shrink space.
#[derive(Clone)]
pub struct Tree<T> {
    root: T,
    children: Thunk<T>,
}

impl<T: Clone + Send + Sync + 'static> Tree<T> {
    /// A tree with no shrinks.
    pub fn leaf(root: T) -> Self {
        Tree {
            root,
            children: Arc::new(Vec::new),
        }
    }

    /// A tree with lazily-computed shrinks.
    pub fn with_children<F>(root: T, children: F) -> Self
    where
        F: Fn() -> Vec<Tree<T>> + Send + Sync + 'static,
    {
        Tree {
            root,
            children: Arc::new(children),
        }
    }

    /// Build a tree from a value and a shrink function, applied recursively.
    pub fn unfold<F>(root: T, shrink: F) -> Self
    where
        F: Fn(&T) -> Vec<T> + Send + Sync + Clone + 'static,
    {
        let r = root.clone();
        Tree::with_children(root, move || {
            shrink(&r)
                .into_iter()
                .map(|c| Tree::unfold(c, shrink.clone()))
                .collect()
        })
    }

    pub fn root(&self) -> &T {
        &self.root
    }

    /// Force one level of shrinks.
    pub fn children(&self) -> Vec<Tree<T>> {
        (self.children)()
    }

    /// Map a function over every value in the tree, lazily below the root.
    pub fn map<U, F>(&self, f: F) -> Tree<U>
    where
        U: Clone + Send + Sync + 'static,
        F: Fn(&T) -> U + Send + Sync + Clone + 'static,
    {
        let root = f(&self.root);
        let children = self.children.clone();
        Tree {
            root,
            children: Arc::new(move || children().iter().map(|c| c.map(f.clone())).collect()),
        }
    }
}

/// Combine a vector of trees into a tree of vectors.
///
/// The root is the vector of roots; shrinks replace one element at a time
/// with one of its shrinks, left to right. This is the shrink order used
/// for tuple- and map-shaped argument structures.
pub fn interleave<T: Clone + Send + Sync + 'static>(trees: Vec<Tree<T>>) -> Tree<Vec<T>> {
    let roots: Vec<T> = trees.iter().map(|t| t.root().clone()).collect();
    Tree::with_children(roots, move || {
        let mut out = Vec::new();
        for (i, tree) in trees.iter().enumerate() {
            for child in tree.children() {
                let mut next = trees.clone();
                next[i] = child;
                out.push(interleave(next));
            }
        }
        out
    })
}

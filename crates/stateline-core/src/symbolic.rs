//! Symbolic handles, bindings and substitution.

use crate::args::ArgTree;
use crate::value::{Caught, Value};
use ahash::AHashMap;
use std::collections::BTreeSet;
use std::fmt;
use thiserror::Error;

/// A symbolic identifier for the eventual result of a command invocation.
///
/// Handles carry their generation sequence number: the setup result is
/// `#<0>`, the first command's result `#<1>`, and so on. A handle may only
/// be referenced by invocations generated after it.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct Handle(u32);

impl Handle {
    /// The reserved handle naming the setup result.
    pub const SETUP: Handle = Handle(0);

    pub fn number(self) -> u32 {
        self.0
    }
}

impl fmt::Display for Handle {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "#<{}>", self.0)
    }
}

/// Mints fresh handles in sequence order. Number 0 is reserved for setup.
#[derive(Debug)]
pub struct HandleMint {
    next: u32,
}

impl HandleMint {
    pub fn new() -> Self {
        HandleMint { next: 1 }
    }

    pub fn mint(&mut self) -> Handle {
        let h = Handle(self.next);
        self.next += 1;
        h
    }
}

impl Default for HandleMint {
    fn default() -> Self {
        Self::new()
    }
}

/// A command result as seen by model callbacks: symbolic during
/// generation, concrete during linearization.
///
/// `next_state` implementations that do not inspect the result work
/// uniformly across both phases; those that store it keep the `SymValue`
/// and hand it back in later argument specs.
#[derive(Debug, Clone, PartialEq)]
pub enum SymValue {
    Sym(Handle),
    Concrete(Value),
}

impl fmt::Display for SymValue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            SymValue::Sym(h) => write!(f, "{}", h),
            SymValue::Concrete(v) => write!(f, "{}", v),
        }
    }
}

/// Result of executing one invocation against the real system.
#[derive(Debug, Clone, PartialEq)]
pub enum ExecOutcome {
    Ok(Value),
    Caught(Caught),
}

impl ExecOutcome {
    /// The outcome as a value: a caught failure flows on as an opaque
    /// `Caught` so later substitutions still resolve.
    pub fn as_value(&self) -> Value {
        match self {
            ExecOutcome::Ok(v) => v.clone(),
            ExecOutcome::Caught(c) => Value::opaque(c.clone()),
        }
    }

    pub fn is_caught(&self) -> bool {
        matches!(self, ExecOutcome::Caught(_))
    }
}

impl fmt::Display for ExecOutcome {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ExecOutcome::Ok(v) => write!(f, "{}", v),
            ExecOutcome::Caught(c) => write!(f, "{}", c),
        }
    }
}

/// An engine invariant violation. Never expected on a well-formed
/// program; not suppressed anywhere.
#[derive(Debug, Error, PartialEq)]
pub enum EngineError {
    #[error("no binding for handle {0}")]
    MissingBinding(Handle),
}

/// Append-only mapping from handles to execution outcomes.
#[derive(Debug, Clone, Default)]
pub struct Bindings {
    map: AHashMap<Handle, ExecOutcome>,
}

impl Bindings {
    pub fn new() -> Self {
        Bindings::default()
    }

    pub fn bind(&mut self, handle: Handle, outcome: ExecOutcome) {
        debug_assert!(
            !self.map.contains_key(&handle),
            "handle {handle} bound twice"
        );
        self.map.insert(handle, outcome);
    }

    pub fn outcome(&self, handle: Handle) -> Option<&ExecOutcome> {
        self.map.get(&handle)
    }

    pub fn contains(&self, handle: Handle) -> bool {
        self.map.contains_key(&handle)
    }

    pub fn len(&self) -> usize {
        self.map.len()
    }

    pub fn is_empty(&self) -> bool {
        self.map.is_empty()
    }
}

/// Collect every handle referenced inside an argument tree.
pub fn referenced_handles(tree: &ArgTree) -> BTreeSet<Handle> {
    let mut out = BTreeSet::new();
    collect(tree, &mut out);
    out
}

fn collect(tree: &ArgTree, out: &mut BTreeSet<Handle>) {
    match tree {
        ArgTree::Ref(h) => {
            out.insert(*h);
        }
        ArgTree::Tuple(items) => {
            for item in items {
                collect(item, out);
            }
        }
        ArgTree::Map(entries) => {
            for (_, v) in entries {
                collect(v, out);
            }
        }
        ArgTree::Lit(_) => {}
    }
}

/// Substitute every handle in an argument tree with its bound value.
///
/// Deep over tuples and maps; literals pass through unchanged. The result
/// contains no `Ref` nodes. A missing binding means well-formedness was
/// violated upstream and is fatal.
pub fn substitute(tree: &ArgTree, bindings: &Bindings) -> Result<ArgTree, EngineError> {
    match tree {
        ArgTree::Lit(v) => Ok(ArgTree::Lit(v.clone())),
        ArgTree::Ref(h) => {
            let outcome = bindings
                .outcome(*h)
                .ok_or(EngineError::MissingBinding(*h))?;
            Ok(ArgTree::Lit(outcome.as_value()))
        }
        ArgTree::Tuple(items) => {
            let items = items
                .iter()
                .map(|t| substitute(t, bindings))
                .collect::<Result<Vec<_>, _>>()?;
            Ok(ArgTree::Tuple(items))
        }
        ArgTree::Map(entries) => {
            let entries = entries
                .iter()
                .map(|(k, v)| Ok((k.clone(), substitute(v, bindings)?)))
                .collect::<Result<Vec<_>, EngineError>>()?;
            Ok(ArgTree::Map(entries))
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn bound(pairs: &[(u32, i64)]) -> Bindings {
        let mut b = Bindings::new();
        for (h, v) in pairs {
            b.bind(Handle(*h), ExecOutcome::Ok(Value::int(*v)));
        }
        b
    }

    #[test]
    fn test_handle_display() {
        assert_eq!(Handle::SETUP.to_string(), "#<0>");
        let mut mint = HandleMint::new();
        assert_eq!(mint.mint().to_string(), "#<1>");
        assert_eq!(mint.mint().to_string(), "#<2>");
    }

    #[test]
    fn test_mint_is_dense_and_ordered() {
        let mut mint = HandleMint::new();
        let a = mint.mint();
        let b = mint.mint();
        assert!(a < b);
        assert_eq!(b.number(), a.number() + 1);
    }

    #[test]
    fn test_referenced_handles_deep() {
        let mut mint = HandleMint::new();
        let h1 = mint.mint();
        let h2 = mint.mint();
        let tree = ArgTree::Tuple(vec![
            ArgTree::Ref(h1),
            ArgTree::Map(vec![("k".into(), ArgTree::Ref(h2))]),
            ArgTree::Lit(Value::int(5)),
        ]);
        let refs = referenced_handles(&tree);
        assert_eq!(refs, BTreeSet::from([h1, h2]));
    }

    #[test]
    fn test_substitute_preserves_shape() {
        let bindings = bound(&[(1, 10), (2, 20)]);
        let mut mint = HandleMint::new();
        let h1 = mint.mint();
        let h2 = mint.mint();
        let tree = ArgTree::Tuple(vec![
            ArgTree::Ref(h1),
            ArgTree::Tuple(vec![ArgTree::Lit(Value::bool(true)), ArgTree::Ref(h2)]),
        ]);
        let out = substitute(&tree, &bindings).unwrap();
        assert_eq!(
            out,
            ArgTree::Tuple(vec![
                ArgTree::Lit(Value::int(10)),
                ArgTree::Tuple(vec![
                    ArgTree::Lit(Value::bool(true)),
                    ArgTree::Lit(Value::int(20)),
                ]),
            ])
        );
        assert!(referenced_handles(&out).is_empty());
    }

    #[test]
    fn test_substitute_missing_binding_is_fatal() {
        let mut mint = HandleMint::new();
        let h1 = mint.mint();
        let err = substitute(&ArgTree::Ref(h1), &Bindings::new()).unwrap_err();
        assert_eq!(err, EngineError::MissingBinding(h1));
    }

    #[test]
    fn test_caught_outcome_substitutes_as_opaque() {
        let mut b = Bindings::new();
        let mut mint = HandleMint::new();
        let h1 = mint.mint();
        b.bind(h1, ExecOutcome::Caught(Caught::new("boom")));
        let out = substitute(&ArgTree::Ref(h1), &b).unwrap();
        match out {
            ArgTree::Lit(v) => {
                assert_eq!(v.downcast_ref::<Caught>().unwrap().message, "boom");
            }
            other => panic!("expected literal, got {other:?}"),
        }
    }
}

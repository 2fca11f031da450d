//! Argument specifications and realized argument trees.

use crate::symbolic::{Handle, SymValue};
use crate::value::Value;
use stateline_harness::Gen;
use std::fmt;

/// An argument *specification*: a value tree that may embed sub-generators
/// at any depth. Produced by a command's `args` callback from the current
/// model state.
#[derive(Clone)]
pub enum ArgSpec {
    /// A literal value.
    Lit(Value),
    /// A reference to the result of an earlier invocation.
    Ref(Handle),
    /// An ordered sequence of sub-specs.
    Tuple(Vec<ArgSpec>),
    /// String-keyed entries; keys are literal, values are sub-specs.
    Map(Vec<(String, ArgSpec)>),
    /// An opaque sub-generator, collapsed at realization time.
    Gen(Gen<ArgTree>),
}

impl ArgSpec {
    /// An empty argument list.
    pub fn unit() -> Self {
        ArgSpec::Tuple(Vec::new())
    }

    pub fn lit(v: impl Into<Value>) -> Self {
        ArgSpec::Lit(v.into())
    }

    /// Embed a generator of plain values.
    pub fn gen(g: Gen<Value>) -> Self {
        ArgSpec::Gen(g.map(|v| ArgTree::Lit(v.clone())))
    }

    /// Embed an integer generator (shrinks towards `lo`).
    pub fn int(lo: i64, hi: i64) -> Self {
        ArgSpec::Gen(Gen::int_range(lo, hi).map(|n| ArgTree::Lit(Value::Int(*n))))
    }
}

impl From<Value> for ArgSpec {
    fn from(v: Value) -> Self {
        ArgSpec::Lit(v)
    }
}

impl From<&SymValue> for ArgSpec {
    fn from(sv: &SymValue) -> Self {
        match sv {
            SymValue::Sym(h) => ArgSpec::Ref(*h),
            SymValue::Concrete(v) => ArgSpec::Lit(v.clone()),
        }
    }
}

/// A fully-realized argument tree: literals and handle references only.
#[derive(Debug, Clone, PartialEq)]
pub enum ArgTree {
    Lit(Value),
    Ref(Handle),
    Tuple(Vec<ArgTree>),
    Map(Vec<(String, ArgTree)>),
}

impl ArgTree {
    pub fn unit() -> Self {
        ArgTree::Tuple(Vec::new())
    }

    /// The literal value at this node, if any.
    pub fn as_value(&self) -> Option<&Value> {
        match self {
            ArgTree::Lit(v) => Some(v),
            _ => None,
        }
    }

    /// The items of a tuple node; a non-tuple has no items.
    pub fn items(&self) -> &[ArgTree] {
        match self {
            ArgTree::Tuple(items) => items,
            _ => &[],
        }
    }

    /// The `i`th tuple item.
    pub fn nth(&self, i: usize) -> Option<&ArgTree> {
        self.items().get(i)
    }

    /// Look up a map entry by key.
    pub fn get(&self, key: &str) -> Option<&ArgTree> {
        match self {
            ArgTree::Map(entries) => entries.iter().find(|(k, _)| k == key).map(|(_, v)| v),
            _ => None,
        }
    }
}

impl From<&SymValue> for ArgTree {
    fn from(sv: &SymValue) -> Self {
        match sv {
            SymValue::Sym(h) => ArgTree::Ref(*h),
            SymValue::Concrete(v) => ArgTree::Lit(v.clone()),
        }
    }
}

impl fmt::Display for ArgTree {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ArgTree::Lit(v) => write!(f, "{}", v),
            ArgTree::Ref(h) => write!(f, "{}", h),
            ArgTree::Tuple(items) => {
                write!(f, "(")?;
                for (i, item) in items.iter().enumerate() {
                    if i > 0 {
                        write!(f, ", ")?;
                    }
                    write!(f, "{}", item)?;
                }
                write!(f, ")")
            }
            ArgTree::Map(entries) => {
                write!(f, "{{")?;
                for (i, (k, v)) in entries.iter().enumerate() {
                    if i > 0 {
                        write!(f, ", ")?;
                    }
                    write!(f, "{}: {}", k, v)?;
                }
                write!(f, "}}")
            }
        }
    }
}

/// Collapse an argument specification into a generator of realized trees.
///
/// Sub-generator nodes become their generated value; tuples and maps map
/// structurally, preserving order and arity; all other leaves become
/// constants. The resulting tree shrinks through the embedded generators
/// only — literals and handle references never shrink.
pub fn realize(spec: &ArgSpec) -> Gen<ArgTree> {
    match spec {
        ArgSpec::Lit(v) => Gen::constant(ArgTree::Lit(v.clone())),
        ArgSpec::Ref(h) => Gen::constant(ArgTree::Ref(*h)),
        ArgSpec::Gen(g) => g.clone(),
        ArgSpec::Tuple(items) => {
            let gens: Vec<Gen<ArgTree>> = items.iter().map(realize).collect();
            Gen::sequence(gens).map(|items| ArgTree::Tuple(items.clone()))
        }
        ArgSpec::Map(entries) => {
            let keys: Vec<String> = entries.iter().map(|(k, _)| k.clone()).collect();
            let gens: Vec<Gen<ArgTree>> = entries.iter().map(|(_, v)| realize(v)).collect();
            Gen::sequence(gens).map(move |vals| {
                ArgTree::Map(keys.iter().cloned().zip(vals.iter().cloned()).collect())
            })
        }
    }
}

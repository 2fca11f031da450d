//! Programs: sequential prefixes plus parallel threads of invocations.

use crate::args::ArgTree;
use crate::command::Command;
use crate::symbolic::Handle;
use stateline_harness::Tree;
use std::fmt;
use std::sync::Arc;

/// One generated call: a fresh handle, the command, and the realized
/// argument tree together with its shrinks.
pub struct Invocation<S> {
    pub handle: Handle,
    pub command: Arc<Command<S>>,
    /// The full shrink tree of argument trees; the root is the current
    /// arguments.
    pub args: Tree<ArgTree>,
}

impl<S> Clone for Invocation<S> {
    fn clone(&self) -> Self {
        Invocation {
            handle: self.handle,
            command: self.command.clone(),
            args: self.args.clone(),
        }
    }
}

impl<S> Invocation<S> {
    pub fn new(handle: Handle, command: Arc<Command<S>>, args: Tree<ArgTree>) -> Self {
        Invocation {
            handle,
            command,
            args,
        }
    }

    /// The current argument tree.
    pub fn args(&self) -> &ArgTree {
        self.args.root()
    }

    /// The same invocation with different arguments (used by shrinking).
    pub fn with_args(&self, args: Tree<ArgTree>) -> Self {
        Invocation {
            handle: self.handle,
            command: self.command.clone(),
            args,
        }
    }
}

impl<S> fmt::Display for Invocation<S> {
    /// `#<k> = (name args…)` — tuple arguments are spliced into the call.
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} = ({}", self.handle, self.command.name())?;
        match self.args() {
            ArgTree::Tuple(items) => {
                for item in items {
                    write!(f, " {}", item)?;
                }
            }
            other => write!(f, " {}", other)?,
        }
        write!(f, ")")
    }
}

/// A generated program: a sequential prefix and zero or more parallel
/// threads. All handles are globally unique and numbered in generation
/// order.
pub struct Program<S> {
    pub sequential: Vec<Invocation<S>>,
    pub threads: Vec<Vec<Invocation<S>>>,
}

impl<S> Clone for Program<S> {
    fn clone(&self) -> Self {
        Program {
            sequential: self.sequential.clone(),
            threads: self.threads.clone(),
        }
    }
}

impl<S> Program<S> {
    pub fn empty() -> Self {
        Program {
            sequential: Vec::new(),
            threads: Vec::new(),
        }
    }

    /// Total number of invocations across the prefix and all threads.
    pub fn len(&self) -> usize {
        self.sequential.len() + self.threads.iter().map(Vec::len).sum::<usize>()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// All invocations: the prefix first, then each thread in order.
    pub fn invocations(&self) -> impl Iterator<Item = &Invocation<S>> {
        self.sequential
            .iter()
            .chain(self.threads.iter().flatten())
    }
}

impl<S> fmt::Display for Program<S> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        writeln!(f, "Sequential prefix:")?;
        for inv in &self.sequential {
            writeln!(f, "  {}", inv)?;
        }
        for (t, invs) in self.threads.iter().enumerate() {
            writeln!(f, "Thread {}:", thread_label(t))?;
            for inv in invs {
                writeln!(f, "  {}", inv)?;
            }
        }
        Ok(())
    }
}

/// Thread display labels: `A`, `B`, … (the thread count is capped well
/// below the alphabet).
pub fn thread_label(index: usize) -> char {
    (b'A' + (index as u8)) as char
}

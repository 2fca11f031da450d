//! Shared fixtures for the soundness suites.
//!
//! The system under test is a mutable FIFO queue behind a mutex, modelled
//! two ways: [`queue_spec`] with a strict `pop` (only generated, and only
//! valid, when the model says the queue is non-empty) and
//! [`concurrent_queue_spec`] with a permissive `pop` whose postcondition
//! tolerates popping an empty queue — the right model when parallel
//! threads race for the same elements.

use stateline_core::{ArgSpec, ArgTree, Command, Spec, SymValue, Value};
use stateline_harness::Gen;
use std::collections::VecDeque;
use std::fmt;
use std::sync::{Arc, Mutex};

/// The real system: a FIFO queue of integers.
pub struct TestQueue {
    items: Mutex<VecDeque<i64>>,
}

impl TestQueue {
    pub fn new() -> Self {
        TestQueue {
            items: Mutex::new(VecDeque::new()),
        }
    }

    pub fn push(&self, n: i64) {
        self.items.lock().unwrap().push_back(n);
    }

    pub fn pop(&self) -> Option<i64> {
        self.items.lock().unwrap().pop_front()
    }

    pub fn contents(&self) -> Vec<i64> {
        self.items.lock().unwrap().iter().copied().collect()
    }
}

impl Default for TestQueue {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Debug for TestQueue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Queue({:?})", self.items.lock().unwrap())
    }
}

/// Model state: the queue's handle (symbolic during generation) and the
/// elements the model believes it holds.
#[derive(Debug, Clone)]
pub struct QueueModel {
    pub queue: Option<SymValue>,
    pub elements: Vec<i64>,
}

impl QueueModel {
    fn empty() -> Self {
        QueueModel {
            queue: None,
            elements: Vec::new(),
        }
    }
}

fn queue_arg(model: &QueueModel) -> ArgSpec {
    ArgSpec::from(model.queue.as_ref().expect("queue required"))
}

fn queue_of(args: &ArgTree) -> Result<&TestQueue, String> {
    args.nth(0)
        .and_then(ArgTree::as_value)
        .and_then(Value::downcast_ref::<TestQueue>)
        .ok_or_else(|| "argument 0 is not a queue".to_string())
}

/// The strict queue spec from the scenario table: `new`, `push n`, `pop`,
/// with `pop` gated on a non-empty model. With `buggy_pop`, `pop`
/// returns the queue object instead of the popped element.
pub fn queue_spec(buggy_pop: bool) -> Arc<Spec<QueueModel>> {
    let spec = Spec::new(|_| QueueModel::empty())
        .command(
            Command::new("new", |_| Ok(Value::opaque(TestQueue::new())))
                .with_requires(|m: &QueueModel| m.queue.is_none())
                .with_next_state(|_, _, result: &SymValue| QueueModel {
                    queue: Some(result.clone()),
                    elements: Vec::new(),
                }),
        )
        .command(
            Command::new("push", |args: &ArgTree| {
                let queue = queue_of(args)?;
                let n = args
                    .nth(1)
                    .and_then(ArgTree::as_value)
                    .and_then(Value::as_int)
                    .ok_or_else(|| "argument 1 is not an integer".to_string())?;
                queue.push(n);
                Ok(Value::none())
            })
            .with_requires(|m: &QueueModel| m.queue.is_some())
            .with_args(|m: &QueueModel| {
                ArgSpec::Tuple(vec![queue_arg(m), ArgSpec::int(0, 100)])
            })
            .with_next_state(|m: &QueueModel, args: &ArgTree, _| {
                let mut next = m.clone();
                if let Some(n) = args.nth(1).and_then(ArgTree::as_value).and_then(Value::as_int)
                {
                    next.elements.push(n);
                }
                next
            })
            .with_postcondition(|_, _, _, result: &Value| result.is_none()),
        )
        .command(
            Command::new("pop", move |args: &ArgTree| {
                if buggy_pop {
                    // Returns the queue instead of the element.
                    let q = args
                        .nth(0)
                        .and_then(ArgTree::as_value)
                        .cloned()
                        .ok_or_else(|| "argument 0 is not a queue".to_string())?;
                    return Ok(q);
                }
                match queue_of(args)?.pop() {
                    Some(n) => Ok(Value::int(n)),
                    None => Err("pop on empty queue".to_string()),
                }
            })
            .with_requires(|m: &QueueModel| m.queue.is_some() && !m.elements.is_empty())
            .with_args(|m: &QueueModel| ArgSpec::Tuple(vec![queue_arg(m)]))
            .with_precondition(|m: &QueueModel, _| !m.elements.is_empty())
            .with_next_state(|m: &QueueModel, _, _| {
                let mut next = m.clone();
                next.elements.remove(0);
                next
            })
            .with_postcondition(|prev: &QueueModel, _, _, result: &Value| {
                result.as_int() == prev.elements.first().copied()
            }),
        );
    Arc::new(spec)
}

/// A queue spec fit for parallel testing: the queue comes from `setup`,
/// and `pop` may observe an empty queue (returning `None`), since a
/// racing thread may have taken the element the generator promised.
pub fn concurrent_queue_spec() -> Arc<Spec<QueueModel>> {
    let spec = Spec::new(|setup: Option<&SymValue>| QueueModel {
        queue: setup.cloned(),
        elements: Vec::new(),
    })
    .with_setup(|| Ok(Value::opaque(TestQueue::new())))
    // Bias generation towards pushes so pops have something to race for.
    .with_generate_command(|_: &QueueModel| {
        Gen::frequency(vec![
            (3, Gen::constant("push".to_string())),
            (1, Gen::constant("pop".to_string())),
        ])
    })
    .command(
        Command::new("push", |args: &ArgTree| {
            let queue = queue_of(args)?;
            let n = args
                .nth(1)
                .and_then(ArgTree::as_value)
                .and_then(Value::as_int)
                .ok_or_else(|| "argument 1 is not an integer".to_string())?;
            queue.push(n);
            Ok(Value::none())
        })
        .with_args(|m: &QueueModel| ArgSpec::Tuple(vec![queue_arg(m), ArgSpec::int(0, 100)]))
        .with_next_state(|m: &QueueModel, args: &ArgTree, _| {
            let mut next = m.clone();
            if let Some(n) = args.nth(1).and_then(ArgTree::as_value).and_then(Value::as_int) {
                next.elements.push(n);
            }
            next
        })
        .with_postcondition(|_, _, _, result: &Value| result.is_none()),
    )
    .command(
        Command::new("pop", |args: &ArgTree| {
            let queue = queue_of(args)?;
            match queue.pop() {
                Some(n) => Ok(Value::some(Value::int(n))),
                None => Ok(Value::none()),
            }
        })
        .with_args(|m: &QueueModel| ArgSpec::Tuple(vec![queue_arg(m)]))
        .with_next_state(|m: &QueueModel, _, _| {
            let mut next = m.clone();
            if !next.elements.is_empty() {
                next.elements.remove(0);
            }
            next
        })
        .with_postcondition(|prev: &QueueModel, _, _, result: &Value| {
            match prev.elements.first() {
                Some(front) => *result == Value::some(Value::int(*front)),
                None => result.is_none(),
            }
        }),
    );
    Arc::new(spec)
}

/// Install a test-friendly tracing subscriber; repeated calls are fine.
pub fn init_test_logging() {
    let _ = tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("warn")),
        )
        .with_test_writer()
        .try_init();
}

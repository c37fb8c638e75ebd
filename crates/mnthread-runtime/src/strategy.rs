//! Pluggable queue discipline for the ready pool
//!
//! The scheduler core is independent of the order contexts come off the
//! pool; swap the strategy to get LIFO or priority behaviour without
//! touching the dispatcher or the I/O thread.

use crate::context::Context;
use std::collections::VecDeque;

/// Ready-to-run contexts. Owned by the scheduler, guarded by its mutex.
pub type Pool = VecDeque<Context>;

/// Queue discipline over the ready pool.
///
/// The caller holds the scheduler lock around both operations.
pub trait Strategy: Send + Sync + 'static {
    /// Add a runnable context to the pool.
    fn push(&self, pool: &mut Pool, ctx: Context);

    /// Remove the next context to run.
    fn pop(&self, pool: &mut Pool) -> Option<Context>;
}

/// First-in first-out, the default discipline.
#[derive(Debug, Default, Clone, Copy)]
pub struct Fifo;

impl Strategy for Fifo {
    fn push(&self, pool: &mut Pool, ctx: Context) {
        pool.push_back(ctx);
    }

    fn pop(&self, pool: &mut Pool) -> Option<Context> {
        pool.pop_front()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn ctx() -> Context {
        Context::new(|| {}, 32 * 1024).unwrap()
    }

    #[test]
    fn test_fifo_order() {
        let strategy = Fifo;
        let mut pool = Pool::new();

        let a = ctx();
        let b = ctx();
        let (id_a, id_b) = (a.id(), b.id());

        strategy.push(&mut pool, a);
        strategy.push(&mut pool, b);

        assert_eq!(strategy.pop(&mut pool).map(|c| c.id()), Some(id_a));
        assert_eq!(strategy.pop(&mut pool).map(|c| c.id()), Some(id_b));
        assert!(strategy.pop(&mut pool).is_none());
    }
}

use parking_lot::Mutex;
use rand::{rngs::StdRng, Rng, SeedableRng};

/// The order in which the two sides of an experiment are executed
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum ExecutionOrder {
    /// Run the control, then the candidate
    ControlFirst,

    /// Run the candidate, then the control
    CandidateFirst,
}

impl ExecutionOrder {
    fn from_coin(heads: bool) -> Self {
        if heads {
            ExecutionOrder::ControlFirst
        } else {
            ExecutionOrder::CandidateFirst
        }
    }
}

/// A method for choosing which side of an experiment runs first.
///
/// Strategies are shared between concurrent runs, so drawing an order must be
/// safe from any thread.
pub trait OrderStrategy: Send + Sync {
    fn pick_order(&self) -> ExecutionOrder;
}

impl OrderStrategy for ExecutionOrder {
    fn pick_order(&self) -> ExecutionOrder {
        *self
    }
}

impl<S: OrderStrategy + ?Sized> OrderStrategy for std::sync::Arc<S> {
    fn pick_order(&self) -> ExecutionOrder {
        (**self).pick_order()
    }
}

/// The default strategy, a fair coin flip per run drawn from the thread-local
/// generator.
#[derive(Clone, Copy, Debug, Default)]
pub struct RandomOrder;

impl OrderStrategy for RandomOrder {
    fn pick_order(&self) -> ExecutionOrder {
        let mut rng = rand::thread_rng();

        ExecutionOrder::from_coin(rng.gen_bool(0.5))
    }
}

/// A fair coin flip driven by a seeded generator. Two `SeededOrder`s built
/// from the same seed produce the same sequence of orders.
pub struct SeededOrder(Mutex<StdRng>);

impl SeededOrder {
    pub fn new(seed: u64) -> Self {
        Self(Mutex::new(StdRng::seed_from_u64(seed)))
    }
}

impl OrderStrategy for SeededOrder {
    fn pick_order(&self) -> ExecutionOrder {
        ExecutionOrder::from_coin(self.0.lock().gen_bool(0.5))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn fixed_order_is_its_own_strategy() {
        assert_eq!(
            ExecutionOrder::CandidateFirst.pick_order(),
            ExecutionOrder::CandidateFirst
        );
        assert_eq!(
            ExecutionOrder::ControlFirst.pick_order(),
            ExecutionOrder::ControlFirst
        );
    }

    #[test]
    fn random_order_produces_both_orders() {
        let orders: Vec<_> = (0..200).map(|_| RandomOrder.pick_order()).collect();

        assert!(orders.contains(&ExecutionOrder::ControlFirst));
        assert!(orders.contains(&ExecutionOrder::CandidateFirst));
    }

    #[test]
    fn seeded_order_is_reproducible() {
        let a = SeededOrder::new(7);
        let b = SeededOrder::new(7);

        let first: Vec<_> = (0..32).map(|_| a.pick_order()).collect();
        let second: Vec<_> = (0..32).map(|_| b.pick_order()).collect();

        assert_eq!(first, second);
        assert!(first.contains(&ExecutionOrder::ControlFirst));
        assert!(first.contains(&ExecutionOrder::CandidateFirst));
    }
}

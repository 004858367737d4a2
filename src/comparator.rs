use std::future::Future;

use async_trait::async_trait;

use crate::observation::Verdict;

/// Decides whether a control value and a candidate value are equivalent.
///
/// Comparators are only consulted when both sides produced a value. The
/// comparison may suspend; the experiment waits for it before publishing.
#[async_trait]
pub trait Comparator<T> {
    async fn equivalent(&self, control: &T, candidate: &T) -> bool;
}

/// Equivalence by `PartialEq`, used when no comparator is configured
#[derive(Clone, Copy, Debug, Default)]
pub struct DefaultComparator;

#[async_trait]
impl<T> Comparator<T> for DefaultComparator
where
    T: PartialEq + Sync,
{
    async fn equivalent(&self, control: &T, candidate: &T) -> bool {
        control == candidate
    }
}

/// A synchronous closure used as a comparator
#[derive(Clone, Copy)]
pub struct FnComparator<F>(pub F);

#[async_trait]
impl<T, F> Comparator<T> for FnComparator<F>
where
    T: Sync,
    F: Fn(&T, &T) -> bool + Sync,
{
    async fn equivalent(&self, control: &T, candidate: &T) -> bool {
        (self.0)(control, candidate)
    }
}

/// An asynchronous closure used as a comparator. It receives clones of both
/// values so the future it returns is free of borrows.
#[derive(Clone, Copy)]
pub struct AsyncFnComparator<F>(pub F);

#[async_trait]
impl<T, F, Fut> Comparator<T> for AsyncFnComparator<F>
where
    T: Clone + Sync,
    F: Fn(T, T) -> Fut + Sync,
    Fut: Future<Output = bool> + Send + 'static,
{
    async fn equivalent(&self, control: &T, candidate: &T) -> bool {
        (self.0)(control.clone(), candidate.clone()).await
    }
}

/// Classify the values the two sides produced, `None` standing for a failed
/// side. The comparator is only called when both sides produced a value; a
/// value is never equivalent to a failure.
pub(crate) async fn decide<T, C>(control: Option<&T>, candidate: Option<&T>, comparator: &C) -> Verdict
where
    C: Comparator<T> + ?Sized,
{
    match (control, candidate) {
        (Some(control), Some(candidate)) => {
            if comparator.equivalent(control, candidate).await {
                Verdict::Matched
            } else {
                Verdict::Mismatched
            }
        }
        (None, None) => Verdict::BothFailed,
        _ => Verdict::Mismatched,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn default_comparator_uses_equality() {
        assert_eq!(decide(Some(&5), Some(&5), &DefaultComparator).await, Verdict::Matched);
        assert_eq!(decide(Some(&5), Some(&3), &DefaultComparator).await, Verdict::Mismatched);
    }

    #[tokio::test]
    async fn custom_comparator_is_authoritative() {
        let same_parity = FnComparator(|a: &i32, b: &i32| a % 2 == b % 2);

        assert_eq!(decide(Some(&3), Some(&5), &same_parity).await, Verdict::Matched);
        assert_eq!(decide(Some(&3), Some(&4), &same_parity).await, Verdict::Mismatched);
    }

    #[tokio::test]
    async fn async_comparator_is_awaited() {
        let slow_eq = AsyncFnComparator(|a: i32, b: i32| async move {
            tokio::task::yield_now().await;
            a == b
        });

        assert_eq!(decide(Some(&9), Some(&9), &slow_eq).await, Verdict::Matched);
    }

    #[tokio::test]
    async fn failures_never_reach_the_comparator() {
        let never = FnComparator(|_: &i32, _: &i32| -> bool {
            panic!("comparator must not be called")
        });

        assert_eq!(decide(None, Some(&1), &never).await, Verdict::Mismatched);
        assert_eq!(decide(Some(&1), None, &never).await, Verdict::Mismatched);
        assert_eq!(decide(None, None, &never).await, Verdict::BothFailed);
    }
}

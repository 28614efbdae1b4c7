//! `TwoLockQueue` against `VecDeque`.

use std::collections::VecDeque;

use proptest::prelude::*;
use reservation_sim::stdx::{ContainerError, TwoLockQueue};

#[derive(Clone, Debug)]
enum Op {
    Enqueue(i64),
    Dequeue,
}

fn op_strategy() -> impl Strategy<Value = Op> {
    prop_oneof![any::<i64>().prop_map(Op::Enqueue), Just(Op::Dequeue)]
}

proptest! {
    #![proptest_config(ProptestConfig::with_cases(crate::proptest_cases(256)))]

    #[test]
    fn matches_vecdeque_model(ops in proptest::collection::vec(op_strategy(), 0..300)) {
        let queue = TwoLockQueue::new().unwrap();
        let mut model = VecDeque::new();

        for op in ops {
            match op {
                Op::Enqueue(value) => {
                    queue.enqueue(value).unwrap();
                    model.push_back(value);
                }
                Op::Dequeue => match model.pop_front() {
                    Some(expected) => prop_assert_eq!(queue.dequeue(), Ok(expected)),
                    None => prop_assert_eq!(queue.dequeue(), Err(ContainerError::Empty)),
                },
            }
            prop_assert_eq!(queue.len(), model.len());
            prop_assert_eq!(queue.is_empty(), model.is_empty());
        }

        prop_assert_eq!(queue.snapshot(), model.iter().copied().collect::<Vec<_>>());
        let sum: i128 = queue.fold(0i128, |acc, value| acc + i128::from(*value));
        prop_assert_eq!(sum, model.iter().map(|v| i128::from(*v)).sum::<i128>());
    }
}

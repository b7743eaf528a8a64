//! Play order properties across many sizes, start indices and seeds.

use core_playback::{LoopMode, PlaybackError, QueueManager, Transition, TransitionController};
use std::collections::HashSet;

#[test]
fn test_sequential_order_starts_at_selection_and_wraps() {
    for len in 1..12 {
        for start in 0..len {
            let mut queue = QueueManager::new(None);
            queue.build(len, start, false).unwrap();

            let expected: Vec<usize> = (0..len).map(|i| (start + i) % len).collect();
            assert_eq!(queue.order(), expected.as_slice(), "len {} start {}", len, start);

            let mut visited = vec![queue.current().unwrap()];
            while queue.advance() {
                visited.push(queue.current().unwrap());
            }
            assert_eq!(visited, expected);
            assert!(queue.is_at_end());
        }
    }
}

#[test]
fn test_shuffled_order_is_permutation_with_selection_first() {
    for seed in 0..32u64 {
        for len in [1usize, 2, 3, 7, 50] {
            let start = (seed as usize * 7) % len;
            let mut queue = QueueManager::new(Some(seed));
            queue.build(len, start, true).unwrap();

            assert_eq!(queue.current(), Some(start));
            assert_eq!(queue.order()[0], start);
            let distinct: HashSet<usize> = queue.order().iter().copied().collect();
            assert_eq!(distinct.len(), len);
            assert!(distinct.iter().all(|&index| index < len));
        }
    }
}

#[test]
fn test_same_seed_same_order() {
    let mut a = QueueManager::new(Some(9));
    let mut b = QueueManager::new(Some(9));
    a.build(40, 5, true).unwrap();
    b.build(40, 5, true).unwrap();
    assert_eq!(a.order(), b.order());
}

#[test]
fn test_invalid_input_leaves_queue_untouched() {
    let mut queue = QueueManager::new(None);
    queue.build(3, 1, false).unwrap();
    let before = queue.order().to_vec();

    assert_eq!(queue.build(0, 0, false), Err(PlaybackError::EmptyQueue));
    assert_eq!(
        queue.build(3, 3, true),
        Err(PlaybackError::InvalidQueueIndex { index: 3, len: 3 })
    );
    assert_eq!(queue.order(), before.as_slice());
    assert_eq!(queue.current(), Some(1));
}

#[test]
fn test_loop_all_cycles_through_whole_order() {
    let mut queue = QueueManager::new(Some(3));
    queue.build(5, 2, true).unwrap();
    let order = queue.order().to_vec();

    let mut controller = TransitionController::default();
    controller.set_loop_mode(LoopMode::All);

    let mut played = vec![queue.current().unwrap()];
    for _ in 0..9 {
        match controller.on_terminal(core_playback::Terminal::Finished, &mut queue) {
            Transition::Play(index) => played.push(index),
            other => panic!("unexpected transition {:?}", other),
        }
    }
    let expected: Vec<usize> = order.iter().chain(order.iter()).copied().collect();
    assert_eq!(played, expected);
}

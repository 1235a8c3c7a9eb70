use std::sync::Arc;
use std::time::Duration;

use super::*;

#[test]
fn test_fifo_order() {
    let queue = ItemQueue::new();
    for i in 0..10 {
        queue.push(Item::text(format!("item-{i}")));
    }

    for i in 0..10 {
        let item = queue.try_pop().unwrap();
        assert_eq!(item.string_form(), format!("item-{i}"));
    }
    assert!(queue.try_pop().is_none());
}

#[test]
fn test_len_and_clear() {
    let queue = ItemQueue::new();
    assert!(queue.is_empty());

    queue.push(Item::text("a"));
    queue.push(Item::text("b"));
    assert_eq!(queue.len(), 2);

    assert_eq!(queue.clear(), 2);
    assert!(queue.is_empty());
    assert_eq!(queue.clear(), 0);
}

#[tokio::test]
async fn test_pop_waits_for_push() {
    let queue = Arc::new(ItemQueue::new());

    let popper = {
        let queue = Arc::clone(&queue);
        tokio::spawn(async move { queue.pop().await })
    };

    tokio::time::sleep(Duration::from_millis(50)).await;
    assert!(!popper.is_finished());

    queue.push(Item::text("late"));
    let item = popper.await.unwrap();
    assert_eq!(item.string_form(), "late");
}

#[tokio::test]
async fn test_pop_returns_queued_item_immediately() {
    let queue = ItemQueue::new();
    queue.push(Item::text("ready"));

    let item = tokio::time::timeout(Duration::from_secs(1), queue.pop())
        .await
        .unwrap();
    assert_eq!(item.string_form(), "ready");
}

#[tokio::test]
async fn test_concurrent_push_pop_loses_nothing() {
    let queue = Arc::new(ItemQueue::new());
    const N: usize = 500;

    let consumer = {
        let queue = Arc::clone(&queue);
        tokio::spawn(async move {
            let mut seen = Vec::with_capacity(N);
            for _ in 0..N {
                seen.push(queue.pop().await.string_form());
            }
            seen
        })
    };

    let producer = {
        let queue = Arc::clone(&queue);
        tokio::spawn(async move {
            for i in 0..N {
                queue.push(Item::text(format!("{i}")));
                if i % 64 == 0 {
                    tokio::task::yield_now().await;
                }
            }
        })
    };

    producer.await.unwrap();
    let seen = consumer.await.unwrap();

    // Single consumer: everything arrives, in push order.
    assert_eq!(seen.len(), N);
    for (i, s) in seen.iter().enumerate() {
        assert_eq!(s, &format!("{i}"));
    }
}

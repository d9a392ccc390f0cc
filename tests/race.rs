extern crate deferred;
extern crate env_logger;
extern crate rand;

use std::time::Duration;

use rand::Rng;

use deferred::{first_determined, first_determined_sequence, first_resolved, first_value,
               first_value_sequence, Context, Error, Future, Priority, Promise, Queue, Resolver};

fn init_logger() {
    let _ = env_logger::builder().is_test(true).try_init();
}

fn pending(count: usize) -> (Vec<Resolver<usize, &'static str>>, Vec<Future<usize, &'static str>>) {
    (0..count)
        .map(|_| {
            let (resolver, promise) = Promise::pair(&Context::global());
            (resolver, promise.into_future())
        })
        .unzip()
}

#[test]
fn test_first_value_single_winner() {
    init_logger();

    let (resolvers, futures) = pending(100);
    let winner = rand::thread_rng().gen_range(0..100);

    let raced = first_value(futures.clone(), true);
    resolvers[winner].resolve_value(winner);

    assert_eq!(raced.wait(), Ok(winner));

    for (i, future) in futures.iter().enumerate() {
        let result = future.wait_timeout(Duration::from_secs(5)).unwrap();
        if i == winner {
            assert_eq!(result, Ok(winner));
        } else {
            assert!(result.unwrap_err().is_canceled());
        }
    }
}

#[test]
fn test_first_determined_takes_failures() {
    init_logger();

    let (resolvers, futures) = pending(3);
    let raced = first_determined(futures.clone(), false);

    resolvers[1].resolve_error("first to settle");
    let winner = raced.wait().unwrap();
    assert!(winner.ptr_eq(&futures[1]));
    assert_eq!(winner.peek(), Some(Err(Error::Failed("first to settle"))));

    // Without `cancel_others` the rest are left alone.
    assert!(futures[0].peek().is_none());
    assert!(futures[2].peek().is_none());
}

#[test]
fn test_empty_races_are_invalid() {
    init_logger();

    let none = Vec::<Future<u8, ()>>::new;
    assert!(matches!(first_determined(none(), false).wait(), Err(Error::Invalid(_))));
    assert!(matches!(first_resolved(none(), true).wait(), Err(Error::Invalid(_))));
    assert!(matches!(first_value(none(), false).wait(), Err(Error::Invalid(_))));
}

#[test]
fn test_all_failures_surface_the_last() {
    init_logger();

    let queue = Queue::serial("race failures").unwrap();
    let context = queue.context(Priority::Normal);

    let futures: Vec<Future<u8, usize>> =
        (0..5).map(|i| Future::spawn(&context, move || Err(Error::Failed(i)))).collect();

    // A serial queue settles them in submission order.
    assert_eq!(first_value(futures, false).wait(), Err(Error::Failed(4)));
}

#[test]
fn test_race_already_determined_inputs() {
    init_logger();

    let futures: Vec<Future<u8, ()>> = (0..10).map(Future::value).collect();
    let winner = first_determined(futures.clone(), false).wait().unwrap();

    assert!(futures.iter().filter(|f| f.ptr_eq(&winner)).count() == 1);
}

#[test]
fn test_race_sequences() {
    init_logger();

    let (resolvers, futures) = pending(4);
    let raced = first_value_sequence(futures.clone(), false);
    let determined = first_determined_sequence(futures, false);

    resolvers[2].resolve_value(2);
    assert_eq!(raced.wait(), Ok(2));
    assert_eq!(determined.wait().unwrap().peek(), Some(Ok(2)));
}

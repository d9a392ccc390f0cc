extern crate deferred;
extern crate env_logger;

use std::time::{Duration, Instant};

use deferred::{Context, Error, Future, Promise, State, DEFAULT_TIMEOUT_REASON};

fn init_logger() {
    let _ = env_logger::builder().is_test(true).try_init();
}

#[test]
fn test_timeout_cancels_source() {
    init_logger();

    let (resolver, source) = Promise::<String, ()>::pair(&Context::global());
    let deadline = Instant::now() + Duration::from_millis(50);
    let bounded = source.timeout(deadline, "fetch took too long");

    assert_eq!(bounded.wait(), Err(Error::TimedOut("fetch took too long".to_owned())));
    assert!(Instant::now() >= deadline);

    assert_eq!(source.state(), State::Determined);
    assert!(source.wait().unwrap_err().is_cancellation());
    assert!(!resolver.needs_resolution());
    assert!(!resolver.resolve_value("too late".to_owned()));
}

#[test]
fn test_timeout_with_default_reason() {
    init_logger();

    let (_resolver, source) = Promise::<(), String>::pair(&Context::global());
    let bounded = source.timeout_after(Duration::from_millis(10), DEFAULT_TIMEOUT_REASON);
    assert_eq!(bounded.wait().unwrap_err().to_string(),
               "timed out: operation timed out");
}

#[test]
fn test_delay_past_deadline_adds_nothing() {
    init_logger();

    let future: Future<u32, ()> = Future::spawn(&Context::global(), || Ok(5));
    assert_eq!(future.wait(), Ok(5));

    let start = Instant::now();
    let delayed = future.delay(Instant::now() - Duration::from_millis(1));
    assert_eq!(delayed.wait(), Ok(5));
    assert!(start.elapsed() < Duration::from_millis(50));
}

#[test]
fn test_delay_far_future_error_is_immediate() {
    init_logger();

    let (resolver, source) = Promise::<u32, &'static str>::pair(&Context::global());
    let delayed = source.delay_for(Duration::from_secs(24 * 3600));

    let start = Instant::now();
    resolver.resolve_error("broken pipe");
    assert_eq!(delayed.wait_timeout(Duration::from_secs(5)),
               Some(Err(Error::Failed("broken pipe"))));
    assert!(start.elapsed() < Duration::from_secs(1));
}

#[test]
fn test_delayed_then_timed_out() {
    init_logger();

    let future: Future<u32, ()> = Future::value(1);
    let bounded = future.delay_for(Duration::from_secs(3600))
        .timeout_after(Duration::from_millis(20), "gave up");

    assert_eq!(bounded.wait(), Err(Error::TimedOut("gave up".to_owned())));
    // The source already had its value and keeps it.
    assert_eq!(future.peek(), Some(Ok(1)));
}

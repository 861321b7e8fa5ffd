//! End-to-end protocol scenarios across sources, operators, and the
//! signalling processor.

use std::{sync::Arc, thread};

use rivulet::prelude::*;

#[test]
fn just_one_value_then_completion() {
  let ts = TestSubscriber::new();
  from_iter([1]).subscribe(ts.clone());
  ts.request(UNBOUNDED);

  ts.assert_values(&[1]);
  ts.assert_complete();
  ts.assert_no_error();
}

#[test]
fn empty_source_completes_without_values() {
  let ts = TestSubscriber::<i32>::new();
  from_iter(Vec::<i32>::new()).subscribe(ts.clone());
  ts.request(1);

  ts.assert_no_values();
  ts.assert_complete();
  ts.assert_no_error();
}

#[test]
fn failing_source_delivers_the_error() {
  let ts = TestSubscriber::<i32>::new();
  fail_with::<i32>(SignalError::failure("forced failure")).subscribe(ts.clone());

  ts.assert_no_values();
  ts.assert_error_message("forced failure");
  ts.assert_not_complete();
}

#[test]
fn bounded_demand_is_honored_to_the_element() {
  let ts = TestSubscriber::new();
  from_iter(1..=1000).subscribe(ts.clone());

  ts.request(3);
  ts.request(2);
  ts.assert_values(&[1, 2, 3, 4, 5]);
  ts.assert_not_complete();

  // Demand up to the exact length completes eagerly with the last
  // element.
  ts.request(995);
  ts.assert_value_count(1000);
  ts.assert_complete();
}

#[test]
fn missing_element_stops_the_stream() {
  let ts = TestSubscriber::unbounded();
  from_option_iter(vec![Some(1), None, Some(3)]).subscribe(ts.clone());

  ts.assert_values(&[1]);
  ts.assert_error_matches(|e| e.is_missing_element());
  ts.assert_not_complete();
}

#[test]
fn retry_when_resubscribes_per_companion_value() {
  let source = from_try_iter(vec![Ok('A'), Err(SignalError::failure("err1"))]);
  let ts = TestSubscriber::unbounded();
  source.retry_when(|_errors| from_iter([1, 2])).subscribe(ts.clone());

  ts.assert_values(&['A', 'A', 'A']);
  ts.assert_complete();
  ts.assert_no_error();
}

#[test]
fn retry_when_propagates_companion_error() {
  let source = from_try_iter(vec![Ok('A'), Err(SignalError::failure("err2"))]);
  let ts = TestSubscriber::unbounded();
  source
    .retry_when(|_errors| {
      from_try_iter(vec![Ok(1), Err(SignalError::failure("companion failed"))])
    })
    .subscribe(ts.clone());

  ts.assert_values(&['A', 'A']);
  ts.assert_error_message("companion failed");
  ts.assert_not_complete();
}

#[test]
fn accumulator_error_cancels_and_terminates() {
  let ts = TestSubscriber::unbounded();
  from_iter([1, 2, 3])
    .accumulate(|_a, _b| Err(SignalError::MissingElement("accumulator")))
    .subscribe(ts.clone());

  ts.assert_values(&[1]);
  ts.assert_error_matches(|e| e.is_missing_element());
  ts.assert_not_complete();
}

#[test]
fn accumulate_composes_with_retry_when() {
  // The accumulation restarts with each re-subscription, so every pass
  // over the source yields a fresh running sum.
  let source = from_try_iter(vec![Ok(1), Ok(2), Err(SignalError::failure("err"))]);
  let ts = TestSubscriber::unbounded();
  source.accumulate(|a, b| Ok(a + b)).retry_when(|_errors| from_iter([0])).subscribe(ts.clone());

  ts.assert_values(&[1, 3, 1, 3]);
  ts.assert_complete();
}

#[test]
fn companion_driven_from_another_thread() {
  let source = from_try_iter(vec![Ok(7), Err(SignalError::failure("flaky"))]);
  let ticks = DirectProcessor::<u32>::new();
  let driver = ticks.clone();

  let ts = TestSubscriber::unbounded();
  source.retry_when(move |_errors| driver.clone()).subscribe(ts.clone());
  ts.assert_values(&[7]);

  // One retry per tick; each tick's demand is replenished by the error
  // that the previous re-subscription produced, so the ticks are issued
  // sequentially off the subscribing thread.
  let ticker = thread::spawn(move || {
    ticks.on_next(1);
    ticks.on_next(1);
  });
  ticker.join().unwrap();

  // Each tick re-subscribed the source exactly once, inline on the
  // ticking thread.
  ts.assert_values(&[7, 7, 7]);
  ts.assert_not_complete();
  ts.assert_no_error();
}

#[test]
fn errors_are_observable_through_the_companion_stream() {
  // The handler can watch the error stream itself: collect the errors
  // while never signalling, so the first failure ends the stream.
  let seen = TestSubscriber::unbounded();
  let probe = seen.clone();

  let source = from_try_iter(vec![Ok(1), Err(SignalError::failure("watched"))]);
  let ts = TestSubscriber::unbounded();
  source
    .retry_when(move |errors| {
      errors.subscribe(probe.clone());
      DirectProcessor::<u32>::new()
    })
    .subscribe(ts.clone());

  ts.assert_values(&[1]);
  ts.assert_not_complete();
  assert_eq!(seen.error_count(), 0);
  seen.assert_value_count(1);
}

#[test]
fn cancellation_is_idempotent_and_final() {
  let ts = TestSubscriber::new();
  from_iter(1..=10).subscribe(ts.clone());
  ts.request(2);
  ts.cancel();
  ts.cancel();
  ts.request(8);

  ts.assert_values(&[1, 2]);
  ts.assert_not_complete();
  ts.assert_no_error();
}

#[test]
fn zero_request_is_a_protocol_error() {
  let ts = TestSubscriber::new();
  from_iter(1..=10).subscribe(ts.clone());
  ts.request(0);

  ts.assert_no_values();
  ts.assert_error_matches(|e| e.is_bad_request());
}

#[test]
fn dropped_errors_reach_the_hooks() {
  use std::sync::atomic::{AtomicUsize, Ordering};

  let dropped = Arc::new(AtomicUsize::new(0));
  let counter = dropped.clone();
  hooks::with_error_capture(
    Arc::new(move |_| {
      counter.fetch_add(1, Ordering::SeqCst);
    }),
    || {
      let processor = DirectProcessor::<i32>::new();
      let ts = TestSubscriber::unbounded();
      processor.subscribe(ts.clone());
      processor.on_complete();
      processor.on_error(SignalError::failure("too late"));
      ts.assert_complete();
      ts.assert_no_error();
    },
  );
  assert_eq!(dropped.load(Ordering::SeqCst), 1);
}

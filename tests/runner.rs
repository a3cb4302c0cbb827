//! Task runner ordering and failure-protocol tests.

use std::sync::{Arc, Mutex};
use std::thread;
use std::time::Duration;

use frameseek::{FrameSeekError, TaskRunner};

#[test]
fn tasks_run_in_submission_order() {
    let runner = TaskRunner::spawn("order");
    let log: Arc<Mutex<Vec<u32>>> = Arc::new(Mutex::new(Vec::new()));

    for i in 0..8 {
        let log = Arc::clone(&log);
        runner.submit(move || {
            log.lock().unwrap().push(i);
            Ok(())
        });
    }

    runner.join().expect("join");
    assert_eq!(*log.lock().unwrap(), (0..8).collect::<Vec<u32>>());
}

#[test]
fn failure_is_reraised_exactly_once() {
    let runner = TaskRunner::spawn("failure");

    runner.submit(|| Ok(()));
    runner.submit(|| Err(FrameSeekError::DecodeError("boom".to_string())));
    runner.submit(|| Ok(()));

    match runner.join() {
        Err(FrameSeekError::DecodeError(message)) => assert_eq!(message, "boom"),
        other => panic!("expected the captured failure, got {other:?}"),
    }

    // The failure was consumed; a second join reports success.
    runner.join().expect("second join");
}

#[test]
fn first_failure_wins() {
    let runner = TaskRunner::spawn("first-failure");

    runner.submit(|| Err(FrameSeekError::DecodeError("first".to_string())));
    runner.submit(|| Err(FrameSeekError::DecodeError("second".to_string())));

    match runner.join() {
        Err(FrameSeekError::DecodeError(message)) => assert_eq!(message, "first"),
        other => panic!("expected the first failure, got {other:?}"),
    }
}

#[test]
fn queue_keeps_draining_after_a_failure() {
    let runner = TaskRunner::spawn("drain");
    let log: Arc<Mutex<Vec<&str>>> = Arc::new(Mutex::new(Vec::new()));

    runner.submit(|| Err(FrameSeekError::DecodeError("early".to_string())));
    let late = Arc::clone(&log);
    runner.submit(move || {
        late.lock().unwrap().push("late");
        Ok(())
    });

    assert!(runner.join().is_err());
    assert_eq!(*log.lock().unwrap(), vec!["late"]);
}

#[test]
fn force_join_discards_queued_tasks_and_failures() {
    let runner = TaskRunner::spawn("force");
    let log: Arc<Mutex<Vec<&str>>> = Arc::new(Mutex::new(Vec::new()));

    let slow = Arc::clone(&log);
    runner.submit(move || {
        thread::sleep(Duration::from_millis(100));
        slow.lock().unwrap().push("in-flight");
        Err(FrameSeekError::DecodeError("discarded".to_string()))
    });
    let queued = Arc::clone(&log);
    runner.submit(move || {
        queued.lock().unwrap().push("queued");
        Ok(())
    });

    // Give the worker time to start the first task, then tear down.
    thread::sleep(Duration::from_millis(20));
    runner.force_join();

    assert_eq!(*log.lock().unwrap(), vec!["in-flight"]);
    runner.join().expect("failure was cleared");
}

#[test]
fn panicking_task_surfaces_as_task_failed() {
    let runner = TaskRunner::spawn("panic");
    runner.submit(|| panic!("worker blew up"));

    match runner.join() {
        Err(FrameSeekError::TaskFailed(message)) => {
            assert!(message.contains("worker blew up"), "message: {message}");
        }
        other => panic!("expected TaskFailed, got {other:?}"),
    }

    // The worker survives the panic and keeps serving tasks.
    runner.submit(|| Ok(()));
    runner.join().expect("join after panic");
}

#[test]
fn drop_runs_queued_tasks_before_stopping() {
    let log: Arc<Mutex<Vec<u32>>> = Arc::new(Mutex::new(Vec::new()));

    {
        let runner = TaskRunner::spawn("drop");
        for i in 0..4 {
            let log = Arc::clone(&log);
            runner.submit(move || {
                log.lock().unwrap().push(i);
                Ok(())
            });
        }
        // Dropped here with work still queued; the worker drains the queue
        // before it stops.
    }

    assert_eq!(*log.lock().unwrap(), vec![0, 1, 2, 3]);
}

#[test]
fn join_with_no_work_returns_immediately() {
    let runner = TaskRunner::spawn("idle");
    runner.join().expect("idle join");
}

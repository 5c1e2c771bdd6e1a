use seltrans::task::{DelayedTask, TaskOutcome};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::{Duration, Instant};
use tokio::runtime::Handle;

#[tokio::test]
async fn runs_after_the_delay() {
    let start = Instant::now();
    let task = DelayedTask::spawn(&Handle::current(), Duration::from_millis(30), || async { 42 });
    assert_eq!(task.wait().await, TaskOutcome::Completed(42));
    assert!(start.elapsed() >= Duration::from_millis(30));
}

#[tokio::test]
async fn cancel_during_delay_skips_the_job() {
    let ran = Arc::new(AtomicBool::new(false));
    let flag = Arc::clone(&ran);
    let task = DelayedTask::spawn(&Handle::current(), Duration::from_secs(10), move || async move {
        flag.store(true, Ordering::SeqCst);
    });
    task.cancel();

    let out = tokio::time::timeout(Duration::from_secs(2), task.wait())
        .await
        .expect("cancellation should be prompt");
    assert_eq!(out, TaskOutcome::Cancelled);
    assert!(!ran.load(Ordering::SeqCst));
}

#[tokio::test]
async fn cancel_while_running_stops_the_job() {
    let task = DelayedTask::spawn(&Handle::current(), Duration::ZERO, || async {
        tokio::time::sleep(Duration::from_secs(10)).await;
        "late"
    });
    tokio::time::sleep(Duration::from_millis(20)).await;
    task.cancel();

    let out = tokio::time::timeout(Duration::from_secs(2), task.wait())
        .await
        .expect("cancellation should be prompt");
    assert_eq!(out, TaskOutcome::Cancelled);
}

#[tokio::test]
async fn finished_flag_flips_on_completion() {
    let task = DelayedTask::spawn(&Handle::current(), Duration::ZERO, || async { () });
    let deadline = Instant::now() + Duration::from_secs(2);
    while !task.is_finished() && Instant::now() < deadline {
        tokio::time::sleep(Duration::from_millis(5)).await;
    }
    assert!(task.is_finished());
    assert_eq!(task.wait().await, TaskOutcome::Completed(()));
}

#[tokio::test]
async fn dropping_the_handle_cancels() {
    let ran = Arc::new(AtomicBool::new(false));
    let flag = Arc::clone(&ran);
    let task = DelayedTask::spawn(&Handle::current(), Duration::from_millis(50), move || async move {
        flag.store(true, Ordering::SeqCst);
    });
    drop(task);
    tokio::time::sleep(Duration::from_millis(150)).await;
    assert!(!ran.load(Ordering::SeqCst));
}

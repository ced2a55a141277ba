use std::sync::{Arc, Barrier};

use host_pulse::stream::{Rejection, SessionLimiter, admit};

#[test]
fn test_parallel_admission_never_exceeds_cap() {
    let limiter = SessionLimiter::new(2);
    let barrier = Arc::new(Barrier::new(32));

    let handles: Vec<_> = (0..32)
        .map(|_| {
            let limiter = limiter.clone();
            let barrier = Arc::clone(&barrier);
            std::thread::spawn(move || {
                barrier.wait();
                admit(&limiter, "tok", Some("tok"))
            })
        })
        .collect();

    let mut admitted = Vec::new();
    let mut busy = 0;
    for handle in handles {
        match handle.join().unwrap() {
            Ok(slot) => admitted.push(slot),
            Err(Rejection::Busy) => busy += 1,
            Err(Rejection::Unauthorized) => panic!("valid token rejected"),
        }
    }

    assert_eq!(admitted.len(), 2);
    assert_eq!(busy, 30);
    assert_eq!(limiter.active(), 2);

    admitted.pop();
    assert_eq!(limiter.active(), 1);
    assert!(admit(&limiter, "tok", Some("tok")).is_ok());
}

#[test]
fn test_rejections_leave_counter_untouched() {
    let limiter = SessionLimiter::new(1);
    for _ in 0..10 {
        assert_eq!(
            admit(&limiter, "tok", Some("nope")).unwrap_err(),
            Rejection::Unauthorized
        );
    }
    let slot = admit(&limiter, "tok", Some("tok")).unwrap();
    for _ in 0..10 {
        assert_eq!(admit(&limiter, "tok", Some("tok")).unwrap_err(), Rejection::Busy);
    }
    assert_eq!(limiter.active(), 1);
    drop(slot);
    assert_eq!(limiter.active(), 0);
}

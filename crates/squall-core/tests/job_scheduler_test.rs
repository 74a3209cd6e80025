// Copyright 2025 eraflo
//
// Licensed under the Apache License, Version 2.0 (the "License");
// you may not use this file except in compliance with the License.
// You may obtain a copy of the License at
//
//     http://www.apache.org/licenses/LICENSE-2.0
//
// Unless required by applicable law or agreed to in writing, software
// distributed under the License is distributed on an "AS IS" BASIS,
// WITHOUT WARRANTIES OR CONDITIONS OF ANY KIND, either express or implied.
// See the License for the specific language governing permissions and
// limitations under the License.

use squall_core::{JobScheduler, JobState};
use std::sync::atomic::{AtomicBool, AtomicU32, Ordering};
use std::sync::{mpsc, Arc};
use std::thread;
use std::time::Duration;

#[test]
fn three_independent_jobs_all_run_exactly_once() {
    // --- ARRANGE ---
    let scheduler = JobScheduler::with_threads(4).expect("pool should start");
    let counters: Vec<Arc<AtomicU32>> = (0..3).map(|_| Arc::new(AtomicU32::new(0))).collect();

    // --- ACT ---
    let handles: Vec<_> = counters
        .iter()
        .map(|counter| {
            let counter = Arc::clone(counter);
            scheduler.create_job(
                move || {
                    counter.fetch_add(1, Ordering::SeqCst);
                },
                0,
                None,
            )
        })
        .collect();

    for handle in &handles {
        handle.wait();
    }

    // --- ASSERT ---
    for (index, counter) in counters.iter().enumerate() {
        assert_eq!(
            counter.load(Ordering::SeqCst),
            1,
            "job {index} should have run exactly once"
        );
    }
}

#[test]
fn dependent_job_waits_for_its_prerequisite() {
    // Scenario: J2 has one unresolved dependency; J1's finish callback
    // resolves it and enqueues J2. Waiting on J2 must imply J1 finished.
    let scheduler = JobScheduler::with_threads(2).expect("pool should start");
    let j1_done = Arc::new(AtomicBool::new(false));
    let order_ok = Arc::new(AtomicBool::new(false));

    let j1_done_in_j2 = Arc::clone(&j1_done);
    let order_ok_clone = Arc::clone(&order_ok);
    let j2 = scheduler.create_job(
        move || {
            order_ok_clone.store(j1_done_in_j2.load(Ordering::SeqCst), Ordering::SeqCst);
        },
        1,
        None,
    );

    assert_eq!(j2.state(), JobState::Pending, "J2 must not start early");

    let submitter = scheduler.handle();
    let j2_for_hook = j2.clone();
    let j1_done_clone = Arc::clone(&j1_done);
    let _j1 = scheduler.create_job(
        move || {
            j1_done_clone.store(true, Ordering::SeqCst);
        },
        0,
        Some(Box::new(move || {
            if j2_for_hook.job().decrement_dependencies() == 0 {
                submitter.queue_job(j2_for_hook);
            }
        })),
    );

    j2.wait();
    assert!(
        order_ok.load(Ordering::SeqCst),
        "J2 must observe J1's side effects"
    );
}

#[test]
fn n_dependency_job_is_enqueued_exactly_once_after_the_nth_decrement() {
    let scheduler = JobScheduler::with_threads(2).expect("pool should start");
    let runs = Arc::new(AtomicU32::new(0));

    let runs_clone = Arc::clone(&runs);
    let job = scheduler.create_job(
        move || {
            runs_clone.fetch_add(1, Ordering::SeqCst);
        },
        3,
        None,
    );

    assert_eq!(job.job().decrement_dependencies(), 2);
    assert_eq!(job.job().decrement_dependencies(), 1);
    assert_eq!(
        job.state(),
        JobState::Pending,
        "job must stay pending until the last dependency resolves"
    );

    assert_eq!(job.job().decrement_dependencies(), 0);
    scheduler.queue_job(job.clone());

    job.wait();
    assert_eq!(runs.load(Ordering::SeqCst), 1);
}

#[test]
fn create_job_after_chains_prerequisites_declaratively() {
    let scheduler = JobScheduler::with_threads(4).expect("pool should start");
    let stage_one_runs = Arc::new(AtomicU32::new(0));

    let prerequisites: Vec<_> = (0..3)
        .map(|_| {
            let runs = Arc::clone(&stage_one_runs);
            scheduler.create_job(
                move || {
                    runs.fetch_add(1, Ordering::SeqCst);
                },
                0,
                None,
            )
        })
        .collect();

    let observed = Arc::new(AtomicU32::new(0));
    let observed_clone = Arc::clone(&observed);
    let runs_at_join = Arc::clone(&stage_one_runs);
    let joined = scheduler.create_job_after(
        &prerequisites,
        move || {
            observed_clone.store(runs_at_join.load(Ordering::SeqCst), Ordering::SeqCst);
        },
        None,
    );

    joined.wait();
    assert_eq!(
        observed.load(Ordering::SeqCst),
        3,
        "the joined job must see every prerequisite's work"
    );
}

#[test]
fn create_job_after_handles_already_finished_prerequisites() {
    let scheduler = JobScheduler::with_threads(2).expect("pool should start");

    let finished = scheduler.create_job(|| {}, 0, None);
    finished.wait();

    let ran = Arc::new(AtomicBool::new(false));
    let ran_clone = Arc::clone(&ran);
    let dependent = scheduler.create_job_after(
        &[finished],
        move || {
            ran_clone.store(true, Ordering::SeqCst);
        },
        None,
    );

    dependent.wait();
    assert!(ran.load(Ordering::SeqCst));
}

#[test]
fn dropping_every_caller_handle_does_not_kill_a_queued_job() {
    let scheduler = JobScheduler::with_threads(1).expect("pool should start");
    let (release_tx, release_rx) = mpsc::channel::<()>();
    let (done_tx, done_rx) = mpsc::channel::<()>();

    // Occupy the only worker so the second job sits in the queue.
    let blocker = scheduler.create_job(
        move || {
            release_rx
                .recv()
                .expect("release signal should arrive");
        },
        0,
        None,
    );

    {
        // The caller drops its handle immediately; the queue's own handle
        // must keep the job alive until it runs.
        let _dropped = scheduler.create_job(
            move || {
                done_tx.send(()).expect("test receiver alive");
            },
            0,
            None,
        );
    }

    release_tx.send(()).expect("worker is waiting");
    done_rx
        .recv_timeout(Duration::from_secs(5))
        .expect("job dropped by its caller should still execute");
    blocker.wait();
}

#[test]
fn shutdown_abandons_jobs_still_in_the_queue() {
    let mut scheduler = JobScheduler::with_threads(1).expect("pool should start");
    let (release_tx, release_rx) = mpsc::channel::<()>();
    let (started_tx, started_rx) = mpsc::channel::<()>();
    let abandoned_ran = Arc::new(AtomicBool::new(false));

    // The worker parks inside this job until we release it.
    let _blocker = scheduler.create_job(
        move || {
            started_tx.send(()).expect("test receiver alive");
            release_rx.recv().expect("release signal should arrive");
        },
        0,
        None,
    );

    // Make sure the worker is inside the blocker before shutting down, so
    // the second job is deterministically still queued.
    started_rx
        .recv_timeout(Duration::from_secs(5))
        .expect("blocker job should have started");

    let abandoned_clone = Arc::clone(&abandoned_ran);
    let _queued_behind = scheduler.create_job(
        move || {
            abandoned_clone.store(true, Ordering::SeqCst);
        },
        0,
        None,
    );

    // Release the blocker once shutdown has begun, from a helper thread,
    // since shutdown() blocks joining the worker.
    let releaser = thread::spawn(move || {
        thread::sleep(Duration::from_millis(50));
        release_tx.send(()).expect("worker is waiting");
    });

    scheduler.shutdown();
    releaser.join().expect("releaser thread should not panic");

    assert!(
        !abandoned_ran.load(Ordering::SeqCst),
        "no job may start executing after shutdown begins"
    );
}

#[test]
fn fifo_order_holds_for_independent_jobs_on_one_worker() {
    let scheduler = JobScheduler::with_threads(1).expect("pool should start");
    let (release_tx, release_rx) = mpsc::channel::<()>();
    let order = Arc::new(std::sync::Mutex::new(Vec::new()));

    // Hold the worker so the numbered jobs all queue up first.
    let blocker = scheduler.create_job(
        move || {
            release_rx.recv().expect("release signal should arrive");
        },
        0,
        None,
    );

    let mut handles = Vec::new();
    for index in 0..5u32 {
        let order_clone = Arc::clone(&order);
        handles.push(scheduler.create_job(
            move || {
                order_clone.lock().unwrap().push(index);
            },
            0,
            None,
        ));
    }

    release_tx.send(()).expect("worker is waiting");
    blocker.wait();
    for handle in &handles {
        handle.wait();
    }

    assert_eq!(
        *order.lock().unwrap(),
        vec![0, 1, 2, 3, 4],
        "single-worker dispatch must preserve submission order"
    );
}

#[test]
fn a_panicking_finish_hook_does_not_kill_the_worker() {
    let scheduler = JobScheduler::with_threads(1).expect("pool should start");
    let (done_tx, done_rx) = mpsc::channel::<()>();

    let faulty = scheduler.create_job(|| {}, 0, Some(Box::new(|| panic!("hook failure"))));
    faulty.wait();
    assert!(faulty.job().is_finished());

    // The only worker must have survived the hook's unwind.
    let _follow_up = scheduler.create_job(
        move || {
            done_tx.send(()).expect("test receiver alive");
        },
        0,
        None,
    );
    done_rx
        .recv_timeout(Duration::from_secs(5))
        .expect("follow-up job should still run after a finish-hook panic");
}

#[test]
fn a_panicking_job_does_not_poison_the_pool() {
    let scheduler = JobScheduler::with_threads(1).expect("pool should start");

    let faulty = scheduler.create_job(|| panic!("job failure"), 0, None);
    faulty.wait();
    assert!(faulty.job().is_finished());

    // The same worker must still be able to run subsequent jobs.
    let ran = Arc::new(AtomicBool::new(false));
    let ran_clone = Arc::clone(&ran);
    let follow_up = scheduler.create_job(
        move || {
            ran_clone.store(true, Ordering::SeqCst);
        },
        0,
        None,
    );
    follow_up.wait();
    assert!(ran.load(Ordering::SeqCst));
}

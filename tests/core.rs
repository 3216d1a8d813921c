// tests/core.rs
use moortune::{Outcome, refine};
use std::cell::RefCell;
use std::ops::ControlFlow;
use std::rc::Rc;

fn keep_going(_i: usize, _t: &f64, _m: &f64) -> ControlFlow<()> {
    ControlFlow::Continue(())
}

/* ──────────────────────────────────────────────────────────────────────────
1) Proportional step toward a fixed point converges inside the budget
────────────────────────────────────────────────────────────────────────── */

#[test]
fn proportional_step_converges_to_target() {
    let target = 42.0_f64;
    let out = refine(
        0.0_f64,
        |t: &f64| Ok::<f64, ()>(*t),
        |d: &f64| Ok(target - *d),
        |_t: &f64, err: &f64| err.abs() < 1e-6,
        |t: &f64, err: &f64| t + 0.5 * err,
        keep_going,
        200,
    )
    .unwrap();

    assert!(out.is_converged(), "{out:?}");
    assert!((out.theta() - target).abs() < 1e-6);
    assert!(out.iters() > 1 && out.iters() < 200);
}

/* ──────────────────────────────────────────────────────────────────────────
2) Budget exhaustion reports the last *tested* parameter
────────────────────────────────────────────────────────────────────────── */

#[test]
fn exceeded_budget_reports_last_tested_theta() {
    let tested = Rc::new(RefCell::new(Vec::new()));
    let out = {
        let tested = Rc::clone(&tested);
        refine(
            10.0_f64,
            move |t: &f64| {
                tested.borrow_mut().push(*t);
                Ok::<f64, ()>(*t)
            },
            |d: &f64| Ok(*d),
            |_t: &f64, _m: &f64| false,
            |t: &f64, _m: &f64| t + 1.0,
            keep_going,
            4,
        )
        .unwrap()
    };

    assert_eq!(*tested.borrow(), vec![10.0, 11.0, 12.0, 13.0]);
    match out {
        Outcome::ExceededBudget { theta, metrics, iters } => {
            assert_eq!(theta, 13.0);
            assert_eq!(metrics, Some(13.0));
            assert_eq!(iters, 4);
        }
        other => panic!("expected ExceededBudget, got {other:?}"),
    }
}

#[test]
fn zero_budget_runs_nothing() {
    let runs = Rc::new(RefCell::new(0usize));
    let out = {
        let runs = Rc::clone(&runs);
        refine(
            7.0_f64,
            move |t: &f64| {
                *runs.borrow_mut() += 1;
                Ok::<f64, ()>(*t)
            },
            |d: &f64| Ok(*d),
            |_t: &f64, _m: &f64| true,
            |t: &f64, _m: &f64| *t,
            keep_going,
            0,
        )
        .unwrap()
    };
    assert_eq!(*runs.borrow(), 0);
    assert_eq!(out, Outcome::ExceededBudget { theta: 7.0, metrics: None, iters: 0 });
}

/* ──────────────────────────────────────────────────────────────────────────
3) Observer can stop the loop; errors abort it
────────────────────────────────────────────────────────────────────────── */

#[test]
fn observer_break_cancels_before_update() {
    let out = refine(
        1.0_f64,
        |t: &f64| Ok::<f64, ()>(*t),
        |d: &f64| Ok(*d),
        |_t: &f64, _m: &f64| false,
        |t: &f64, _m: &f64| t * 2.0,
        |i: usize, _t: &f64, _m: &f64| if i == 3 { ControlFlow::Break(()) } else { ControlFlow::Continue(()) },
        100,
    )
    .unwrap();

    match out {
        Outcome::Cancelled { theta, iters, .. } => {
            assert_eq!(theta, 4.0);
            assert_eq!(iters, 3);
        }
        other => panic!("expected Cancelled, got {other:?}"),
    }
}

#[test]
fn simulate_error_aborts_immediately() {
    let err = refine(
        0.0_f64,
        |t: &f64| if *t >= 2.0 { Err(format!("simulator failed at {t}")) } else { Ok(*t) },
        |d: &f64| Ok(*d),
        |_t: &f64, _m: &f64| false,
        |t: &f64, _m: &f64| t + 1.0,
        keep_going,
        100,
    )
    .unwrap_err();
    assert_eq!(err, "simulator failed at 2");
}

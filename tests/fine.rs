// tests/fine.rs
mod common;

use std::f64::consts::PI;

use bevy_prng::WyRand;
use rand_core::{RngCore, SeedableRng};

use moortune::io::outb::FileFormat;
use moortune::mechanics::catenary::MooringGeometry;
use moortune::mechanics::{SpectrumError, band_step, dominant_frequency, length_update};
use moortune::platform::OC3;
use moortune::systems::deck::InputDeck;
use moortune::systems::fine::{self, FineTuner};
use moortune::systems::sdk::{CancelFlag, Hook, Recorder};
use moortune::{Error, Phase};

fn uniform(rng: &mut WyRand) -> f64 {
    (rng.next_u64() >> 11) as f64 / (1u64 << 53) as f64
}

/* ──────────────────────────────────────────────────────────────────────────
1) Banded control law
────────────────────────────────────────────────────────────────────────── */

#[test]
fn band_steps_grow_with_the_error() {
    assert_eq!(band_step(0.0), None);
    assert_eq!(band_step(0.0005), None);
    assert_eq!(band_step(0.0006), Some(0.1));
    assert_eq!(band_step(0.002), Some(0.1));
    assert_eq!(band_step(0.004), Some(0.5));
    assert_eq!(band_step(0.01), Some(1.0));
    assert_eq!(band_step(0.02), Some(2.0));
    assert_eq!(band_step(0.3), Some(3.0));
}

#[test]
fn slow_candidate_lengthens_and_fast_candidate_shortens() {
    assert_eq!(length_update(1000.0, -0.03), 1003.0);
    assert_eq!(length_update(1000.0, 0.03), 997.0);
    assert_eq!(length_update(1000.0, -0.004), 1000.5);
    assert_eq!(length_update(1000.0, 0.0004), 1000.0);
}

/* ──────────────────────────────────────────────────────────────────────────
2) Loop core against a synthetic simulator
────────────────────────────────────────────────────────────────────────── */

#[test]
fn steps_shrink_as_the_frequency_closes_in() {
    let answers = [0.07, 0.092, 0.0997];
    let mut calls = 0;
    let recorder = Recorder::new();
    let mut hooks: Vec<Box<dyn Hook>> = vec![Box::new(recorder.clone())];

    let tuned = fine::tune_with(1000.0, 0.1, 10, &mut hooks, |_| {
        calls += 1;
        Ok(answers[calls - 1])
    })
    .unwrap();

    assert_eq!(tuned.iterations, 3);
    assert_eq!(tuned.line_length, 1004.0);
    assert!(tuned.observation.error().abs() <= 0.0005);

    let lengths: Vec<f64> = recorder.iterations().iter().map(|it| it.line_length).collect();
    assert_eq!(lengths, [1000.0, 1003.0, 1004.0]);
    assert!(recorder.iterations().iter().all(|it| it.phase == Phase::Fine));
}

#[test]
fn budget_exhaustion_reports_the_last_tested_length() {
    let err = fine::tune_with(1000.0, 0.1, 4, &mut [], |_| Ok(0.05)).unwrap_err();
    match err {
        Error::NonConvergence { phase, iterations, last_length, last_metric } => {
            assert_eq!(phase, Phase::Fine);
            assert_eq!(iterations, 4);
            assert_eq!(last_length, 1009.0);
            assert!((last_metric.unwrap() + 0.05).abs() < 1e-12);
        }
        other => panic!("expected NonConvergence, got {other}"),
    }
}

#[test]
fn simulator_errors_abort_the_phase() {
    let mut calls = 0;
    let err = fine::tune_with(1000.0, 0.1, 10, &mut [], |_| {
        calls += 1;
        if calls == 2 {
            return Err(Error::Spectrum(SpectrumError::Flat));
        }
        Ok(0.05)
    })
    .unwrap_err();
    assert!(matches!(err, Error::Spectrum(SpectrumError::Flat)), "{err}");
    assert_eq!(calls, 2);
}

#[test]
fn cancelled_fine_phase_is_an_error() {
    let flag = CancelFlag::new();
    let mut hooks: Vec<Box<dyn Hook>> = vec![Box::new(flag.clone())];
    let err = fine::tune_with(1000.0, 0.1, 10, &mut hooks, |_| {
        flag.cancel();
        Ok(0.05)
    })
    .unwrap_err();
    match err {
        Error::Cancelled { phase, iterations, last_length, last_metric } => {
            assert_eq!(phase, Phase::Fine);
            assert_eq!(iterations, 1);
            assert_eq!(last_length, 1000.0);
            assert!((last_metric.unwrap() + 0.05).abs() < 1e-12);
        }
        other => panic!("expected Cancelled, got {other}"),
    }
}

/* ──────────────────────────────────────────────────────────────────────────
3) Dominant frequency
────────────────────────────────────────────────────────────────────────── */

#[test]
fn dominant_frequency_survives_noise() {
    let mut rng = WyRand::from_seed(7u64.to_le_bytes());
    let dt = 0.05;
    let time = common::time_axis(4096, dt);
    let signal: Vec<f64> = time
        .iter()
        .map(|t| (2.0 * PI * 0.25 * t).sin() + 0.4 * (uniform(&mut rng) - 0.5) + 3.0)
        .collect();

    let f = dominant_frequency(&time, &signal).unwrap();
    assert!((f - 0.25).abs() < 0.0025, "got {f}");
}

#[test]
fn dominant_frequency_of_a_damped_decay() {
    let time = common::time_axis(common::SAMPLES, common::DT);
    for freq in [0.03, 0.05, 0.1] {
        let f = dominant_frequency(&time, &common::surge_decay(&time, freq)).unwrap();
        assert!((f - freq).abs() < 3e-4, "{freq} Hz estimated as {f}");
    }
}

#[test]
fn degenerate_signals_are_rejected() {
    let t = common::time_axis(8, 0.1);
    assert_eq!(
        dominant_frequency(&t[..3], &[0.0, 1.0, 0.0]),
        Err(SpectrumError::TooShort { min: 4, got: 3 })
    );
    assert_eq!(dominant_frequency(&t, &[5.0; 8]), Err(SpectrumError::Flat));
    assert_eq!(
        dominant_frequency(&t, &[1.0; 7]),
        Err(SpectrumError::LengthMismatch { time: 8, signal: 7 })
    );
    let square = [0.0, 1.0, 0.0, -1.0, 0.0, 1.0, 0.0, -1.0];
    assert!(matches!(dominant_frequency(&[1.0; 8], &square), Err(SpectrumError::BadSpacing(_))));
}

#[test]
fn channel_frequency_reads_the_binary_output() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("baseline.outb");
    let time = common::time_axis(common::SAMPLES, common::DT);
    common::write_outb(&path, &["PtfmSurge"], &time, &[common::surge_decay(&time, 0.08)], FileFormat::WithTime);

    let f = fine::channel_frequency(&path, "PtfmSurge").unwrap();
    assert!((f - 0.08).abs() < 5e-4, "got {f}");
    assert!(matches!(fine::channel_frequency(&path, "PtfmPitch"), Err(Error::Outb(_))));
}

/* ──────────────────────────────────────────────────────────────────────────
4) Full phase against a stub simulator
────────────────────────────────────────────────────────────────────────── */

#[test]
fn fine_tuner_writes_nothing_when_it_gives_up() {
    let templates = tempfile::tempdir().unwrap();
    let work = tempfile::tempdir().unwrap();
    common::write_templates(templates.path(), &OC3);

    let baseline = templates.path().join("baseline.outb");
    let time = common::time_axis(common::SAMPLES, common::DT);
    common::write_outb(&baseline, &["PtfmSurge"], &time, &[common::surge_decay(&time, 0.1)], FileFormat::WithTime);

    let deck = InputDeck::new(templates.path(), &OC3, MooringGeometry::compute(&OC3, 320.0).unwrap());
    let output = templates.path().join("tuned.dat");
    // 40 m short of the target: 3 m steps cannot close the gap in two runs
    let mut sim = common::StubFast::new(0.0, 1990.0, 0.1);

    let err = FineTuner::new(&deck, work.path())
        .with_max_iters(2)
        .tune(1950.0, &baseline, &output, &mut sim, &mut [])
        .unwrap_err();

    assert!(
        matches!(err, Error::NonConvergence { phase: Phase::Fine, iterations: 2, last_length, .. } if last_length == 1953.0),
        "{err}"
    );
    assert!(!output.exists());
    assert!(sim.runs.iter().all(|(fst, _, _)| fst == "fine.fst"));
    assert_eq!(sim.runs.iter().map(|r| r.1).collect::<Vec<_>>(), [1950.0, 1953.0]);
}

//! Synthetic cohorts shared by application tests.
//!
//! Labels follow a noisy monotone score of the model features so trained
//! forests have real signal to find.

use rand::{Rng, SeedableRng};
use rand_chacha::ChaCha20Rng;

use crate::adapters::forest::ForestParams;
use crate::domain::{CohortDataset, PatientInput};

fn build(headers: &[&str], records: Vec<Vec<String>>) -> CohortDataset {
    CohortDataset::from_records(headers.iter().map(|h| h.to_string()).collect(), records)
        .expect("Fixture cohort should build")
}

/// Diabetes-shaped cohort: `Diabetes, HighBP, BMI, Age, GenHlth`.
pub(crate) fn diabetes_cohort(n: usize, seed: u64) -> CohortDataset {
    let mut rng = ChaCha20Rng::seed_from_u64(seed);
    let records = (0..n)
        .map(|_| {
            let bmi: f64 = (rng.gen_range(18.0..45.0_f64) * 10.0).round() / 10.0;
            let age: u8 = rng.gen_range(1..=13);
            let health: u8 = rng.gen_range(1..=5);
            let score = (bmi - 18.0) / 27.0 * 0.5
                + f64::from(age) / 13.0 * 0.3
                + f64::from(health - 1) / 4.0 * 0.4
                + rng.gen_range(-0.15..0.15);
            let high_bp = u8::from(rng.gen_bool(0.4));
            vec![
                u8::from(score > 0.6).to_string(),
                high_bp.to_string(),
                bmi.to_string(),
                age.to_string(),
                health.to_string(),
            ]
        })
        .collect();
    build(&["Diabetes", "HighBP", "BMI", "Age", "GenHlth"], records)
}

/// Hypertension-shaped cohort: `age, cp, thalach, oldpeak, target`.
pub(crate) fn hypertension_cohort(n: usize, seed: u64) -> CohortDataset {
    let mut rng = ChaCha20Rng::seed_from_u64(seed);
    let records = (0..n)
        .map(|_| {
            let age: u8 = rng.gen_range(29..=77);
            let cp: u8 = rng.gen_range(0..=3);
            let thalach: u16 = rng.gen_range(90..=200);
            let oldpeak: f64 = (rng.gen_range(0.0..6.0_f64) * 10.0).round() / 10.0;
            let score = f64::from(cp) / 3.0 * 0.5
                + f64::from(200 - thalach) / 110.0 * 0.3
                + oldpeak / 6.0 * 0.4
                + rng.gen_range(-0.15..0.15);
            vec![
                age.to_string(),
                cp.to_string(),
                thalach.to_string(),
                oldpeak.to_string(),
                u8::from(score > 0.6).to_string(),
            ]
        })
        .collect();
    build(&["age", "cp", "thalach", "oldpeak", "target"], records)
}

/// Forest small enough for fast unit tests.
pub(crate) fn small_forest() -> ForestParams {
    ForestParams {
        n_trees: 20,
        ..ForestParams::default()
    }
}

/// The worked example from the form: age 45, BMI 28.5, health 2, chest pain 1, pain 3.
pub(crate) fn scenario_input() -> PatientInput {
    PatientInput {
        age: Some(45),
        bmi: Some(28.5),
        general_health: 2,
        chest_pain: 1,
        exercise_pain: 3.0,
    }
}

//! Reference test binary entry point
//!
//! Runs every reference scene to its configured frame limit.

use anyhow::Result;
use reference_tests::{
    ContainmentCheck, ExpectedResult, ObstacleClearanceCheck, ReferenceTest, SettlingCheck,
    TestResult,
};

/// Dam break
///
/// A block of water dropped into an empty tank collapses, spreads over the
/// floor and comes to rest.
fn dam_break_test() -> ReferenceTest {
    ReferenceTest {
        name: "Dam Break".to_string(),
        config_path: "configs/dam-break.json".to_string(),
        frames: None, // Run to the scene's max_timesteps
        expected: ExpectedResult {
            containment: Some(ContainmentCheck { margin: 1.0e-4 }),
            density_floor: true,
            settling: Some(SettlingCheck {
                max_mean_height: 1.0,
                max_energy_fraction: 0.25,
            }),
            obstacle_clearance: None,
            max_speed: Some(10.0),
        },
    }
}

/// Obstacle pour
///
/// Water poured onto an upright box and a tilted box must flow around both
/// without any particle ending up buried inside.
fn obstacle_pour_test() -> ReferenceTest {
    ReferenceTest {
        name: "Obstacle Pour".to_string(),
        config_path: "configs/obstacle-pour.json".to_string(),
        frames: None,
        expected: ExpectedResult {
            containment: Some(ContainmentCheck { margin: 1.0e-4 }),
            density_floor: true,
            settling: Some(SettlingCheck {
                max_mean_height: 1.2, // Some water stays on top of the upright box
                max_energy_fraction: 0.25,
            }),
            obstacle_clearance: Some(ObstacleClearanceCheck { margin: 1.0e-3 }),
            max_speed: None,
        },
    }
}

/// Get all reference tests
fn all_tests() -> Vec<ReferenceTest> {
    vec![dam_break_test(), obstacle_pour_test()]
}

fn main() -> Result<()> {
    // Initialize logging
    tracing_subscriber::fmt()
        .with_max_level(tracing::Level::INFO)
        .with_target(false)
        .init();

    tracing::info!("SPH Reference Test Suite");
    tracing::info!("========================");

    let tests = all_tests();
    tracing::info!("Found {} reference tests", tests.len());

    let mut results: Vec<TestResult> = Vec::new();
    let mut passed_count = 0;
    let mut failed_count = 0;

    for test in tests {
        match test.run() {
            Ok(result) => {
                if result.passed {
                    passed_count += 1;
                } else {
                    failed_count += 1;
                }
                result.print_summary();
                results.push(result);
            }
            Err(e) => {
                eprintln!("\nERROR running test {}: {:#}", test.name, e);
                failed_count += 1;
            }
        }
    }

    println!("\n{}", "=".repeat(80));
    println!("OVERALL SUMMARY");
    println!("{}", "=".repeat(80));
    println!("Total tests: {}", results.len());
    println!("Passed: {}", passed_count);
    println!("Failed: {}", failed_count);
    println!("{}", "=".repeat(80));

    if failed_count > 0 {
        anyhow::bail!("{} reference test(s) failed", failed_count);
    }
    Ok(())
}

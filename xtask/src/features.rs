use std::process::Command;

use anyhow::{Context, Result};

/// `(package, features)` pairs that must compile on their own.
const FEATURE_COMBINATIONS: &[(&str, &[&str])] = &[
    ("creditsync-common", &[]),
    ("creditsync-common", &["foundation"]),
    ("creditsync-common", &["observability"]),
    ("creditsync-common", &["runtime"]),
    ("creditsync-common", &["platform"]),
    ("creditsync-core", &[]),
    ("creditsync-core", &["test-utils"]),
];

/// Check that every common feature tier compiles in isolation.
pub fn test_feature_matrix() -> Result<()> {
    println!("Testing {} feature combinations...", FEATURE_COMBINATIONS.len());

    for (index, (package, features)) in FEATURE_COMBINATIONS.iter().enumerate() {
        let joined = features.join(",");
        let label = if features.is_empty() {
            format!("{package} (no features)")
        } else {
            format!("{package} --features {joined}")
        };

        println!("\n[{}/{}] cargo check -p {label}", index + 1, FEATURE_COMBINATIONS.len());

        let mut command = Command::new("cargo");
        command.args(["check", "-p", package, "--no-default-features"]);
        if !features.is_empty() {
            command.arg("--features").arg(&joined);
        }

        let status =
            command.status().with_context(|| format!("Failed to run cargo check for '{label}'"))?;

        if !status.success() {
            anyhow::bail!("Feature combination '{label}' failed to compile");
        }

        println!("✅ '{label}' compiled successfully");
    }

    println!("\n✅ All {} feature combinations compile successfully!", FEATURE_COMBINATIONS.len());

    Ok(())
}

//! Build script: embeds the moddeploy version string at compile time.

use std::process::Command;

fn main() {
    // Release builds pin the version through MODDEPLOY_VERSION; local builds
    // describe the current git checkout instead.
    if let Ok(version) = std::env::var("MODDEPLOY_VERSION") {
        println!("cargo:rustc-env=MODDEPLOY_VERSION={version}");
    } else if let Ok(output) = Command::new("git")
        .args(["describe", "--tags", "--always", "--dirty"])
        .output()
        && output.status.success()
    {
        let version = String::from_utf8_lossy(&output.stdout).trim().to_string();
        println!("cargo:rustc-env=MODDEPLOY_VERSION={version}");
    }

    println!("cargo:rerun-if-changed=.git/HEAD");
    println!("cargo:rerun-if-changed=.git/refs/");
    println!("cargo:rerun-if-env-changed=MODDEPLOY_VERSION");
}

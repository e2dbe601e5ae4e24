// src/utils/arch.rs

//! Host architecture detection.

use std::process::Command;

/// Debian architecture of the running machine.
///
/// Asks `dpkg --print-architecture` first and falls back to the
/// architecture this binary was compiled for.
pub fn detect_architecture() -> String {
    match dpkg_architecture() {
        Some(arch) => arch,
        None => {
            let arch = debian_name(std::env::consts::ARCH).to_string();
            log::debug!("dpkg unavailable, assuming architecture {}", arch);
            arch
        }
    }
}

fn dpkg_architecture() -> Option<String> {
    let output = Command::new("dpkg")
        .arg("--print-architecture")
        .output()
        .ok()?;
    if !output.status.success() {
        return None;
    }
    let arch = String::from_utf8(output.stdout).ok()?.trim().to_string();
    (!arch.is_empty()).then_some(arch)
}

/// Map a Rust target architecture name to the Debian one.
pub fn debian_name(rust_arch: &str) -> &str {
    match rust_arch {
        "x86_64" => "amd64",
        "x86" => "i386",
        "aarch64" => "arm64",
        "arm" => "armhf",
        "powerpc64" => "ppc64el",
        "mips64" => "mips64el",
        "loongarch64" => "loong64",
        other => other,
    }
}

//! GPU identification
//!
//! Tries, in order:
//! - nvidia-smi (any platform with an NVIDIA driver)
//! - lspci (Linux)
//! - wmic Win32_VideoController (Windows)
//!
//! and falls back to "Unknown GPU" when nothing answers.

use anyhow::{Context, Result};
use std::process::Command;
use tracing::debug;

pub(crate) const UNKNOWN_GPU: &str = "Unknown GPU";

#[derive(Debug, Clone, PartialEq)]
pub(crate) struct GpuDetails {
    pub name: String,
    pub vram_mb: Option<u64>,
    pub driver_version: Option<String>,
}

impl GpuDetails {
    pub fn unknown() -> Self {
        Self {
            name: UNKNOWN_GPU.to_string(),
            vram_mb: None,
            driver_version: None,
        }
    }

    /// Best-effort detection of the primary GPU. Never fails.
    pub fn detect() -> Self {
        match Self::query_nvidia_smi() {
            Ok(gpu) => return gpu,
            Err(err) => debug!("nvidia-smi detection failed: {err:#}"),
        }

        #[cfg(target_os = "linux")]
        {
            match Self::query_lspci() {
                Ok(gpu) => return gpu,
                Err(err) => debug!("lspci detection failed: {err:#}"),
            }
        }

        #[cfg(target_os = "windows")]
        {
            match Self::query_wmic() {
                Ok(gpu) => return gpu,
                Err(err) => debug!("wmic detection failed: {err:#}"),
            }
        }

        Self::unknown()
    }

    fn query_nvidia_smi() -> Result<Self> {
        let output = Command::new("nvidia-smi")
            .args([
                "--query-gpu=name,memory.total,driver_version",
                "--format=csv,noheader,nounits",
            ])
            .output()
            .context("nvidia-smi not found")?;

        if !output.status.success() {
            anyhow::bail!("nvidia-smi exited with {}", output.status);
        }

        parse_nvidia_smi(&String::from_utf8_lossy(&output.stdout))
            .context("Unexpected nvidia-smi output")
    }

    #[cfg(target_os = "linux")]
    fn query_lspci() -> Result<Self> {
        let output = Command::new("lspci").output().context("lspci not found")?;
        if !output.status.success() {
            anyhow::bail!("lspci exited with {}", output.status);
        }

        parse_lspci(&String::from_utf8_lossy(&output.stdout)).context("No display controller in lspci output")
    }

    #[cfg(target_os = "windows")]
    fn query_wmic() -> Result<Self> {
        let output = Command::new("wmic")
            .args([
                "path",
                "win32_VideoController",
                "get",
                "AdapterRAM,DriverVersion,Name",
                "/format:csv",
            ])
            .output()
            .context("wmic not found")?;
        if !output.status.success() {
            anyhow::bail!("wmic exited with {}", output.status);
        }

        parse_wmic_csv(&String::from_utf8_lossy(&output.stdout)).context("No GPU in wmic output")
    }
}

/// First line of `name, memory.total, driver_version` (no header, no units).
fn parse_nvidia_smi(stdout: &str) -> Option<GpuDetails> {
    let line = stdout.lines().map(str::trim).find(|l| !l.is_empty())?;
    let mut parts = line.split(',').map(str::trim);

    let raw_name = parts.next().filter(|n| !n.is_empty())?;
    let vram_mb = parts.next().and_then(|v| v.parse::<u64>().ok());
    let driver_version = parts.next().filter(|d| !d.is_empty()).map(str::to_string);

    let name = if raw_name.starts_with("NVIDIA") {
        raw_name.to_string()
    } else {
        format!("NVIDIA {}", raw_name)
    };

    Some(GpuDetails {
        name,
        vram_mb,
        driver_version,
    })
}

/// `01:00.0 VGA compatible controller: NVIDIA Corporation GA104 [GeForce RTX 3070] (rev a1)`
#[cfg(target_os = "linux")]
fn parse_lspci(stdout: &str) -> Option<GpuDetails> {
    let line = stdout
        .lines()
        .find(|l| l.contains("VGA") || l.contains("3D controller") || l.contains("Display controller"))?;

    let (_, description) = line.split_once(": ")?;
    let name = match description.rfind(" (rev") {
        Some(idx) => &description[..idx],
        None => description,
    };

    Some(GpuDetails {
        name: name.trim().to_string(),
        vram_mb: None,
        driver_version: None,
    })
}

/// `Node,AdapterRAM,DriverVersion,Name` rows; AdapterRAM is in bytes.
#[cfg(target_os = "windows")]
fn parse_wmic_csv(stdout: &str) -> Option<GpuDetails> {
    stdout
        .lines()
        .map(str::trim)
        .filter(|l| !l.is_empty() && !l.starts_with("Node,"))
        .find_map(|line| {
            let parts: Vec<&str> = line.split(',').map(str::trim).collect();
            let [_, ram, driver, name] = parts.as_slice() else {
                return None;
            };
            if name.is_empty() {
                return None;
            }
            Some(GpuDetails {
                name: name.to_string(),
                vram_mb: ram.parse::<u64>().ok().map(|bytes| bytes / 1024 / 1024),
                driver_version: Some(driver.to_string()).filter(|d| !d.is_empty()),
            })
        })
}

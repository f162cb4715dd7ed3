//! Hardware detection module
//!
//! Collects the environment metadata attached to a benchmark result: GPU via
//! vendor tools, CPU/RAM/OS via sysinfo.

mod gpu;

use sysinfo::System;

use gpu::GpuDetails;

use crate::report::HardwareMetadata;

const UNKNOWN: &str = "Unknown";

/// Detect the metadata for the current machine. Missing pieces are reported as
/// unknown rather than failing.
pub fn detect() -> HardwareMetadata {
    let gpu = GpuDetails::detect();

    let mut sys = System::new();
    sys.refresh_cpu_all();
    sys.refresh_memory();

    let cpu_name = sys
        .cpus()
        .first()
        .map(|cpu| cpu.brand().trim().to_string())
        .filter(|name| !name.is_empty())
        .unwrap_or_else(|| "Unknown CPU".to_string());

    let ram_mb = Some(sys.total_memory() / 1024 / 1024).filter(|mb| *mb > 0);

    HardwareMetadata {
        gpu_name: gpu.name,
        vram_mb: gpu.vram_mb,
        driver_version: gpu.driver_version,
        cpu_name,
        ram_mb,
        os_version: os_version(),
        uses_wine: uses_wine(),
    }
}

fn os_version() -> String {
    let name = System::name().unwrap_or_else(|| UNKNOWN.to_string());
    match System::os_version() {
        Some(version) => format!("{} {}", name, version),
        None => name,
    }
}

/// Wine sets `WINEDEBUG` for every process it hosts.
pub fn uses_wine() -> bool {
    std::env::var_os("WINEDEBUG").is_some()
}

/// Boxed summary for the `detect` command.
pub fn display(metadata: &HardwareMetadata) -> String {
    const WIDTH: usize = 62;
    let mut output = String::new();

    output.push_str(&format!("╔{}╗\n", "═".repeat(WIDTH)));
    output.push_str(&format!("║{:^WIDTH$}║\n", "SYSTEM INFORMATION"));
    output.push_str(&format!("╠{}╣\n", "═".repeat(WIDTH)));

    let line = |label: &str, content: &str| -> String {
        let room = WIDTH.saturating_sub(1 + label.chars().count());
        let content: String = content.chars().take(room).collect();
        format!("║ {}{:<room$}║\n", label, content)
    };

    output.push_str(&line("GPU:    ", &metadata.gpu_name));
    if let Some(vram) = metadata.vram_mb {
        output.push_str(&line("        ", &format!("VRAM: {} MB", vram)));
    }
    if let Some(driver) = &metadata.driver_version {
        output.push_str(&line("        ", &format!("Driver: {}", driver)));
    }
    output.push_str(&line("CPU:    ", &metadata.cpu_name));
    let ram = metadata
        .ram_mb
        .map(|mb| format!("{:.1} GB", mb as f64 / 1024.0))
        .unwrap_or_else(|| UNKNOWN.to_string());
    output.push_str(&line("RAM:    ", &ram));
    output.push_str(&line("OS:     ", &metadata.os_version));
    if metadata.uses_wine {
        output.push_str(&line("        ", "Running under Wine"));
    }

    output.push_str(&format!("╚{}╝", "═".repeat(WIDTH)));
    output
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sample() -> HardwareMetadata {
        HardwareMetadata {
            gpu_name: "NVIDIA GeForce RTX 3070".to_string(),
            vram_mb: Some(8192),
            driver_version: Some("550.54.14".to_string()),
            cpu_name: "AMD Ryzen 7 5800X 8-Core Processor".to_string(),
            ram_mb: Some(32_768),
            os_version: "Ubuntu 24.04".to_string(),
            uses_wine: false,
        }
    }

    #[test]
    fn display_lines_have_equal_width() {
        let text = display(&sample());
        let widths: Vec<usize> = text.lines().map(|l| l.chars().count()).collect();
        assert!(widths.windows(2).all(|w| w[0] == w[1]), "{text}");
        assert!(text.contains("VRAM: 8192 MB"));
        assert!(text.contains("32.0 GB"));
    }

    #[test]
    fn long_names_are_truncated() {
        let mut metadata = sample();
        metadata.cpu_name = "X".repeat(200);
        let text = display(&metadata);
        let widths: Vec<usize> = text.lines().map(|l| l.chars().count()).collect();
        assert!(widths.windows(2).all(|w| w[0] == w[1]));
    }

    #[test]
    fn detect_always_names_a_gpu_and_cpu() {
        let metadata = detect();
        assert!(!metadata.gpu_name.is_empty());
        assert!(!metadata.cpu_name.is_empty());
        assert!(!metadata.os_version.is_empty());
    }
}

// One-time choice of presentation backend from the environment.
//
// On Linux the X display decides: `:0` is the local, GPU-backed session; any
// other value (ssh forwarding, Xvfb, VNC) gets the CPU window; no display at
// all means nothing can be shown in a window, so frames go to the terminal.
// Other platforms always have a window system.

use std::fmt;

pub const DISPLAY_ENV: &str = "DISPLAY";
/// The local, primary X session.
pub const PRIMARY_DISPLAY: &str = ":0";

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Backend {
    GpuWindow,
    CpuWindow,
    HeadlessSink,
}

impl Backend {
    /// Short label used in log lines.
    pub fn label(self) -> &'static str {
        match self {
            Backend::GpuWindow => "gpu",
            Backend::CpuWindow => "cpu",
            Backend::HeadlessSink => "headless",
        }
    }
}

impl fmt::Display for Backend {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.label())
    }
}

/// Everything the selection depends on, gathered up front.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Environment {
    pub cpu_only: bool,
    pub gpu_available: bool,
    pub linux: bool,
    pub display: Option<String>,
}

impl Environment {
    pub fn from_env(cpu_only: bool) -> Self {
        Self::with_lookup(cpu_only, |key| std::env::var(key).ok())
    }

    pub fn with_lookup(cpu_only: bool, env: impl Fn(&str) -> Option<String>) -> Self {
        Self {
            cpu_only,
            gpu_available: cfg!(feature = "gpu"),
            linux: cfg!(target_os = "linux"),
            display: env(DISPLAY_ENV),
        }
    }
}

pub fn select(env: &Environment) -> Backend {
    let gpu_allowed = !env.cpu_only && env.gpu_available;
    if !env.linux {
        return if gpu_allowed { Backend::GpuWindow } else { Backend::CpuWindow };
    }
    match env.display.as_deref() {
        None => Backend::HeadlessSink,
        Some(PRIMARY_DISPLAY) if gpu_allowed => Backend::GpuWindow,
        Some(_) => Backend::CpuWindow,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn linux(cpu_only: bool, gpu_available: bool, display: Option<&str>) -> Environment {
        Environment {
            cpu_only,
            gpu_available,
            linux: true,
            display: display.map(str::to_string),
        }
    }

    #[test]
    fn no_display_is_headless_whatever_the_gpu() {
        assert_eq!(select(&linux(false, true, None)), Backend::HeadlessSink);
        assert_eq!(select(&linux(false, false, None)), Backend::HeadlessSink);
        assert_eq!(select(&linux(true, true, None)), Backend::HeadlessSink);
    }

    #[test]
    fn primary_display_with_gpu_is_gpu_window() {
        assert_eq!(select(&linux(false, true, Some(":0"))), Backend::GpuWindow);
    }

    #[test]
    fn remote_display_is_cpu_window() {
        assert_eq!(select(&linux(false, true, Some("localhost:10.0"))), Backend::CpuWindow);
        assert_eq!(select(&linux(false, true, Some(":1"))), Backend::CpuWindow);
    }

    #[test]
    fn cpu_override_or_missing_gpu_falls_back_to_cpu_window() {
        assert_eq!(select(&linux(true, true, Some(":0"))), Backend::CpuWindow);
        assert_eq!(select(&linux(false, false, Some(":0"))), Backend::CpuWindow);
    }

    #[test]
    fn other_platforms_ignore_display() {
        let mut p = Environment { cpu_only: false, gpu_available: true, linux: false, display: None };
        assert_eq!(select(&p), Backend::GpuWindow);
        p.cpu_only = true;
        assert_eq!(select(&p), Backend::CpuWindow);
    }

    #[test]
    fn lookup_reads_display() {
        let p = Environment::with_lookup(false, |k| (k == DISPLAY_ENV).then(|| ":0".to_string()));
        assert_eq!(p.display.as_deref(), Some(":0"));
        assert!(!p.cpu_only);
    }
}

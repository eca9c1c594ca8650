use clap::ValueEnum;
use std::collections::BTreeSet;
use std::fmt;

/// Kind of host a log category is collected from
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum HostClass {
    Controller,
    Blade,
}

/// Log category selectable with `--logtypes`.
///
/// Declaration order is the order categories are evaluated on a host.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, ValueEnum)]
#[value(rename_all = "snake_case")]
pub enum LogType {
    /// middleware.log of FMs
    Middleware,
    /// platform.log of FMs
    Platform,
    /// system.log of FMs
    System,
    /// nfs.log of blades
    Nfs,
    /// platform.log of blades
    PlatformBlades,
    /// system.log of blades
    SystemBlades,
    /// haproxy.log of blades
    HaproxyBlades,
    /// atop measurements on blades (accepted, not collected)
    AtopBlades,
}

impl LogType {
    pub const ALL: [LogType; 8] = [
        LogType::Middleware,
        LogType::Platform,
        LogType::System,
        LogType::Nfs,
        LogType::PlatformBlades,
        LogType::SystemBlades,
        LogType::HaproxyBlades,
        LogType::AtopBlades,
    ];

    pub const DEFAULTS: [LogType; 3] = [LogType::Middleware, LogType::Platform, LogType::Nfs];

    pub fn name(&self) -> &'static str {
        match self {
            LogType::Middleware => "middleware",
            LogType::Platform => "platform",
            LogType::System => "system",
            LogType::Nfs => "nfs",
            LogType::PlatformBlades => "platform_blades",
            LogType::SystemBlades => "system_blades",
            LogType::HaproxyBlades => "haproxy_blades",
            LogType::AtopBlades => "atop_blades",
        }
    }

    pub fn host_class(&self) -> HostClass {
        match self {
            LogType::Middleware | LogType::Platform | LogType::System => HostClass::Controller,
            _ => HostClass::Blade,
        }
    }

    /// Filename patterns in the remote log directory.
    ///
    /// `nfs` lists the bare file explicitly so it is always included.
    pub fn patterns(&self) -> &'static [&'static str] {
        match self {
            LogType::Middleware => &["middleware.log*"],
            LogType::Platform => &["platform.log*"],
            LogType::System => &["system.log*"],
            LogType::Nfs => &["nfs.log", "nfs.log.*"],
            LogType::PlatformBlades => &["platform.log*"],
            LogType::SystemBlades => &["system.log*"],
            LogType::HaproxyBlades => &["haproxy.log*"],
            // TODO: collect atop measurements once the on-blade file naming is confirmed
            LogType::AtopBlades => &[],
        }
    }

    pub fn is_collected(&self) -> bool {
        !self.patterns().is_empty()
    }
}

impl fmt::Display for LogType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

/// The set of requested log categories
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct LogSelection {
    requested: BTreeSet<LogType>,
}

impl LogSelection {
    pub fn new(requested: impl IntoIterator<Item = LogType>) -> Self {
        Self {
            requested: requested.into_iter().collect(),
        }
    }

    pub fn is_empty(&self) -> bool {
        self.requested.is_empty()
    }

    pub fn contains(&self, log_type: LogType) -> bool {
        self.requested.contains(&log_type)
    }

    pub fn names(&self) -> Vec<&'static str> {
        self.requested.iter().map(LogType::name).collect()
    }

    /// Requested categories of `class` that map to at least one pattern
    pub fn for_class(&self, class: HostClass) -> Vec<LogType> {
        self.requested
            .iter()
            .copied()
            .filter(|t| t.host_class() == class && t.is_collected())
            .collect()
    }

    pub fn controller_types(&self) -> Vec<LogType> {
        self.for_class(HostClass::Controller)
    }

    pub fn blade_types(&self) -> Vec<LogType> {
        self.for_class(HostClass::Blade)
    }

    pub fn wants_controller_logs(&self) -> bool {
        !self.controller_types().is_empty()
    }

    /// Blade topology discovery only happens when this is true
    pub fn wants_blade_logs(&self) -> bool {
        !self.blade_types().is_empty()
    }
}

/// Remote command listing the newest `count` files matching `patterns`,
/// oldest first. `None` when there is nothing to list.
pub fn listing_command(log_dir: &str, patterns: &[&str], count: usize) -> Option<String> {
    if patterns.is_empty() {
        return None;
    }
    Some(format!(
        "cd {} && ls -tr {} | tail --lines {}",
        log_dir,
        patterns.join(" "),
        count
    ))
}

/// File names from a listing, keeping at most the last `count` entries in their original order
pub fn parse_listing(stdout: &str, count: usize) -> Vec<String> {
    let names: Vec<String> = stdout
        .lines()
        .map(str::trim)
        .filter(|line| !line.is_empty())
        .map(str::to_string)
        .collect();
    let skip = names.len().saturating_sub(count);
    names.into_iter().skip(skip).collect()
}

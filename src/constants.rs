// src/constants.rs

use uuid::Uuid;

pub const APP_DIR_NAME: &str = "PerfTool";
pub const STATE_FILE_NAME: &str = "backup_state.json";
pub const PROFILES_DIR_NAME: &str = "profiles";

/// Built-in "High performance" power scheme.
pub const HIGH_PERFORMANCE_SCHEME: Uuid = Uuid::from_u128(0x8c5e7fda_e8bf_4a96_9a85_a6e23a8c635c);

// State store keys. Registry-backed keys are built from these prefixes.
pub const POWER_PLAN_STATE_KEY: &str = "power_plan_guid";
pub const SERVICES_STATE_KEY: &str = "original_service_states";
pub const GAMING_STATE_PREFIX: &str = "reg_";
pub const NAGLE_STATE_PREFIX: &str = "nagle_";

/// Device class key for network adapters. Each numbered subkey carries a `NetCfgInstanceId`.
pub const NETWORK_CLASS_PATH: &str = "HKEY_LOCAL_MACHINE\\SYSTEM\\CurrentControlSet\\Control\\Class\\{4d36e972-e325-11ce-bfc1-08002be10318}";
pub const NET_CFG_INSTANCE_ID: &str = "NetCfgInstanceId";
pub const TCPIP_INTERFACES_PATH: &str =
    "HKEY_LOCAL_MACHINE\\SYSTEM\\CurrentControlSet\\Services\\Tcpip\\Parameters\\Interfaces";

/// Processes never touched when trimming working sets (lowercase).
pub const CRITICAL_PROCESSES: &[&str] = &[
    "csrss.exe",
    "wininit.exe",
    "services.exe",
    "lsass.exe",
    "winlogon.exe",
    "svchost.exe",
    "smss.exe",
    "system",
    "registry",
];

/// How long to wait for a stopped service to report `SERVICE_STOPPED`.
pub const SERVICE_STOP_TIMEOUT_MS: u64 = 5_000;
pub const SERVICE_STOP_POLL_MS: u64 = 250;

use std::env;
use std::net::{IpAddr, Ipv4Addr, Ipv6Addr, SocketAddr};

use crate::loader::{LoadingType, PackingConfig, PackingMode};
use crate::model::ContainerSpec;

/// Complete application configuration, loaded from environment variables or default values.
#[derive(Clone, Debug)]
pub struct AppConfig {
    pub api: ApiConfig,
    pub optimizer: OptimizerConfig,
}

impl AppConfig {
    /// Creates a configuration from the currently available environment variables.
    pub fn from_env() -> Self {
        Self {
            api: ApiConfig::from_env(),
            optimizer: OptimizerConfig::from_env(),
        }
    }
}

/// Configuration for the API server.
#[derive(Clone, Debug)]
pub struct ApiConfig {
    bind_ip: IpAddr,
    display_host: String,
    port: u16,
}

impl ApiConfig {
    const DEFAULT_HOST: &'static str = "0.0.0.0";
    const DEFAULT_PORT: u16 = 8080;
    const HOST_VAR: &'static str = "LOAD_PLANNER_API_HOST";
    const PORT_VAR: &'static str = "LOAD_PLANNER_API_PORT";

    fn from_env() -> Self {
        Self::from_values(env_string(Self::HOST_VAR), env_string(Self::PORT_VAR))
    }

    fn from_values(host: Option<String>, port: Option<String>) -> Self {
        let default_ip = IpAddr::V4(Ipv4Addr::UNSPECIFIED);
        let host_value = host.unwrap_or_else(|| Self::DEFAULT_HOST.to_string());
        let (bind_ip, effective_host) = match host_value.parse::<IpAddr>() {
            Ok(ip) => (ip, host_value),
            Err(err) => {
                log::warn!(
                    "Could not parse {} ('{}'): {}. Using {}.",
                    Self::HOST_VAR,
                    host_value,
                    err,
                    Self::DEFAULT_HOST
                );
                (default_ip, Self::DEFAULT_HOST.to_string())
            }
        };

        let port = match port {
            Some(raw) => match raw.parse::<u16>() {
                Ok(value) if value != 0 => value,
                Ok(_) => {
                    log::warn!(
                        "{} must not be 0. Using {}.",
                        Self::PORT_VAR,
                        Self::DEFAULT_PORT
                    );
                    Self::DEFAULT_PORT
                }
                Err(err) => {
                    log::warn!(
                        "Could not parse {} ('{}'): {}. Using {}.",
                        Self::PORT_VAR,
                        raw,
                        err,
                        Self::DEFAULT_PORT
                    );
                    Self::DEFAULT_PORT
                }
            },
            None => Self::DEFAULT_PORT,
        };

        Self {
            bind_ip,
            display_host: effective_host,
            port,
        }
    }

    /// Socket address to bind the server to.
    pub fn socket_addr(&self) -> SocketAddr {
        SocketAddr::new(self.bind_ip, self.port)
    }

    /// Visible hostname for logging and hints.
    pub fn display_host(&self) -> &str {
        &self.display_host
    }

    pub fn port(&self) -> u16 {
        self.port
    }

    /// Indicates whether binding to all interfaces.
    pub fn binds_to_all_interfaces(&self) -> bool {
        match self.bind_ip {
            IpAddr::V4(addr) => addr == Ipv4Addr::UNSPECIFIED,
            IpAddr::V6(addr) => addr == Ipv6Addr::UNSPECIFIED,
        }
    }
}

/// Loader defaults and the container catalog used when a request names no containers.
#[derive(Clone, Debug)]
pub struct OptimizerConfig {
    packing: PackingConfig,
    default_extension: u32,
    catalog: Vec<ContainerSpec>,
}

impl OptimizerConfig {
    const LOADING_TYPE_VAR: &'static str = "LOAD_PLANNER_LOADING_TYPE";
    const PACKING_MODE_VAR: &'static str = "LOAD_PLANNER_PACKING_MODE";
    const WITH_ORDER_VAR: &'static str = "LOAD_PLANNER_WITH_ORDER";
    const PARALLEL_TRIALS_VAR: &'static str = "LOAD_PLANNER_PARALLEL_TRIALS";
    const DEFAULT_EXTENSION_VAR: &'static str = "LOAD_PLANNER_DEFAULT_EXTENSION";

    pub const DEFAULT_EXTENSION: u32 = 0;
    /// Clearance beyond this is almost certainly a unit mistake (mm instead of cm).
    const MAX_EXTENSION: u32 = 100;

    /// Standard sea containers in cm and kg: name, inner dimensions, lifting capacity.
    const DEFAULT_CATALOG: [(&'static str, (u32, u32, u32), u32); 3] = [
        ("20' container", (589, 235, 239), 28_200),
        ("40' container", (1203, 235, 239), 26_700),
        ("40' high cube", (1203, 235, 269), 26_500),
    ];

    fn from_env() -> Self {
        let loading_type = env_string(Self::LOADING_TYPE_VAR)
            .and_then(|raw| parse_loading_type(&raw, Self::LOADING_TYPE_VAR))
            .unwrap_or(PackingConfig::DEFAULT_LOADING_TYPE);

        let packing_mode = env_string(Self::PACKING_MODE_VAR)
            .and_then(|raw| parse_packing_mode(&raw, Self::PACKING_MODE_VAR))
            .unwrap_or(PackingConfig::DEFAULT_PACKING_MODE);

        let with_order = env_string(Self::WITH_ORDER_VAR)
            .and_then(|raw| parse_bool(&raw, Self::WITH_ORDER_VAR))
            .unwrap_or(PackingConfig::DEFAULT_WITH_ORDER);

        let parallel_trials = env_string(Self::PARALLEL_TRIALS_VAR)
            .and_then(|raw| parse_bool(&raw, Self::PARALLEL_TRIALS_VAR))
            .unwrap_or(PackingConfig::DEFAULT_PARALLEL_TRIALS);

        let default_extension = load_u32_with_warning(
            Self::DEFAULT_EXTENSION_VAR,
            Self::DEFAULT_EXTENSION,
            |value| value <= Self::MAX_EXTENSION,
            "must not exceed 100",
            "Every item without its own extension reserves this clearance",
        );

        let packing = PackingConfig::builder()
            .loading_type(loading_type)
            .packing_mode(packing_mode)
            .with_order(with_order)
            .parallel_trials(parallel_trials)
            .build();

        Self {
            packing,
            default_extension,
            catalog: Self::default_catalog(),
        }
    }

    fn default_catalog() -> Vec<ContainerSpec> {
        Self::DEFAULT_CATALOG
            .iter()
            .filter_map(|(name, dims, capacity)| ContainerSpec::new(*name, *dims, *capacity).ok())
            .collect()
    }

    /// Returns the configured PackingConfig.
    pub fn packing_config(&self) -> PackingConfig {
        self.packing
    }

    /// Clearance applied to items that do not specify one.
    pub fn default_extension(&self) -> u32 {
        self.default_extension
    }

    /// Container types offered in auto mode.
    pub fn catalog(&self) -> &[ContainerSpec] {
        &self.catalog
    }
}

impl Default for OptimizerConfig {
    fn default() -> Self {
        Self {
            packing: PackingConfig::default(),
            default_extension: Self::DEFAULT_EXTENSION,
            catalog: Self::default_catalog(),
        }
    }
}

fn env_string(name: &str) -> Option<String> {
    match env::var(name) {
        Ok(value) => {
            let trimmed = value.trim();
            if trimmed.is_empty() {
                None
            } else {
                Some(trimmed.to_owned())
            }
        }
        Err(env::VarError::NotPresent) => None,
        Err(err) => {
            log::warn!("Access to {} failed: {}. Using default value.", name, err);
            None
        }
    }
}

fn parse_bool(raw: &str, var_name: &str) -> Option<bool> {
    match raw.trim().to_ascii_lowercase().as_str() {
        "1" | "true" | "yes" | "y" | "on" => Some(true),
        "0" | "false" | "no" | "n" | "off" => Some(false),
        other => {
            log::warn!(
                "Could not interpret {} ('{}') as boolean value. Using default value.",
                var_name,
                other
            );
            None
        }
    }
}

fn parse_loading_type(raw: &str, var_name: &str) -> Option<LoadingType> {
    match raw.trim().to_ascii_lowercase().as_str() {
        "stable" | "layer" => Some(LoadingType::Stable),
        "vertical" | "column" => Some(LoadingType::Vertical),
        other => {
            log::warn!(
                "Unknown loading type in {} ('{}'). Using default value.",
                var_name,
                other
            );
            None
        }
    }
}

fn parse_packing_mode(raw: &str, var_name: &str) -> Option<PackingMode> {
    match raw.trim().to_ascii_lowercase().replace('-', "_").as_str() {
        "best_trial" => Some(PackingMode::BestTrial),
        "existing_first" => Some(PackingMode::ExistingFirst),
        other => {
            log::warn!(
                "Unknown packing mode in {} ('{}'). Using default value.",
                var_name,
                other
            );
            None
        }
    }
}

fn load_u32_with_warning(
    var_name: &str,
    default: u32,
    validator: impl Fn(u32) -> bool,
    invalid_hint: &str,
    notice: &str,
) -> u32 {
    match env_string(var_name) {
        Some(raw) => parse_u32_with_warning(&raw, var_name, default, validator, invalid_hint, notice),
        None => default,
    }
}

fn parse_u32_with_warning(
    raw: &str,
    var_name: &str,
    default: u32,
    validator: impl Fn(u32) -> bool,
    invalid_hint: &str,
    notice: &str,
) -> u32 {
    match raw.parse::<u32>() {
        Ok(value) if validator(value) => {
            if value != default {
                log::info!("{} ({} = {}).", notice, var_name, value);
            }
            value
        }
        Ok(_) => {
            log::warn!(
                "{} contains invalid value '{}': {}. Using {}.",
                var_name,
                raw,
                invalid_hint,
                default
            );
            default
        }
        Err(err) => {
            log::warn!(
                "Could not parse {} ('{}') as number: {}. Using {}.",
                var_name,
                raw,
                err,
                default
            );
            default
        }
    }
}

//! Command line configuration.

use std::net::SocketAddr;
use std::time::Duration;

use thiserror::Error;

const DEFAULT_LISTEN_ADDR: &str = "127.0.0.1:7777";
const DEFAULT_COLLECTOR_ENDPOINT: &str = "http://localhost:14268/api/traces";
const DEFAULT_SERVICE_NAME: &str = "fortune-service";

/// Errors from command line parsing. Any of these aborts startup.
#[derive(Debug, Error, PartialEq)]
pub enum ConfigError {
    #[error("unknown flag `{0}`")]
    UnknownFlag(String),

    #[error("flag `{0}` requires a value")]
    MissingValue(&'static str),

    #[error("invalid value `{value}` for flag `{flag}`: {reason}")]
    InvalidValue {
        flag: &'static str,
        value: String,
        reason: String,
    },
}

/// Runtime configuration, resolved before the tracer or server start.
#[derive(Clone, Debug, PartialEq)]
pub struct Config {
    /// Address the HTTP server binds to.
    pub listen_addr: SocketAddr,
    /// Collector span ingestion URL.
    pub collector_endpoint: String,
    /// Service name recorded on exported spans.
    pub service_name: String,
    /// Fraction of traces to sample; `None` samples everything.
    pub sample_ratio: Option<f64>,
    /// Number of spans that triggers an export without waiting.
    pub batch_max_size: usize,
    /// Longest a finished span waits before its batch is exported.
    pub batch_max_delay: Duration,
    /// Deadline for flush and shutdown.
    pub flush_timeout: Duration,
}

impl Default for Config {
    fn default() -> Self {
        Config {
            listen_addr: DEFAULT_LISTEN_ADDR.parse().expect("default addr parses"),
            collector_endpoint: DEFAULT_COLLECTOR_ENDPOINT.to_string(),
            service_name: DEFAULT_SERVICE_NAME.to_string(),
            sample_ratio: None,
            batch_max_size: 512,
            batch_max_delay: Duration::from_secs(5),
            flush_timeout: Duration::from_secs(10),
        }
    }
}

impl Config {
    /// Parse configuration from command line arguments (without the
    /// program name).
    pub fn from_args(mut args: impl Iterator<Item = String>) -> Result<Config, ConfigError> {
        let mut config = Config::default();

        while let Some(flag) = args.next() {
            match flag.as_str() {
                "--listen" => {
                    let value = args.next().ok_or(ConfigError::MissingValue("--listen"))?;
                    config.listen_addr =
                        value.parse().map_err(|err| ConfigError::InvalidValue {
                            flag: "--listen",
                            value,
                            reason: format!("{err}"),
                        })?;
                }
                "--collector" => {
                    config.collector_endpoint =
                        args.next().ok_or(ConfigError::MissingValue("--collector"))?;
                }
                "--service-name" => {
                    config.service_name = args
                        .next()
                        .ok_or(ConfigError::MissingValue("--service-name"))?;
                }
                "--sample-ratio" => {
                    let value = args
                        .next()
                        .ok_or(ConfigError::MissingValue("--sample-ratio"))?;
                    let ratio: f64 =
                        value.parse().map_err(|err| ConfigError::InvalidValue {
                            flag: "--sample-ratio",
                            value: value.clone(),
                            reason: format!("{err}"),
                        })?;
                    if !(0.0..=1.0).contains(&ratio) {
                        return Err(ConfigError::InvalidValue {
                            flag: "--sample-ratio",
                            value,
                            reason: "must be between 0 and 1".to_string(),
                        });
                    }
                    config.sample_ratio = Some(ratio);
                }
                "--batch-max-size" => {
                    let size: usize = parse_value("--batch-max-size", &mut args)?;
                    if size == 0 {
                        return Err(ConfigError::InvalidValue {
                            flag: "--batch-max-size",
                            value: "0".to_string(),
                            reason: "must be at least 1".to_string(),
                        });
                    }
                    config.batch_max_size = size;
                }
                "--batch-max-delay-ms" => {
                    config.batch_max_delay =
                        Duration::from_millis(parse_value("--batch-max-delay-ms", &mut args)?);
                }
                "--flush-timeout-ms" => {
                    config.flush_timeout =
                        Duration::from_millis(parse_value("--flush-timeout-ms", &mut args)?);
                }
                other => return Err(ConfigError::UnknownFlag(other.to_string())),
            }
        }
        Ok(config)
    }
}

fn parse_value<T>(
    flag: &'static str,
    args: &mut impl Iterator<Item = String>,
) -> Result<T, ConfigError>
where
    T: std::str::FromStr,
    T::Err: std::fmt::Display,
{
    let value = args.next().ok_or(ConfigError::MissingValue(flag))?;
    value.parse().map_err(|err: T::Err| ConfigError::InvalidValue {
        flag,
        value,
        reason: format!("{err}"),
    })
}

//! Process-wide settings read from environment variables.

use std::env;
use std::sync::OnceLock;

use tracing::warn;

use crate::dtype::DataType;

/// Name of the variable which sets [`Config::default_float_type`].
pub const FLOAT_TYPE_VAR: &str = "NDBROADCAST_FLOAT_TYPE";

/// Name of the variable which sets [`Config::num_threads`].
pub const NUM_THREADS_VAR: &str = "NDBROADCAST_NUM_THREADS";

#[derive(Clone, Debug, PartialEq)]
pub struct Config {
    /// Element type of outputs created for non-float inputs when integer
    /// outputs are not allowed. Either `Float32` or `Float64`.
    pub default_float_type: DataType,

    /// Number of threads in the pool returned by
    /// [`thread_pool`](crate::thread_pool), or `None` to choose
    /// based on the number of cores.
    pub num_threads: Option<usize>,
}

impl Default for Config {
    fn default() -> Config {
        Config {
            default_float_type: DataType::Float64,
            num_threads: None,
        }
    }
}

impl Config {
    /// Read the configuration from the environment.
    ///
    /// Unset variables use defaults. Invalid values are logged and ignored.
    pub fn from_env() -> Config {
        let float_type = env::var(FLOAT_TYPE_VAR).ok();
        let num_threads = env::var(NUM_THREADS_VAR).ok();
        Config::from_values(float_type.as_deref(), num_threads.as_deref())
    }

    fn from_values(float_type: Option<&str>, num_threads: Option<&str>) -> Config {
        let mut config = Config::default();

        if let Some(value) = float_type {
            match value.trim().parse::<DataType>() {
                Ok(dtype) if dtype.is_float() => config.default_float_type = dtype,
                _ => warn!(var = FLOAT_TYPE_VAR, value, "expected \"f32\" or \"f64\""),
            }
        }

        if let Some(value) = num_threads {
            match value.trim().parse::<usize>() {
                Ok(n) if n > 0 => config.num_threads = Some(n),
                _ => warn!(var = NUM_THREADS_VAR, value, "expected a positive integer"),
            }
        }

        config
    }
}

/// Return the configuration for this process.
///
/// The environment is read on the first call.
pub fn config() -> &'static Config {
    static CONFIG: OnceLock<Config> = OnceLock::new();
    CONFIG.get_or_init(Config::from_env)
}

#[cfg(test)]
mod tests {
    use super::Config;
    use crate::dtype::DataType;
    use crate::test_util::TestCases;

    #[test]
    fn test_config_from_values() {
        #[derive(Debug)]
        struct Case {
            float_type: Option<&'static str>,
            num_threads: Option<&'static str>,
            expected: Config,
        }

        let cases = [
            Case {
                float_type: None,
                num_threads: None,
                expected: Config::default(),
            },
            Case {
                float_type: Some("f32"),
                num_threads: Some(" 4 "),
                expected: Config {
                    default_float_type: DataType::Float32,
                    num_threads: Some(4),
                },
            },
            // Non-float types and unparseable values fall back to defaults.
            Case {
                float_type: Some("i32"),
                num_threads: Some("0"),
                expected: Config::default(),
            },
            Case {
                float_type: Some("double"),
                num_threads: Some("many"),
                expected: Config::default(),
            },
        ];

        cases.test_each(|case| {
            let config = Config::from_values(case.float_type, case.num_threads);
            assert_eq!(config, case.expected);
        })
    }
}

//! # Configuration
//!
//! A tree's structural limits (`libtreed::path::Limits`) can be overridden
//! through environment variables the same way `cfgenv` layers env vars over
//! the rest of the server's configuration: read, parse, fall back to the
//! default and log a warning on anything malformed, never fail hard.

use env_logger::Builder;
use libtreed::path::Limits;
use std::env;

const ENV_MAX_COMPONENT_LEN: &str = "TREED_MAX_COMPONENT_LEN";
const ENV_MAX_DEPTH: &str = "TREED_MAX_DEPTH";
const ENV_LOG: &str = "TREED_LOG";

/// Reads `TREED_MAX_COMPONENT_LEN` and `TREED_MAX_DEPTH` from the
/// environment, falling back to [`Limits::default`] for anything unset or
/// unparsable.
pub fn limits_from_env() -> Limits {
    let default = Limits::default();
    let max_component_len = match env::var(ENV_MAX_COMPONENT_LEN) {
        Ok(val) => match val.parse::<usize>() {
            Ok(n) if n > 0 => n,
            _ => {
                log::warn!(
                    "{} is set but not a valid positive integer; using default ({})",
                    ENV_MAX_COMPONENT_LEN,
                    default.max_component_len
                );
                default.max_component_len
            }
        },
        Err(_) => default.max_component_len,
    };
    let max_depth = match env::var(ENV_MAX_DEPTH) {
        Ok(val) => match val.parse::<usize>() {
            Ok(n) if n > 0 => n,
            _ => {
                log::warn!(
                    "{} is set but not a valid positive integer; using default ({})",
                    ENV_MAX_DEPTH,
                    default.max_depth
                );
                default.max_depth
            }
        },
        Err(_) => default.max_depth,
    };
    Limits {
        max_component_len,
        max_depth,
    }
}

/// Initializes the default `env_logger` backend, honoring `TREED_LOG` for
/// filter directives the way the server honors `SKY_LOG`.
pub fn init_default_logger() {
    Builder::new()
        .parse_filters(&env::var(ENV_LOG).unwrap_or_else(|_| "info".to_owned()))
        .init();
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_limits_from_env_defaults_when_unset() {
        env::remove_var(ENV_MAX_COMPONENT_LEN);
        env::remove_var(ENV_MAX_DEPTH);
        let limits = limits_from_env();
        assert_eq!(limits, Limits::default());
    }
}

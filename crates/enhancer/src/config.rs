use std::sync::Arc;

use crate::command::CommandEnhancer;
use crate::http::HttpEnhancer;
use crate::Enhancer;

/// Model service used when neither `ENHANCER_URL` nor `ENHANCER_COMMAND`
/// is set.
pub const DEFAULT_ENHANCER_URL: &str = "http://127.0.0.1:9000";

/// Which model runtime to talk to.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum EnhancerBackend {
    Http { base_url: String },
    Command { program: String, args: Vec<String> },
}

/// Enhancer configuration loaded from environment variables.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EnhancerConfig {
    pub backend: EnhancerBackend,
}

impl EnhancerConfig {
    /// Load configuration from environment variables.
    ///
    /// | Env Var            | Default                  |
    /// |--------------------|--------------------------|
    /// | `ENHANCER_COMMAND` | unset                    |
    /// | `ENHANCER_ARGS`    | empty (whitespace split) |
    /// | `ENHANCER_URL`     | `http://127.0.0.1:9000`  |
    ///
    /// `ENHANCER_COMMAND` wins when both it and `ENHANCER_URL` are set.
    pub fn from_env() -> Self {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Same as [`from_env`](Self::from_env) with an arbitrary variable source.
    pub fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Self {
        let non_empty = |key: &str| lookup(key).map(|v| v.trim().to_string()).filter(|v| !v.is_empty());

        let backend = match non_empty("ENHANCER_COMMAND") {
            Some(program) => EnhancerBackend::Command {
                program,
                args: non_empty("ENHANCER_ARGS")
                    .map(|raw| raw.split_whitespace().map(str::to_string).collect())
                    .unwrap_or_default(),
            },
            None => EnhancerBackend::Http {
                base_url: non_empty("ENHANCER_URL")
                    .unwrap_or_else(|| DEFAULT_ENHANCER_URL.to_string()),
            },
        };

        Self { backend }
    }

    /// Construct the configured backend.
    pub fn build(&self) -> Arc<dyn Enhancer> {
        match &self.backend {
            EnhancerBackend::Http { base_url } => Arc::new(HttpEnhancer::new(base_url.clone())),
            EnhancerBackend::Command { program, args } => {
                Arc::new(CommandEnhancer::new(program, args.clone()))
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use std::collections::HashMap;

    use super::*;

    fn config(vars: &[(&str, &str)]) -> EnhancerConfig {
        let vars: HashMap<String, String> = vars
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect();
        EnhancerConfig::from_lookup(|key| vars.get(key).cloned())
    }

    #[test]
    fn defaults_to_local_http_service() {
        assert_eq!(
            config(&[]).backend,
            EnhancerBackend::Http {
                base_url: DEFAULT_ENHANCER_URL.into()
            }
        );
    }

    #[test]
    fn url_is_used_when_set() {
        let cfg = config(&[("ENHANCER_URL", "http://gpu-box:8080")]);
        assert_eq!(
            cfg.backend,
            EnhancerBackend::Http {
                base_url: "http://gpu-box:8080".into()
            }
        );
        assert_eq!(cfg.build().name(), "http");
    }

    #[test]
    fn command_takes_precedence_and_splits_args() {
        let cfg = config(&[
            ("ENHANCER_URL", "http://ignored"),
            ("ENHANCER_COMMAND", "/opt/model/run"),
            ("ENHANCER_ARGS", "--device cpu  --quiet"),
        ]);
        assert_eq!(
            cfg.backend,
            EnhancerBackend::Command {
                program: "/opt/model/run".into(),
                args: vec!["--device".into(), "cpu".into(), "--quiet".into()],
            }
        );
        assert_eq!(cfg.build().name(), "command");
    }

    #[test]
    fn blank_values_are_ignored() {
        let cfg = config(&[("ENHANCER_COMMAND", "   "), ("ENHANCER_URL", "")]);
        assert_eq!(
            cfg.backend,
            EnhancerBackend::Http {
                base_url: DEFAULT_ENHANCER_URL.into()
            }
        );
    }
}

//! Engine configuration
//!
//! Defines where local state lives and the fixed settings used when
//! materializing stages: alarm queue, trigger function runtime, and the
//! placement of container hosts.

use std::path::PathBuf;
use std::time::Duration;

use yunpipe_core::domain::system::Placement;

/// Longest timeout a trigger function may have
const MAX_FUNCTION_TIMEOUT: Duration = Duration::from_secs(900);

/// Engine configuration
#[derive(Debug, Clone)]
pub struct Config {
    /// Root directory of all local state (e.g. `~/.yunpipe`)
    pub home: PathBuf,

    /// Directory holding `<name>_info.json` algorithm descriptors
    pub algorithm_dir: PathBuf,

    /// Directory cleanup manifests are written to
    pub manifest_dir: PathBuf,

    /// State file of the local provider
    pub state_file: PathBuf,

    /// Name of the alarm queue shared by every stage
    pub alarm_queue: String,

    /// Execution role trigger functions run as
    pub execution_role: String,

    pub function_runtime: String,

    pub function_timeout: Duration,

    /// Trigger function memory in MB
    pub function_memory_mb: u32,

    /// Container host placement, resolved outside the engine
    pub placement: Placement,
}

impl Config {
    /// Creates a configuration rooted at `home` with defaults for everything else
    pub fn with_home(home: impl Into<PathBuf>) -> Self {
        let home = home.into();
        Self {
            algorithm_dir: home.join("algorithms"),
            manifest_dir: home.join("manifests"),
            state_file: home.join("cloud_state.json"),
            home,
            alarm_queue: "shutdown_alarm_sqs".to_string(),
            execution_role: "lambda_exec_role".to_string(),
            function_runtime: "python3.12".to_string(),
            function_timeout: Duration::from_secs(300),
            function_memory_mb: 128,
            placement: Placement {
                image_id: "ami-ecs-optimized".to_string(),
                instance_profile: "ecsInstanceRole".to_string(),
                subnet_id: String::new(),
                security_group: "default".to_string(),
            },
        }
    }

    /// Creates configuration from environment variables
    ///
    /// Recognized environment variables (all optional):
    /// - YUNPIPE_HOME (default: ~/.yunpipe)
    /// - YUNPIPE_ALGORITHM_DIR, YUNPIPE_MANIFEST_DIR, YUNPIPE_STATE_FILE
    /// - YUNPIPE_ALARM_QUEUE (default: shutdown_alarm_sqs)
    /// - YUNPIPE_EXECUTION_ROLE (default: lambda_exec_role)
    /// - YUNPIPE_FUNCTION_RUNTIME, YUNPIPE_FUNCTION_TIMEOUT (seconds), YUNPIPE_FUNCTION_MEMORY (MB)
    /// - YUNPIPE_IMAGE_ID, YUNPIPE_INSTANCE_PROFILE, YUNPIPE_SUBNET_ID, YUNPIPE_SECURITY_GROUP
    pub fn from_env() -> anyhow::Result<Self> {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Same as [`Config::from_env`], reading values through `lookup`
    pub fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> anyhow::Result<Self> {
        let home = match lookup("YUNPIPE_HOME") {
            Some(home) => PathBuf::from(home),
            None => default_home()?,
        };
        let mut config = Self::with_home(home);

        if let Some(dir) = lookup("YUNPIPE_ALGORITHM_DIR") {
            config.algorithm_dir = PathBuf::from(dir);
        }
        if let Some(dir) = lookup("YUNPIPE_MANIFEST_DIR") {
            config.manifest_dir = PathBuf::from(dir);
        }
        if let Some(file) = lookup("YUNPIPE_STATE_FILE") {
            config.state_file = PathBuf::from(file);
        }
        if let Some(queue) = lookup("YUNPIPE_ALARM_QUEUE") {
            config.alarm_queue = queue;
        }
        if let Some(role) = lookup("YUNPIPE_EXECUTION_ROLE") {
            config.execution_role = role;
        }
        if let Some(runtime) = lookup("YUNPIPE_FUNCTION_RUNTIME") {
            config.function_runtime = runtime;
        }
        if let Some(timeout) = lookup("YUNPIPE_FUNCTION_TIMEOUT") {
            let secs = timeout
                .parse::<u64>()
                .map_err(|_| anyhow::anyhow!("YUNPIPE_FUNCTION_TIMEOUT must be a number of seconds"))?;
            config.function_timeout = Duration::from_secs(secs);
        }
        if let Some(memory) = lookup("YUNPIPE_FUNCTION_MEMORY") {
            config.function_memory_mb = memory
                .parse::<u32>()
                .map_err(|_| anyhow::anyhow!("YUNPIPE_FUNCTION_MEMORY must be a number of MB"))?;
        }
        if let Some(image_id) = lookup("YUNPIPE_IMAGE_ID") {
            config.placement.image_id = image_id;
        }
        if let Some(profile) = lookup("YUNPIPE_INSTANCE_PROFILE") {
            config.placement.instance_profile = profile;
        }
        if let Some(subnet) = lookup("YUNPIPE_SUBNET_ID") {
            config.placement.subnet_id = subnet;
        }
        if let Some(group) = lookup("YUNPIPE_SECURITY_GROUP") {
            config.placement.security_group = group;
        }

        Ok(config)
    }

    /// Validates the configuration
    pub fn validate(&self) -> anyhow::Result<()> {
        if self.alarm_queue.is_empty() {
            anyhow::bail!("alarm_queue cannot be empty");
        }

        if self.execution_role.is_empty() {
            anyhow::bail!("execution_role cannot be empty");
        }

        if self.function_runtime.is_empty() {
            anyhow::bail!("function_runtime cannot be empty");
        }

        if self.function_timeout.as_secs() == 0 {
            anyhow::bail!("function_timeout must be greater than 0");
        }

        if self.function_timeout > MAX_FUNCTION_TIMEOUT {
            anyhow::bail!(
                "function_timeout cannot exceed {} seconds",
                MAX_FUNCTION_TIMEOUT.as_secs()
            );
        }

        if self.function_memory_mb == 0 {
            anyhow::bail!("function_memory_mb must be greater than 0");
        }

        if self.placement.image_id.is_empty() {
            anyhow::bail!("placement image_id cannot be empty");
        }

        Ok(())
    }
}

impl Default for Config {
    fn default() -> Self {
        Self::with_home(
            dirs::home_dir()
                .unwrap_or_else(|| PathBuf::from("."))
                .join(".yunpipe"),
        )
    }
}

fn default_home() -> anyhow::Result<PathBuf> {
    dirs::home_dir()
        .map(|home| home.join(".yunpipe"))
        .ok_or_else(|| anyhow::anyhow!("cannot determine home directory, set YUNPIPE_HOME"))
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    fn lookup(vars: &[(&str, &str)]) -> impl Fn(&str) -> Option<String> {
        let vars: HashMap<String, String> = vars
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect();
        move |key| vars.get(key).cloned()
    }

    #[test]
    fn test_default_layout() {
        let config = Config::with_home("/tmp/yp");
        assert_eq!(config.algorithm_dir, PathBuf::from("/tmp/yp/algorithms"));
        assert_eq!(config.manifest_dir, PathBuf::from("/tmp/yp/manifests"));
        assert_eq!(config.state_file, PathBuf::from("/tmp/yp/cloud_state.json"));
        assert_eq!(config.alarm_queue, "shutdown_alarm_sqs");
        assert_eq!(config.function_timeout, Duration::from_secs(300));
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_from_lookup_overrides() {
        let config = Config::from_lookup(lookup(&[
            ("YUNPIPE_HOME", "/srv/yunpipe"),
            ("YUNPIPE_ALGORITHM_DIR", "/opt/algorithms"),
            ("YUNPIPE_FUNCTION_TIMEOUT", "60"),
            ("YUNPIPE_SUBNET_ID", "subnet-42"),
        ]))
        .unwrap();

        assert_eq!(config.home, PathBuf::from("/srv/yunpipe"));
        assert_eq!(config.algorithm_dir, PathBuf::from("/opt/algorithms"));
        assert_eq!(config.manifest_dir, PathBuf::from("/srv/yunpipe/manifests"));
        assert_eq!(config.function_timeout, Duration::from_secs(60));
        assert_eq!(config.placement.subnet_id, "subnet-42");
    }

    #[test]
    fn test_from_lookup_rejects_bad_numbers() {
        let result = Config::from_lookup(lookup(&[
            ("YUNPIPE_HOME", "/srv/yunpipe"),
            ("YUNPIPE_FUNCTION_MEMORY", "lots"),
        ]));
        assert!(result.is_err());
    }

    #[test]
    fn test_config_validation() {
        let mut config = Config::with_home("/tmp/yp");

        config.function_timeout = Duration::from_secs(0);
        assert!(config.validate().is_err());

        config.function_timeout = Duration::from_secs(901);
        assert!(config.validate().is_err());

        config.function_timeout = Duration::from_secs(300);
        config.alarm_queue = String::new();
        assert!(config.validate().is_err());

        config.alarm_queue = "alarm".to_string();
        assert!(config.validate().is_ok());
    }
}

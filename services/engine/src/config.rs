//! OpenStack connection settings, read from flags or the usual `OS_*` variables.

use std::fmt;
use std::time::Duration;

use clap::Args;

#[derive(Args, Clone)]
pub struct OpenStackConfig {
    /// Keystone endpoint, e.g. https://keystone.example.com:5000/v3
    #[arg(long, env = "OS_AUTH_URL")]
    pub auth_url: String,

    #[arg(long, env = "OS_USERNAME")]
    pub username: String,

    #[arg(long, env = "OS_PASSWORD", hide_env_values = true)]
    pub password: String,

    #[arg(long, default_value = "Default", env = "OS_USER_DOMAIN_NAME")]
    pub user_domain: String,

    /// Project used when a request names no tenant
    #[arg(long, env = "OS_PROJECT_NAME")]
    pub project_name: String,

    #[arg(long, default_value = "Default", env = "OS_PROJECT_DOMAIN_NAME")]
    pub project_domain: String,

    /// Restrict catalog lookups to this region
    #[arg(long, env = "OS_REGION_NAME")]
    pub region: Option<String>,

    /// Catalog endpoint interface (public, internal, admin)
    #[arg(long, default_value = "public", env = "OS_INTERFACE")]
    pub interface: String,

    /// Zone whose workers run operations for this manager
    #[arg(long, default_value = "default", env = "MIQ_ZONE")]
    pub zone: String,

    /// HTTP timeout for Keystone and Neutron calls
    #[arg(long, default_value = "30", env = "SUBNET_ENGINE_HTTP_TIMEOUT")]
    pub timeout_secs: u64,
}

impl OpenStackConfig {
    pub fn timeout(&self) -> Duration {
        Duration::from_secs(self.timeout_secs)
    }
}

impl fmt::Debug for OpenStackConfig {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("OpenStackConfig")
            .field("auth_url", &self.auth_url)
            .field("username", &self.username)
            .field("password", &"<redacted>")
            .field("user_domain", &self.user_domain)
            .field("project_name", &self.project_name)
            .field("project_domain", &self.project_domain)
            .field("region", &self.region)
            .field("interface", &self.interface)
            .field("zone", &self.zone)
            .field("timeout_secs", &self.timeout_secs)
            .finish()
    }
}

//! Default configuration values shared by the binary and its tests

/// Default HTTP port for the event harness
pub const DEFAULT_PORT: u16 = 8080;

/// Environment variable holding the project to protect
pub const ENV_PROJECT: &str = "GOOGLE_CLOUD_PROJECT";

/// Environment variable holding the policy label
pub const ENV_LABEL: &str = "LABEL";

/// Environment variable holding the HTTP port
pub const ENV_PORT: &str = "PORT";

/// Environment variable holding a pre-minted OAuth access token
pub const ENV_ACCESS_TOKEN: &str = "GOOGLE_OAUTH_ACCESS_TOKEN";

/// Environment variable selecting the mitigation policy
pub const ENV_MITIGATION_POLICY: &str = "MITIGATION_POLICY";

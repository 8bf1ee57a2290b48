// ABOUTME: Environment variable name constants
// ABOUTME: Centralized definitions of all environment variable names used across Agentdeck

// Server Configuration
pub const AGENTDECK_API_PORT: &str = "AGENTDECK_API_PORT";
pub const AGENTDECK_CORS_ORIGIN: &str = "AGENTDECK_CORS_ORIGIN";

// Catalog Configuration
pub const AGENTDECK_CATALOG_ROOT: &str = "AGENTDECK_CATALOG_ROOT";

// Model List Cache Configuration
pub const AGENTDECK_MODEL_CACHE_TTL_SECS: &str = "AGENTDECK_MODEL_CACHE_TTL_SECS";

// Run Stream Configuration
pub const AGENTDECK_RUN_IDLE_TIMEOUT_SECS: &str = "AGENTDECK_RUN_IDLE_TIMEOUT_SECS";

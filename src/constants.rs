// Built-in driver names
pub const SESSION_DRIVER: &str = "session";
pub const SIGNED_DRIVER: &str = "signed";
pub const OAUTH_DRIVER: &str = "oauth";
pub const BUILTIN_DRIVERS: [&str; 3] = [SESSION_DRIVER, SIGNED_DRIVER, OAUTH_DRIVER];
pub const DEFAULT_DRIVER: &str = SESSION_DRIVER;

// Guard names bound by the built-in drivers unless configured otherwise
pub const DEFAULT_SESSION_GUARD: &str = "web";
pub const DEFAULT_SIGNED_GUARD: &str = "api";
pub const DEFAULT_OAUTH_GUARD: &str = "web";

// Credential fields read by the in-memory guard
pub const IDENTIFIER_FIELD: &str = "id";
pub const SECRET_FIELD: &str = "secret";

// Token issuance defaults
pub const DEFAULT_DEVICE_NAME: &str = "auth-fusion";
pub const REFRESHED_DEVICE_NAME: &str = "refreshed-token";
pub const WILDCARD_ABILITY: &str = "*";
pub const SESSION_TOKEN_BYTES: usize = 40;
pub const DEFAULT_SIGNED_TTL_MINUTES: i64 = 60;
pub const DEFAULT_OAUTH_TTL_DAYS: i64 = 365;

// Demo server
pub const DEFAULT_HOST: &str = "127.0.0.1";
pub const DEFAULT_PORT: u16 = 3030;

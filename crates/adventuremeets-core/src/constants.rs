/// Route component constants shared across crates
pub const API_ROUTE_COMPONENT: &str = "api";
pub const API_ROUTE_PREFIX: &str = const_str::concat!("/", API_ROUTE_COMPONENT);

pub const API_VERSION_COMPONENT: &str = "v1";
pub const API_VERSION_PREFIX: &str =
    const_str::concat!(API_ROUTE_PREFIX, "/", API_VERSION_COMPONENT);

pub const MEETS_ROUTE_COMPONENT: &str = "meets";
pub const MEETS_ROUTE_PREFIX: &str =
    const_str::concat!(API_VERSION_PREFIX, "/", MEETS_ROUTE_COMPONENT);

/// Header carrying the scheduler's service credential.
pub const WORKER_API_KEY_HEADER: &str = "x-api-key";

/// Headers forwarded by the authenticating gateway in proxy mode.
pub const REMOTE_USER_HEADER: &str = "x-remote-user";
pub const REMOTE_ORGANIZATIONS_HEADER: &str = "x-remote-organizations";

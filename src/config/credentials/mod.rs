use super::schema::Config;

macro_rules! define_credentials {
    ($( $env:literal => $($path:ident).+ );* $(;)?) => {
        /// Environment variables that can supply backend secrets.
        pub const CREDENTIAL_ENV_VARS: &[&str] = &[$($env),*];

        /// Apply environment variable overrides.
        ///
        /// Any `SWITCHBOARD_*` env var that is set and non-empty overwrites the
        /// corresponding config field, so secrets can be injected without
        /// touching the config file.
        pub fn apply_env_overrides(config: &mut Config) {
            $(
                if let Ok(val) = std::env::var($env) {
                    if !val.is_empty() {
                        config.$($path).+ = val;
                    }
                }
            )*
        }
    };
}

define_credentials! {
    "SWITCHBOARD_SLACK_TOKEN"            => tools.slack.user_token;
    "SWITCHBOARD_GOOGLE_CLIENT_ID"       => tools.google.client_id;
    "SWITCHBOARD_GOOGLE_CLIENT_SECRET"   => tools.google.client_secret;
    "SWITCHBOARD_GOOGLE_REFRESH_TOKEN"   => tools.google.refresh_token;
}

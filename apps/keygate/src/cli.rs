use clap::{Parser, Subcommand};

use keygate_common::GlobalConfigPatch;

#[derive(Parser)]
#[command(name = "keygate", version, about)]
pub(crate) struct Cli {
    #[arg(long, env = "KEYGATE_DSN", default_value = "")]
    pub(crate) dsn: String,
    #[arg(long, default_value = "")]
    pub(crate) data_dir: String,
    #[arg(long, env = "KEYGATE_HOST")]
    pub(crate) host: Option<String>,
    #[arg(long, env = "KEYGATE_PORT")]
    pub(crate) port: Option<u16>,
    #[arg(long, env = "KEYGATE_JWT_SECRET", hide_env_values = true)]
    pub(crate) jwt_secret: Option<String>,
    #[arg(long, env = "KEYGATE_JWT_EXPIRE_SECS")]
    pub(crate) jwt_expire_secs: Option<u64>,
    #[arg(long, env = "KEYGATE_BCRYPT_COST")]
    pub(crate) bcrypt_cost: Option<u32>,
    #[arg(long, env = "KEYGATE_EXPOSE_ERROR_DETAILS")]
    pub(crate) expose_error_details: Option<bool>,
    #[command(subcommand)]
    pub(crate) command: Option<Command>,
}

#[derive(Subcommand)]
pub(crate) enum Command {
    /// Run the HTTP server (default).
    Serve,
    /// Print a signed bearer token for a user.
    Token {
        #[arg(long)]
        user_id: i64,
        #[arg(long)]
        username: String,
    },
}

impl Cli {
    pub(crate) fn patch(&self, dsn: String) -> GlobalConfigPatch {
        GlobalConfigPatch {
            host: self.host.clone(),
            port: self.port,
            dsn: Some(dsn),
            jwt_secret: self.jwt_secret.clone(),
            jwt_expire_secs: self.jwt_expire_secs,
            bcrypt_cost: self.bcrypt_cost,
            expose_error_details: self.expose_error_details,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn token_subcommand_parses() {
        let cli = Cli::try_parse_from([
            "keygate",
            "--jwt-secret",
            "s",
            "token",
            "--user-id",
            "4",
            "--username",
            "erin",
        ])
        .unwrap();
        assert!(matches!(
            cli.command,
            Some(Command::Token { user_id: 4, ref username }) if username == "erin"
        ));
        let patch = cli.patch("sqlite::memory:".to_string());
        assert_eq!(patch.jwt_secret.as_deref(), Some("s"));
    }
}

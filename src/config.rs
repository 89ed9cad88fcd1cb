use std::{net::SocketAddr, path::PathBuf};

use clap::{Args, Parser, Subcommand};

use crate::password::{PasswordError, PasswordHasher};

#[derive(Parser, Debug, Clone)]
#[command(
    name = "chirpy",
    about = "Chirp and account API backed by a single JSON file",
    version,
    disable_help_subcommand = true
)]
pub struct Cli {
    #[command(subcommand)]
    pub command: Option<Command>,

    #[command(flatten)]
    pub config: Config,
}

#[derive(Subcommand, Debug, Clone)]
pub enum Command {
    /// Start the HTTP server (default).
    Run,

    /// Print an Argon2id hash for a password using the configured cost.
    HashPassword(HashPasswordArgs),
}

#[derive(Args, Debug, Clone)]
pub struct HashPasswordArgs {
    #[arg(long, value_name = "PASSWORD")]
    pub password: String,
}

#[derive(Args, Debug, Clone)]
pub struct Config {
    #[arg(
        long,
        global = true,
        env = "CHIRPY_BIND",
        value_name = "ADDR",
        default_value = "127.0.0.1:8080"
    )]
    pub bind: SocketAddr,

    #[arg(
        long,
        global = true,
        env = "CHIRPY_DB_PATH",
        value_name = "PATH",
        default_value = "./database.json"
    )]
    pub db_path: PathBuf,

    #[arg(
        long,
        global = true,
        env = "JWT_SECRET",
        value_name = "SECRET",
        default_value = "",
        hide_env_values = true
    )]
    pub jwt_secret: String,

    #[arg(
        long = "argon2-memory-kib",
        global = true,
        env = "CHIRPY_ARGON2_MEMORY_KIB",
        value_name = "KIB",
        default_value_t = 19_456,
        value_parser = clap::value_parser!(u32).range(8..=1_048_576)
    )]
    pub argon2_memory_kib: u32,

    #[arg(
        long = "argon2-iterations",
        global = true,
        env = "CHIRPY_ARGON2_ITERATIONS",
        value_name = "N",
        default_value_t = 2,
        value_parser = clap::value_parser!(u32).range(1..=10)
    )]
    pub argon2_iterations: u32,

    #[arg(
        long = "argon2-parallelism",
        global = true,
        env = "CHIRPY_ARGON2_PARALLELISM",
        value_name = "N",
        default_value_t = 1,
        value_parser = clap::value_parser!(u32).range(1..=16)
    )]
    pub argon2_parallelism: u32,
}

impl Config {
    pub fn password_hasher(&self) -> Result<PasswordHasher, PasswordError> {
        PasswordHasher::new(
            self.argon2_memory_kib,
            self.argon2_iterations,
            self.argon2_parallelism,
        )
    }
}

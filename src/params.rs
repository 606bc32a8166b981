//! Start-up parameters shared by every recipe binary.

use std::ffi::OsString;
use std::path::PathBuf;

use clap::Parser;

pub const DEFAULT_USER_ID: &str = "recipe_1";
pub const DEFAULT_ADDR: &str = "127.0.0.1";
pub const DEFAULT_PORT: u16 = 59000;

/// Command-line parameters a recipe is launched with.
#[derive(Parser, Debug, Clone, PartialEq)]
#[command(author, version, about = "Aqueduct recipe", long_about = None)]
pub struct InitParams {
    /// User id the recipe acts as
    #[arg(short = 'u', long = "user-id", visible_alias = "user_id", default_value = DEFAULT_USER_ID)]
    pub user_id: String,

    /// IP address of the Aqueduct application (no port)
    #[arg(short = 'a', long = "addr", default_value = DEFAULT_ADDR)]
    pub ip_address: String,

    #[arg(short = 'p', long = "port", default_value_t = DEFAULT_PORT)]
    pub port: u16,

    /// 1 to reset the setup on initialize, 0 to keep it
    #[arg(
        short = 'i',
        long = "init",
        default_value = "1",
        value_parser = parse_flag,
    )]
    pub init: bool,

    /// 1 to register this process with the Aqueduct API, 0 to skip. A bare
    /// `-r` means 1.
    #[arg(
        short = 'r',
        long = "register",
        num_args = 0..=1,
        default_value = "1",
        default_missing_value = "1",
        value_parser = parse_flag,
    )]
    pub register_process: bool,

    /// Optional TOML settings file
    #[arg(short = 'c', long = "config")]
    pub config: Option<PathBuf>,
}

impl InitParams {
    /// Parses `std::env::args`, exiting with a usage message on error.
    pub fn parse_args() -> Self {
        <Self as Parser>::parse()
    }

    pub fn parse_from_iter<I, T>(args: I) -> Result<Self, clap::Error>
    where
        I: IntoIterator<Item = T>,
        T: Into<OsString> + Clone,
    {
        <Self as Parser>::try_parse_from(args)
    }
}

fn parse_flag(s: &str) -> Result<bool, String> {
    match s.trim() {
        "1" => Ok(true),
        "0" => Ok(false),
        other => Err(format!("expected 0 or 1, got `{other}`")),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn parse(args: &[&str]) -> InitParams {
        let mut argv = vec!["recipe"];
        argv.extend_from_slice(args);
        InitParams::parse_from_iter(argv).unwrap()
    }

    #[test]
    fn defaults() {
        let p = parse(&[]);
        assert_eq!(p.user_id, DEFAULT_USER_ID);
        assert_eq!(p.ip_address, DEFAULT_ADDR);
        assert_eq!(p.port, DEFAULT_PORT);
        assert!(p.init);
        assert!(p.register_process);
        assert!(p.config.is_none());
    }

    #[test]
    fn register_defaults_to_true_when_omitted() {
        assert!(parse(&["-u", "r2"]).register_process);
    }

    #[test]
    fn bare_register_flag_means_true() {
        assert!(parse(&["-r"]).register_process);
        assert!(parse(&["--register", "-p", "60000"]).register_process);
    }

    #[test]
    fn register_zero_skips_registration() {
        assert!(!parse(&["-r", "0"]).register_process);
        assert!(!parse(&["--register=0"]).register_process);
    }

    #[test]
    fn register_rejects_other_values() {
        assert!(InitParams::parse_from_iter(["recipe", "-r", "yes"]).is_err());
    }

    #[test]
    fn explicit_values() {
        let p = parse(&["--user_id", "tff", "-a", "10.0.0.5", "-p", "59001", "-i", "0"]);
        assert_eq!(p.user_id, "tff");
        assert_eq!(p.ip_address, "10.0.0.5");
        assert_eq!(p.port, 59001);
        assert!(!p.init);
    }
}

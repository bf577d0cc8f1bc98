use clap::Parser;
use std::path::PathBuf;

use crate::config::DEFAULT_CONFIG_FILE;

#[derive(Parser, Debug)]
#[command(name = "flexfs", version)]
#[command(about = "Mount a union of directories as a single virtual volume")]
pub struct Args {
    #[arg(help = "Drive letter or mount directory")]
    pub mount: String,

    #[arg(value_name = "CONF_FILE", help = "Mapping file (default: fs.conf)")]
    pub conf_file: Option<PathBuf>,

    #[arg(
        short = 'c',
        long = "conf",
        value_name = "CONF_FILE",
        conflicts_with = "conf_file",
        help = "Mapping file"
    )]
    pub conf: Option<PathBuf>,

    #[arg(short, long, help = "Run in the foreground with debug logging")]
    pub debug: bool,

    #[arg(short, long, help = "Run in the foreground")]
    pub foreground: bool,

    #[arg(long, hide = true, help = "Set by the background launcher")]
    pub detached: bool,
}

impl Args {
    pub fn config_path(&self) -> PathBuf {
        self.conf
            .clone()
            .or_else(|| self.conf_file.clone())
            .unwrap_or_else(|| PathBuf::from(DEFAULT_CONFIG_FILE))
    }

    pub fn runs_in_foreground(&self) -> bool {
        self.foreground || self.debug || self.detached
    }

    pub fn log_filter(&self) -> &'static str {
        if self.debug {
            "debug"
        } else {
            "info"
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_config_path() {
        let args = Args::try_parse_from(["flexfs", "/mnt/flex"]).unwrap();
        assert_eq!(args.config_path(), PathBuf::from("fs.conf"));
        assert!(!args.runs_in_foreground());
        assert_eq!(args.log_filter(), "info");
    }

    #[test]
    fn test_positional_and_option_config() {
        let args = Args::try_parse_from(["flexfs", "Q", "union.conf"]).unwrap();
        assert_eq!(args.config_path(), PathBuf::from("union.conf"));

        let args = Args::try_parse_from(["flexfs", "Q", "-c", "other.conf", "-d"]).unwrap();
        assert_eq!(args.config_path(), PathBuf::from("other.conf"));
        assert!(args.runs_in_foreground());
        assert_eq!(args.log_filter(), "debug");
    }

    #[test]
    fn test_config_given_twice_is_rejected() {
        assert!(Args::try_parse_from(["flexfs", "Q", "a.conf", "--conf", "b.conf"]).is_err());
    }

    #[test]
    fn test_mount_is_required() {
        assert!(Args::try_parse_from(["flexfs"]).is_err());
    }
}

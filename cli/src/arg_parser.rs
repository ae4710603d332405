use clap::{Parser, Subcommand};
use std::path::PathBuf;

/// Talk to a script execution server
#[derive(Debug, Parser)]
pub struct ArgParser {
    /// The base URL of the server
    #[clap(
        short = 's',
        long = "server",
        env = "EXEC_SERVER",
        default_value = "http://localhost:8080"
    )]
    pub server: String,
    /// The sub-command to use
    #[clap(subcommand)]
    pub sub_command: SubCommand,
}

#[derive(Clone, Debug, PartialEq, Eq, PartialOrd, Ord, Subcommand)]
pub enum SubCommand {
    /// run a script and print its result
    Execute {
        /// path of the script, or - to read it from stdin
        #[clap(parse(from_os_str))]
        script: PathBuf,
    },
    /// check that the server is up
    Health,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_execute() {
        let argv = ["cli", "-s", "http://10.0.0.1:9000", "execute", "job.py"];
        let args = ArgParser::try_parse_from(argv).expect("args rejected");
        assert_eq!(args.server, "http://10.0.0.1:9000");
        assert_eq!(
            args.sub_command,
            SubCommand::Execute {
                script: PathBuf::from("job.py")
            }
        );
    }

    #[test]
    fn parses_health() {
        let args = ArgParser::try_parse_from(["cli", "--server", "http://h", "health"])
            .expect("args rejected");
        assert_eq!(args.sub_command, SubCommand::Health);
    }

    #[test]
    fn execute_requires_a_script() {
        assert!(ArgParser::try_parse_from(["cli", "execute"]).is_err());
    }
}

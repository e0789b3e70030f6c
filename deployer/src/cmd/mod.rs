use crate::{constants, felt::Felt};
use clap::{ArgAction, Parser, Subcommand};
use std::path::PathBuf;

/// Deploy contracts and keep track of where they live, one network at a time.
#[derive(Debug, Parser)]
#[clap(name = "deployer", version)]
pub struct Command {
    /// Path to the directory holding the `Deployer.toml`. Defaults to the closest one above the
    /// current directory.
    #[clap(long, global = true)]
    pub path: Option<PathBuf>,

    /// The network to run against. Falls back to `default-network` from the manifest.
    #[clap(long, env = constants::NETWORK_ENV_VAR, global = true)]
    pub network: Option<String>,

    /// Use this owner account instead of the one configured for the network.
    #[clap(long, env = constants::ACCOUNT_ENV_VAR, global = true)]
    pub account: Option<Felt>,

    /// Use verbose output (-v for debug, -vv for trace).
    #[clap(short, long, action = ArgAction::Count, global = true)]
    pub verbose: u8,

    /// Silence all output.
    #[clap(long, global = true)]
    pub silent: bool,

    /// Write logs as JSON lines.
    #[clap(long, global = true)]
    pub json: bool,

    #[clap(subcommand)]
    pub action: Action,
}

#[derive(Debug, Subcommand)]
pub enum Action {
    /// Run a single step of the plan.
    Step {
        /// Name of the step.
        name: String,
        /// Deploy again even if the contract is already recorded.
        #[clap(long)]
        redeploy: bool,
    },
    /// Run every step of the plan, independent steps concurrently.
    Run {
        /// Deploy every contract again even if already recorded.
        #[clap(long)]
        redeploy: bool,
    },
    /// Print the recorded address of a contract.
    Resolve { name: String },
    /// List the contracts recorded on the network.
    List,
    /// Show the deployments a contract superseded.
    History { name: String },
    /// Call a read-only entrypoint of a recorded contract.
    View {
        /// Logical name of the contract.
        name: String,
        entrypoint: String,
        /// Calldata: `0x` hex, decimal or a `'short string'`.
        args: Vec<String>,
    },
}

#[cfg(test)]
mod tests {
    use super::*;
    use serial_test::serial;

    #[test]
    fn command_is_well_formed() {
        use clap::CommandFactory;
        Command::command().debug_assert();
    }

    #[test]
    #[serial]
    fn network_and_account_come_from_env() {
        std::env::set_var(constants::NETWORK_ENV_VAR, "sepolia");
        std::env::set_var(constants::ACCOUNT_ENV_VAR, "0x0123");
        let cmd = Command::parse_from(["deployer", "resolve", "Arbiter"]);
        std::env::remove_var(constants::NETWORK_ENV_VAR);
        std::env::remove_var(constants::ACCOUNT_ENV_VAR);

        assert_eq!(cmd.network.as_deref(), Some("sepolia"));
        assert_eq!(cmd.account, Some(Felt::from(0x0123u64)));
        assert!(matches!(cmd.action, Action::Resolve { ref name } if name == "Arbiter"));
    }

    #[test]
    #[serial]
    fn flag_wins_over_env() {
        std::env::set_var(constants::NETWORK_ENV_VAR, "sepolia");
        let cmd = Command::parse_from([
            "deployer",
            "step",
            "ModuleController",
            "--redeploy",
            "--network",
            "goerli",
            "-vv",
        ]);
        std::env::remove_var(constants::NETWORK_ENV_VAR);

        assert_eq!(cmd.network.as_deref(), Some("goerli"));
        assert_eq!(cmd.verbose, 2);
        assert!(matches!(cmd.action, Action::Step { redeploy: true, .. }));
    }

    #[test]
    #[serial]
    fn view_takes_trailing_args() {
        let cmd = Command::parse_from([
            "deployer",
            "view",
            "ModuleController",
            "get_module_address",
            "1",
            "'Settling'",
        ]);
        match cmd.action {
            Action::View { args, .. } => assert_eq!(args, vec!["1", "'Settling'"]),
            other => panic!("unexpected action {other:?}"),
        }
    }
}

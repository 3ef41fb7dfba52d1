use super::super::args::*;

pub fn dispatch(cli: Cli) -> anyhow::Result<i32> {
    match cli.cmd {
        Command::Validate(args) => super::validate::run(args),
        Command::GithubReport(args) => super::github_report::run(args),
        Command::Packs(args) => super::packs::run(args),
    }
}

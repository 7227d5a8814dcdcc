use anyhow::Result;

mod cmd_rules_list;
use crate::args;

pub fn run(global_args: &args::GlobalArgs, args: &args::RulesArgs) -> Result<()> {
    match &args.command {
        args::RulesCommand::List(args) => cmd_rules_list::run(global_args, args),
    }
}

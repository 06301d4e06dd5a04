use crate::cmd::{load_queue_set, CheckArgs};
use crate::exit::{CliResult, SUCCESS};
use crate::output::{print_queue_set, OutputFormat};

pub fn run(args: CheckArgs, format: OutputFormat) -> CliResult<i32> {
    let queues = load_queue_set(&args.spec, !args.no_schema)?;
    print_queue_set(&queues, format);
    Ok(SUCCESS)
}

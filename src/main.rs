mod command;

use std::process::ExitCode;

fn main() -> ExitCode {
    command::args_handle()
}

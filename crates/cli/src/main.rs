use std::process::ExitCode;

fn main() -> ExitCode {
    pidloga_cli::run()
}

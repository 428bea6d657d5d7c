use std::process::ExitCode;

fn main() -> ExitCode {
    pagebuild::cli::run()
}

use std::process::ExitCode;

fn main() -> ExitCode {
    cardbot_cli::run()
}

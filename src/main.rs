use std::process::ExitCode;

fn main() -> ExitCode {
    ExitCode::from(hnssec::run(hnssec::env::RealEnv))
}

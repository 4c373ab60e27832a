pub mod archive;
pub mod args;
pub mod cert;
pub mod env;
pub mod error;
pub mod keys;
pub mod layout;
pub mod log;
pub mod pipeline;
pub mod summary;
pub mod target;
pub mod util;
pub mod zone;

use clap::Parser;

pub use args::Args;
use env::Env;
use error::Error;

/// Parse the command line of `env`.
pub fn parse_args(env: impl Env) -> Result<Args, Error> {
    Args::try_parse_from(env.args_os()).map_err(Error::from)
}

/// Run the program in `env` and return its exit code.
pub fn run(env: impl Env) -> u8 {
    let res = parse_args(&env).and_then(|args| args.execute(&env));
    match res {
        Ok(()) => 0,
        Err(err) => {
            err.pretty_print(&env);
            err.exit_code()
        }
    }
}

//! Entry point for the `fuse-harness` binary.

use std::io;
use std::process::ExitCode;

fn main() -> ExitCode {
    let mut stderr = io::stderr().lock();
    fuse_harness::run(std::env::args_os(), &mut stderr)
}

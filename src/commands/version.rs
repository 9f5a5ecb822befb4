//! Command: print version information.

/// Print the nucleus version to stdout.
#[allow(clippy::print_stdout)]
pub fn run() {
    println!("nucleus {}", super::version());
}

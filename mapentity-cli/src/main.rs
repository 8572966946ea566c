//! Entry point for the `mapentity` binary.
#![forbid(unsafe_code)]

#[expect(
    clippy::print_stderr,
    reason = "The binary reports fatal errors on stderr before exiting"
)]
fn main() {
    if let Err(err) = mapentity_cli::run() {
        eprintln!("mapentity: {err}");
        std::process::exit(1);
    }
}

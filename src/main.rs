use std::process::ExitCode;

fn main() -> ExitCode {
    uvbake::logger::init();
    uvbake::cli::run()
}

use std::process::ExitCode;

fn main() -> ExitCode {
    match submittal_check_lib::run() {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            eprintln!("submittal-check: {e}");
            ExitCode::FAILURE
        }
    }
}

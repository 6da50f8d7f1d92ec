use std::process::ExitCode;

#[tokio::main]
async fn main() -> ExitCode {
    match subscription_organizer::run(std::env::args().skip(1)).await {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            log::error!("起動に失敗しました: {e}");
            eprintln!("{e}");
            ExitCode::FAILURE
        }
    }
}

mod cli;
mod infra;
mod jobs;
mod routes;
mod server;

use relief_ai::error::AppError;

pub async fn run() -> Result<(), AppError> {
    cli::run().await
}

#[tokio::main]
async fn main() {
    if let Err(error) = breaklog::run().await {
        tracing::error!(%error, "breaklog failed");
        eprintln!("breaklog: {error}");
        std::process::exit(1);
    }
}

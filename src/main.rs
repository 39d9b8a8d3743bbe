#[tokio::main]
async fn main() {
    if let Err(e) = aerocare::run().await {
        eprintln!("aerocare: {e}");
        std::process::exit(1);
    }
}

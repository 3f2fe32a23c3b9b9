#[tokio::main]
async fn main() {
    wrapper_auction::start(std::env::args()).await;
}

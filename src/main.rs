use std::sync::Arc;

use despesas::config::{load_config, print_schema};
use despesas::startup;
use despesas::utils::logger::init_logging;

#[tokio::main]
async fn main() {
    // `despesas schema` prints the config JSON schema and exits.
    if std::env::args().nth(1).as_deref() == Some("schema") {
        print_schema();
        return;
    }

    let config = Arc::new(load_config());
    init_logging(&config.logging);

    if let Err(e) = startup::run(config).await {
        eprintln!("Server error: {}", e);
        std::process::exit(1);
    }
}

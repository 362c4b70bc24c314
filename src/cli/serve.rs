use crate::{config::Config, error, server};

pub async fn serve(config: Config) {
    let state = super::app_state(config);
    if let Err(e) = server::start_api_server(state).await {
        error!("Server stopped with an error: {}", e);
    }
}

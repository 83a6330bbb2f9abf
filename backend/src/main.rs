use std::sync::Once;

use moon::*;
use shared::{DownMsg, PlateQuery, UpMsg, UserPreferences};

mod config_store;
mod upstream;

static LOGGING: Once = Once::new();

/// Installs env_logger unless the server runtime already set up a logger.
fn init_logging() {
    LOGGING.call_once(|| {
        let _ = env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info")).try_init();
        let server = config_store::current_server();
        log::info!("Plate API at {}, images at {}", server.api_base_url, server.image_base_url);
    });
}

async fn frontend() -> Frontend {
    init_logging();
    Frontend::new()
        .title("Plate Viewer")
        .index_by_robots(false)
}

async fn up_msg_handler(req: UpMsgRequest<UpMsg>) {
    init_logging();
    let (session_id, cor_id) = (req.session_id, req.cor_id);
    log::debug!("Request: {}", req.up_msg.describe());

    match &req.up_msg {
        UpMsg::LoadConfig => {
            load_config(session_id, cor_id).await;
        }
        UpMsg::SavePreferences(preferences) => {
            save_preferences(preferences.clone(), session_id, cor_id).await;
        }
        UpMsg::ListPlates(query) => {
            list_plates(query, &req.up_msg, session_id, cor_id).await;
        }
        UpMsg::LoadPlate { barcode, acquisition_id } => {
            load_plate(barcode, acquisition_id.as_deref(), &req.up_msg, session_id, cor_id).await;
        }
        UpMsg::MoveToTrash { acquisition_id } => {
            move_to_trash(acquisition_id, &req.up_msg, session_id, cor_id).await;
        }
    }
}

async fn load_config(session_id: SessionId, cor_id: CorId) {
    let msg = match config_store::load_config().await {
        Ok(config) => DownMsg::ConfigLoaded(config),
        Err(error) => {
            log::error!("{error:#}");
            DownMsg::ConfigError(format!("{error:#}"))
        }
    };
    send_down_msg(msg, session_id, cor_id).await;
}

async fn save_preferences(preferences: UserPreferences, session_id: SessionId, cor_id: CorId) {
    let msg = match config_store::save_preferences(preferences).await {
        Ok(()) => DownMsg::ConfigSaved,
        Err(error) => {
            log::error!("{error:#}");
            DownMsg::ConfigError(format!("{error:#}"))
        }
    };
    send_down_msg(msg, session_id, cor_id).await;
}

async fn list_plates(query: &PlateQuery, request: &UpMsg, session_id: SessionId, cor_id: CorId) {
    let base = config_store::current_server().api_base_url;
    let msg = match upstream::list_plates(&base, query).await {
        Ok(rows) => DownMsg::PlateList(rows),
        Err(error) => api_error(error, request),
    };
    send_down_msg(msg, session_id, cor_id).await;
}

async fn load_plate(
    barcode: &str,
    acquisition_id: Option<&str>,
    request: &UpMsg,
    session_id: SessionId,
    cor_id: CorId,
) {
    let base = config_store::current_server().api_base_url;
    let msg = match upstream::fetch_plate(&base, barcode, acquisition_id).await {
        Ok(plate) => DownMsg::PlateLoaded(plate),
        Err(error) => api_error(error, request),
    };
    send_down_msg(msg, session_id, cor_id).await;
}

async fn move_to_trash(acquisition_id: &str, request: &UpMsg, session_id: SessionId, cor_id: CorId) {
    let base = config_store::current_server().api_base_url;
    let msg = match upstream::move_to_trash(&base, acquisition_id).await {
        Ok(()) => DownMsg::MovedToTrash { acquisition_id: acquisition_id.to_string() },
        Err(error) => api_error(error, request),
    };
    send_down_msg(msg, session_id, cor_id).await;
}

fn api_error(error: upstream::UpstreamError, request: &UpMsg) -> DownMsg {
    log::error!("Failed to {}: {error}", request.describe());
    DownMsg::ApiError { error: error.into_api_error(), request: request.clone() }
}

async fn send_down_msg(msg: DownMsg, session_id: SessionId, cor_id: CorId) {
    if let Some(session) = sessions::by_session_id().wait_for(session_id).await {
        session.send_down_msg(&msg, cor_id).await;
    } else {
        log::debug!("Session disconnected before its response");
    }
}

#[moon::main]
async fn main() -> std::io::Result<()> {
    std::panic::set_hook(Box::new(|panic_info| {
        eprintln!("BACKEND PANIC: {panic_info}");
    }));

    if let Err(error) = config_store::load_config().await {
        eprintln!("Starting without a readable config: {error:#}");
    }

    start(frontend, up_msg_handler, |_| {}).await
}

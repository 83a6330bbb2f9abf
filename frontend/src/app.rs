//! PlateApp: domain wiring, backend message dispatch and the root layout.

use futures::StreamExt;
use shared::{DownMsg, UpMsg};
use zoon::*;

use crate::animation::AnimationHost;
use crate::config::ConfigStore;
use crate::connection::{connect, send_up_msg};
use crate::dataflow::Actor;
use crate::error_display::{ErrorAlert, current_alert_signal, error_modal, show_alert};
use crate::image_viewer::ImageViewer;
use crate::plate_grid::plate_grid;
use crate::plate_session::PlateSession;
use crate::routing::current_route;
use crate::sidebar::{PlateList, sidebar};
use crate::toolbar::toolbar;

pub struct PlateApp {
    pub config: ConfigStore,
    pub session: PlateSession,
    pub plate_list: PlateList,
    pub viewer: ImageViewer,
    _animation: AnimationHost,
    _dispatcher: Actor<()>,
}

impl PlateApp {
    pub fn new() -> Self {
        let config = ConfigStore::new();
        let session = PlateSession::new(config.save_requested_relay.clone());
        let plate_list = PlateList::new();
        let viewer = ImageViewer::new(session.clone(), config.clone());
        let animation = AnimationHost::new(session.clone());

        let down_msgs = connect();
        let dispatcher = Actor::new((), {
            let (config, session, plate_list) = (config.clone(), session.clone(), plate_list.clone());
            async move |_state| {
                let Some(mut down_msgs) = down_msgs else {
                    zoon::println!("Backend connection was already opened");
                    return;
                };
                while let Some(down_msg) = down_msgs.next().await {
                    dispatch(down_msg, &config, &session, &plate_list);
                }
            }
        });

        send_up_msg(UpMsg::LoadConfig);
        session.open_route(current_route());
        PlateList::refresh();

        Self {
            config,
            session,
            plate_list,
            viewer,
            _animation: animation,
            _dispatcher: dispatcher,
        }
    }

    pub fn root(&self) -> impl Element + use<> {
        Stack::new()
            .s(Width::fill())
            .s(Height::screen())
            .s(Background::new().color("rgb(18, 18, 20)"))
            .s(Font::new().family([FontFamily::new("Inter"), FontFamily::new("sans-serif")]).color("rgb(230, 230, 230)"))
            .layer(
                Row::new()
                    .s(Width::fill())
                    .s(Height::fill())
                    .item(sidebar(self.session.clone(), self.plate_list.clone(), self.config.clone()))
                    .item(
                        Column::new()
                            .s(Width::fill())
                            .s(Height::fill())
                            .item(toolbar(self.session.clone()))
                            .item(plate_grid(self.session.clone(), self.config.clone())),
                    ),
            )
            .layer_signal(
                self.session
                    .selection_signal(|selection| selection.viewer.is_some())
                    .dedupe()
                    .map_true({
                        let viewer = self.viewer.clone();
                        move || viewer.root()
                    }),
            )
            .layer_signal(current_alert_signal().map(|alert| alert.map(error_modal)))
    }
}

fn dispatch(down_msg: DownMsg, config: &ConfigStore, session: &PlateSession, plate_list: &PlateList) {
    match down_msg {
        DownMsg::ConfigLoaded(app_config) => {
            session.preferences_loaded_relay.send(app_config.preferences.clone());
            config.config_loaded_relay.send(app_config);
        }
        DownMsg::ConfigSaved => zoon::println!("Preferences saved"),
        DownMsg::ConfigError(error) => show_alert(ErrorAlert::config(error)),
        DownMsg::PlateList(rows) => plate_list.rows_loaded_relay.send(rows),
        DownMsg::PlateLoaded(plate) => session.plate_loaded_relay.send(plate),
        DownMsg::MovedToTrash { acquisition_id } => {
            session.acquisition_trashed_relay.send(acquisition_id.clone());
            plate_list.row_trashed_relay.send(acquisition_id);
        }
        DownMsg::ApiError { error, request } => {
            if let UpMsg::LoadPlate { barcode, .. } = &request {
                session.plate_failed_relay.send(barcode.clone());
            }
            show_alert(ErrorAlert::api(&error, request));
        }
    }
}

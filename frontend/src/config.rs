//! Browser side of the persisted configuration: server addresses from the
//! backend, and debounced saving of user preferences.

use futures::{FutureExt, StreamExt, select};
use shared::{AppConfig, ServerSection, UpMsg, UserPreferences};
use zoon::*;

use crate::connection::send_up_msg;
use crate::dataflow::{Actor, Relay, relay};

/// Quiet period before a burst of preference changes is saved.
const SAVE_DEBOUNCE_MS: u32 = 300;

#[derive(Clone)]
pub struct ConfigStore {
    pub server: Actor<ServerSection>,
    pub config_loaded_relay: Relay<AppConfig>,
    pub save_requested_relay: Relay<UserPreferences>,
    _save_debouncer: Actor<()>,
}

impl ConfigStore {
    pub fn new() -> Self {
        let (config_loaded_relay, mut config_loaded_stream) = relay::<AppConfig>();
        let (save_requested_relay, save_requested_stream) = relay::<UserPreferences>();

        let server = Actor::new(ServerSection::default(), async move |state| {
            while let Some(config) = config_loaded_stream.next().await {
                state.set_neq(config.server);
            }
        });

        let save_debouncer = Actor::new((), async move |_state| {
            let mut save_requested_stream = save_requested_stream.fuse();
            while let Some(mut latest) = save_requested_stream.next().await {
                loop {
                    select! {
                        newer = save_requested_stream.next() => {
                            match newer {
                                Some(preferences) => latest = preferences,
                                None => break,
                            }
                        }
                        _ = Timer::sleep(SAVE_DEBOUNCE_MS).fuse() => {
                            send_up_msg(UpMsg::SavePreferences(latest.clone()));
                            break;
                        }
                    }
                }
            }
        });

        Self {
            server,
            config_loaded_relay,
            save_requested_relay,
            _save_debouncer: save_debouncer,
        }
    }

    pub fn image_base_url(&self) -> String {
        self.server.get_cloned().image_base_url
    }

    pub fn latest_count_signal(&self) -> impl Signal<Item = usize> + use<> {
        self.server.signal_ref(|server| server.latest_count)
    }
}

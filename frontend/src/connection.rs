use std::sync::OnceLock;

use futures::channel::mpsc::{UnboundedReceiver, unbounded};
use shared::{DownMsg, UpMsg};
use zoon::*;

use crate::error_display::{ErrorAlert, show_alert};

static CONNECTION: OnceLock<SendWrapper<Connection<UpMsg, DownMsg>>> = OnceLock::new();

/// Opens the backend connection once and returns the stream of its messages.
/// Later calls return `None`.
pub fn connect() -> Option<UnboundedReceiver<DownMsg>> {
    let (message_sender, message_stream) = unbounded();
    let connection = Connection::new(move |down_msg, _| {
        let _ = message_sender.unbounded_send(down_msg);
    });
    CONNECTION.set(SendWrapper::new(connection)).ok()?;
    Some(message_stream)
}

/// Sends in the background; transport failures surface as an error alert.
pub fn send_up_msg(up_msg: UpMsg) {
    Task::start(async move {
        let Some(connection) = CONNECTION.get() else {
            zoon::println!("Dropped '{}': not connected", up_msg.describe());
            return;
        };
        if let Err(error) = connection.send_up_msg(up_msg.clone()).await {
            zoon::println!("Failed to send message: {:?}", error);
            show_alert(ErrorAlert::connection(&up_msg, format!("{error:?}")));
        }
    });
}

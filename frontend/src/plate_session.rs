//! The loaded plate and the selection every view reads from.
//!
//! All writes go through one processor task: UI callbacks send a
//! [`SelectionEdit`], the processor applies it and bumps the revision counter
//! of each view the edit affects. Views watch their counter and redraw.

use std::sync::Arc;

use futures::{StreamExt, select};
use shared::{AppRoute, Plate, RefreshScope, Selection, SelectionEdit, UpMsg, UserPreferences, ViewerLink};
use zoon::*;

use crate::connection::send_up_msg;
use crate::dataflow::{Actor, Relay, relay};
use crate::routing::replace_route;

/// Redraw counters, one per view.
#[derive(Clone, Default)]
pub struct Revisions {
    pub toolbar: Mutable<u64>,
    pub grid: Mutable<u64>,
    pub viewer: Mutable<u64>,
    pub sidebar: Mutable<u64>,
}

impl Revisions {
    fn bump(&self, scope: RefreshScope) {
        for (dirty, counter) in [
            (scope.toolbar, &self.toolbar),
            (scope.grid, &self.grid),
            (scope.viewer, &self.viewer),
            (scope.sidebar, &self.sidebar),
        ] {
            if dirty {
                *counter.lock_mut() += 1;
            }
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct PlateRequest {
    pub barcode: String,
    pub acquisition_id: Option<String>,
}

#[derive(Clone)]
pub struct PlateSession {
    pub plate: Mutable<Option<Arc<Plate>>>,
    pub selection: Mutable<Selection>,
    /// Barcode of the plate being fetched.
    pub loading: Mutable<Option<String>>,
    pub revisions: Revisions,
    pub selection_edited_relay: Relay<SelectionEdit>,
    pub plate_requested_relay: Relay<PlateRequest>,
    pub viewer_link_opened_relay: Relay<ViewerLink>,
    pub plate_loaded_relay: Relay<Plate>,
    pub plate_failed_relay: Relay<String>,
    pub acquisition_trashed_relay: Relay<String>,
    pub preferences_loaded_relay: Relay<UserPreferences>,
    _processor: Actor<()>,
}

impl PlateSession {
    pub fn new(preferences_changed_relay: Relay<UserPreferences>) -> Self {
        let plate: Mutable<Option<Arc<Plate>>> = Mutable::new(None);
        let selection = Mutable::new(Selection::default());
        let loading = Mutable::new(None);
        let revisions = Revisions::default();

        let (selection_edited_relay, mut selection_edited_stream) = relay();
        let (plate_requested_relay, mut plate_requested_stream) = relay::<PlateRequest>();
        let (viewer_link_opened_relay, mut viewer_link_opened_stream) = relay::<ViewerLink>();
        let (plate_loaded_relay, mut plate_loaded_stream) = relay::<Plate>();
        let (plate_failed_relay, mut plate_failed_stream) = relay::<String>();
        let (acquisition_trashed_relay, mut acquisition_trashed_stream) = relay::<String>();
        let (preferences_loaded_relay, mut preferences_loaded_stream) = relay::<UserPreferences>();

        let processor = Actor::new((), {
            let plate = plate.clone();
            let selection = selection.clone();
            let loading = loading.clone();
            let revisions = revisions.clone();
            async move |_state| {
                // Selection to restore once the requested plate arrives.
                let mut pending: Option<Selection> = None;
                loop {
                    select! {
                        edit = selection_edited_stream.next() => {
                            let Some(edit) = edit else { break };
                            let scope = selection.lock_mut().apply(edit);
                            if scope.preferences {
                                preferences_changed_relay.send(selection.lock_ref().preferences());
                            }
                            revisions.bump(scope);
                            if !scope.is_empty() {
                                sync_address(&plate, &selection);
                            }
                        }
                        request = plate_requested_stream.next() => {
                            let Some(PlateRequest { barcode, acquisition_id }) = request else { break };
                            pending = acquisition_id.clone().map(|acquisition_id| Selection {
                                acquisition_id: Some(acquisition_id),
                                ..Selection::from_preferences(&selection.lock_ref().preferences())
                            });
                            request_plate(&loading, barcode, acquisition_id);
                        }
                        link = viewer_link_opened_stream.next() => {
                            let Some(link) = link else { break };
                            pending = Some(Selection::from_link(&link, &selection.lock_ref().preferences()));
                            request_plate(&loading, link.barcode.clone(), Some(link.acquisition_id.clone()));
                        }
                        loaded = plate_loaded_stream.next() => {
                            let Some(loaded) = loaded else { break };
                            install_plate(&plate, &selection, loaded, pending.take());
                            loading.set(None);
                            revisions.bump(RefreshScope::FULL);
                            sync_address(&plate, &selection);
                        }
                        failed = plate_failed_stream.next() => {
                            let Some(barcode) = failed else { break };
                            if loading.lock_ref().as_deref() == Some(barcode.as_str()) {
                                loading.set(None);
                                pending = None;
                            }
                        }
                        trashed = acquisition_trashed_stream.next() => {
                            let Some(acquisition_id) = trashed else { break };
                            let changed = plate
                                .lock_mut()
                                .as_mut()
                                .is_some_and(|plate| Arc::make_mut(plate).mark_acquisition_trashed(&acquisition_id));
                            if changed {
                                revisions.bump(RefreshScope { toolbar: true, sidebar: true, ..RefreshScope::NONE });
                            }
                        }
                        preferences = preferences_loaded_stream.next() => {
                            let Some(preferences) = preferences else { break };
                            apply_preferences(&mut selection.lock_mut(), &preferences);
                            revisions.bump(RefreshScope { toolbar: true, ..RefreshScope::FULL });
                        }
                    }
                }
            }
        });

        Self {
            plate,
            selection,
            loading,
            revisions,
            selection_edited_relay,
            plate_requested_relay,
            viewer_link_opened_relay,
            plate_loaded_relay,
            plate_failed_relay,
            acquisition_trashed_relay,
            preferences_loaded_relay,
            _processor: processor,
        }
    }

    pub fn edit(&self, edit: SelectionEdit) {
        self.selection_edited_relay.send(edit);
    }

    /// Opens whatever the page address points at.
    pub fn open_route(&self, route: AppRoute) {
        match route {
            AppRoute::Home => {}
            AppRoute::Plate { barcode, acquisition_id } => {
                self.plate_requested_relay.send(PlateRequest { barcode, acquisition_id });
            }
            AppRoute::Viewer(link) => self.viewer_link_opened_relay.send(link),
        }
    }

    pub fn plate_signal(&self) -> impl Signal<Item = Option<Arc<Plate>>> + use<> {
        self.plate.signal_cloned()
    }

    pub fn selection_signal<U, F>(&self, f: F) -> impl Signal<Item = U> + use<U, F>
    where
        F: FnMut(&Selection) -> U + 'static,
    {
        self.selection.signal_ref(f)
    }

    pub fn current_plate(&self) -> Option<Arc<Plate>> {
        self.plate.get_cloned()
    }
}

fn request_plate(loading: &Mutable<Option<String>>, barcode: String, acquisition_id: Option<String>) {
    loading.set(Some(barcode.clone()));
    send_up_msg(UpMsg::LoadPlate { barcode, acquisition_id });
}

/// Replaces the plate wholesale. A different plate closes the viewer unless
/// a pending selection (deep link) says otherwise.
fn install_plate(
    plate: &Mutable<Option<Arc<Plate>>>,
    selection: &Mutable<Selection>,
    loaded: Plate,
    pending: Option<Selection>,
) {
    let same_plate = plate
        .lock_ref()
        .as_ref()
        .is_some_and(|current| current.barcode == loaded.barcode);
    let mut selection = selection.lock_mut();
    match pending {
        Some(pending) => *selection = pending,
        None if !same_plate => selection.viewer = None,
        None => {}
    }
    selection.reconcile(&loaded);
    plate.set(Some(Arc::new(loaded)));
}

fn apply_preferences(selection: &mut Selection, preferences: &UserPreferences) {
    let preferences = preferences.clone().clamped();
    selection.brightness_percent = preferences.brightness_percent;
    selection.show_hidden = preferences.show_hidden;
    selection.show_layout_overlay = preferences.show_layout_overlay;
    selection.sidebar_sort_alphabetically = preferences.sort_alphabetically;
    selection.animation_speed = preferences.animation_speed;
}

fn sync_address(plate: &Mutable<Option<Arc<Plate>>>, selection: &Mutable<Selection>) {
    if let Some(plate) = plate.lock_ref().as_ref() {
        replace_route(&AppRoute::for_view(&plate.barcode, &selection.lock_ref()));
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use shared::plate::parse_plate_response;
    use shared::selection::ViewerFocus;

    fn plate(barcode: &str) -> Plate {
        parse_plate_response(
            r#"{"acquisitions": {"7": {"wells": {"B03": {"sites": {"1": {"channels": {"1": {"path": "a"}}}}}}}}}"#,
            barcode,
        )
        .unwrap()
    }

    fn open_viewer(selection: &Mutable<Selection>) {
        selection.lock_mut().apply(SelectionEdit::OpenViewer {
            well: "B03".into(),
            site: "1".into(),
            depth: "default".into(),
        });
    }

    #[test]
    fn reloading_the_same_plate_keeps_the_viewer_open() {
        let current = Mutable::new(None);
        let selection = Mutable::new(Selection::default());
        install_plate(&current, &selection, plate("P1"), None);
        open_viewer(&selection);

        install_plate(&current, &selection, plate("P1"), None);
        assert_eq!(selection.lock_ref().viewer_position(), Some(("7", "B03", "1", "default")));

        install_plate(&current, &selection, plate("P2"), None);
        assert_eq!(selection.lock_ref().viewer, None);
        assert_eq!(selection.lock_ref().acquisition_id.as_deref(), Some("7"));
    }

    #[test]
    fn pending_link_selection_wins_over_a_plate_switch() {
        let current = Mutable::new(Some(Arc::new(plate("P1"))));
        let selection = Mutable::new(Selection::default());
        let pending = Selection {
            acquisition_id: Some("7".into()),
            viewer: Some(ViewerFocus { well: "B03".into(), site: "1".into(), depth: "default".into() }),
            ..Selection::default()
        };

        install_plate(&current, &selection, plate("P2"), Some(pending));
        assert_eq!(selection.lock_ref().viewer_position(), Some(("7", "B03", "1", "default")));
        assert_eq!(current.lock_ref().as_ref().map(|plate| plate.barcode.clone()), Some("P2".into()));
    }

    #[test]
    fn loaded_preferences_are_clamped_into_the_selection() {
        let mut selection = Selection::default();
        let preferences = UserPreferences {
            brightness_percent: 5000,
            show_hidden: true,
            show_layout_overlay: true,
            sort_alphabetically: true,
            animation_speed: 42,
        };
        apply_preferences(&mut selection, &preferences);

        assert_eq!(selection.brightness_percent, 400);
        assert_eq!(selection.animation_speed, 9);
        assert!(selection.show_hidden && selection.show_layout_overlay && selection.sidebar_sort_alphabetically);
    }
}

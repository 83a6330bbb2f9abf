//! Plate list: project → acquisition tree with a client-side filter.

use std::collections::BTreeSet;

use futures::{StreamExt, select};
use shared::sidebar::{GroupKind, SidebarGroup, SidebarOptions, build_tree, mark_row_trashed};
use shared::{Plate, PlateListRow, PlateQuery, SelectionEdit, UpMsg};
use zoon::*;

use crate::config::ConfigStore;
use crate::connection::send_up_msg;
use crate::dataflow::{Actor, Relay, relay};
use crate::plate_session::{PlateRequest, PlateSession};
use crate::toolbar::flag_chip;
use crate::widgets::{MUTED_TEXT_COLOR, TEXT_COLOR, tool_button};

/// Rows of the last list query.
#[derive(Clone)]
pub struct PlateList {
    pub rows: Actor<Vec<PlateListRow>>,
    pub rows_loaded_relay: Relay<Vec<PlateListRow>>,
    pub row_trashed_relay: Relay<String>,
}

impl PlateList {
    pub fn new() -> Self {
        let (rows_loaded_relay, mut rows_loaded_stream) = relay::<Vec<PlateListRow>>();
        let (row_trashed_relay, mut row_trashed_stream) = relay::<String>();

        let rows = Actor::new(Vec::new(), async move |state| {
            loop {
                select! {
                    loaded = rows_loaded_stream.next() => {
                        let Some(loaded) = loaded else { break };
                        state.set(loaded);
                    }
                    trashed = row_trashed_stream.next() => {
                        let Some(acquisition_id) = trashed else { break };
                        let mut rows = state.lock_mut();
                        if !mark_row_trashed(&mut rows, &acquisition_id) {
                            zoon::println!("Trashed acquisition {acquisition_id} is not in the plate list");
                        }
                    }
                }
            }
        });

        Self { rows, rows_loaded_relay, row_trashed_relay }
    }

    pub fn refresh() {
        send_up_msg(UpMsg::ListPlates(PlateQuery::default()));
    }
}

#[derive(Debug, Clone, PartialEq)]
enum RowAction {
    /// The row belongs to the loaded plate; switch in place.
    SelectAcquisition(String),
    LoadPlate(PlateRequest),
}

fn row_action(current_plate: Option<&Plate>, row: &PlateListRow) -> RowAction {
    let loaded = current_plate
        .is_some_and(|plate| plate.barcode == row.plate_barcode && plate.acquisition(&row.id).is_some());
    if loaded {
        RowAction::SelectAcquisition(row.id.clone())
    } else {
        RowAction::LoadPlate(PlateRequest {
            barcode: row.plate_barcode.clone(),
            acquisition_id: Some(row.id.clone()),
        })
    }
}

pub fn sidebar(session: PlateSession, plate_list: PlateList, config: ConfigStore) -> impl Element {
    let collapsed: Mutable<BTreeSet<String>> = Mutable::default();

    let selection = session.selection.clone();
    let groups = map_ref! {
        let rows = plate_list.rows.signal(),
        let latest_count = config.latest_count_signal(),
        let _revision = session.revisions.sidebar.signal(),
        let _collapsed = collapsed.signal_cloned() => {
            let selection = selection.lock_ref();
            let options = SidebarOptions {
                filter: selection.search_filter.clone(),
                show_hidden: selection.show_hidden,
                sort_alphabetically: selection.sidebar_sort_alphabetically,
                latest_count: *latest_count,
            };
            build_tree(rows, &options)
        }
    };

    Column::new()
        .s(Width::exact(300))
        .s(Height::fill())
        .s(Padding::all(8))
        .s(Gap::new().y(8))
        .s(Background::new().color("rgb(26, 26, 30)"))
        .item(filter_input(&session))
        .item(
            Row::new()
                .s(Gap::new().x(6))
                .item(flag_chip(&session, "Hidden", "Show hidden acquisitions", |selection| selection.show_hidden, SelectionEdit::ShowHidden))
                .item(flag_chip(&session, "A–Z", "Sort projects alphabetically", |selection| selection.sidebar_sort_alphabetically, SelectionEdit::SortAlphabetically))
                .item(tool_button("↻", "Reload the plate list", PlateList::refresh)),
        )
        .item(
            Column::new()
                .s(Width::fill())
                .s(Height::fill())
                .s(Scrollbars::y_and_clip_x())
                .items_signal_vec(groups.to_signal_vec().map({
                    let session = session.clone();
                    move |group| group_view(group, &session, &collapsed)
                })),
        )
}

fn filter_input(session: &PlateSession) -> impl Element {
    let session = session.clone();
    TextInput::new()
        .s(Width::fill())
        .s(Padding::new().x(8).y(5))
        .s(RoundedCorners::all(4))
        .s(Background::new().color("rgb(45, 45, 52)"))
        .s(Font::new().size(13).color(TEXT_COLOR))
        .label_hidden("Filter plates")
        .placeholder(Placeholder::new("Filter plates"))
        .text(session.selection.lock_ref().search_filter.clone())
        .on_change(move |text| session.edit(SelectionEdit::SearchFilter(text)))
}

fn group_view(group: SidebarGroup, session: &PlateSession, collapsed: &Mutable<BTreeSet<String>>) -> impl Element {
    let is_collapsed = collapsed.lock_ref().contains(&group.key);
    let marker = if is_collapsed { "▸" } else { "▾" };
    let weight = match group.kind {
        GroupKind::Latest => FontWeight::Bold,
        GroupKind::Project => FontWeight::SemiBold,
    };
    let header = Button::new()
        .s(Width::fill())
        .s(Padding::new().x(4).y(3))
        .s(Font::new().size(13).weight(weight).color(TEXT_COLOR).no_wrap())
        .label(format!("{marker} {} ({})", group.label, group.rows.len()))
        .on_press({
            let (collapsed, key) = (collapsed.clone(), group.key.clone());
            move || {
                let mut collapsed = collapsed.lock_mut();
                if !collapsed.remove(&key) {
                    collapsed.insert(key.clone());
                }
            }
        });

    let rows = (!is_collapsed).then(|| {
        Column::new()
            .s(Padding::new().left(14))
            .items(group.rows.into_iter().map(|row| row_view(row, session)))
    });

    Column::new().s(Width::fill()).item(header).item(rows)
}

fn row_view(row: PlateListRow, session: &PlateSession) -> impl Element {
    let (hovered, hovered_signal) = Mutable::new_and_signal(false);
    let selected = session.selection_signal({
        let id = row.id.clone();
        move |selection| selection.acquisition_id.as_deref() == Some(id.as_str())
    });
    let background = map_ref! {
        let hovered = hovered_signal,
        let selected = selected => match (*selected, *hovered) {
            (true, _) => "rgb(55, 90, 170)",
            (false, true) => "rgb(45, 45, 52)",
            (false, false) => "transparent",
        }
    };
    let title = format!("{}\nacquisition {}\n{}", row.plate_barcode, row.id, row.microscope);
    let color = if row.is_hidden() { MUTED_TEXT_COLOR } else { TEXT_COLOR };

    Button::new()
        .s(Width::fill())
        .s(Padding::new().x(6).y(3))
        .s(RoundedCorners::all(3))
        .s(Font::new().size(12).color(color).no_wrap())
        .s(Background::new().color_signal(background))
        .update_raw_el(move |raw_el| raw_el.attr("title", &title))
        .on_hovered_change(move |is_hovered| hovered.set_neq(is_hovered))
        .label(row.label())
        .on_press({
            let session = session.clone();
            move || match row_action(session.current_plate().as_deref(), &row) {
                RowAction::SelectAcquisition(id) => session.edit(SelectionEdit::Acquisition(id)),
                RowAction::LoadPlate(request) => session.plate_requested_relay.send(request),
            }
        })
}

#[cfg(test)]
mod tests {
    use super::*;
    use shared::plate::parse_plate_response;

    fn row(barcode: &str, id: &str) -> PlateListRow {
        PlateListRow {
            plate_barcode: barcode.to_string(),
            id: id.to_string(),
            ..PlateListRow::default()
        }
    }

    #[test]
    fn rows_of_the_loaded_plate_switch_in_place() {
        let plate = parse_plate_response(r#"{"barcode": "P1", "acquisitions": {"7": {"wells": {}}}}"#, "P1").unwrap();

        assert_eq!(row_action(Some(&plate), &row("P1", "7")), RowAction::SelectAcquisition("7".into()));
        assert_eq!(
            row_action(Some(&plate), &row("P1", "9")),
            RowAction::LoadPlate(PlateRequest { barcode: "P1".into(), acquisition_id: Some("9".into()) })
        );
        assert_eq!(
            row_action(None, &row("P2", "3")),
            RowAction::LoadPlate(PlateRequest { barcode: "P2".into(), acquisition_id: Some("3".into()) })
        );
    }
}

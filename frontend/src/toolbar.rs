//! Selector bar above the grid.
//!
//! Option lists are rebuilt whenever the toolbar revision is bumped. Values
//! that change without a toolbar bump (zoom, brightness, speed, chip state)
//! follow the selection signal directly.

use std::sync::Arc;

use shared::channels::{AUTO_PRESET, available_presets, preset_channel_ids};
use shared::config::{MAX_ANIMATION_SPEED, MAX_BRIGHTNESS_PERCENT, MIN_BRIGHTNESS_PERCENT};
use shared::selection::{MAX_ZOOM_PERCENT, MIN_ZOOM_PERCENT};
use shared::{ChannelSelection, Plate, Selection, SelectionEdit, UpMsg};
use zoon::*;

use crate::connection::send_up_msg;
use crate::plate_session::PlateSession;
use crate::widgets::{MUTED_TEXT_COLOR, SelectOption, caption, chip, native_select, tool_button};

const ZOOM_STEP: u32 = 25;
const BRIGHTNESS_STEP: u32 = 10;

pub fn toolbar(session: PlateSession) -> impl Element {
    Column::new()
        .s(Width::fill())
        .s(Padding::new().x(12).y(8))
        .s(Gap::new().y(6))
        .s(Background::new().color("rgb(32, 32, 36)"))
        .item(
            El::new().s(Width::fill()).child_signal(session.revisions.toolbar.signal().map({
                let session = session.clone();
                move |_| {
                    let plate = session.current_plate()?;
                    let selection = session.selection.get_cloned();
                    Some(selectors(&session, plate, &selection))
                }
            })),
        )
        .item(view_controls(&session))
}

fn selectors(session: &PlateSession, plate: Arc<Plate>, selection: &Selection) -> impl Element {
    let acquisition_id = selection.acquisition_id.clone().unwrap_or_default();
    Row::new()
        .multiline()
        .s(Gap::new().x(12).y(6))
        .item(caption(&plate.barcode))
        .item(native_select(acquisition_options(&plate), selection.acquisition_id.clone(), {
            let session = session.clone();
            move |id| session.edit(SelectionEdit::Acquisition(id))
        }))
        .item(toggle_group(
            session,
            "Sites",
            plate.available_sites(&acquisition_id),
            |selection| &selection.sites,
            SelectionEdit::ToggleSite,
            SelectionEdit::Sites,
        ))
        .item(toggle_group(
            session,
            "Depths",
            plate.available_depths(&acquisition_id),
            |selection| &selection.depths,
            SelectionEdit::ToggleDepth,
            SelectionEdit::Depths,
        ))
        .item(native_select(
            channel_options(&plate, &acquisition_id, selection.channels.as_ref()),
            selection.channels.as_ref().map(ToString::to_string),
            {
                let session = session.clone();
                move |token| match token.parse::<ChannelSelection>() {
                    Ok(channels) => session.edit(SelectionEdit::Channels(channels)),
                    Err(error) => zoon::println!("Ignoring channel selection '{token}': {error}"),
                }
            },
        ))
        .item(trash_button(&plate, &acquisition_id))
}

fn toggle_group(
    session: &PlateSession,
    label: &str,
    values: Vec<String>,
    selected: fn(&Selection) -> &Vec<String>,
    toggle: fn(String) -> SelectionEdit,
    select_all: fn(Vec<String>) -> SelectionEdit,
) -> impl Element {
    let all = values.clone();
    Row::new()
        .s(Gap::new().x(4))
        .item(caption(label))
        .items(values.into_iter().map(|value| {
            let active = session.selection_signal({
                let value = value.clone();
                move |selection| selected(selection).contains(&value)
            });
            chip(value.clone(), format!("{label} {value}"), active, {
                let session = session.clone();
                move || session.edit(toggle(value.clone()))
            })
        }))
        .item((all.len() > 1).then(|| {
            let session = session.clone();
            tool_button("All", &format!("Show all {}", label.to_lowercase()), move || {
                session.edit(select_all(all.clone()))
            })
        }))
}

fn trash_button(plate: &Plate, acquisition_id: &str) -> Option<impl Element + use<>> {
    let acquisition = plate.acquisition(acquisition_id)?;
    if acquisition.is_trashed() {
        return None;
    }
    let (id, name) = (acquisition.id.clone(), acquisition.display_name().to_string());
    Some(tool_button("Move to trash", "Hide this acquisition from the plate list", move || {
        let confirmed = web_sys::window()
            .and_then(|window| window.confirm_with_message(&format!("Move acquisition '{name}' to trash?")).ok())
            .unwrap_or(false);
        if confirmed {
            send_up_msg(UpMsg::MoveToTrash { acquisition_id: id.clone() });
        }
    }))
}

fn view_controls(session: &PlateSession) -> impl Element {
    Row::new()
        .multiline()
        .s(Gap::new().x(12).y(6))
        .item(stepper(
            session,
            "Zoom",
            |selection| format!("{}%", selection.zoom_percent),
            |selection, up| SelectionEdit::Zoom(step(selection.zoom_percent, ZOOM_STEP, up, MIN_ZOOM_PERCENT, MAX_ZOOM_PERCENT)),
        ))
        .item(stepper(
            session,
            "Brightness",
            |selection| format!("{}%", selection.brightness_percent),
            |selection, up| {
                SelectionEdit::Brightness(step(
                    selection.brightness_percent,
                    BRIGHTNESS_STEP,
                    up,
                    MIN_BRIGHTNESS_PERCENT,
                    MAX_BRIGHTNESS_PERCENT,
                ))
            },
        ))
        .item(play_button(session))
        .item(stepper(
            session,
            "Speed",
            |selection| selection.animation_speed.to_string(),
            |selection, up| {
                let speed = u32::from(selection.animation_speed);
                SelectionEdit::AnimationSpeed(step(speed, 1, up, 0, u32::from(MAX_ANIMATION_SPEED)) as u8)
            },
        ))
        .item(flag_chip(session, "Layout", "Show plate layout indicators", |selection| selection.show_layout_overlay, SelectionEdit::ShowLayoutOverlay))
        .item(
            El::new()
                .s(Font::new().size(12).color(MUTED_TEXT_COLOR).no_wrap())
                .child_signal(session.loading.signal_cloned().map(|loading| {
                    loading.map(|barcode| format!("Loading plate {barcode}…"))
                })),
        )
}

/// `value` moved one `increment` up or down, kept inside `min..=max`.
fn step(value: u32, increment: u32, up: bool, min: u32, max: u32) -> u32 {
    let next = if up { value.saturating_add(increment) } else { value.saturating_sub(increment) };
    next.clamp(min, max)
}

fn stepper(
    session: &PlateSession,
    label: &str,
    display: fn(&Selection) -> String,
    edit: fn(&Selection, bool) -> SelectionEdit,
) -> impl Element {
    let press = |up: bool| {
        let session = session.clone();
        move || {
            let next = edit(&session.selection.lock_ref(), up);
            session.edit(next);
        }
    };
    Row::new()
        .s(Gap::new().x(4))
        .item(caption(label))
        .item(tool_button("−", &format!("Decrease {}", label.to_lowercase()), press(false)))
        .item(
            El::new()
                .s(Width::exact(44))
                .s(Font::new().size(12).center())
                .child_signal(session.selection_signal(display)),
        )
        .item(tool_button("+", &format!("Increase {}", label.to_lowercase()), press(true)))
}

fn play_button(session: &PlateSession) -> impl Element {
    El::new().child_signal(session.selection_signal(|selection| selection.animating).dedupe().map({
        let session = session.clone();
        move |animating| {
            let session = session.clone();
            let (label, title) = if animating {
                ("■ Stop", "Stop stepping through acquisitions")
            } else {
                ("▶ Play", "Step through acquisitions")
            };
            tool_button(label, title, move || session.edit(SelectionEdit::Animating(!animating)))
        }
    }))
}

pub fn flag_chip(
    session: &PlateSession,
    label: &str,
    title: &str,
    flag: fn(&Selection) -> bool,
    edit: fn(bool) -> SelectionEdit,
) -> impl Element {
    chip(label.to_string(), title.to_string(), session.selection_signal(flag), {
        let session = session.clone();
        move || {
            let current = flag(&session.selection.lock_ref());
            session.edit(edit(!current));
        }
    })
}

fn acquisition_options(plate: &Plate) -> Vec<SelectOption> {
    plate
        .acquisitions
        .values()
        .map(|acquisition| SelectOption {
            value: acquisition.id.clone(),
            label: if acquisition.is_trashed() {
                format!("{} (trash)", acquisition.display_name())
            } else {
                acquisition.display_name().to_string()
            },
            title: format!("Acquisition {}\n{}", acquisition.id, acquisition.folder),
        })
        .collect()
}

/// Channel choices for the current acquisition: resolvable presets, every
/// single channel, a merge of the first three, and the current selection if
/// none of those match it.
fn channel_options(plate: &Plate, acquisition_id: &str, current: Option<&ChannelSelection>) -> Vec<SelectOption> {
    let table = plate.representative_channels(acquisition_id);
    let channels = plate.available_channels(acquisition_id);
    let mut options = Vec::new();

    let mut presets = vec![AUTO_PRESET];
    presets.extend(available_presets(table));
    for name in presets {
        let Some(ids) = preset_channel_ids(table, name) else {
            continue;
        };
        let selection = ChannelSelection::Preset(name.to_string());
        options.push(SelectOption {
            value: selection.to_string(),
            label: selection.label(),
            title: format!("Channels {}", ids.join(", ")),
        });
    }
    for channel in &channels {
        let selection = ChannelSelection::Single(channel.id.clone());
        let label = if channel.dye.is_empty() {
            selection.label()
        } else {
            format!("{} ({})", selection.label(), channel.dye)
        };
        options.push(SelectOption { value: selection.to_string(), label, title: channel.tooltip() });
    }
    if let [a, b, c, ..] = channels.as_slice() {
        let selection = ChannelSelection::Triple(a.id.clone(), b.id.clone(), c.id.clone());
        options.push(SelectOption {
            value: selection.to_string(),
            label: selection.label(),
            title: format!("{} + {} + {}", a.dye, b.dye, c.dye),
        });
    }
    if let Some(current) = current {
        let value = current.to_string();
        if !options.iter().any(|option| option.value == value) {
            options.push(SelectOption { value, label: current.label(), title: String::new() });
        }
    }
    options
}

#[cfg(test)]
mod tests {
    use super::*;
    use shared::plate::parse_plate_response;

    fn plate() -> Plate {
        parse_plate_response(
            r#"{"barcode": "P1", "acquisitions": {
                "7": {"name": "day 1", "wells": {"A01": {"sites": {"1": {"channels": {
                    "1": {"dye": "HOECHST", "path": "a"},
                    "2": {"dye": "SYTO", "path": "b"},
                    "3": {"dye": "CONC", "path": "c"}
                }}}}}},
                "8": {"project": "trash", "wells": {}}
            }}"#,
            "P1",
        )
        .unwrap()
    }

    #[test]
    fn steps_stay_inside_bounds() {
        assert_eq!(step(100, 25, true, 10, 800), 125);
        assert_eq!(step(20, 25, false, 10, 800), 10);
        assert_eq!(step(790, 25, true, 10, 800), 800);
        assert_eq!(step(0, 1, false, 0, 9), 0);
    }

    #[test]
    fn trashed_acquisitions_are_labelled() {
        let labels: Vec<String> = acquisition_options(&plate()).into_iter().map(|option| option.label).collect();
        assert_eq!(labels, ["day 1", "8 (trash)"]);
    }

    #[test]
    fn channel_options_offer_presets_singles_and_merge() {
        let values: Vec<String> = channel_options(&plate(), "7", None)
            .into_iter()
            .map(|option| option.value)
            .collect();
        assert_eq!(values, ["auto", "HOECHST+SYTO+CONC", "1", "2", "3", "1,2,3"]);
    }

    #[test]
    fn unlisted_current_selection_is_kept() {
        let current = ChannelSelection::Pair("2".into(), "3".into());
        let options = channel_options(&plate(), "7", Some(&current));
        assert_eq!(options.last().map(|option| option.value.as_str()), Some("2,3"));
    }
}

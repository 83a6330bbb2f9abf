//! Small controls shared by the toolbar, sidebar and viewer.

use wasm_bindgen::JsCast;
use web_sys::HtmlSelectElement;
use zoon::events::Change;
use zoon::*;

pub const TEXT_COLOR: &str = "rgb(230, 230, 230)";
pub const MUTED_TEXT_COLOR: &str = "rgb(150, 150, 150)";

pub fn tool_button(label: &str, title: &str, on_press: impl FnMut() + 'static) -> impl Element + use<> {
    let (hovered, hovered_signal) = Mutable::new_and_signal(false);
    let title = title.to_string();
    Button::new()
        .s(Padding::new().x(10).y(4))
        .s(RoundedCorners::all(4))
        .s(Font::new().size(13).color(TEXT_COLOR).no_wrap())
        .s(Background::new().color_signal(
            hovered_signal.map_bool(|| "rgb(70, 70, 80)", || "rgb(45, 45, 52)"),
        ))
        .update_raw_el(move |raw_el| raw_el.attr("title", &title))
        .on_hovered_change(move |is_hovered| hovered.set_neq(is_hovered))
        .label(label.to_string())
        .on_press(on_press)
}

/// Toggle button whose highlight follows `active`.
pub fn chip(
    label: String,
    title: String,
    active: impl Signal<Item = bool> + Unpin + 'static,
    on_press: impl FnMut() + 'static,
) -> impl Element {
    Button::new()
        .s(Padding::new().x(8).y(3))
        .s(RoundedCorners::all(10))
        .s(Font::new().size(12).color(TEXT_COLOR).no_wrap())
        .s(Background::new().color_signal(
            active.map_bool(|| "rgb(55, 90, 170)", || "rgb(45, 45, 52)"),
        ))
        .update_raw_el(move |raw_el| raw_el.attr("title", &title))
        .label(label)
        .on_press(on_press)
}

/// One `<option>` of [`native_select`].
#[derive(Debug, Clone, PartialEq)]
pub struct SelectOption {
    pub value: String,
    pub label: String,
    pub title: String,
}

/// Native `<select>`; `on_change` receives the chosen option value.
pub fn native_select(
    options: Vec<SelectOption>,
    selected: Option<String>,
    mut on_change: impl FnMut(String) + 'static,
) -> impl Element {
    RawHtmlEl::new("select")
        .style("background-color", "rgb(45, 45, 52)")
        .style("color", TEXT_COLOR)
        .style("border", "1px solid rgb(70, 70, 80)")
        .style("border-radius", "4px")
        .style("padding", "3px 6px")
        .style("font-size", "13px")
        .children(options.into_iter().map(|option| {
            let is_selected = selected.as_deref() == Some(option.value.as_str());
            let element = RawHtmlEl::new("option")
                .attr("value", &option.value)
                .attr("title", &option.title)
                .child(option.label);
            if is_selected { element.attr("selected", "") } else { element }
        }))
        .event_handler(move |event: Change| {
            let value = event
                .target()
                .and_then(|target| target.dyn_into::<HtmlSelectElement>().ok())
                .map(|select| select.value());
            if let Some(value) = value {
                on_change(value);
            }
        })
}

pub fn caption(text: &str) -> impl Element + use<> {
    El::new()
        .s(Font::new().size(12).color(MUTED_TEXT_COLOR).no_wrap())
        .child(text.to_string())
}

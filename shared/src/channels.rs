//! Channel selections and composite image URLs.

use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

use crate::plate::{Channel, Channels};

/// Served when no composite URL can be built.
pub const PLACEHOLDER_IMAGE_URL: &str = "/_api/public/images/no-image.svg";
/// Path token for an unused plane slot.
pub const UNDEFINED_SLOT: &str = "undefined";
/// Preset name resolving to the first catalogue entry the plate can satisfy.
pub const AUTO_PRESET: &str = "auto";

/// Known dye triads in priority order.
pub const DYE_PRESETS: [(&str, [&str; 3]); 3] = [
    ("HOECHST+MITO+PHAandWGA", ["HOECHST", "MITO", "PHAandWGA"]),
    ("HOECHST+SYTO+CONC", ["HOECHST", "SYTO", "CONC"]),
    ("HOECHST+CONC+MITO", ["HOECHST", "CONC", "MITO"]),
];

#[derive(Serialize, Deserialize, Debug, Clone, PartialEq, Eq, Hash)]
pub enum ChannelSelection {
    Single(String),
    Pair(String, String),
    Triple(String, String, String),
    Preset(String),
}

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum ChannelSelectionError {
    #[error("empty channel selection")]
    Empty,
    #[error("channel selection '{0}' has an empty component")]
    EmptyComponent(String),
    #[error("channel selection '{0}' names more than three channels")]
    TooMany(String),
}

#[derive(Serialize, Deserialize, Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ImageKind {
    Thumbnail,
    Full,
}

impl ImageKind {
    fn endpoint(self) -> &'static str {
        match self {
            Self::Thumbnail => "image-merge-thumb",
            Self::Full => "image-merge",
        }
    }
}

impl FromStr for ChannelSelection {
    type Err = ChannelSelectionError;

    /// Decodes `1`, `1,2`, `1,2,3`, legacy `1-2`, `[3]`, `[1,2,3]` and preset names.
    fn from_str(token: &str) -> Result<Self, Self::Err> {
        let token = token.trim();
        if token.is_empty() {
            return Err(ChannelSelectionError::Empty);
        }
        if is_preset_name(token) {
            return Ok(Self::Preset(token.to_string()));
        }

        let inner = token
            .strip_prefix('[')
            .and_then(|rest| rest.strip_suffix(']'))
            .unwrap_or(token);
        let ids: Vec<String> = inner
            .split([',', '-'])
            .map(|id| id.trim().trim_matches('"').to_string())
            .collect();
        if ids.iter().any(String::is_empty) {
            return Err(ChannelSelectionError::EmptyComponent(token.to_string()));
        }

        match <[String; 3]>::try_from(ids) {
            Ok([a, b, c]) => Ok(Self::Triple(a, b, c)),
            Err(ids) => match ids.as_slice() {
                [a] => Ok(Self::Single(a.clone())),
                [a, b] => Ok(Self::Pair(a.clone(), b.clone())),
                _ => Err(ChannelSelectionError::TooMany(token.to_string())),
            },
        }
    }
}

impl fmt::Display for ChannelSelection {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Single(a) => write!(f, "{a}"),
            Self::Pair(a, b) => write!(f, "{a},{b}"),
            Self::Triple(a, b, c) => write!(f, "{a},{b},{c}"),
            Self::Preset(name) => write!(f, "{name}"),
        }
    }
}

impl ChannelSelection {
    /// Explicitly named channel ids; empty for presets.
    pub fn ids(&self) -> Vec<&str> {
        match self {
            Self::Single(a) => vec![a.as_str()],
            Self::Pair(a, b) => vec![a.as_str(), b.as_str()],
            Self::Triple(a, b, c) => vec![a.as_str(), b.as_str(), c.as_str()],
            Self::Preset(_) => Vec::new(),
        }
    }

    /// Auto preset when the channels satisfy one, else the first three ids.
    pub fn default_for(channels: &[Channel]) -> Option<Self> {
        let table: Channels = channels.iter().map(|c| (c.id.clone(), c.clone())).collect();
        if preset_channel_ids(&table, AUTO_PRESET).is_some() {
            return Some(Self::Preset(AUTO_PRESET.to_string()));
        }
        let mut ids = channels.iter().map(|channel| channel.id.clone());
        match (ids.next(), ids.next(), ids.next()) {
            (Some(a), Some(b), Some(c)) => Some(Self::Triple(a, b, c)),
            (Some(a), Some(b), None) => Some(Self::Pair(a, b)),
            (Some(a), None, _) => Some(Self::Single(a)),
            _ => None,
        }
    }

    pub fn label(&self) -> String {
        match self {
            Self::Single(id) => format!("Channel {id}"),
            Self::Preset(name) if name.eq_ignore_ascii_case(AUTO_PRESET) => "Auto merge".to_string(),
            Self::Preset(name) => name.clone(),
            other => format!("Merge {other}"),
        }
    }
}

fn is_preset_name(token: &str) -> bool {
    token.eq_ignore_ascii_case(AUTO_PRESET)
        || token.contains('+')
        || DYE_PRESETS.iter().any(|(name, _)| name.eq_ignore_ascii_case(token))
}

fn find_by_dye<'a>(channels: &'a Channels, dye: &str) -> Option<&'a Channel> {
    channels.values().find(|channel| channel.dye.eq_ignore_ascii_case(dye))
}

fn ids_for_dyes<'a>(channels: &'a Channels, dyes: &[&str]) -> Option<Vec<&'a str>> {
    dyes.iter()
        .map(|dye| find_by_dye(channels, dye).map(|channel| channel.id.as_str()))
        .collect()
}

/// Channel ids a preset resolves to, in plane order.
pub fn preset_channel_ids<'a>(channels: &'a Channels, name: &str) -> Option<Vec<&'a str>> {
    if name.eq_ignore_ascii_case(AUTO_PRESET) {
        return DYE_PRESETS
            .iter()
            .find_map(|(_, dyes)| ids_for_dyes(channels, dyes));
    }
    let dyes: Vec<&str> = match DYE_PRESETS.iter().find(|(preset, _)| preset.eq_ignore_ascii_case(name)) {
        Some((_, dyes)) => dyes.to_vec(),
        None => name.split('+').map(str::trim).filter(|dye| !dye.is_empty()).collect(),
    };
    if dyes.is_empty() || dyes.len() > 3 {
        return None;
    }
    ids_for_dyes(channels, &dyes)
}

/// Catalogue presets whose three dyes are all present.
pub fn available_presets(channels: &Channels) -> Vec<&'static str> {
    DYE_PRESETS
        .iter()
        .filter(|(_, dyes)| ids_for_dyes(channels, dyes).is_some())
        .map(|(name, _)| *name)
        .collect()
}

/// Composite image URL for one plane, or the placeholder when the selection
/// cannot be resolved against `channels`.
///
/// Unused slots are filled with `undefined`. A referenced channel id that is
/// absent, or has no path, yields the placeholder.
pub fn build_image_url(channels: Option<&Channels>, selection: &ChannelSelection, kind: ImageKind) -> String {
    compose_image_url(channels, selection, kind).unwrap_or_else(|| PLACEHOLDER_IMAGE_URL.to_string())
}

fn compose_image_url(channels: Option<&Channels>, selection: &ChannelSelection, kind: ImageKind) -> Option<String> {
    let channels = channels?;
    let ids = match selection {
        ChannelSelection::Preset(name) => preset_channel_ids(channels, name)?,
        explicit => explicit.ids(),
    };
    let mut slots = Vec::with_capacity(3);
    for id in ids {
        let path = channels.get(id).map(|channel| channel.path.as_str())?;
        if path.is_empty() {
            return None;
        }
        slots.push(path);
    }
    if slots.is_empty() {
        return None;
    }
    slots.resize(3, UNDEFINED_SLOT);

    Some(format!(
        "/api/{}/ch1/{}/ch2/{}/ch3/{}/channels.png",
        kind.endpoint(),
        slots[0],
        slots[1],
        slots[2]
    ))
}

/// Address the browser fetches: composite URLs live on the image server,
/// the placeholder is served by the app itself.
pub fn resolve_image_url(image_base_url: &str, url: &str) -> String {
    if url == PLACEHOLDER_IMAGE_URL {
        url.to_string()
    } else {
        format!("{}{url}", image_base_url.trim_end_matches('/'))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn channel(id: &str, dye: &str, path: &str) -> (String, Channel) {
        let channel = Channel { id: id.into(), dye: dye.into(), path: path.into(), ..Default::default() };
        (id.to_string(), channel)
    }

    fn abc() -> Channels {
        [channel("1", "HOECHST", "a"), channel("2", "MITO", "b"), channel("3", "PHAandWGA", "c")]
            .into_iter()
            .collect()
    }

    fn selection(token: &str) -> ChannelSelection {
        token.parse().unwrap()
    }

    #[test]
    fn full_image_urls_fill_unused_slots() {
        let channels = abc();
        assert_eq!(
            build_image_url(Some(&channels), &selection("1,2,3"), ImageKind::Full),
            "/api/image-merge/ch1/a/ch2/b/ch3/c/channels.png"
        );
        assert_eq!(
            build_image_url(Some(&channels), &selection("1,2"), ImageKind::Full),
            "/api/image-merge/ch1/a/ch2/b/ch3/undefined/channels.png"
        );
        assert_eq!(
            build_image_url(Some(&channels), &selection("1"), ImageKind::Full),
            "/api/image-merge/ch1/a/ch2/undefined/ch3/undefined/channels.png"
        );
    }

    #[test]
    fn thumbnails_use_thumb_endpoint() {
        let channels = abc();
        assert_eq!(
            build_image_url(Some(&channels), &selection("3,1"), ImageKind::Thumbnail),
            "/api/image-merge-thumb/ch1/c/ch2/a/ch3/undefined/channels.png"
        );
    }

    #[test]
    fn unresolvable_selections_fall_back_to_placeholder() {
        let channels = abc();
        assert_eq!(build_image_url(None, &selection("1"), ImageKind::Full), PLACEHOLDER_IMAGE_URL);
        assert_eq!(build_image_url(Some(&channels), &selection("1,9"), ImageKind::Full), PLACEHOLDER_IMAGE_URL);
        assert_eq!(
            build_image_url(Some(&channels), &selection("HOECHST+SYTO+CONC"), ImageKind::Full),
            PLACEHOLDER_IMAGE_URL
        );
        assert_eq!(build_image_url(Some(&Channels::new()), &selection("auto"), ImageKind::Full), PLACEHOLDER_IMAGE_URL);
    }

    #[test]
    fn legacy_tokens_decode_to_tagged_selections() {
        assert_eq!(selection("1-2"), ChannelSelection::Pair("1".into(), "2".into()));
        assert_eq!(selection("[3]"), ChannelSelection::Single("3".into()));
        assert_eq!(selection("[1,2,3]"), ChannelSelection::Triple("1".into(), "2".into(), "3".into()));
        assert_eq!(selection(" grey "), ChannelSelection::Single("grey".into()));
        assert_eq!(selection("Auto"), ChannelSelection::Preset("Auto".into()));
        assert_eq!("".parse::<ChannelSelection>(), Err(ChannelSelectionError::Empty));
        assert!(matches!("1,,2".parse::<ChannelSelection>(), Err(ChannelSelectionError::EmptyComponent(_))));
        assert!(matches!("1,2,3,4".parse::<ChannelSelection>(), Err(ChannelSelectionError::TooMany(_))));
    }

    #[test]
    fn display_re_encodes_canonical_token() {
        assert_eq!(selection("[1,2,3]").to_string(), "1,2,3");
        assert_eq!(selection("1-2").to_string(), "1,2");
    }

    #[test]
    fn presets_resolve_by_dye_in_priority_order() {
        let channels = abc();
        assert_eq!(
            build_image_url(Some(&channels), &selection("auto"), ImageKind::Full),
            "/api/image-merge/ch1/a/ch2/b/ch3/c/channels.png"
        );
        assert_eq!(available_presets(&channels), ["HOECHST+MITO+PHAandWGA"]);

        let mut mixed: Channels = [channel("5", "conc", "e"), channel("7", "hoechst", "h"), channel("8", "MITO", "m")]
            .into_iter()
            .collect();
        assert_eq!(preset_channel_ids(&mixed, AUTO_PRESET), Some(vec!["7", "5", "8"]));
        mixed.shift_remove("5");
        assert_eq!(preset_channel_ids(&mixed, AUTO_PRESET), None);
    }

    #[test]
    fn default_selection_prefers_auto_preset() {
        let channels: Vec<Channel> = abc().into_values().collect();
        assert_eq!(ChannelSelection::default_for(&channels), Some(ChannelSelection::Preset(AUTO_PRESET.into())));
        let plain = vec![channel("1", "X", "x").1, channel("2", "Y", "y").1];
        assert_eq!(ChannelSelection::default_for(&plain), Some(ChannelSelection::Pair("1".into(), "2".into())));
        assert_eq!(ChannelSelection::default_for(&[]), None);
    }

    #[test]
    fn composite_urls_are_resolved_against_image_server() {
        let url = build_image_url(Some(&abc()), &selection("1"), ImageKind::Full);
        assert_eq!(
            resolve_image_url("http://images:8000/", &url),
            "http://images:8000/api/image-merge/ch1/a/ch2/undefined/ch3/undefined/channels.png"
        );
        assert_eq!(resolve_image_url("http://images:8000", PLACEHOLDER_IMAGE_URL), PLACEHOLDER_IMAGE_URL);
    }
}

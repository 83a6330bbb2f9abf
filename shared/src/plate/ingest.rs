use std::collections::BTreeMap;

use indexmap::IndexMap;
use serde_json::{Map, Value};

use super::layout::WellLayout;
use super::{Acquisition, Channel, DEFAULT_DEPTH, Plate, Site, Well, ZPlane};

#[derive(Debug, thiserror::Error)]
pub enum PlateError {
    #[error("plate response is not valid JSON: {0}")]
    InvalidJson(#[from] serde_json::Error),
    #[error("plate response is not an object")]
    NotAnObject,
    #[error("plate '{0}' not present in response")]
    MissingPlate(String),
}

/// Normalizes one plate-detail response into the canonical schema.
///
/// Accepts a bare plate object or the `{"data": {"plates": {barcode: plate}}}`
/// envelope, `acquisitions` or the older `timepoints` key, and sites with or
/// without a depth layer. Acquisitions are keyed by their resolved id;
/// wells, sites and channels by their map key.
pub fn parse_plate_response(json: &str, barcode: &str) -> Result<Plate, PlateError> {
    let value: Value = serde_json::from_str(json)?;
    let (plate, barcode) = select_plate(&value, barcode)?;
    Ok(normalize_plate(plate, &barcode))
}

/// The plate object plus the barcode it was filed under: the envelope key
/// that matched, or `barcode` for a bare plate object.
fn select_plate<'a>(value: &'a Value, barcode: &str) -> Result<(&'a Map<String, Value>, String), PlateError> {
    let root = value.as_object().ok_or(PlateError::NotAnObject)?;

    let plates = root
        .get("data")
        .and_then(|data| data.get("plates"))
        .or_else(|| root.get("plates"))
        .and_then(Value::as_object);

    match plates {
        Some(plates) => plates
            .get_key_value(barcode)
            .or_else(|| plates.iter().next())
            .and_then(|(key, plate)| Some((plate.as_object()?, key.clone())))
            .ok_or_else(|| PlateError::MissingPlate(barcode.to_string())),
        None => Ok((root, barcode.to_string())),
    }
}

fn normalize_plate(raw: &Map<String, Value>, barcode: &str) -> Plate {
    let barcode = ["barcode", "plate_barcode", "id"]
        .iter()
        .find_map(|key| raw.get(*key).and_then(id_string))
        .unwrap_or_else(|| barcode.to_string());

    let acquisitions: IndexMap<String, Acquisition> = raw
        .get("acquisitions")
        .or_else(|| raw.get("timepoints"))
        .map(|acquisitions| {
            entries(acquisitions)
                .map(|(key, acquisition)| {
                    let acquisition = normalize_acquisition(&key, acquisition);
                    (acquisition.id.clone(), acquisition)
                })
                .collect()
        })
        .unwrap_or_default();

    let layout: IndexMap<String, Vec<WellLayout>> = raw
        .get("layout")
        .map(|layout| {
            entries(layout)
                .map(|(well, records)| (well, normalize_layout(records)))
                .collect()
        })
        .unwrap_or_default();

    Plate { barcode, layout, acquisitions }
}

fn normalize_acquisition(key: &str, raw: &Value) -> Acquisition {
    let wells: IndexMap<String, Well> = raw
        .get("wells")
        .map(|wells| {
            entries(wells)
                .map(|(key, well)| {
                    let well = normalize_well(&key, well);
                    (key, well)
                })
                .collect()
        })
        .unwrap_or_default();

    Acquisition {
        id: field_string(raw, &["id", "acquisition_id", "plate_acquisition_id"]).unwrap_or_else(|| key.to_string()),
        name: field_string(raw, &["name"]).unwrap_or_default(),
        project: field_string(raw, &["project"]).unwrap_or_default(),
        hidden: raw.get("hidden").is_some_and(truthy),
        folder: field_string(raw, &["folder"]).unwrap_or_default(),
        wells,
    }
}

fn normalize_well(key: &str, raw: &Value) -> Well {
    let sites: IndexMap<String, Site> = raw
        .get("sites")
        .map(|sites| {
            entries(sites)
                .map(|(key, site)| {
                    let site = normalize_site(&key, site);
                    (key, site)
                })
                .collect()
        })
        .unwrap_or_default();

    Well { id: key.to_string(), sites }
}

fn normalize_site(key: &str, raw: &Value) -> Site {
    let depths: IndexMap<String, ZPlane> = match raw.get("z_positions").or_else(|| raw.get("depths")) {
        Some(depths) => entries(depths)
            .map(|(depth, plane)| (depth, normalize_plane(plane.get("channels"))))
            .collect(),
        None => match raw.get("channels") {
            Some(channels) => IndexMap::from([(DEFAULT_DEPTH.to_string(), normalize_plane(Some(channels)))]),
            None => IndexMap::new(),
        },
    };

    Site { id: key.to_string(), depths }
}

fn normalize_plane(channels: Option<&Value>) -> ZPlane {
    let channels: IndexMap<String, Channel> = channels
        .map(|channels| {
            entries(channels)
                .map(|(key, channel)| {
                    let channel = normalize_channel(&key, channel);
                    (key, channel)
                })
                .collect()
        })
        .unwrap_or_default();
    ZPlane { channels }
}

fn normalize_channel(key: &str, raw: &Value) -> Channel {
    let image_meta = raw
        .get("image_meta")
        .and_then(Value::as_object)
        .map(|meta| {
            meta.iter()
                .map(|(key, value)| (key.clone(), scalar_string(value)))
                .collect::<BTreeMap<_, _>>()
        })
        .unwrap_or_default();

    Channel {
        id: key.to_string(),
        dye: field_string(raw, &["dye"]).unwrap_or_default(),
        path: field_string(raw, &["path"]).unwrap_or_default(),
        image_meta,
    }
}

fn normalize_layout(records: &Value) -> Vec<WellLayout> {
    match records {
        Value::Array(records) => records.iter().filter_map(WellLayout::from_value).collect(),
        Value::Object(_) => WellLayout::from_value(records).into_iter().collect(),
        _ => Vec::new(),
    }
}

// ===== VALUE HELPERS =====

/// Key-value pairs of an object, or index-keyed items of an array.
fn entries(value: &Value) -> Box<dyn Iterator<Item = (String, &Value)> + '_> {
    match value {
        Value::Object(map) => Box::new(map.iter().map(|(key, value)| (key.clone(), value))),
        Value::Array(items) => Box::new(items.iter().enumerate().map(|(index, item)| {
            let key = item.get("id").and_then(id_string).unwrap_or_else(|| index.to_string());
            (key, item)
        })),
        _ => Box::new(std::iter::empty()),
    }
}

pub(super) fn field_string(raw: &Value, keys: &[&str]) -> Option<String> {
    keys.iter().find_map(|key| raw.get(*key).and_then(id_string))
}

/// Strings and numbers as their textual form; anything else is absent.
fn id_string(value: &Value) -> Option<String> {
    match value {
        Value::String(text) => Some(text.clone()),
        Value::Number(number) => Some(number.to_string()),
        _ => None,
    }
}

fn scalar_string(value: &Value) -> String {
    match value {
        Value::String(text) => text.clone(),
        Value::Null => String::new(),
        other => other.to_string(),
    }
}

fn truthy(value: &Value) -> bool {
    match value {
        Value::Bool(flag) => *flag,
        Value::Number(number) => number.as_f64().is_some_and(|n| n != 0.0),
        Value::String(text) => matches!(text.to_ascii_lowercase().as_str(), "true" | "1" | "yes"),
        _ => false,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn historical_envelope_with_timepoints_is_normalized() {
        let json = r#"{"data": {"plates": {"P009": {
            "id": "P009",
            "timepoints": {"1": {"wells": {"A01": {"sites": {"1": {"channels": {
                "1": {"dye": "HOECHST", "path": "/img/a01-s1-w1.tif"}}}}}}}}
        }}}}"#;
        let plate = parse_plate_response(json, "P009").unwrap();

        assert_eq!(plate.barcode, "P009");
        let depths = plate.depths("1", "A01", "1");
        assert_eq!(depths.keys().collect::<Vec<_>>(), [DEFAULT_DEPTH]);
        let channel = &plate.channels("1", "A01", "1", None)["1"];
        assert_eq!(channel.id, "1");
        assert_eq!(channel.path, "/img/a01-s1-w1.tif");
    }

    #[test]
    fn numeric_ids_become_strings() {
        let json = r#"{"barcode": 4711, "acquisitions": {"12": {"id": 12, "hidden": 1,
            "wells": {"B02": {"sites": {"3": {"id": 3, "z_positions": {"2": {"channels": {
                "5": {"id": 5, "dye": "MITO", "path": "x", "image_meta": {"size": 2048, "note": null}}}}}}}}}}}}"#;
        let plate = parse_plate_response(json, "ignored").unwrap();

        assert_eq!(plate.barcode, "4711");
        let acquisition = plate.acquisition("12").unwrap();
        assert_eq!(acquisition.id, "12");
        assert!(acquisition.hidden);
        let channel = &plate.channels("12", "B02", "3", Some("2"))["5"];
        assert_eq!(channel.image_meta["size"], "2048");
        assert_eq!(channel.image_meta["note"], "");
    }

    #[test]
    fn mistyped_fields_degrade_to_defaults() {
        let json = r#"{"barcode": "P1", "acquisitions": {"1": {"wells": "oops", "name": []}}}"#;
        let plate = parse_plate_response(json, "P1").unwrap();
        let acquisition = plate.acquisition("1").unwrap();
        assert_eq!(acquisition.id, "1");
        assert!(acquisition.name.is_empty());
        assert!(acquisition.wells.is_empty());
    }

    #[test]
    fn envelope_falls_back_to_first_plate() {
        let json = r#"{"data": {"plates": {"OTHER": {"acquisitions": {}}}}}"#;
        let plate = parse_plate_response(json, "P1").unwrap();
        assert_eq!(plate.barcode, "OTHER");
    }

    #[test]
    fn acquisitions_are_keyed_by_their_resolved_id() {
        let json = r#"{"barcode": "P1", "timepoints": {"1": {"id": 3210,
            "wells": {"A01": {"id": "ignored", "sites": {"1": {"channels": {"2": {"channel": 9, "path": "x"}}}}}}}}}"#;
        let mut plate = parse_plate_response(json, "P1").unwrap();

        assert_eq!(plate.acquisition_ids(), ["3210"]);
        assert_eq!(plate.acquisition("3210").map(|acquisition| acquisition.id.as_str()), Some("3210"));
        assert!(plate.wells("1").is_empty());
        let channel = &plate.channels("3210", "A01", "1", None)["2"];
        assert_eq!(channel.id, "2");
        assert_eq!(plate.wells("3210")["A01"].id, "A01");
        assert!(plate.mark_acquisition_trashed("3210"));
    }

    #[test]
    fn non_object_responses_fail() {
        assert!(matches!(parse_plate_response("[1, 2]", "P1"), Err(PlateError::NotAnObject)));
        assert!(matches!(parse_plate_response("{", "P1"), Err(PlateError::InvalidJson(_))));
        assert!(matches!(
            parse_plate_response(r#"{"data": {"plates": {"P1": 5}}}"#, "P1"),
            Err(PlateError::MissingPlate(_))
        ));
    }

    #[test]
    fn acquisition_order_is_preserved() {
        let json = r#"{"acquisitions": {"30": {}, "4": {}, "17": {}}}"#;
        let plate = parse_plate_response(json, "P1").unwrap();
        assert_eq!(plate.acquisition_ids(), ["30", "4", "17"]);
    }
}

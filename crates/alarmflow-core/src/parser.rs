// ── Text parser capability ──
//
// Parsers turn normalized OCR lines into an `Operation`. Dispatch
// centers each have their own fax layout, so the engine only knows the
// trait. `KeywordParser` handles the common `KEY: value` layout.

use chrono::NaiveDateTime;

use crate::error::CoreError;
use crate::model::{Operation, OperationResource, PropertyLocation};

/// Converts already-normalized text lines into an operation.
pub trait TextParser: Send + Sync {
    fn parse(&self, lines: &[String]) -> Result<Operation, CoreError>;
}

const TIMESTAMP_FORMATS: &[&str] = &[
    "%d.%m.%Y %H:%M:%S",
    "%d.%m.%Y %H:%M",
    "%d.%m.%y %H:%M",
    "%Y-%m-%d %H:%M:%S",
    "%Y-%m-%dT%H:%M:%S",
];

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Section {
    None,
    Comment,
}

/// Generic parser for faxes laid out as `KEY: value` lines.
///
/// Unknown keys are kept in [`Operation::custom_data`]. Lines without a
/// key continue a preceding `BEMERKUNG`/`HINWEIS` block.
#[derive(Debug, Clone, Copy, Default)]
pub struct KeywordParser;

impl KeywordParser {
    pub fn new() -> Self {
        Self
    }
}

impl TextParser for KeywordParser {
    fn parse(&self, lines: &[String]) -> Result<Operation, CoreError> {
        let mut op = Operation::new();
        let mut section = Section::None;
        let mut recognized = 0_usize;

        for raw in lines {
            let line = raw.trim();
            if line.is_empty() {
                continue;
            }

            let Some((key, value)) = split_key(line) else {
                if section == Section::Comment {
                    append_line(&mut op.comment, line);
                }
                continue;
            };

            if !apply_field(&mut op, &key, value) {
                if section == Section::Comment {
                    append_line(&mut op.comment, line);
                } else if !value.is_empty() {
                    op.custom_data.insert(key, serde_json::Value::from(value));
                }
                continue;
            }

            recognized += 1;
            section = if matches!(key.as_str(), "BEMERKUNG" | "HINWEIS") {
                Section::Comment
            } else {
                Section::None
            };
        }

        if recognized == 0 {
            return Err(CoreError::Parse {
                message: format!("no known field in {} line(s)", lines.len()),
            });
        }
        Ok(op)
    }
}

/// Split `KEY: value` into an upper-cased key and a trimmed value.
fn split_key(line: &str) -> Option<(String, &str)> {
    let (key, value) = line.split_once(':')?;
    let key = key.trim();
    if key.is_empty() || key.chars().any(|c| c.is_ascii_digit()) {
        return None;
    }
    Some((key.to_uppercase(), value.trim()))
}

/// Store a known field. Returns `false` for unknown keys.
fn apply_field(op: &mut Operation, key: &str, value: &str) -> bool {
    let text = || (!value.is_empty()).then(|| value.to_owned());

    match key {
        "EINSATZNUMMER" | "EINSATZNR" => op.operation_number = text(),
        "MITTEILER" => op.messenger = text(),
        "EINSATZORT" => fill_location(&mut op.einsatzort, value),
        "ZIELORT" => fill_location(&mut op.zielort, value),
        "STRASSE" => set_street(&mut op.einsatzort, value),
        "HAUSNUMMER" | "HAUS-NR." | "HAUS-NR" => op.einsatzort.street_number = text(),
        "ORT" => set_city(&mut op.einsatzort, value),
        "PLZ" => op.einsatzort.zip_code = text(),
        "OBJEKT" => op.einsatzort.property = text(),
        "KREUZUNG" => op.einsatzort.intersection = text(),
        "STICHWORT" => op.keywords.keyword = text(),
        "STICHWORT B" => op.keywords.b = text(),
        "STICHWORT R" => op.keywords.r = text(),
        "STICHWORT S" => op.keywords.s = text(),
        "STICHWORT T" => op.keywords.t = text(),
        "EINSATZSTICHWORT" => op.keywords.emergency_keyword = text(),
        "MELDEBILD" => op.picture = text(),
        "PRIORITÄT" | "PRIORITAET" => op.priority = text(),
        "EINSATZPLAN" => op.operation_plan = text(),
        "BEMERKUNG" | "HINWEIS" => {
            if !value.is_empty() {
                append_line(&mut op.comment, value);
            }
        }
        "ZEIT" | "ALARMZEIT" => op.timestamp = parse_timestamp(value),
        "EINSATZMITTEL" | "NAME" => {
            if !value.is_empty() {
                op.resources.push(OperationResource {
                    full_name: value.to_owned(),
                    ..OperationResource::default()
                });
            }
        }
        "GERÄT" | "GERAET" => {
            if let Some(resource) = op.resources.last_mut().filter(|_| !value.is_empty()) {
                resource.requested_equipment.push(value.to_owned());
            }
        }
        _ => return false,
    }
    true
}

fn append_line(target: &mut Option<String>, line: &str) {
    match target {
        Some(existing) => {
            existing.push('\n');
            existing.push_str(line);
        }
        None => *target = Some(line.to_owned()),
    }
}

/// `Main St 5` becomes street `Main St`, number `5`.
fn set_street(location: &mut PropertyLocation, value: &str) {
    if value.is_empty() {
        return;
    }
    match value.rsplit_once(char::is_whitespace) {
        Some((street, number)) if number.starts_with(|c: char| c.is_ascii_digit()) => {
            location.street = Some(street.trim().to_owned());
            location.street_number = Some(number.to_owned());
        }
        _ => location.street = Some(value.to_owned()),
    }
}

/// `12345 Springfield` becomes zip `12345`, city `Springfield`.
fn set_city(location: &mut PropertyLocation, value: &str) {
    if value.is_empty() {
        return;
    }
    match value.split_once(char::is_whitespace) {
        Some((zip, city)) if zip.len() == 5 && zip.chars().all(|c| c.is_ascii_digit()) => {
            location.zip_code = Some(zip.to_owned());
            location.city = Some(city.trim().to_owned());
        }
        _ => location.city = Some(value.to_owned()),
    }
}

/// `EINSATZORT` carries either `street number` or `street number, zip city`.
fn fill_location(location: &mut PropertyLocation, value: &str) {
    if value.is_empty() {
        return;
    }
    location.location = Some(value.to_owned());
    match value.split_once(',') {
        Some((street, city)) => {
            set_street(location, street.trim());
            set_city(location, city.trim());
        }
        None => set_street(location, value),
    }
}

fn parse_timestamp(value: &str) -> Option<NaiveDateTime> {
    TIMESTAMP_FORMATS
        .iter()
        .find_map(|fmt| NaiveDateTime::parse_from_str(value, fmt).ok())
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    fn parse(raw: &[&str]) -> Result<Operation, CoreError> {
        let lines: Vec<String> = raw.iter().map(|s| (*s).to_owned()).collect();
        KeywordParser::new().parse(&lines)
    }

    #[test]
    fn maps_messenger_and_location() {
        let op = parse(&["MITTEILER: Fire Dept", "EINSATZORT: Main St 5"]).unwrap();
        assert_eq!(op.messenger.as_deref(), Some("Fire Dept"));
        assert_eq!(op.einsatzort.street.as_deref(), Some("Main St"));
        assert_eq!(op.einsatzort.street_number.as_deref(), Some("5"));
        assert_eq!(op.einsatzort.location.as_deref(), Some("Main St 5"));
    }

    #[test]
    fn location_with_city_part() {
        let op = parse(&["Einsatzort: Hauptstraße 12a, 12345 Musterstadt"]).unwrap();
        assert_eq!(op.einsatzort.zip_code.as_deref(), Some("12345"));
        assert_eq!(op.einsatzort.city.as_deref(), Some("Musterstadt"));
        assert_eq!(op.einsatzort.street_number.as_deref(), Some("12a"));
        assert!(op.einsatzort.is_meaningful());
    }

    #[test]
    fn comment_continues_over_unkeyed_lines() {
        let op = parse(&[
            "EINSATZNUMMER: B 1.2 4711",
            "BEMERKUNG: Rauch aus Dach",
            "Anrufer wartet vor Ort",
            "Tel: 0123",
            "STICHWORT: B3",
        ])
        .unwrap();
        assert_eq!(
            op.comment.as_deref(),
            Some("Rauch aus Dach\nAnrufer wartet vor Ort\nTel: 0123")
        );
        assert_eq!(op.keywords.keyword.as_deref(), Some("B3"));
        assert!(op.custom_data.is_empty());
    }

    #[test]
    fn resources_collect_equipment() {
        let op = parse(&["EINSATZMITTEL: FL Musterstadt 1/44", "GERÄT: Atemschutz", "NAME: RTW 1"])
            .unwrap();
        assert_eq!(op.resources.len(), 2);
        assert_eq!(op.resources[0].requested_equipment, vec!["Atemschutz".to_owned()]);
        assert_eq!(op.resources[1].full_name, "RTW 1");
    }

    #[test]
    fn timestamp_is_parsed_or_left_unset() {
        let op = parse(&["ALARMZEIT: 12.03.2024 14:22:10"]).unwrap();
        assert_eq!(
            op.timestamp.map(|t| t.to_string()).as_deref(),
            Some("2024-03-12 14:22:10")
        );

        let op = parse(&["ZEIT: gestern", "MITTEILER: ILS"]).unwrap();
        assert!(op.timestamp.is_none());
    }

    #[test]
    fn unknown_keys_land_in_custom_data() {
        let op = parse(&["MITTEILER: ILS", "FUNKRUFNAME: Florian 1"]).unwrap();
        assert_eq!(
            op.custom_data("FUNKRUFNAME"),
            Some(&serde_json::Value::from("Florian 1"))
        );
    }

    #[test]
    fn text_without_fields_is_a_parse_error() {
        assert!(matches!(parse(&["just noise", ""]), Err(CoreError::Parse { .. })));
    }
}

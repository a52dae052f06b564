use chrono::{DateTime, NaiveDateTime};
use tracing::trace;

use crate::constants::UNKNOWN_TEAM;
use crate::schema::{ColumnMap, columns, detect_schema, split_record};
use crate::snapshot::{Snapshot, Vec3};

/// Accepted layouts for textual timestamps without a zone (read as UTC)
const NAIVE_TIMESTAMP_FORMATS: [&str; 2] = ["%Y-%m-%d %H:%M:%S%.f", "%Y-%m-%dT%H:%M:%S%.f"];

/// Field lookup by column name with type-appropriate defaults.
struct Fields<'a> {
    fields: &'a [&'a str],
    columns: &'a ColumnMap,
}

impl<'a> Fields<'a> {
    fn raw(&self, name: &str) -> Option<&'a str> {
        let index = self.columns.index(name)?;
        self.fields.get(index).map(|field| field.trim())
    }

    fn text(&self, name: &str) -> String {
        self.raw(name).unwrap_or_default().to_string()
    }

    fn optional_text(&self, name: &str) -> Option<String> {
        self.raw(name)
            .filter(|value| !value.is_empty())
            .map(str::to_string)
    }

    fn float(&self, name: &str) -> f32 {
        self.raw(name).map(parse_float).unwrap_or(0.0)
    }

    fn int(&self, name: &str) -> i32 {
        self.raw(name).map(parse_int).unwrap_or(0)
    }

    fn count(&self, name: &str) -> u32 {
        self.int(name).max(0) as u32
    }

    fn flag(&self, name: &str) -> bool {
        self.raw(name).is_some_and(parse_bool)
    }

    fn team(&self, name: &str) -> i32 {
        self.raw(name).map(parse_team).unwrap_or(UNKNOWN_TEAM)
    }

    fn timestamp(&self, name: &str) -> f64 {
        self.raw(name).map(parse_timestamp).unwrap_or(0.0)
    }
}

/// Parse a float, yielding zero for anything unparseable or non-finite.
pub fn parse_float(value: &str) -> f32 {
    value
        .trim()
        .parse::<f32>()
        .ok()
        .filter(|v| v.is_finite())
        .unwrap_or(0.0)
}

/// Parse an integer. Values written as floats (`"3.0"`) are truncated.
pub fn parse_int(value: &str) -> i32 {
    let value = value.trim();
    value
        .parse::<i32>()
        .ok()
        .or_else(|| {
            value
                .parse::<f64>()
                .ok()
                .filter(|v| v.is_finite())
                .map(|v| v as i32)
        })
        .unwrap_or(0)
}

/// `true`, `1` and `yes` (any case) are true; everything else is false.
pub fn parse_bool(value: &str) -> bool {
    let value = value.trim();
    ["true", "1", "yes"]
        .iter()
        .any(|token| value.eq_ignore_ascii_case(token))
}

/// Team colors map to their index; otherwise the raw integer, or -1.
pub fn parse_team(value: &str) -> i32 {
    let lower = value.trim().to_ascii_lowercase();
    const COLORS: [(&str, i32); 4] = [("red", 0), ("blue", 1), ("green", 2), ("orange", 3)];
    if let Some((_, team)) = COLORS.iter().find(|(color, _)| lower.contains(color)) {
        return *team;
    }
    lower.parse::<i32>().unwrap_or(UNKNOWN_TEAM)
}

/// Seconds as a plain number, an RFC 3339 date-time, or a zone-less date-time
/// taken as UTC. Anything else is zero.
pub fn parse_timestamp(value: &str) -> f64 {
    let value = value.trim();
    if value.is_empty() {
        return 0.0;
    }
    if let Ok(seconds) = value.parse::<f64>() {
        return if seconds.is_finite() { seconds } else { 0.0 };
    }
    if let Ok(date_time) = DateTime::parse_from_rfc3339(value) {
        return date_time.timestamp_micros() as f64 / 1_000_000.0;
    }
    for format in NAIVE_TIMESTAMP_FORMATS {
        if let Ok(date_time) = NaiveDateTime::parse_from_str(value, format) {
            return date_time.and_utc().timestamp_micros() as f64 / 1_000_000.0;
        }
    }
    0.0
}

/// Convert one record into a [`Snapshot`].
///
/// Missing or out-of-range columns take defaults. The record is rejected only
/// when the player name is empty or is the header token itself.
pub fn parse_record(fields: &[&str], columns: &ColumnMap) -> Option<Snapshot> {
    let fields = Fields { fields, columns };

    let name = fields.text(columns::PLAYER_NAME);
    if name.is_empty() || name.eq_ignore_ascii_case(columns::PLAYER_NAME) {
        return None;
    }

    let respawn_timer = fields.float(columns::RESPAWN_TIMER);
    let dead = fields.flag(columns::IS_DEAD) || respawn_timer > 0.0;

    Some(Snapshot {
        map: fields.text(columns::MAP),
        game_type: fields.text(columns::GAME_TYPE),
        name,
        player_index: fields.int(columns::PLAYER_INDEX),
        platform_id: fields.optional_text(columns::XBOX_ID),
        machine_id: fields.optional_text(columns::MACHINE_ID),
        team: fields.team(columns::TEAM),
        emblem_foreground: fields.int(columns::EMBLEM_FG),
        emblem_background: fields.int(columns::EMBLEM_BG),
        primary_color: fields.int(columns::PRIMARY_COLOR),
        secondary_color: fields.int(columns::SECONDARY_COLOR),
        timestamp: fields.timestamp(columns::TIMESTAMP),
        position: Vec3::new(
            fields.float(columns::POS_X),
            fields.float(columns::POS_Y),
            fields.float(columns::POS_Z),
        ),
        velocity: Vec3::new(
            fields.float(columns::VEL_X),
            fields.float(columns::VEL_Y),
            fields.float(columns::VEL_Z),
        ),
        speed: fields.float(columns::SPEED),
        yaw: fields.float(columns::YAW),
        pitch: fields.float(columns::PITCH),
        yaw_degrees: fields.float(columns::YAW_DEG),
        pitch_degrees: fields.float(columns::PITCH_DEG),
        health: fields.float(columns::HEALTH),
        shield: fields.float(columns::SHIELD),
        crouching: fields.flag(columns::IS_CROUCHING),
        crouch_blend: fields.float(columns::CROUCH_BLEND),
        airborne: fields.flag(columns::IS_AIRBORNE),
        airborne_ticks: fields.int(columns::AIRBORNE_TICKS),
        weapon_slot: fields.int(columns::WEAPON_SLOT),
        weapon: fields.text(columns::WEAPON),
        frag_grenades: fields.int(columns::FRAG_GRENADES),
        plasma_grenades: fields.int(columns::PLASMA_GRENADES),
        kills: fields.count(columns::KILLS),
        deaths: fields.count(columns::DEATHS),
        assists: fields.count(columns::ASSISTS),
        respawn_timer,
        dead,
        event: fields.text(columns::EVENT),
    })
}

/// Outcome of feeding one record to a [`RecordDecoder`].
#[derive(Debug, Clone, PartialEq)]
pub enum Decoded {
    /// Empty line
    Blank,
    /// The first record was a header row and now defines the columns
    Header,
    /// The record carried no usable player name
    Rejected,
    Record(Snapshot),
}

/// Stateful decoder for one feed or file: detects the schema on the first
/// non-blank record, then parses every following record as data.
#[derive(Debug, Default)]
pub struct RecordDecoder {
    columns: Option<ColumnMap>,
}

impl RecordDecoder {
    pub fn new() -> Self {
        Self::default()
    }

    /// Column mapping, once the first record has been seen
    pub fn columns(&self) -> Option<&ColumnMap> {
        self.columns.as_ref()
    }

    pub fn decode_line(&mut self, line: &str) -> Decoded {
        let fields = split_record(line);
        self.decode_fields(&fields)
    }

    pub fn decode_fields(&mut self, fields: &[&str]) -> Decoded {
        if fields.iter().all(|field| field.is_empty()) {
            return Decoded::Blank;
        }

        let first_record = self.columns.is_none();
        let columns = self.columns.get_or_insert_with(|| detect_schema(fields));
        if first_record && columns.is_header() {
            trace!(columns = columns.len(), "Detected header row");
            return Decoded::Header;
        }

        match parse_record(fields, columns) {
            Some(snapshot) => Decoded::Record(snapshot),
            None => Decoded::Rejected,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::schema::DEFAULT_COLUMNS;

    fn default_row(overrides: &[(&str, &str)]) -> String {
        DEFAULT_COLUMNS
            .iter()
            .map(|column| {
                overrides
                    .iter()
                    .find(|(name, _)| name == column)
                    .map(|(_, value)| value.to_string())
                    .unwrap_or_else(|| match *column {
                        columns::TIMESTAMP => "2024-05-01 18:22:03.500".to_string(),
                        columns::PLAYER_NAME => "Alpha".to_string(),
                        _ => "0".to_string(),
                    })
            })
            .collect::<Vec<_>>()
            .join(",")
    }

    #[test]
    fn test_respawn_timer_forces_dead() {
        let line = default_row(&[(columns::IS_DEAD, "false"), (columns::RESPAWN_TIMER, "2.5")]);
        let fields = split_record(&line);
        let snapshot = parse_record(&fields, &ColumnMap::default_order()).unwrap();
        assert!(snapshot.dead);
        assert_eq!(snapshot.respawn_timer, 2.5);
    }

    #[test]
    fn test_explicit_dead_without_timer() {
        let line = default_row(&[(columns::IS_DEAD, "Yes")]);
        let fields = split_record(&line);
        let snapshot = parse_record(&fields, &ColumnMap::default_order()).unwrap();
        assert!(snapshot.dead);
    }

    #[test]
    fn test_missing_columns_default() {
        let columns = ColumnMap::from_header(&["playername", "kills"]);
        let snapshot = parse_record(&["Bravo", "7"], &columns).unwrap();
        assert_eq!(snapshot.name, "Bravo");
        assert_eq!(snapshot.kills, 7);
        assert_eq!(snapshot.team, UNKNOWN_TEAM);
        assert_eq!(snapshot.position, Vec3::ZERO);
        assert_eq!(snapshot.timestamp, 0.0);
        assert!(!snapshot.dead);
        assert!(snapshot.platform_id.is_none());
    }

    #[test]
    fn test_out_of_range_column_defaults() {
        let columns = ColumnMap::from_header(&["playername", "posx", "posy", "posz"]);
        let snapshot = parse_record(&["Bravo", "1.5"], &columns).unwrap();
        assert_eq!(snapshot.position, Vec3::new(1.5, 0.0, 0.0));
    }

    #[test]
    fn test_rejects_empty_and_header_name() {
        let columns = ColumnMap::from_header(&["playername"]);
        assert!(parse_record(&[""], &columns).is_none());
        assert!(parse_record(&["PlayerName"], &columns).is_none());
        assert!(parse_record(&[], &columns).is_none());
    }

    #[test]
    fn test_team_parsing() {
        assert_eq!(parse_team("Red"), 0);
        assert_eq!(parse_team("team_blue"), 1);
        assert_eq!(parse_team("GREEN"), 2);
        assert_eq!(parse_team("orange"), 3);
        assert_eq!(parse_team("5"), 5);
        assert_eq!(parse_team("purple"), UNKNOWN_TEAM);
        assert_eq!(parse_team(""), UNKNOWN_TEAM);
    }

    #[test]
    fn test_numbers_default_to_zero() {
        assert_eq!(parse_float("abc"), 0.0);
        assert_eq!(parse_float("NaN"), 0.0);
        assert_eq!(parse_float(" -3.25 "), -3.25);
        assert_eq!(parse_int("x"), 0);
        assert_eq!(parse_int("4.0"), 4);
    }

    #[test]
    fn test_bool_parsing() {
        assert!(parse_bool("TRUE"));
        assert!(parse_bool("1"));
        assert!(parse_bool("yes"));
        assert!(!parse_bool("no"));
        assert!(!parse_bool("2"));
    }

    #[test]
    fn test_timestamp_formats() {
        assert_eq!(parse_timestamp("12.5"), 12.5);
        assert_eq!(parse_timestamp("1970-01-01 00:00:10.250"), 10.25);
        assert_eq!(parse_timestamp("1970-01-01T00:01:00Z"), 60.0);
        assert_eq!(parse_timestamp("1970-01-01T00:00:05"), 5.0);
        assert_eq!(parse_timestamp("garbage"), 0.0);
    }

    #[test]
    fn test_decoder_with_header() {
        let mut decoder = RecordDecoder::new();
        assert_eq!(decoder.decode_line("PlayerName,Kills"), Decoded::Header);
        match decoder.decode_line("Charlie,3") {
            Decoded::Record(snapshot) => {
                assert_eq!(snapshot.name, "Charlie");
                assert_eq!(snapshot.kills, 3);
            }
            other => panic!("unexpected {:?}", other),
        }
        // A repeated header later in the stream is treated as data and rejected
        assert_eq!(decoder.decode_line("PlayerName,Kills"), Decoded::Rejected);
    }

    #[test]
    fn test_decoder_without_header() {
        let mut decoder = RecordDecoder::new();
        assert_eq!(decoder.decode_line(""), Decoded::Blank);
        assert!(decoder.columns().is_none());

        let line = default_row(&[(columns::KILLS, "2")]);
        match decoder.decode_line(&line) {
            Decoded::Record(snapshot) => assert_eq!(snapshot.kills, 2),
            other => panic!("unexpected {:?}", other),
        }
        assert!(!decoder.columns().unwrap().is_header());
    }
}

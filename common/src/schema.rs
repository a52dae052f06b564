//! Column layout of the comma-separated telemetry format.
//!
//! A feed or file may open with a header row naming its columns. When it does
//! not, the fixed [`DEFAULT_COLUMNS`] order applies. Detection looks at the
//! first record only, once per feed.

use std::collections::HashMap;

/// Column names, lowercase. Header rows are matched case-insensitively.
pub mod columns {
    pub const TIMESTAMP: &str = "timestamp";
    pub const MAP: &str = "map";
    pub const GAME_TYPE: &str = "gametype";
    pub const PLAYER_INDEX: &str = "playerindex";
    pub const PLAYER_NAME: &str = "playername";
    pub const TEAM: &str = "team";
    pub const XBOX_ID: &str = "xboxid";
    pub const MACHINE_ID: &str = "machineid";
    pub const EMBLEM_FG: &str = "emblemfg";
    pub const EMBLEM_BG: &str = "emblembg";
    pub const PRIMARY_COLOR: &str = "primarycolor";
    pub const SECONDARY_COLOR: &str = "secondarycolor";
    pub const POS_X: &str = "posx";
    pub const POS_Y: &str = "posy";
    pub const POS_Z: &str = "posz";
    pub const VEL_X: &str = "velx";
    pub const VEL_Y: &str = "vely";
    pub const VEL_Z: &str = "velz";
    pub const SPEED: &str = "speed";
    pub const YAW: &str = "yaw";
    pub const PITCH: &str = "pitch";
    pub const YAW_DEG: &str = "yawdeg";
    pub const PITCH_DEG: &str = "pitchdeg";
    pub const HEALTH: &str = "health";
    pub const SHIELD: &str = "shield";
    pub const IS_DEAD: &str = "isdead";
    pub const RESPAWN_TIMER: &str = "respawntimer";
    pub const IS_CROUCHING: &str = "iscrouching";
    pub const CROUCH_BLEND: &str = "crouchblend";
    pub const IS_AIRBORNE: &str = "isairborne";
    pub const AIRBORNE_TICKS: &str = "airborneticks";
    pub const WEAPON_SLOT: &str = "weaponslot";
    pub const WEAPON: &str = "weapon";
    pub const FRAG_GRENADES: &str = "fraggrenades";
    pub const PLASMA_GRENADES: &str = "plasmagrenades";
    pub const KILLS: &str = "kills";
    pub const DEATHS: &str = "deaths";
    pub const ASSISTS: &str = "assists";
    pub const EVENT: &str = "event";
}

/// Column order used when a feed carries no header row.
pub const DEFAULT_COLUMNS: [&str; 39] = [
    columns::TIMESTAMP,
    columns::MAP,
    columns::GAME_TYPE,
    columns::PLAYER_INDEX,
    columns::PLAYER_NAME,
    columns::TEAM,
    columns::XBOX_ID,
    columns::MACHINE_ID,
    columns::EMBLEM_FG,
    columns::EMBLEM_BG,
    columns::PRIMARY_COLOR,
    columns::SECONDARY_COLOR,
    columns::POS_X,
    columns::POS_Y,
    columns::POS_Z,
    columns::VEL_X,
    columns::VEL_Y,
    columns::VEL_Z,
    columns::SPEED,
    columns::YAW,
    columns::PITCH,
    columns::YAW_DEG,
    columns::PITCH_DEG,
    columns::HEALTH,
    columns::SHIELD,
    columns::IS_DEAD,
    columns::RESPAWN_TIMER,
    columns::IS_CROUCHING,
    columns::CROUCH_BLEND,
    columns::IS_AIRBORNE,
    columns::AIRBORNE_TICKS,
    columns::WEAPON_SLOT,
    columns::WEAPON,
    columns::FRAG_GRENADES,
    columns::PLASMA_GRENADES,
    columns::KILLS,
    columns::DEATHS,
    columns::ASSISTS,
    columns::EVENT,
];

/// Alternate header spellings, mapped to their column name
const HEADER_ALIASES: [(&str, &str); 1] = [("airbornetics", columns::AIRBORNE_TICKS)];

/// First-field values that always mark a header row
const HEADER_TOKENS: [&str; 2] = [columns::TIMESTAMP, columns::PLAYER_NAME];

/// Case-insensitive column name to field index mapping.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ColumnMap {
    indices: HashMap<String, usize>,
    from_header: bool,
}

impl ColumnMap {
    /// Mapping for the fixed default column order
    pub fn default_order() -> Self {
        let indices = DEFAULT_COLUMNS
            .iter()
            .enumerate()
            .map(|(index, name)| (name.to_string(), index))
            .collect();
        Self {
            indices,
            from_header: false,
        }
    }

    /// Mapping built from the fields of a header row. The first occurrence of a
    /// repeated name wins.
    pub fn from_header(fields: &[&str]) -> Self {
        let mut indices = HashMap::with_capacity(fields.len());
        for (index, field) in fields.iter().enumerate() {
            let name = field.trim().to_ascii_lowercase();
            if name.is_empty() {
                continue;
            }
            let name = HEADER_ALIASES
                .iter()
                .find(|(alias, _)| *alias == name)
                .map_or(name, |(_, column)| column.to_string());
            indices.entry(name).or_insert(index);
        }
        Self {
            indices,
            from_header: true,
        }
    }

    pub fn index(&self, name: &str) -> Option<usize> {
        self.indices.get(&name.to_ascii_lowercase()).copied()
    }

    pub fn has(&self, name: &str) -> bool {
        self.index(name).is_some()
    }

    /// True when the mapping came from a header row rather than the default order
    pub fn is_header(&self) -> bool {
        self.from_header
    }

    pub fn len(&self) -> usize {
        self.indices.len()
    }

    pub fn is_empty(&self) -> bool {
        self.indices.is_empty()
    }
}

/// Split one record into trimmed fields. A trailing carriage return is dropped.
pub fn split_record(line: &str) -> Vec<&str> {
    line.trim_end_matches(['\r', '\n'])
        .split(',')
        .map(str::trim)
        .collect()
}

/// Whether the first record of a feed is a header row.
///
/// Data rows start with a date-time timestamp (or a negative number), both of
/// which contain a hyphen. A known header token, or a first field without a
/// hyphen, marks a header.
pub fn is_header_row(fields: &[&str]) -> bool {
    let Some(first) = fields.first() else {
        return false;
    };
    let first = first.trim();
    if HEADER_TOKENS
        .iter()
        .any(|token| first.eq_ignore_ascii_case(token))
    {
        return true;
    }
    !first.contains('-')
}

/// Build the column mapping for a feed from its first record.
pub fn detect_schema(first_row: &[&str]) -> ColumnMap {
    if is_header_row(first_row) {
        ColumnMap::from_header(first_row)
    } else {
        ColumnMap::default_order()
    }
}

use anyhow::Result;
use common::{DEFAULT_COLUMNS, Decoded, RecordDecoder, Snapshot};

const ROWS: [&str; 3] = [
    "2024-05-01 18:22:03.000,Lockout,Slayer,0,Alpha,Red,X1,M1,4,7,2,5,1.5,-2.25,10,0.1,0.2,0,0.22,1.57,-0.1,90,-5.7,100,75,false,0,true,0.8,false,0,1,Battle Rifle,2,1,3,1,0,",
    "2024-05-01 18:22:03.100,Lockout,Slayer,1,Bravo,blue,,,1,1,3,3,-40,12,3.5,0,0,0,0,3.14,0,180,0,0,0,false,3.5,false,0,true,12,0,Sniper Rifle,0,0,1,4,2,killed",
    "2024-05-01 18:22:03.200,Lockout,Slayer,2,Charlie,7,X3,,0,0,0,0,0,0,0,0,0,0,0,0,0,0,0,50,0,yes,0,false,0,false,0,0,,0,0,0,0,0,",
];

fn decode_all(lines: &[String]) -> Vec<Snapshot> {
    let mut decoder = RecordDecoder::new();
    lines
        .iter()
        .filter_map(|line| match decoder.decode_line(line) {
            Decoded::Record(snapshot) => Some(snapshot),
            _ => None,
        })
        .collect()
}

#[test]
fn test_header_and_default_order_agree() -> Result<()> {
    let headerless: Vec<String> = ROWS.iter().map(|row| row.to_string()).collect();

    let header = DEFAULT_COLUMNS
        .iter()
        .map(|column| column.to_uppercase())
        .collect::<Vec<_>>()
        .join(",");
    let mut with_header = vec![header];
    with_header.extend(headerless.iter().cloned());

    let from_default = decode_all(&headerless);
    let from_header = decode_all(&with_header);

    assert_eq!(from_default.len(), 3);
    assert_eq!(from_default, from_header);
    Ok(())
}

#[test]
fn test_reordered_header_matches_default_values() -> Result<()> {
    // Same first row, columns shuffled and an unknown column added
    let header = "PlayerName,Extra,posx,posy,posz,Team,Kills,Deaths,isdead,respawntimer,timestamp,weapon";
    let row = "Alpha,ignored,1.5,-2.25,10,Red,3,1,false,0,2024-05-01 18:22:03.000,Battle Rifle";
    let from_header = decode_all(&[header.to_string(), row.to_string()]);
    let from_default = decode_all(&[ROWS[0].to_string()]);

    let a = &from_header[0];
    let b = &from_default[0];
    assert_eq!(a.name, b.name);
    assert_eq!(a.position, b.position);
    assert_eq!(a.team, b.team);
    assert_eq!(a.kills, b.kills);
    assert_eq!(a.deaths, b.deaths);
    assert_eq!(a.dead, b.dead);
    assert_eq!(a.timestamp, b.timestamp);
    assert_eq!(a.weapon, b.weapon);
    Ok(())
}

#[test]
fn test_dead_follows_respawn_timer() {
    let snapshots = decode_all(&ROWS.iter().map(|row| row.to_string()).collect::<Vec<_>>());
    for snapshot in &snapshots {
        if snapshot.respawn_timer > 0.0 {
            assert!(snapshot.dead, "{} has a timer but is alive", snapshot.name);
        }
    }
    assert!(!snapshots[0].dead);
    assert!(snapshots[1].dead);
    assert!(snapshots[2].dead);
    assert_eq!(snapshots[1].team, 1);
    assert_eq!(snapshots[2].team, 7);
    assert_eq!(snapshots[2].platform_id.as_deref(), Some("X3"));
    assert!(snapshots[2].machine_id.is_none());
}

#[test]
fn test_airborne_ticks_from_header() -> Result<()> {
    let header = "Timestamp,PlayerName,IsAirborne,AirborneTicks";
    let row = "2024-05-01 18:22:03.000,Alpha,true,12";
    let snapshots = decode_all(&[header.to_string(), row.to_string()]);

    assert_eq!(snapshots.len(), 1);
    assert!(snapshots[0].airborne);
    assert_eq!(snapshots[0].airborne_ticks, 12);
    Ok(())
}

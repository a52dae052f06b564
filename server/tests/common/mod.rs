#![allow(dead_code)]

use std::time::Duration;

use ::common::DEFAULT_COLUMNS;
use server::Roster;

/// A header-less record in the default column order
pub fn telemetry_line(timestamp: &str, name: &str, kills: u32, deaths: u32) -> String {
    DEFAULT_COLUMNS
        .iter()
        .map(|column| match *column {
            "timestamp" => timestamp.to_string(),
            "playername" => name.to_string(),
            "team" => "red".to_string(),
            "kills" => kills.to_string(),
            "deaths" => deaths.to_string(),
            "weapon" => "Magnum".to_string(),
            _ => "0".to_string(),
        })
        .collect::<Vec<_>>()
        .join(",")
}

/// Poll the roster until `condition` holds or two seconds pass
pub async fn wait_for(roster: &Roster, condition: impl Fn(&Roster) -> bool) -> bool {
    for _ in 0..200 {
        if condition(roster) {
            return true;
        }
        tokio::time::sleep(Duration::from_millis(10)).await;
    }
    condition(roster)
}

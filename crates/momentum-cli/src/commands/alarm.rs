use chrono::{Local, Utc};
use clap::Subcommand;
use momentum_core::alarm::next_trigger;
use momentum_core::TimeOfDay;
use serde_json::json;

use super::open_settings;

#[derive(Subcommand)]
pub enum AlarmAction {
    /// Set the alarm time (HH:MM, 24h)
    Set {
        /// Time of day, e.g. "06:45"
        time: TimeOfDay,
    },
    /// Switch the alarm on (armed by `momentum run`)
    On,
    /// Switch the alarm off
    Off,
    /// Print alarm state as JSON
    Status,
}

pub fn run(action: AlarmAction) -> Result<(), Box<dyn std::error::Error>> {
    let settings = open_settings()?;

    match action {
        AlarmAction::Set { time } => settings.set_alarm_time(time)?,
        AlarmAction::On => settings.set_alarm_active(true)?,
        AlarmAction::Off => settings.set_alarm_active(false)?,
        AlarmAction::Status => {}
    }

    let alarm = settings.alarm();
    let next = alarm
        .active
        .then(|| next_trigger(&Local::now(), alarm.time_of_day).with_timezone(&Utc));
    let status = json!({
        "time": alarm.time_of_day,
        "active": alarm.active,
        "next_trigger": next,
    });
    println!("{}", serde_json::to_string_pretty(&status)?);
    Ok(())
}

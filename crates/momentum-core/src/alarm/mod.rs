mod scheduler;
mod time_of_day;

pub use scheduler::{
    AlarmScheduler, AlertPermission, PermissionStatus, ScheduledTrigger, StaticPermission,
    TriggerFired,
};
pub use time_of_day::{next_trigger, TimeOfDay};

pub mod attendance;
pub mod backup;
pub mod core;
pub mod marks;
pub mod outpass;
pub mod overview;
pub mod schedules;
pub mod settings;
pub mod students;

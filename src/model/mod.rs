pub mod attendance;
pub mod department;
pub mod employee;
pub mod event;

pub use attendance::{AttendanceRecord, AttendanceStatus};
pub use department::{normalize_department, UNKNOWN_DEPARTMENT};
pub use employee::Employee;
pub use event::{ClockEvent, EventKind};

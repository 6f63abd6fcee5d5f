pub mod attendance_record;
pub mod beacon_assignment;
pub mod check_in_token;
pub mod class_session;
pub mod course;
pub mod user;

pub use attendance_record::Entity as AttendanceRecord;
pub use beacon_assignment::Entity as BeaconAssignment;
pub use check_in_token::Entity as CheckInToken;
pub use class_session::Entity as ClassSession;
pub use course::Entity as Course;
pub use user::Entity as User;

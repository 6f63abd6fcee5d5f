pub mod m202601100001_create_users;
pub mod m202601100002_create_courses;
pub mod m202601100003_create_class_sessions;
pub mod m202601100004_create_check_in_tokens;
pub mod m202601100005_create_beacon_assignments;
pub mod m202601100006_create_attendance_records;

use serde::{Deserialize, Serialize};
use std::fmt;

pub const STUDENTS: &str = "students";
pub const MARKS: &str = "marks";
pub const ATTENDANCE: &str = "attendance";
pub const OUTPASSES: &str = "outpasses";
pub const EXAM_SCHEDULES: &str = "examSchedules";

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Student {
    pub identity: String,
    #[serde(default)]
    pub first_name: String,
    #[serde(default)]
    pub last_name: String,
    #[serde(default, alias = "class")]
    pub class_label: String,
    #[serde(default)]
    pub roll_no: String,
    #[serde(default)]
    pub parent_name: String,
    #[serde(default)]
    pub phone: String,
    #[serde(default)]
    pub email: String,
}

impl Student {
    pub fn full_name(&self) -> String {
        format!("{} {}", self.first_name, self.last_name)
            .trim()
            .to_string()
    }
}

/// Registration payload; the identity is assigned by the roster service.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct NewStudent {
    #[serde(default)]
    pub first_name: String,
    #[serde(default)]
    pub last_name: String,
    #[serde(default, alias = "class")]
    pub class_label: String,
    #[serde(default)]
    pub roll_no: String,
    #[serde(default)]
    pub parent_name: String,
    #[serde(default)]
    pub phone: String,
    #[serde(default)]
    pub email: String,
}

impl NewStudent {
    pub fn into_student(self, identity: String) -> Student {
        Student {
            identity,
            first_name: self.first_name,
            last_name: self.last_name,
            class_label: self.class_label,
            roll_no: self.roll_no,
            parent_name: self.parent_name,
            phone: self.phone,
            email: self.email,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum Outcome {
    Pass,
    Fail,
    Absent,
}

impl Outcome {
    pub fn parse(raw: &str) -> Option<Outcome> {
        match raw.trim().to_ascii_lowercase().as_str() {
            "pass" | "p" => Some(Outcome::Pass),
            "fail" | "f" => Some(Outcome::Fail),
            "absent" | "ab" | "a" => Some(Outcome::Absent),
            _ => None,
        }
    }
}

impl fmt::Display for Outcome {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            Outcome::Pass => "Pass",
            Outcome::Fail => "Fail",
            Outcome::Absent => "Absent",
        };
        f.write_str(s)
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct MarkEntry {
    pub marks_obtained: f64,
    pub total_marks: f64,
    pub outcome: Outcome,
    #[serde(default)]
    pub remarks: String,
    #[serde(default)]
    pub date: String,
}

/// Address of one mark inside the nested `marks[identity][period][subject]` layout.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct MarkKey {
    pub identity: String,
    pub period: String,
    pub subject: String,
}

impl MarkKey {
    /// Field path of this mark inside the student's marks document.
    pub fn path(&self) -> Vec<String> {
        vec![self.period.clone(), self.subject.clone()]
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ResolvedUpdate {
    pub key: MarkKey,
    pub entry: MarkEntry,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AttendanceEntry {
    pub present: bool,
    #[serde(default)]
    pub intimation: bool,
    #[serde(default)]
    pub intimated_by: String,
    #[serde(default)]
    pub reason: String,
}

impl Default for AttendanceEntry {
    fn default() -> Self {
        Self {
            present: true,
            intimation: false,
            intimated_by: String::new(),
            reason: String::new(),
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AttendancePatch {
    pub present: Option<bool>,
    pub intimation: Option<bool>,
    pub intimated_by: Option<String>,
    pub reason: Option<String>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum OutpassStatus {
    Pending,
    Approved,
    Rejected,
}

impl OutpassStatus {
    pub fn parse(raw: &str) -> Option<OutpassStatus> {
        match raw.trim().to_ascii_lowercase().as_str() {
            "pending" => Some(OutpassStatus::Pending),
            "approved" => Some(OutpassStatus::Approved),
            "rejected" => Some(OutpassStatus::Rejected),
            _ => None,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct OutpassRequest {
    pub id: String,
    pub identity: String,
    pub status: OutpassStatus,
    pub requested_at: String,
    pub date: String,
    pub time_out: String,
    pub time_in: String,
    pub reason: String,
    #[serde(default)]
    pub student_name: String,
    #[serde(default)]
    pub class_label: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ScheduledSubject {
    pub date: String,
    pub subject: String,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ExamSchedule {
    pub id: String,
    pub name: String,
    pub start_date: String,
    pub end_date: String,
    pub total_marks: f64,
    #[serde(default)]
    pub classes: Vec<String>,
    #[serde(default)]
    pub subjects: Vec<ScheduledSubject>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum Actor {
    Admin,
    Staff,
}

impl Actor {
    pub fn parse(raw: &str) -> Option<Actor> {
        match raw.trim().to_ascii_lowercase().as_str() {
            "admin" => Some(Actor::Admin),
            "staff" | "teacher" | "user" => Some(Actor::Staff),
            _ => None,
        }
    }

    pub fn can_approve(self) -> bool {
        matches!(self, Actor::Admin)
    }
}

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;

/// Identifier assigned by the remote service. Always positive.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct WorkItemId(u32);

impl WorkItemId {
    /// Returns `None` for zero, which the service never assigns.
    pub fn new(raw: u32) -> Option<Self> {
        (raw > 0).then_some(Self(raw))
    }

    pub fn get(self) -> u32 {
        self.0
    }
}

impl fmt::Display for WorkItemId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RecordKind {
    WorkItems,
    Bugs,
    TestCases,
    Requirements,
    Outcomes,
}

impl RecordKind {
    pub const ALL: [RecordKind; 5] = [
        RecordKind::WorkItems,
        RecordKind::Bugs,
        RecordKind::TestCases,
        RecordKind::Requirements,
        RecordKind::Outcomes,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            RecordKind::WorkItems => "work_items",
            RecordKind::Bugs => "bugs",
            RecordKind::TestCases => "test_cases",
            RecordKind::Requirements => "requirements",
            RecordKind::Outcomes => "outcomes",
        }
    }

    pub fn parse(s: &str) -> Option<Self> {
        Self::ALL
            .into_iter()
            .find(|k| k.as_str() == s || k.as_str().replace('_', "-") == s)
    }
}

impl fmt::Display for RecordKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Fields every record kind carries. Title is mandatory.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Header {
    pub id: WorkItemId,
    pub title: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub assigned_to: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub state: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct WorkItem {
    #[serde(flatten)]
    pub header: Header,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub tags: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub team_project: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub work_item_type: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub round: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub discipline: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub requirement_category: Option<String>,
    /// Link back to the requirement this item was cloned from, kept as the
    /// service returns it.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub original_requirement_id: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Bug {
    #[serde(flatten)]
    pub header: Header,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub bug_type: Option<String>,
    /// Zero when the service reports no priority.
    #[serde(default)]
    pub priority: i64,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TestCase {
    #[serde(flatten)]
    pub header: Header,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub tags: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub team_project: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub work_item_type: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Requirement {
    #[serde(flatten)]
    pub header: Header,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub tags: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub test_verification_method: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub board_column: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Outcome {
    #[serde(flatten)]
    pub header: Header,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub current_outcome: Option<String>,
    /// `None` is the unset sentinel: absent or unparseable upstream.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub changed_date: Option<DateTime<Utc>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub changed_by: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub run_by: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub tester: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub test_outcome: Option<String>,
}

/// One normalized record of any kind.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(untagged)]
pub enum Record {
    WorkItem(WorkItem),
    Bug(Bug),
    TestCase(TestCase),
    Requirement(Requirement),
    Outcome(Outcome),
}

impl Record {
    pub fn kind(&self) -> RecordKind {
        match self {
            Record::WorkItem(_) => RecordKind::WorkItems,
            Record::Bug(_) => RecordKind::Bugs,
            Record::TestCase(_) => RecordKind::TestCases,
            Record::Requirement(_) => RecordKind::Requirements,
            Record::Outcome(_) => RecordKind::Outcomes,
        }
    }

    pub fn header(&self) -> &Header {
        match self {
            Record::WorkItem(r) => &r.header,
            Record::Bug(r) => &r.header,
            Record::TestCase(r) => &r.header,
            Record::Requirement(r) => &r.header,
            Record::Outcome(r) => &r.header,
        }
    }

    /// Single-line description for terminal output.
    pub fn summary(&self) -> String {
        let h = self.header();
        let state = h.state.as_deref().unwrap_or("-");
        let detail = match self {
            Record::WorkItem(r) => format!(
                "type={} round={} discipline={}",
                or_dash(&r.work_item_type),
                or_dash(&r.round),
                or_dash(&r.discipline)
            ),
            Record::Bug(r) => format!("bug_type={} priority={}", or_dash(&r.bug_type), r.priority),
            Record::TestCase(r) => format!("project={}", or_dash(&r.team_project)),
            Record::Requirement(r) => format!(
                "verification={} column={}",
                or_dash(&r.test_verification_method),
                or_dash(&r.board_column)
            ),
            Record::Outcome(r) => format!(
                "outcome={} changed={}",
                or_dash(&r.current_outcome),
                r.changed_date
                    .map(|d| d.to_rfc3339())
                    .unwrap_or_else(|| "-".into())
            ),
        };
        format!("#{} [{}] {} - {}", h.id, state, h.title, detail)
    }
}

fn or_dash(value: &Option<String>) -> &str {
    value.as_deref().unwrap_or("-")
}

use crate::model::work_item::RecordKind;

/// Logical attribute of a normalized record.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Attr {
    Title,
    AssignedTo,
    State,
    Tags,
    TeamProject,
    WorkItemType,
    Round,
    Discipline,
    RequirementCategory,
    OriginalRequirementId,
    BugType,
    Priority,
    TestVerificationMethod,
    BoardColumn,
    CurrentOutcome,
    ChangedDate,
    ChangedBy,
    RunBy,
    Tester,
    TestOutcome,
}

/// Where an attribute lives in the `fields` document.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct FieldSpec {
    pub attr: Attr,
    pub path: &'static str,
    pub subpath: Option<&'static str>,
}

const fn field(attr: Attr, path: &'static str) -> FieldSpec {
    FieldSpec {
        attr,
        path,
        subpath: None,
    }
}

/// Identity-valued fields arrive as `{displayName, uniqueName, ...}`.
const fn person(attr: Attr, path: &'static str) -> FieldSpec {
    FieldSpec {
        attr,
        path,
        subpath: Some("displayName"),
    }
}

pub const HEADER: &[FieldSpec] = &[
    field(Attr::Title, "System.Title"),
    person(Attr::AssignedTo, "System.AssignedTo"),
    field(Attr::State, "System.State"),
];

pub const WORK_ITEM: &[FieldSpec] = &[
    field(Attr::Tags, "System.Tags"),
    field(Attr::TeamProject, "System.TeamProject"),
    field(Attr::WorkItemType, "System.WorkItemType"),
    field(Attr::Round, "Custom.Round"),
    field(Attr::Discipline, "Microsoft.VSTS.Common.Discipline"),
    field(Attr::RequirementCategory, "Custom.RequirementCategory"),
    // Organization-specific field with a generated reference name.
    field(
        Attr::OriginalRequirementId,
        "Custom.3e6a7048-fa00-4b92-890c-5f56c824ea24",
    ),
];

pub const BUG: &[FieldSpec] = &[
    field(Attr::BugType, "Custom.BugType"),
    field(Attr::Priority, "Microsoft.VSTS.Common.Priority"),
];

pub const TEST_CASE: &[FieldSpec] = &[
    field(Attr::Tags, "System.Tags"),
    field(Attr::TeamProject, "System.TeamProject"),
    field(Attr::WorkItemType, "System.WorkItemType"),
];

pub const REQUIREMENT: &[FieldSpec] = &[
    field(Attr::Tags, "System.Tags"),
    field(
        Attr::TestVerificationMethod,
        "Microsoft.VSTS.Common.TestVerificationMethod",
    ),
    field(Attr::BoardColumn, "System.BoardColumn"),
];

pub const OUTCOME: &[FieldSpec] = &[
    field(Attr::CurrentOutcome, "Custom.CurrentOutcome"),
    field(Attr::ChangedDate, "System.ChangedDate"),
    person(Attr::ChangedBy, "System.ChangedBy"),
    person(Attr::RunBy, "Microsoft.VSTS.Common.RunBy"),
    person(Attr::Tester, "Microsoft.VSTS.Common.Tester"),
    field(Attr::TestOutcome, "Microsoft.VSTS.Common.Outcome"),
];

/// Kind-specific fields, read in addition to [`HEADER`].
pub fn table(kind: RecordKind) -> &'static [FieldSpec] {
    match kind {
        RecordKind::WorkItems => WORK_ITEM,
        RecordKind::Bugs => BUG,
        RecordKind::TestCases => TEST_CASE,
        RecordKind::Requirements => REQUIREMENT,
        RecordKind::Outcomes => OUTCOME,
    }
}

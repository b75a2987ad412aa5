pub mod field_map;

use chrono::{DateTime, Utc};
use serde_json::Value;
use thiserror::Error;

use crate::model::detail::RawDetail;
use crate::model::work_item::{
    Bug, Header, Outcome, Record, RecordKind, Requirement, TestCase, WorkItem, WorkItemId,
};
use crate::util::fields::{extract_i64, extract_string, extract_timestamp};
use field_map::{Attr, FieldSpec, HEADER};

#[derive(Error, Debug, Clone, PartialEq)]
pub enum NormalizationError {
    #[error("payload is not a JSON object")]
    NotAnObject,
    #[error("payload has no id")]
    MissingId,
    #[error("payload id {0} is not a positive integer")]
    InvalidId(String),
    #[error("work item {id} has no {field}")]
    MissingField { id: WorkItemId, field: &'static str },
}

/// Read access to one payload's `fields`, restricted to a kind's table.
pub struct Projection<'a> {
    fields: &'a Value,
    table: &'static [FieldSpec],
}

impl<'a> Projection<'a> {
    pub fn new(detail: &'a RawDetail, kind: RecordKind) -> Self {
        Self {
            fields: detail.fields(),
            table: field_map::table(kind),
        }
    }

    fn spec(&self, attr: Attr) -> Option<&'static FieldSpec> {
        HEADER.iter().chain(self.table).find(|s| s.attr == attr)
    }

    pub fn text(&self, attr: Attr) -> Option<String> {
        let spec = self.spec(attr)?;
        extract_string(self.fields, spec.path, spec.subpath)
    }

    pub fn int(&self, attr: Attr) -> Option<i64> {
        let spec = self.spec(attr)?;
        extract_i64(self.fields, spec.path, spec.subpath)
    }

    pub fn timestamp(&self, attr: Attr) -> Option<DateTime<Utc>> {
        let spec = self.spec(attr)?;
        extract_timestamp(self.fields, spec.path, spec.subpath)
    }
}

/// A record shape that can be built from a detail payload.
pub trait FromDetail: Sized + Send + 'static {
    const KIND: RecordKind;

    fn from_projection(header: Header, p: &Projection<'_>) -> Self;
}

/// Build a `T` from a payload, failing only when the id or title is missing.
pub fn normalize<T: FromDetail>(detail: &RawDetail) -> Result<T, NormalizationError> {
    if !detail.is_object() {
        return Err(NormalizationError::NotAnObject);
    }
    let id = read_id(detail)?;
    let p = Projection::new(detail, T::KIND);
    let title = p.text(Attr::Title).ok_or(NormalizationError::MissingField {
        id,
        field: "System.Title",
    })?;
    let header = Header {
        id,
        title,
        assigned_to: p.text(Attr::AssignedTo),
        state: p.text(Attr::State),
    };
    Ok(T::from_projection(header, &p))
}

/// Same as [`normalize`], selecting the shape at runtime.
pub fn normalize_kind(kind: RecordKind, detail: &RawDetail) -> Result<Record, NormalizationError> {
    match kind {
        RecordKind::WorkItems => normalize::<WorkItem>(detail).map(Record::WorkItem),
        RecordKind::Bugs => normalize::<Bug>(detail).map(Record::Bug),
        RecordKind::TestCases => normalize::<TestCase>(detail).map(Record::TestCase),
        RecordKind::Requirements => normalize::<Requirement>(detail).map(Record::Requirement),
        RecordKind::Outcomes => normalize::<Outcome>(detail).map(Record::Outcome),
    }
}

fn read_id(detail: &RawDetail) -> Result<WorkItemId, NormalizationError> {
    let raw = match detail.id() {
        None | Some(Value::Null) => return Err(NormalizationError::MissingId),
        Some(v) => v,
    };
    raw.as_u64()
        .and_then(|n| u32::try_from(n).ok())
        .and_then(WorkItemId::new)
        .ok_or_else(|| NormalizationError::InvalidId(raw.to_string()))
}

impl FromDetail for WorkItem {
    const KIND: RecordKind = RecordKind::WorkItems;

    fn from_projection(header: Header, p: &Projection<'_>) -> Self {
        Self {
            header,
            tags: p.text(Attr::Tags),
            team_project: p.text(Attr::TeamProject),
            work_item_type: p.text(Attr::WorkItemType),
            round: p.text(Attr::Round),
            discipline: p.text(Attr::Discipline),
            requirement_category: p.text(Attr::RequirementCategory),
            original_requirement_id: p.text(Attr::OriginalRequirementId),
        }
    }
}

impl FromDetail for Bug {
    const KIND: RecordKind = RecordKind::Bugs;

    fn from_projection(header: Header, p: &Projection<'_>) -> Self {
        Self {
            header,
            bug_type: p.text(Attr::BugType),
            priority: p.int(Attr::Priority).unwrap_or_default(),
        }
    }
}

impl FromDetail for TestCase {
    const KIND: RecordKind = RecordKind::TestCases;

    fn from_projection(header: Header, p: &Projection<'_>) -> Self {
        Self {
            header,
            tags: p.text(Attr::Tags),
            team_project: p.text(Attr::TeamProject),
            work_item_type: p.text(Attr::WorkItemType),
        }
    }
}

impl FromDetail for Requirement {
    const KIND: RecordKind = RecordKind::Requirements;

    fn from_projection(header: Header, p: &Projection<'_>) -> Self {
        Self {
            header,
            tags: p.text(Attr::Tags),
            test_verification_method: p.text(Attr::TestVerificationMethod),
            board_column: p.text(Attr::BoardColumn),
        }
    }
}

impl FromDetail for Outcome {
    const KIND: RecordKind = RecordKind::Outcomes;

    fn from_projection(header: Header, p: &Projection<'_>) -> Self {
        Self {
            header,
            current_outcome: p.text(Attr::CurrentOutcome),
            changed_date: p.timestamp(Attr::ChangedDate),
            changed_by: p.text(Attr::ChangedBy),
            run_by: p.text(Attr::RunBy),
            tester: p.text(Attr::Tester),
            test_outcome: p.text(Attr::TestOutcome),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn detail(value: Value) -> RawDetail {
        RawDetail::from(value)
    }

    fn full_payload() -> RawDetail {
        detail(json!({
            "id": 42,
            "rev": 7,
            "fields": {
                "System.Title": "Fix login bug",
                "System.AssignedTo": { "displayName": "Grace Hopper", "uniqueName": "grace@example.com" },
                "System.State": "Active",
                "System.Tags": "auth; sso",
                "System.TeamProject": "Electronic Health Record (EHR)",
                "System.WorkItemType": "Requirement",
                "System.BoardColumn": "Doing",
                "System.ChangedDate": "2024-05-06T07:08:09.5Z",
                "System.ChangedBy": { "displayName": "Alan Turing" },
                "Custom.Round": "R2",
                "Custom.RequirementCategory": "Functional",
                "Custom.3e6a7048-fa00-4b92-890c-5f56c824ea24": "1001",
                "Custom.BugType": "Regression",
                "Custom.CurrentOutcome": "Passed",
                "Microsoft.VSTS.Common.Discipline": "Development",
                "Microsoft.VSTS.Common.Priority": 1,
                "Microsoft.VSTS.Common.TestVerificationMethod": "Test",
                "Microsoft.VSTS.Common.RunBy": { "displayName": "Runner" },
                "Microsoft.VSTS.Common.Tester": { "displayName": "Tester" },
                "Microsoft.VSTS.Common.Outcome": "Passed",
                "System.SomethingElse": [1, 2, 3]
            }
        }))
    }

    #[test]
    fn work_item_maps_every_documented_field() {
        let item: WorkItem = normalize(&full_payload()).unwrap();
        assert_eq!(item.header.id, WorkItemId::new(42).unwrap());
        assert_eq!(item.header.title, "Fix login bug");
        assert_eq!(item.header.assigned_to.as_deref(), Some("Grace Hopper"));
        assert_eq!(item.header.state.as_deref(), Some("Active"));
        assert_eq!(item.tags.as_deref(), Some("auth; sso"));
        assert_eq!(item.team_project.as_deref(), Some("Electronic Health Record (EHR)"));
        assert_eq!(item.work_item_type.as_deref(), Some("Requirement"));
        assert_eq!(item.round.as_deref(), Some("R2"));
        assert_eq!(item.discipline.as_deref(), Some("Development"));
        assert_eq!(item.requirement_category.as_deref(), Some("Functional"));
        assert_eq!(item.original_requirement_id.as_deref(), Some("1001"));
    }

    #[test]
    fn bug_reads_type_and_priority() {
        let bug: Bug = normalize(&full_payload()).unwrap();
        assert_eq!(bug.bug_type.as_deref(), Some("Regression"));
        assert_eq!(bug.priority, 1);
    }

    #[test]
    fn requirement_reads_verification_and_column() {
        let req: Requirement = normalize(&full_payload()).unwrap();
        assert_eq!(req.test_verification_method.as_deref(), Some("Test"));
        assert_eq!(req.board_column.as_deref(), Some("Doing"));
    }

    #[test]
    fn outcome_reads_people_and_date() {
        let outcome: Outcome = normalize(&full_payload()).unwrap();
        assert_eq!(outcome.current_outcome.as_deref(), Some("Passed"));
        assert_eq!(outcome.changed_by.as_deref(), Some("Alan Turing"));
        assert_eq!(outcome.run_by.as_deref(), Some("Runner"));
        assert_eq!(outcome.tester.as_deref(), Some("Tester"));
        assert_eq!(outcome.test_outcome.as_deref(), Some("Passed"));
        assert_eq!(
            outcome.changed_date.unwrap().to_rfc3339(),
            "2024-05-06T07:08:09.500+00:00"
        );
    }

    #[test]
    fn optional_fields_default_to_empty() {
        let minimal = detail(json!({ "id": 5, "fields": { "System.Title": "Only a title" } }));

        let item: WorkItem = normalize(&minimal).unwrap();
        assert_eq!(item.header.assigned_to, None);
        assert_eq!(item.tags, None);
        assert_eq!(item.original_requirement_id, None);

        let bug: Bug = normalize(&minimal).unwrap();
        assert_eq!(bug.priority, 0);
        assert_eq!(bug.bug_type, None);

        let outcome: Outcome = normalize(&minimal).unwrap();
        assert_eq!(outcome.changed_date, None);
    }

    #[test]
    fn unparseable_changed_date_is_unset() {
        let payload = detail(json!({
            "id": 9,
            "fields": { "System.Title": "Run", "System.ChangedDate": "not a date" }
        }));
        let outcome: Outcome = normalize(&payload).unwrap();
        assert_eq!(outcome.changed_date, None);
    }

    #[test]
    fn mismatched_shapes_are_tolerated() {
        let payload = detail(json!({
            "id": 3,
            "fields": {
                "System.Title": "Odd shapes",
                "System.AssignedTo": "plain string",
                "Microsoft.VSTS.Common.Priority": "high",
                "System.State": { "name": "Active" }
            }
        }));
        let bug: Bug = normalize(&payload).unwrap();
        assert_eq!(bug.header.assigned_to, None);
        assert_eq!(bug.header.state, None);
        assert_eq!(bug.priority, 0);
    }

    #[test]
    fn missing_title_fails() {
        let payload = detail(json!({ "id": 11, "fields": { "System.State": "New" } }));
        let err = normalize::<TestCase>(&payload).unwrap_err();
        assert_eq!(
            err,
            NormalizationError::MissingField {
                id: WorkItemId::new(11).unwrap(),
                field: "System.Title"
            }
        );
    }

    #[test]
    fn null_title_fails() {
        let payload = detail(json!({ "id": 11, "fields": { "System.Title": null } }));
        assert!(matches!(
            normalize::<Outcome>(&payload),
            Err(NormalizationError::MissingField { .. })
        ));
    }

    #[test]
    fn missing_or_invalid_id_fails() {
        let no_id = detail(json!({ "fields": { "System.Title": "t" } }));
        assert_eq!(normalize::<WorkItem>(&no_id).unwrap_err(), NormalizationError::MissingId);

        let zero = detail(json!({ "id": 0, "fields": { "System.Title": "t" } }));
        assert!(matches!(
            normalize::<WorkItem>(&zero),
            Err(NormalizationError::InvalidId(_))
        ));

        let text = detail(json!({ "id": "12", "fields": { "System.Title": "t" } }));
        assert!(matches!(
            normalize::<WorkItem>(&text),
            Err(NormalizationError::InvalidId(_))
        ));
    }

    #[test]
    fn non_object_payload_fails() {
        assert_eq!(
            normalize::<Bug>(&detail(json!([1, 2]))).unwrap_err(),
            NormalizationError::NotAnObject
        );
    }

    #[test]
    fn normalize_kind_selects_shape() {
        let payload = full_payload();
        for kind in RecordKind::ALL {
            let record = normalize_kind(kind, &payload).unwrap();
            assert_eq!(record.kind(), kind);
            assert_eq!(record.header().title, "Fix login bug");
        }
    }
}

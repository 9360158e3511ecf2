use chrono::Utc;
use serde::{Deserialize, Serialize};
use std::fmt;
use thiserror::Error;
use tracing::{debug, info};
use uuid::Uuid;

/// A scanned score as the capture pipeline produced it. Numbers keep their
/// original JSON representation so `70` never comes back as `70.0`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum Score {
    Number(serde_json::Number),
    Text(String),
}

impl fmt::Display for Score {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Score::Number(n) => write!(f, "{n}"),
            Score::Text(s) => f.write_str(s),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ResultRecord {
    pub id: Uuid,
    pub name: String,
    pub score: Option<Score>,
    #[serde(rename = "class")]
    pub class_name: String,
}

impl ResultRecord {
    pub fn from_candidate(candidate: Candidate) -> Self {
        Self {
            id: Uuid::new_v4(),
            name: candidate.name.unwrap_or_default(),
            score: candidate.score,
            class_name: candidate.class_name.unwrap_or_default(),
        }
    }
}

/// A newly produced name/score/class triple awaiting reconciliation.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Candidate {
    #[serde(default)]
    pub name: Option<String>,
    #[serde(default)]
    pub score: Option<Score>,
    #[serde(default, rename = "class")]
    pub class_name: Option<String>,
}

impl Candidate {
    pub fn name(&self) -> &str {
        self.name.as_deref().unwrap_or("")
    }

    pub fn class_name(&self) -> &str {
        self.class_name.as_deref().unwrap_or("")
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ResolveAction {
    KeepOld,
    UseNew,
    FixName,
}

impl ResolveAction {
    pub const ALL: [ResolveAction; 3] = [
        ResolveAction::KeepOld,
        ResolveAction::UseNew,
        ResolveAction::FixName,
    ];

    pub fn as_str(self) -> &'static str {
        match self {
            ResolveAction::KeepOld => "keep_old",
            ResolveAction::UseNew => "use_new",
            ResolveAction::FixName => "fix_name",
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case", tag = "state", content = "action")]
pub enum ConflictState {
    Detected,
    Presented,
    Resolved(ResolveAction),
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct PromptAction {
    pub action: ResolveAction,
    pub label: String,
}

/// What the review table shows under the existing row when a scan collides.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ConflictPrompt {
    pub conflict_id: Uuid,
    pub record_id: Uuid,
    /// Current row of `record_id`; `None` once that record has been removed.
    pub existing_index: Option<usize>,
    pub target_missing: bool,
    pub student_name: String,
    pub headline: String,
    pub existing_score: String,
    pub candidate_score: String,
    pub actions: Vec<PromptAction>,
    pub detected_at: String,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum FocusField {
    Name,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Resolution {
    pub conflict_id: Uuid,
    pub record_id: Uuid,
    pub action: ResolveAction,
    /// Display position of the record at resolution time.
    pub index: Option<usize>,
    pub target_missing: bool,
    pub score: Option<Score>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub focus: Option<FocusField>,
    pub resolved_at: String,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase", tag = "outcome")]
pub enum ScanOutcome {
    Added { index: usize, record: ResultRecord },
    Duplicate { prompt: ConflictPrompt },
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct RecordPatch {
    pub name: Option<String>,
    #[serde(default, deserialize_with = "patch_score")]
    pub score: Option<Option<Score>>,
    #[serde(rename = "class")]
    pub class_name: Option<String>,
}

// Distinguishes an explicit `"score": null` from an absent key.
fn patch_score<'de, D>(de: D) -> Result<Option<Option<Score>>, D::Error>
where
    D: serde::Deserializer<'de>,
{
    Option::<Score>::deserialize(de).map(Some)
}

#[derive(Debug, Error, PartialEq)]
pub enum ReconcileError {
    #[error("conflict not found: {0}")]
    UnknownConflict(Uuid),
    #[error("conflict {id} was already resolved with {}", .action.as_str())]
    AlreadyResolved { id: Uuid, action: ResolveAction },
    #[error("record not found: {0}")]
    UnknownRecord(Uuid),
    #[error("another record at index {index} already has this name and class")]
    WouldDuplicate { index: usize },
}

impl ReconcileError {
    pub fn code(&self) -> &'static str {
        match self {
            ReconcileError::UnknownConflict(_) | ReconcileError::UnknownRecord(_) => "not_found",
            ReconcileError::AlreadyResolved { .. } => "conflict_resolved",
            ReconcileError::WouldDuplicate { .. } => "duplicate",
        }
    }
}

fn normalize(s: &str) -> String {
    s.trim().to_lowercase()
}

fn position_of_identity(
    name: &str,
    class_name: &str,
    records: &[ResultRecord],
    skip: Option<Uuid>,
) -> Option<usize> {
    let name = normalize(name);
    if name.is_empty() {
        return None;
    }
    let class_name = normalize(class_name);
    records.iter().position(|r| {
        Some(r.id) != skip && normalize(&r.name) == name && normalize(&r.class_name) == class_name
    })
}

/// Index of the first record with the same trimmed, case-folded name and class.
/// An unnamed candidate never collides.
pub fn find_duplicate_index(candidate: &Candidate, records: &[ResultRecord]) -> Option<usize> {
    position_of_identity(candidate.name(), candidate.class_name(), records, None)
}

fn score_label(score: Option<&Score>) -> String {
    match score {
        Some(s) if !s.to_string().trim().is_empty() => s.to_string(),
        _ => "?".to_string(),
    }
}

/// Builds the three-way prompt for a collision at `existing_index`. Returns
/// `None` if that index no longer maps to a record.
pub fn present_conflict(
    existing_index: usize,
    candidate: &Candidate,
    records: &[ResultRecord],
    assessment: Option<&str>,
) -> Option<ConflictPrompt> {
    let existing = records.get(existing_index)?;
    let existing_score = score_label(existing.score.as_ref());
    let candidate_score = score_label(candidate.score.as_ref());
    let student_name = match candidate.name().trim() {
        "" => "Unknown".to_string(),
        n => n.to_string(),
    };
    let assessment = assessment
        .map(str::trim)
        .filter(|a| !a.is_empty())
        .unwrap_or("score");

    let actions = ResolveAction::ALL
        .iter()
        .map(|&action| PromptAction {
            action,
            label: match action {
                ResolveAction::KeepOld => format!("Keep {existing_score} (first was correct)"),
                ResolveAction::UseNew => format!("Use {candidate_score} (this scan is better)"),
                ResolveAction::FixName => "Wrong name, let me fix".to_string(),
            },
        })
        .collect();

    Some(ConflictPrompt {
        conflict_id: Uuid::new_v4(),
        record_id: existing.id,
        existing_index: Some(existing_index),
        target_missing: false,
        headline: format!("{student_name}'s {assessment} was already scanned"),
        student_name,
        existing_score,
        candidate_score,
        actions,
        detected_at: Utc::now().to_rfc3339(),
    })
}

/// Applies `action` to the record at `index`. Returns false when the index is
/// out of range, in which case nothing changes.
pub fn resolve_at(
    records: &mut [ResultRecord],
    index: usize,
    action: ResolveAction,
    candidate_score: Option<Score>,
) -> bool {
    let Some(record) = records.get_mut(index) else {
        return false;
    };
    if action == ResolveAction::UseNew {
        record.score = candidate_score;
    }
    true
}

// Points a stored prompt at wherever its record sits now.
fn relocate(prompt: &ConflictPrompt, records: &[ResultRecord]) -> ConflictPrompt {
    let mut prompt = prompt.clone();
    prompt.existing_index = records.iter().position(|r| r.id == prompt.record_id);
    prompt.target_missing = prompt.existing_index.is_none();
    prompt
}

#[derive(Debug, Clone)]
struct Conflict {
    prompt: ConflictPrompt,
    candidate: Candidate,
    state: ConflictState,
}

/// Owns the review list and every duplicate prompt raised against it.
#[derive(Debug, Default)]
pub struct Reconciler {
    records: Vec<ResultRecord>,
    conflicts: Vec<Conflict>,
}

impl Reconciler {
    pub fn records(&self) -> &[ResultRecord] {
        &self.records
    }

    pub fn clear(&mut self) {
        self.records.clear();
        self.conflicts.clear();
    }

    /// Reconciles one candidate against the current list: either appends it
    /// or opens a prompt on the first matching record.
    pub fn scan(&mut self, candidate: Candidate, assessment: Option<&str>) -> ScanOutcome {
        if let Some(existing_index) = find_duplicate_index(&candidate, &self.records) {
            let Some(prompt) =
                present_conflict(existing_index, &candidate, &self.records, assessment)
            else {
                return self.append(candidate);
            };
            let slot = self.detect(prompt, candidate);
            return ScanOutcome::Duplicate {
                prompt: self.present(slot),
            };
        }
        self.append(candidate)
    }

    /// Records a collision. It is not listed as pending until presented.
    fn detect(&mut self, prompt: ConflictPrompt, candidate: Candidate) -> usize {
        info!(
            conflict_id = %prompt.conflict_id,
            record_id = %prompt.record_id,
            "duplicate scan detected"
        );
        self.conflicts.push(Conflict {
            prompt,
            candidate,
            state: ConflictState::Detected,
        });
        self.conflicts.len() - 1
    }

    fn present(&mut self, slot: usize) -> ConflictPrompt {
        let conflict = &mut self.conflicts[slot];
        conflict.state = ConflictState::Presented;
        debug!(conflict_id = %conflict.prompt.conflict_id, "conflict presented");
        relocate(&conflict.prompt, &self.records)
    }

    /// Batch candidates run one after another so each sees what the previous
    /// one appended.
    pub fn scan_batch(
        &mut self,
        candidates: Vec<Candidate>,
        assessment: Option<&str>,
    ) -> Vec<ScanOutcome> {
        candidates
            .into_iter()
            .map(|c| self.scan(c, assessment))
            .collect()
    }

    fn append(&mut self, candidate: Candidate) -> ScanOutcome {
        let record = ResultRecord::from_candidate(candidate);
        self.records.push(record.clone());
        let index = self.records.len() - 1;
        debug!(record_id = %record.id, index, "scan appended");
        ScanOutcome::Added { index, record }
    }

    pub fn pending(&self) -> Vec<ConflictPrompt> {
        self.conflicts
            .iter()
            .filter(|c| c.state == ConflictState::Presented)
            .map(|c| relocate(&c.prompt, &self.records))
            .collect()
    }

    pub fn conflict_state(&self, conflict_id: Uuid) -> Option<ConflictState> {
        self.conflicts
            .iter()
            .find(|c| c.prompt.conflict_id == conflict_id)
            .map(|c| c.state)
    }

    pub fn resolve(
        &mut self,
        conflict_id: Uuid,
        action: ResolveAction,
    ) -> Result<Resolution, ReconcileError> {
        let conflict = self
            .conflicts
            .iter_mut()
            .find(|c| c.prompt.conflict_id == conflict_id)
            .ok_or(ReconcileError::UnknownConflict(conflict_id))?;
        if let ConflictState::Resolved(prev) = conflict.state {
            return Err(ReconcileError::AlreadyResolved {
                id: conflict_id,
                action: prev,
            });
        }

        let record_id = conflict.prompt.record_id;
        let index = self.records.iter().position(|r| r.id == record_id);
        let target_missing = match index {
            Some(i) => !resolve_at(&mut self.records, i, action, conflict.candidate.score.clone()),
            None => true,
        };
        conflict.state = ConflictState::Resolved(action);

        info!(
            %conflict_id,
            action = action.as_str(),
            target_missing,
            "duplicate resolved"
        );

        Ok(Resolution {
            conflict_id,
            record_id,
            action,
            index,
            target_missing,
            score: index.and_then(|i| self.records[i].score.clone()),
            focus: (action == ResolveAction::FixName && !target_missing).then_some(FocusField::Name),
            resolved_at: Utc::now().to_rfc3339(),
        })
    }

    /// Edits a record in place. A patch that would make the record collide
    /// with another one is rejected.
    pub fn update(&mut self, record_id: Uuid, patch: RecordPatch) -> Result<usize, ReconcileError> {
        let index = self
            .records
            .iter()
            .position(|r| r.id == record_id)
            .ok_or(ReconcileError::UnknownRecord(record_id))?;

        let current = &self.records[index];
        let name = patch.name.as_deref().unwrap_or(&current.name);
        let class_name = patch.class_name.as_deref().unwrap_or(&current.class_name);
        if let Some(other) = position_of_identity(name, class_name, &self.records, Some(record_id)) {
            return Err(ReconcileError::WouldDuplicate { index: other });
        }

        let record = &mut self.records[index];
        if let Some(name) = patch.name {
            record.name = name;
        }
        if let Some(class_name) = patch.class_name {
            record.class_name = class_name;
        }
        if let Some(score) = patch.score {
            record.score = score;
        }
        Ok(index)
    }

    pub fn remove(&mut self, record_id: Uuid) -> Result<ResultRecord, ReconcileError> {
        let index = self
            .records
            .iter()
            .position(|r| r.id == record_id)
            .ok_or(ReconcileError::UnknownRecord(record_id))?;
        Ok(self.records.remove(index))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn candidate(name: &str, score: &str, class_name: &str) -> Candidate {
        Candidate {
            name: Some(name.to_string()),
            score: Some(Score::Text(score.to_string())),
            class_name: Some(class_name.to_string()),
        }
    }

    fn seeded(rows: &[(&str, &str, &str)]) -> Reconciler {
        let mut r = Reconciler::default();
        for (name, score, class_name) in rows {
            r.records
                .push(ResultRecord::from_candidate(candidate(name, score, class_name)));
        }
        r
    }

    #[test]
    fn duplicate_match_ignores_case_and_padding() {
        let r = seeded(&[("Ade Bello", "70", "JSS2A")]);
        assert_eq!(
            find_duplicate_index(&candidate("ade bello", "85", "jss2a "), r.records()),
            Some(0)
        );
        assert_eq!(
            find_duplicate_index(&candidate("Ade Bello", "85", "JSS2B"), r.records()),
            None
        );
    }

    #[test]
    fn blank_class_on_both_sides_still_matches() {
        let r = seeded(&[("Tolu", "5", ""), ("Tolu", "6", "  ")]);
        assert_eq!(find_duplicate_index(&candidate(" TOLU ", "9", ""), r.records()), Some(0));
    }

    #[test]
    fn first_match_wins() {
        let mut r = seeded(&[("Kemi", "1", "SS1"), ("Bayo", "2", "SS1")]);
        r.records
            .push(ResultRecord::from_candidate(candidate("kemi", "3", "ss1")));
        assert_eq!(find_duplicate_index(&candidate("KEMI", "4", "SS1"), r.records()), Some(0));
    }

    #[test]
    fn unnamed_candidate_never_collides() {
        let r = seeded(&[("", "1", "SS1"), ("  ", "2", "SS1")]);
        assert_eq!(find_duplicate_index(&candidate("   ", "3", "SS1"), r.records()), None);
        assert_eq!(find_duplicate_index(&Candidate::default(), r.records()), None);
    }

    #[test]
    fn prompt_shows_both_scores_and_three_actions() {
        let r = seeded(&[("Ade Bello", "70", "JSS2A")]);
        let prompt =
            present_conflict(0, &candidate("ade bello", "85", "jss2a"), r.records(), Some("CA1"))
                .expect("prompt");
        assert_eq!(prompt.existing_score, "70");
        assert_eq!(prompt.candidate_score, "85");
        assert_eq!(prompt.student_name, "ade bello");
        assert_eq!(prompt.headline, "ade bello's CA1 was already scanned");
        let actions: Vec<_> = prompt.actions.iter().map(|a| a.action).collect();
        assert_eq!(actions, ResolveAction::ALL.to_vec());
        assert!(present_conflict(3, &Candidate::default(), r.records(), None).is_none());
    }

    #[test]
    fn missing_scores_render_as_question_mark() {
        let r = seeded(&[("Ada", "", "")]);
        let unscored = Candidate {
            name: Some("ada".into()),
            ..Default::default()
        };
        let prompt = present_conflict(0, &unscored, r.records(), None).expect("prompt");
        assert_eq!(prompt.existing_score, "?");
        assert_eq!(prompt.candidate_score, "?");
        assert_eq!(prompt.headline, "ada's score was already scanned");
    }

    #[test]
    fn keep_old_leaves_score_untouched() {
        let mut r = seeded(&[("Ade Bello", "70", "JSS2A")]);
        let before = r.records()[0].score.clone();
        let ScanOutcome::Duplicate { prompt } = r.scan(candidate("ade bello", "85", "jss2a"), None)
        else {
            panic!("expected duplicate");
        };
        let res = r.resolve(prompt.conflict_id, ResolveAction::KeepOld).expect("resolve");
        assert_eq!(r.records()[0].score, before);
        assert_eq!(res.focus, None);
        assert_eq!(r.records().len(), 1);
    }

    #[test]
    fn use_new_overwrites_score_exactly() {
        let mut r = seeded(&[("Ade Bello", "70", "JSS2A")]);
        let ScanOutcome::Duplicate { prompt } = r.scan(candidate("ade bello", "85", "jss2a "), None)
        else {
            panic!("expected duplicate");
        };
        assert_eq!(prompt.existing_index, Some(0));
        let res = r.resolve(prompt.conflict_id, ResolveAction::UseNew).expect("resolve");
        assert_eq!(r.records()[0].score, Some(Score::Text("85".into())));
        assert_eq!(res.index, Some(0));
        assert!(!res.target_missing);
    }

    #[test]
    fn fix_name_requests_focus_without_mutation() {
        let mut r = seeded(&[("Ade Bello", "70", "JSS2A")]);
        let ScanOutcome::Duplicate { prompt } = r.scan(candidate("Ade Bello", "40", "JSS2A"), None)
        else {
            panic!("expected duplicate");
        };
        let res = r.resolve(prompt.conflict_id, ResolveAction::FixName).expect("resolve");
        assert_eq!(res.focus, Some(FocusField::Name));
        assert_eq!(r.records()[0].score, Some(Score::Text("70".into())));
    }

    #[test]
    fn a_conflict_resolves_once() {
        let mut r = seeded(&[("Ade", "70", "")]);
        let ScanOutcome::Duplicate { prompt } = r.scan(candidate("ade", "85", ""), None) else {
            panic!("expected duplicate");
        };
        assert_eq!(r.conflict_state(prompt.conflict_id), Some(ConflictState::Presented));
        r.resolve(prompt.conflict_id, ResolveAction::KeepOld).expect("first");
        let again = r.resolve(prompt.conflict_id, ResolveAction::UseNew);
        assert_eq!(
            again,
            Err(ReconcileError::AlreadyResolved {
                id: prompt.conflict_id,
                action: ResolveAction::KeepOld
            })
        );
        assert_eq!(r.records()[0].score, Some(Score::Text("70".into())));
        assert!(r.pending().is_empty());
    }

    #[test]
    fn removed_target_resolves_quietly() {
        let mut r = seeded(&[("Ade", "70", "")]);
        let id = r.records()[0].id;
        let ScanOutcome::Duplicate { prompt } = r.scan(candidate("ade", "85", ""), None) else {
            panic!("expected duplicate");
        };
        r.remove(id).expect("remove");
        let res = r.resolve(prompt.conflict_id, ResolveAction::UseNew).expect("resolve");
        assert!(res.target_missing);
        assert_eq!(res.index, None);
        assert!(r.records().is_empty());
    }

    #[test]
    fn pending_prompt_follows_its_record() {
        let mut r = seeded(&[("Ade", "70", ""), ("Bola", "60", "")]);
        let ade = r.records()[0].id;
        let ScanOutcome::Duplicate { prompt } = r.scan(candidate("bola", "65", ""), None) else {
            panic!("expected duplicate");
        };
        assert_eq!(prompt.existing_index, Some(1));

        r.remove(ade).expect("remove ade");
        let pending = r.pending();
        assert_eq!(pending[0].existing_index, Some(0));
        assert!(!pending[0].target_missing);

        let ScanOutcome::Duplicate { prompt } = r.scan(candidate("BOLA", "66", ""), None) else {
            panic!("expected duplicate");
        };
        r.remove(prompt.record_id).expect("remove bola");
        for p in r.pending() {
            assert_eq!(p.existing_index, None);
            assert!(p.target_missing);
        }
        assert_eq!(r.pending().len(), 2);
    }

    #[test]
    fn detected_conflict_is_listed_once_presented() {
        let mut r = seeded(&[("Ade", "70", "")]);
        let prompt = present_conflict(0, &candidate("ade", "85", ""), r.records(), None)
            .expect("prompt");
        let conflict_id = prompt.conflict_id;
        let slot = r.detect(prompt, candidate("ade", "85", ""));
        assert_eq!(r.conflict_state(conflict_id), Some(ConflictState::Detected));
        assert!(r.pending().is_empty());

        let shown = r.present(slot);
        assert_eq!(shown.conflict_id, conflict_id);
        assert_eq!(r.conflict_state(conflict_id), Some(ConflictState::Presented));
        assert_eq!(r.pending().len(), 1);
    }

    #[test]
    fn resolve_at_out_of_range_is_a_no_op() {
        let mut records = seeded(&[("Ade", "70", "")]).records;
        assert!(!resolve_at(&mut records, 4, ResolveAction::UseNew, None));
        assert!(resolve_at(&mut records, 0, ResolveAction::KeepOld, None));
        assert_eq!(records[0].score, Some(Score::Text("70".into())));
    }

    #[test]
    fn batch_sees_earlier_candidates() {
        let mut r = Reconciler::default();
        let out = r.scan_batch(
            vec![
                candidate("Zainab", "10", "SS2"),
                candidate("zainab ", "12", "ss2"),
                candidate("Musa", "8", "SS2"),
            ],
            None,
        );
        assert!(matches!(out[0], ScanOutcome::Added { index: 0, .. }));
        assert!(matches!(&out[1], ScanOutcome::Duplicate { prompt } if prompt.existing_index == Some(0)));
        assert!(matches!(out[2], ScanOutcome::Added { index: 1, .. }));
        assert_eq!(r.records().len(), 2);
    }

    #[test]
    fn update_rejects_collisions() {
        let mut r = seeded(&[("Ade", "70", "SS1"), ("Bola", "60", "SS1")]);
        let bola = r.records()[1].id;
        let patch = RecordPatch {
            name: Some("ADE".into()),
            ..Default::default()
        };
        assert_eq!(r.update(bola, patch), Err(ReconcileError::WouldDuplicate { index: 0 }));

        let patch = RecordPatch {
            name: Some("Bolaji".into()),
            score: Some(None),
            ..Default::default()
        };
        assert_eq!(r.update(bola, patch), Ok(1));
        assert_eq!(r.records()[1].name, "Bolaji");
        assert_eq!(r.records()[1].score, None);
    }

    #[test]
    fn numeric_scores_keep_their_form() {
        let raw = serde_json::json!({ "name": "Ade", "score": 70, "class": "SS1" });
        let c: Candidate = serde_json::from_value(raw).expect("candidate");
        let record = ResultRecord::from_candidate(c);
        let out = serde_json::to_value(&record).expect("serialize");
        assert_eq!(out["score"], serde_json::json!(70));
        assert_eq!(out["class"], "SS1");
    }
}

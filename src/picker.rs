use serde::{Deserialize, Serialize};
use serde_json::Value;
use tracing::warn;

pub const ROSTER_UNAVAILABLE: &str = "Could not load classes.";

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RosterClass {
    pub name: String,
    #[serde(default, alias = "student_count")]
    pub student_count: Option<i64>,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Chip {
    pub name: String,
    pub student_count: Option<i64>,
    pub selected: bool,
}

/// Multi-class chip picker. The first selected class is the primary one.
#[derive(Debug, Default)]
pub struct ClassPicker {
    roster: Vec<RosterClass>,
    selected: Vec<String>,
    unavailable: bool,
}

impl ClassPicker {
    /// Takes whatever the roster service answered. Anything that is not a list
    /// of classes leaves an empty roster with the unavailable flag set.
    pub fn load_roster(&mut self, payload: &Value) {
        match serde_json::from_value::<Vec<RosterClass>>(payload.clone()) {
            Ok(classes) => {
                self.roster = classes
                    .into_iter()
                    .filter(|c| !c.name.trim().is_empty())
                    .collect();
                self.unavailable = false;
            }
            Err(e) => {
                warn!(error = %e, "roster payload rejected");
                self.roster.clear();
                self.unavailable = true;
            }
        }
    }

    pub fn empty_message(&self) -> Option<&'static str> {
        self.unavailable.then_some(ROSTER_UNAVAILABLE)
    }

    /// Flips selection for `class_name` and reports whether it is now selected.
    pub fn toggle(&mut self, class_name: &str) -> bool {
        let class_name = class_name.trim();
        if class_name.is_empty() {
            return false;
        }
        match self.selected.iter().position(|c| c == class_name) {
            Some(i) => {
                self.selected.remove(i);
                false
            }
            None => {
                self.selected.push(class_name.to_string());
                true
            }
        }
    }

    pub fn selected(&self) -> &[String] {
        &self.selected
    }

    pub fn primary(&self) -> Option<&str> {
        self.selected.first().map(String::as_str)
    }

    pub fn chips(&self) -> Vec<Chip> {
        self.roster
            .iter()
            .map(|c| Chip {
                name: c.name.clone(),
                student_count: c.student_count,
                selected: self.selected.iter().any(|s| *s == c.name),
            })
            .collect()
    }

    pub fn clear_selection(&mut self) {
        self.selected.clear();
    }
}

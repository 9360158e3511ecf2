use regex::Regex;
use serde::de::{MapAccess, Visitor};
use serde::ser::SerializeMap;
use serde::{Deserialize, Deserializer, Serialize, Serializer};
use serde_json::Value;
use std::fmt;
use std::sync::OnceLock;
use tracing::debug;

pub const DEFAULT_PREVIEW_ROWS: usize = 5;
pub const OTHER_LEVEL: &str = "OTHER";
/// Arm value for class names that carry no section after the numeral.
pub const NO_ARM: &str = "-";
pub const EMPTY_SHEET_MESSAGE: &str = "No data for this class yet.";

pub type Row = serde_json::Map<String, Value>;

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Sheet {
    #[serde(rename = "class", default)]
    pub class_name: String,
    #[serde(default)]
    pub subject: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub level: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub columns: Option<Vec<String>>,
    #[serde(default)]
    pub rows: Option<Vec<Row>>,
}

impl Sheet {
    pub fn rows(&self) -> &[Row] {
        self.rows.as_deref().unwrap_or(&[])
    }

    /// Explicit column list, or the first row's keys in their original order.
    pub fn columns(&self) -> Vec<String> {
        match &self.columns {
            Some(cols) if !cols.is_empty() => cols.clone(),
            _ => self
                .rows()
                .first()
                .map(|r| r.keys().cloned().collect())
                .unwrap_or_default(),
        }
    }

    pub fn heading(&self) -> String {
        format!("{} — {}", self.class_name, self.subject)
    }

    fn level_key(&self) -> String {
        let source = self
            .level
            .as_deref()
            .filter(|l| !l.trim().is_empty())
            .unwrap_or(&self.class_name);
        derive_level(source).level
    }
}

/// Sheet name to sheet, in the order the aggregation service listed them.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct SheetsCollection {
    entries: Vec<(String, Sheet)>,
}

impl SheetsCollection {
    pub fn insert(&mut self, name: String, sheet: Sheet) {
        match self.entries.iter_mut().find(|(n, _)| *n == name) {
            Some(slot) => slot.1 = sheet,
            None => self.entries.push((name, sheet)),
        }
    }

    pub fn get(&self, name: &str) -> Option<&Sheet> {
        self.entries.iter().find(|(n, _)| n == name).map(|(_, s)| s)
    }

    pub fn contains(&self, name: &str) -> bool {
        self.get(name).is_some()
    }

    pub fn names(&self) -> impl Iterator<Item = &str> {
        self.entries.iter().map(|(n, _)| n.as_str())
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, &Sheet)> {
        self.entries.iter().map(|(n, s)| (n.as_str(), s))
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }
}

impl FromIterator<(String, Sheet)> for SheetsCollection {
    fn from_iter<I: IntoIterator<Item = (String, Sheet)>>(iter: I) -> Self {
        let mut out = SheetsCollection::default();
        for (name, sheet) in iter {
            out.insert(name, sheet);
        }
        out
    }
}

impl Serialize for SheetsCollection {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        let mut map = serializer.serialize_map(Some(self.entries.len()))?;
        for (name, sheet) in &self.entries {
            map.serialize_entry(name, sheet)?;
        }
        map.end()
    }
}

struct SheetsVisitor;

impl<'de> Visitor<'de> for SheetsVisitor {
    type Value = SheetsCollection;

    fn expecting(&self, f: &mut fmt::Formatter) -> fmt::Result {
        f.write_str("an object of sheet name to sheet")
    }

    fn visit_map<A: MapAccess<'de>>(self, mut access: A) -> Result<Self::Value, A::Error> {
        let mut out = SheetsCollection::default();
        while let Some((name, sheet)) = access.next_entry::<String, Sheet>()? {
            out.insert(name, sheet);
        }
        Ok(out)
    }
}

impl<'de> Deserialize<'de> for SheetsCollection {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        deserializer.deserialize_map(SheetsVisitor)
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct LevelInfo {
    pub level: String,
    pub arm: String,
    pub normalized: String,
}

fn level_pattern() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| Regex::new(r"^([A-Z]+)\s*([0-9]+)\s*(.*)$").expect("level regex"))
}

/// Splits a class name such as `JSS 2A` into its level (`JSS2`) and arm (`A`).
pub fn derive_level(class_name: &str) -> LevelInfo {
    let normalized = class_name
        .replace('.', "")
        .to_uppercase()
        .split_whitespace()
        .collect::<Vec<_>>()
        .join(" ");

    if normalized.is_empty() {
        return LevelInfo {
            level: OTHER_LEVEL.to_string(),
            arm: NO_ARM.to_string(),
            normalized,
        };
    }

    match level_pattern().captures(&normalized) {
        Some(caps) => {
            let level = format!("{}{}", &caps[1], &caps[2]);
            let arm: String = caps[3]
                .trim_start_matches(|c: char| !c.is_alphanumeric())
                .split_whitespace()
                .collect();
            let arm = if arm.is_empty() { NO_ARM.to_string() } else { arm };
            LevelInfo {
                level,
                arm,
                normalized,
            }
        }
        None => LevelInfo {
            level: normalized.clone(),
            arm: NO_ARM.to_string(),
            normalized,
        },
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Tab {
    pub sheet_name: String,
    #[serde(rename = "class")]
    pub class_name: String,
    pub subject: String,
    pub active: bool,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct TabGroup {
    pub level: String,
    pub tabs: Vec<Tab>,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct TabBar {
    pub groups: Vec<TabGroup>,
    /// False when every sheet sits in one level; the bar is then a flat row.
    pub show_level_labels: bool,
}

impl TabBar {
    fn mark_active(&mut self, sheet_name: &str) {
        for tab in self.groups.iter_mut().flat_map(|g| g.tabs.iter_mut()) {
            tab.active = tab.sheet_name == sheet_name;
        }
    }
}

pub fn build_tabs(sheets: &SheetsCollection) -> TabBar {
    let mut groups: Vec<TabGroup> = Vec::new();
    for (name, sheet) in sheets.iter() {
        let level = sheet.level_key();
        let tab = Tab {
            sheet_name: name.to_string(),
            class_name: sheet.class_name.clone(),
            subject: sheet.subject.clone(),
            active: false,
        };
        match groups.iter_mut().find(|g| g.level == level) {
            Some(g) => g.tabs.push(tab),
            None => groups.push(TabGroup {
                level,
                tabs: vec![tab],
            }),
        }
    }
    let show_level_labels = groups.len() > 1;
    TabBar {
        groups,
        show_level_labels,
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct RowsToggle {
    pub label: String,
    pub expanded: bool,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase", tag = "kind")]
pub enum RowsView {
    Empty {
        message: String,
    },
    #[serde(rename_all = "camelCase")]
    Table {
        columns: Vec<String>,
        preview: Vec<Vec<String>>,
        overflow: Vec<Vec<String>>,
        overflow_hidden: bool,
        toggle: Option<RowsToggle>,
    },
}

fn cell_text(value: Option<&Value>) -> String {
    match value {
        None | Some(Value::Null) => String::new(),
        Some(Value::String(s)) => s.clone(),
        Some(other) => other.to_string(),
    }
}

pub fn render_rows(sheet: &Sheet, preview_rows: usize, expanded: bool) -> RowsView {
    let rows = sheet.rows();
    if rows.is_empty() {
        return RowsView::Empty {
            message: EMPTY_SHEET_MESSAGE.to_string(),
        };
    }

    let columns = sheet.columns();
    let cells: Vec<Vec<String>> = rows
        .iter()
        .map(|row| columns.iter().map(|c| cell_text(row.get(c))).collect())
        .collect();

    let split = preview_rows.min(cells.len());
    let mut preview = cells;
    let overflow = preview.split_off(split);

    let toggle = (!overflow.is_empty()).then(|| RowsToggle {
        label: if expanded {
            "Collapse list".to_string()
        } else {
            format!("Show all {} students", rows.len())
        },
        expanded,
    });

    RowsView::Table {
        columns,
        overflow_hidden: !overflow.is_empty() && !expanded,
        preview,
        overflow,
        toggle,
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ResultsPanel {
    pub active_sheet: String,
    pub heading: String,
    pub tabs: TabBar,
    pub rows: RowsView,
}

/// Tabbed results view. Holds the sheets collection and the active tab.
#[derive(Debug)]
pub struct ResultsView {
    sheets: SheetsCollection,
    active: Option<String>,
    expanded: bool,
    preview_rows: usize,
}

impl Default for ResultsView {
    fn default() -> Self {
        Self::new(DEFAULT_PREVIEW_ROWS)
    }
}

impl ResultsView {
    pub fn new(preview_rows: usize) -> Self {
        Self {
            sheets: SheetsCollection::default(),
            active: None,
            expanded: false,
            preview_rows,
        }
    }

    pub fn active_tab(&self) -> Option<&str> {
        self.active.as_deref()
    }

    pub fn sheets(&self) -> &SheetsCollection {
        &self.sheets
    }

    pub fn clear(&mut self) {
        self.sheets = SheetsCollection::default();
        self.active = None;
        self.expanded = false;
    }

    /// Replaces the collection and shows its first sheet.
    pub fn render(&mut self, sheets: SheetsCollection) -> Option<ResultsPanel> {
        self.active = sheets.names().next().map(str::to_string);
        self.sheets = sheets;
        self.expanded = false;
        debug!(sheets = self.sheets.len(), active = ?self.active, "results rendered");
        self.panel()
    }

    /// Unknown names leave the view untouched and return `None`.
    pub fn select_tab(&mut self, sheet_name: &str) -> Option<ResultsPanel> {
        if !self.sheets.contains(sheet_name) {
            return None;
        }
        self.active = Some(sheet_name.to_string());
        self.expanded = false;
        debug!(sheet_name, "tab selected");
        self.panel()
    }

    pub fn toggle_rows(&mut self) -> Option<RowsView> {
        let sheet = self.sheets.get(self.active.as_deref()?)?;
        if sheet.rows().len() <= self.preview_rows {
            return Some(render_rows(sheet, self.preview_rows, self.expanded));
        }
        self.expanded = !self.expanded;
        Some(render_rows(sheet, self.preview_rows, self.expanded))
    }

    pub fn panel(&self) -> Option<ResultsPanel> {
        let name = self.active.as_deref()?;
        let sheet = self.sheets.get(name)?;
        let mut tabs = build_tabs(&self.sheets);
        tabs.mark_active(name);
        Some(ResultsPanel {
            active_sheet: name.to_string(),
            heading: sheet.heading(),
            tabs,
            rows: render_rows(sheet, self.preview_rows, self.expanded),
        })
    }
}

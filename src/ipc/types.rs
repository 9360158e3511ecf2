use serde::Deserialize;

use crate::config::Config;
use crate::picker::ClassPicker;
use crate::reconcile::Reconciler;
use crate::sheets::ResultsView;

#[derive(Debug, Deserialize, Clone)]
pub struct Request {
    pub id: String,
    pub method: String,
    #[serde(default)]
    pub params: serde_json::Value,
}

/// Everything the browser layer used to keep in page globals.
pub struct AppState {
    pub results: Reconciler,
    pub view: ResultsView,
    pub picker: ClassPicker,
}

impl AppState {
    pub fn new(cfg: &Config) -> Self {
        Self {
            results: Reconciler::default(),
            view: ResultsView::new(cfg.preview_rows),
            picker: ClassPicker::default(),
        }
    }

    pub fn reset(&mut self) {
        self.results.clear();
        self.view.clear();
        self.picker.clear_selection();
    }
}

use crate::model::DatasetFile;
use crate::orchestrator::{process_result, SubmissionController};
use std::path::{Path, PathBuf};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Focus {
    File,
    Target,
}

pub struct UiState {
    pub focus: Focus,
    pub file_path: String,
    pub target_column: String,
    pub info: String,
    pub file_error: Option<String>,
    pub show_help: bool,
    pub endpoint: String,
    pub image_dir: Option<PathBuf>,
    pub result_lines: Vec<String>,
}

impl Default for UiState {
    fn default() -> Self {
        Self {
            focus: Focus::File,
            file_path: String::new(),
            target_column: String::new(),
            info: "Informe o arquivo e a coluna alvo, depois Enter.".into(),
            file_error: None,
            show_help: false,
            endpoint: String::new(),
            image_dir: None,
            result_lines: Vec::new(),
        }
    }
}

impl UiState {
    pub fn toggle_focus(&mut self) {
        self.focus = match self.focus {
            Focus::File => Focus::Target,
            Focus::Target => Focus::File,
        };
    }

    fn focused_mut(&mut self) -> &mut String {
        match self.focus {
            Focus::File => &mut self.file_path,
            Focus::Target => &mut self.target_column,
        }
    }

    pub fn push_char(&mut self, c: char) {
        self.focused_mut().push(c);
    }

    pub fn backspace(&mut self) {
        self.focused_mut().pop();
    }

    pub fn clear_focused(&mut self) {
        self.focused_mut().clear();
    }

    /// Push the form fields into the controller.
    ///
    /// An empty path clears the file; an unreadable one clears it too and is
    /// reported through `file_error`, so validation still runs.
    pub fn sync_input(&mut self, controller: &mut SubmissionController) {
        self.file_error = None;
        let path = self.file_path.trim();
        let file = if path.is_empty() {
            None
        } else {
            match DatasetFile::from_path(Path::new(path)) {
                Ok(file) => Some(file),
                Err(e) => {
                    self.file_error = Some(format!("{e:#}"));
                    None
                }
            }
        };
        controller.set_file(file);
        controller.set_target_column(self.target_column.clone());
    }

    /// Rebuild the result panel from the controller's terminal status.
    pub fn refresh_results(&mut self, controller: &SubmissionController) {
        self.result_lines = match controller.result() {
            Some(result) => {
                let processed = process_result(self.image_dir.as_deref(), result);
                let mut lines = processed.lines;
                lines.extend(processed.export_messages);
                lines
            }
            None => Vec::new(),
        };
    }
}

pub fn submit_label(in_flight: bool) -> &'static str {
    if in_flight {
        "Processando..."
    } else {
        "Enviar"
    }
}

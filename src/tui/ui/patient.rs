//! Patient data input form.

use ratatui::{
    layout::{Constraint, Direction, Layout, Rect},
    text::{Line, Span},
    widgets::{Block, Borders, Paragraph},
    Frame,
};
use zeroize::Zeroize;

use crate::domain::PatientInput;
use crate::tui::styles::MedicalTheme;

const GENERAL_HEALTH_LABELS: [&str; 5] = ["Excellent", "Very good", "Good", "Fair", "Poor"];
const CHEST_PAIN_LABELS: [&str; 4] = [
    "None",
    "Non-anginal pain",
    "Atypical angina",
    "Typical angina",
];

/// How a field takes input.
#[derive(Debug, Clone, PartialEq)]
pub enum FieldKind {
    /// Typed number; `decimal` allows one `.`
    Text { value: String, decimal: bool },
    /// Stepped with Left/Right between `min` and `max`
    Slider { value: f64, min: f64, max: f64, step: f64 },
}

/// Form field definition
#[derive(Debug, Clone)]
pub struct FormField {
    pub label: &'static str,
    pub hint: &'static str,
    pub kind: FieldKind,
}

impl FormField {
    fn display(&self) -> String {
        match (&self.kind, self.label) {
            (FieldKind::Text { value, .. }, _) => value.clone(),
            (FieldKind::Slider { value, .. }, "General health") => {
                let idx = (*value as usize).clamp(1, 5) - 1;
                format!("{value:.0} ({})", GENERAL_HEALTH_LABELS[idx])
            }
            (FieldKind::Slider { value, .. }, "Chest pain") => {
                let idx = (*value as usize).min(3);
                format!("{value:.0} ({})", CHEST_PAIN_LABELS[idx])
            }
            (FieldKind::Slider { value, .. }, _) => format!("{value:.1}"),
        }
    }
}

/// Patient form state
pub struct PatientFormState {
    pub fields: Vec<FormField>,
    pub selected_field: usize,
    pub error_message: Option<String>,
}

impl Default for PatientFormState {
    fn default() -> Self {
        let defaults = PatientInput::default();
        Self {
            fields: vec![
                FormField {
                    label: "Age",
                    hint: "years",
                    kind: FieldKind::Text {
                        value: String::new(),
                        decimal: false,
                    },
                },
                FormField {
                    label: "BMI",
                    hint: "kg/m², e.g. 24.5",
                    kind: FieldKind::Text {
                        value: String::new(),
                        decimal: true,
                    },
                },
                FormField {
                    label: "General health",
                    hint: "1 excellent .. 5 poor",
                    kind: FieldKind::Slider {
                        value: f64::from(defaults.general_health),
                        min: 1.0,
                        max: 5.0,
                        step: 1.0,
                    },
                },
                FormField {
                    label: "Chest pain",
                    hint: "type of chest pain",
                    kind: FieldKind::Slider {
                        value: f64::from(defaults.chest_pain),
                        min: 0.0,
                        max: 3.0,
                        step: 1.0,
                    },
                },
                FormField {
                    label: "Exercise pain",
                    hint: "0 none .. 6 forces a stop",
                    kind: FieldKind::Slider {
                        value: defaults.exercise_pain,
                        min: 0.0,
                        max: 6.0,
                        step: 0.1,
                    },
                },
            ],
            selected_field: 0,
            error_message: None,
        }
    }
}

impl PatientFormState {
    /// Move to the next field
    pub fn next_field(&mut self) {
        self.selected_field = (self.selected_field + 1) % self.fields.len();
    }

    /// Move to the previous field
    pub fn prev_field(&mut self) {
        if self.selected_field == 0 {
            self.selected_field = self.fields.len() - 1;
        } else {
            self.selected_field -= 1;
        }
    }

    /// Add a character to the current text field
    pub fn input_char(&mut self, c: char) {
        if let FieldKind::Text { value, decimal } = &mut self.fields[self.selected_field].kind {
            if c.is_ascii_digit() || (*decimal && c == '.' && !value.contains('.')) {
                value.push(c);
                self.error_message = None;
            }
        }
    }

    /// Delete the last character
    pub fn delete_char(&mut self) {
        if let FieldKind::Text { value, .. } = &mut self.fields[self.selected_field].kind {
            value.pop();
        }
    }

    /// Clear the current text field
    pub fn clear_field(&mut self) {
        if let FieldKind::Text { value, .. } = &mut self.fields[self.selected_field].kind {
            value.zeroize();
        }
    }

    /// Step the current slider by `steps` increments (negative moves down).
    pub fn adjust(&mut self, steps: i32) {
        if let FieldKind::Slider {
            value,
            min,
            max,
            step,
        } = &mut self.fields[self.selected_field].kind
        {
            let next = *value + f64::from(steps) * *step;
            // Snap to the step grid so 0.1 increments do not drift.
            *value = ((next / *step).round() * *step).clamp(*min, *max);
            self.error_message = None;
        }
    }

    /// Wipe typed buffers and restore slider defaults.
    pub fn clear_sensitive(&mut self) {
        for field in &mut self.fields {
            if let FieldKind::Text { value, .. } = &mut field.kind {
                value.zeroize();
            }
        }
        let fresh = Self::default();
        for (field, default) in self.fields.iter_mut().zip(fresh.fields) {
            if matches!(field.kind, FieldKind::Slider { .. }) {
                field.kind = default.kind;
            }
        }
        self.error_message = None;
        self.selected_field = 0;
    }

    fn text(&self, index: usize) -> &str {
        match &self.fields[index].kind {
            FieldKind::Text { value, .. } => value,
            FieldKind::Slider { .. } => "",
        }
    }

    fn slider(&self, index: usize) -> f64 {
        match &self.fields[index].kind {
            FieldKind::Slider { value, .. } => *value,
            FieldKind::Text { .. } => 0.0,
        }
    }

    /// Convert the form to raw input. Empty text fields become `None`.
    ///
    /// # Errors
    /// A field that holds text but does not parse.
    pub fn to_patient_input(&self) -> Result<PatientInput, String> {
        let age = match self.text(0) {
            "" => None,
            s => Some(s.parse::<i32>().map_err(|_| "Age: Invalid number".to_string())?),
        };
        let bmi = match self.text(1) {
            "" => None,
            s => Some(s.parse::<f64>().map_err(|_| "BMI: Invalid number".to_string())?),
        };

        Ok(PatientInput {
            age,
            bmi,
            general_health: self.slider(2).round() as u8,
            chest_pain: self.slider(3).round() as u8,
            exercise_pain: (self.slider(4) * 10.0).round() / 10.0,
        })
    }

    /// Load a worked example: age 45, BMI 28.5, good health, non-anginal pain.
    pub fn load_sample_data(&mut self) {
        let sample = [45.0, 28.5, 2.0, 1.0, 3.0];
        for (field, v) in self.fields.iter_mut().zip(sample) {
            match &mut field.kind {
                FieldKind::Text { value, decimal } => {
                    *value = if *decimal { format!("{v:.1}") } else { format!("{v:.0}") };
                }
                FieldKind::Slider { value, .. } => *value = v,
            }
        }
        self.error_message = None;
    }
}

/// Render the patient data input form
pub fn render_patient_form(f: &mut Frame, area: Rect, state: &PatientFormState) {
    let chunks = Layout::default()
        .direction(Direction::Vertical)
        .constraints([
            Constraint::Length(3), // Header
            Constraint::Min(0),    // Form
            Constraint::Length(3), // Footer/error
        ])
        .split(area);

    render_form_header(f, chunks[0]);
    render_form_fields(f, chunks[1], state);
    render_form_footer(f, chunks[2], state);
}

fn render_form_header(f: &mut Frame, area: Rect) {
    let header = Paragraph::new(Line::from(vec![
        Span::styled(" ", MedicalTheme::text()),
        Span::styled("Patient Data Entry", MedicalTheme::title()),
        Span::styled(
            " │ Diabetes & Hypertension Risk",
            MedicalTheme::text_secondary(),
        ),
    ]))
    .block(
        Block::default()
            .borders(Borders::BOTTOM)
            .border_style(MedicalTheme::border()),
    );

    f.render_widget(header, area);
}

fn render_form_fields(f: &mut Frame, area: Rect, state: &PatientFormState) {
    let columns = Layout::default()
        .direction(Direction::Horizontal)
        .constraints([Constraint::Percentage(50), Constraint::Percentage(50)])
        .margin(1)
        .split(area);

    // Typed fields left, sliders right.
    render_field_column(f, columns[0], &state.fields[..2], 0, state.selected_field);
    render_field_column(f, columns[1], &state.fields[2..], 2, state.selected_field);
}

fn render_field_column(
    f: &mut Frame,
    area: Rect,
    fields: &[FormField],
    offset: usize,
    selected: usize,
) {
    let field_height = 3;
    let constraints: Vec<Constraint> = fields
        .iter()
        .map(|_| Constraint::Length(field_height))
        .chain(std::iter::once(Constraint::Min(0)))
        .collect();

    let chunks = Layout::default()
        .direction(Direction::Vertical)
        .constraints(constraints)
        .split(area);

    for (i, field) in fields.iter().enumerate() {
        let is_selected = offset + i == selected;
        let border_style = if is_selected {
            MedicalTheme::border_focused()
        } else {
            MedicalTheme::border()
        };

        let title_style = if is_selected {
            MedicalTheme::focused()
        } else {
            MedicalTheme::text_secondary()
        };

        let block = Block::default()
            .title(Span::styled(format!(" {} ", field.label), title_style))
            .borders(Borders::ALL)
            .border_style(border_style);

        let shown = field.display();
        let mut spans = vec![Span::raw(" ")];
        match &field.kind {
            FieldKind::Text { .. } if shown.is_empty() => {
                spans.push(Span::styled(field.hint, MedicalTheme::text_muted()));
            }
            FieldKind::Text { .. } => spans.push(Span::styled(shown, MedicalTheme::text())),
            FieldKind::Slider { .. } => {
                spans.push(Span::styled("◀ ", MedicalTheme::key_hint()));
                spans.push(Span::styled(shown, MedicalTheme::text()));
                spans.push(Span::styled(" ▶  ", MedicalTheme::key_hint()));
                spans.push(Span::styled(field.hint, MedicalTheme::text_muted()));
            }
        }
        if is_selected && matches!(field.kind, FieldKind::Text { .. }) {
            spans.push(Span::styled("▌", MedicalTheme::cursor()));
        }

        f.render_widget(Paragraph::new(Line::from(spans)).block(block), chunks[i]);
    }
}

fn render_form_footer(f: &mut Frame, area: Rect, state: &PatientFormState) {
    let content = if let Some(err) = &state.error_message {
        Line::from(vec![
            Span::styled("! ", MedicalTheme::danger()),
            Span::styled(err.clone(), MedicalTheme::danger()),
        ])
    } else {
        Line::from(vec![
            Span::styled("[↑↓] ", MedicalTheme::key_hint()),
            Span::styled("Navigate ", MedicalTheme::key_desc()),
            Span::styled("[←→] ", MedicalTheme::key_hint()),
            Span::styled("Adjust ", MedicalTheme::key_desc()),
            Span::styled("[Enter] ", MedicalTheme::key_hint()),
            Span::styled("Submit ", MedicalTheme::key_desc()),
            Span::styled("[S] ", MedicalTheme::key_hint()),
            Span::styled("Sample Data ", MedicalTheme::key_desc()),
            Span::styled("[Esc] ", MedicalTheme::key_hint()),
            Span::styled("Cancel", MedicalTheme::key_desc()),
        ])
    };

    let footer = Paragraph::new(content).block(
        Block::default()
            .borders(Borders::TOP)
            .border_style(MedicalTheme::border()),
    );

    f.render_widget(footer, area);
}

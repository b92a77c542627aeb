//! Lab report composition.

use std::collections::HashMap;
use std::fmt::Write as _;

use octofhir_labs::EvaluationResult;
use time::OffsetDateTime;
use time::macros::format_description;

use crate::error::NotificationError;
use crate::templates::{Template, TemplateRenderer};

pub const REPORT_TEMPLATE_ID: &str = "lab-report";
pub const REPORT_TITLE: &str = "Patients Lab Report Summary";

const HTML_TEMPLATE: &str = r#"<h1>{{title}} - {{timestamp}}</h1>
<table border="1" cellpadding="5" cellspacing="0" style="border-collapse: collapse; width: 100%;">
  <thead>
    <tr>
      <th>Patient</th>
      <th>Observation</th>
      <th>Value</th>
      <th>Normal</th>
      <th>Reason</th>
    </tr>
  </thead>
  <tbody>
{{rows}}  </tbody>
</table>
"#;

const TEXT_TEMPLATE: &str = "{{title}} - {{timestamp}}\n\n{{rows}}\n{{summary}}\n";

/// A composed report ready for delivery.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ReportMessage {
    pub subject: String,
    pub html: String,
    pub text: String,
}

/// One rendered table row.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ReportRow {
    pub patient: String,
    pub observation: String,
    pub value: String,
    pub normal: bool,
    pub reason: String,
}

impl ReportRow {
    pub fn from_result(result: &EvaluationResult) -> Self {
        let patient = result
            .patient
            .as_ref()
            .and_then(|p| p.display_name())
            .unwrap_or_else(|| "Unknown patient".to_string());
        let observation = result
            .observation
            .code
            .label()
            .unwrap_or(result.observation.id.as_str())
            .to_string();
        let value = match (result.value, result.observation.unit()) {
            (Some(v), Some(unit)) => format!("{v} {unit}"),
            (Some(v), None) => v.to_string(),
            (None, _) => "Not known".to_string(),
        };

        Self {
            patient,
            observation,
            value,
            normal: result.normal,
            reason: result.reason.to_string(),
        }
    }

    fn glyph(&self) -> &'static str {
        if self.normal { "✅" } else { "❌" }
    }
}

/// Renders evaluation results into the HTML report email.
pub struct ReportComposer {
    renderer: TemplateRenderer,
}

impl ReportComposer {
    pub fn new() -> Self {
        let mut renderer = TemplateRenderer::new();
        renderer.register(Template {
            id: REPORT_TEMPLATE_ID.to_string(),
            subject: Some("{{title}} - {{timestamp}}".to_string()),
            body: TEXT_TEMPLATE.to_string(),
            html_body: Some(HTML_TEMPLATE.to_string()),
        });
        Self { renderer }
    }

    /// Composes the report for the given results, in result order.
    pub fn compose(
        &self,
        results: &[EvaluationResult],
        generated_at: OffsetDateTime,
    ) -> Result<ReportMessage, NotificationError> {
        let rows: Vec<ReportRow> = results.iter().map(ReportRow::from_result).collect();
        let abnormal = rows.iter().filter(|r| !r.normal).count();

        let mut data = HashMap::new();
        data.insert("title", REPORT_TITLE.to_string());
        data.insert("timestamp", format_timestamp(generated_at));
        data.insert("rows", render_html_rows(&rows));
        let text_rows = render_text_rows(&rows);
        let summary = format!("{} observations, {abnormal} not normal", rows.len());

        let html = self.renderer.render(REPORT_TEMPLATE_ID, &data)?;
        data.insert("rows", text_rows);
        data.insert("summary", summary);
        let text = self.renderer.render(REPORT_TEMPLATE_ID, &data)?;

        Ok(ReportMessage {
            subject: text.subject.unwrap_or_else(|| REPORT_TITLE.to_string()),
            html: html.html_body.unwrap_or_default(),
            text: text.body,
        })
    }
}

impl Default for ReportComposer {
    fn default() -> Self {
        Self::new()
    }
}

/// `2024-05-01 00:00:00 UTC`
pub fn format_timestamp(at: OffsetDateTime) -> String {
    let format = format_description!("[year]-[month]-[day] [hour]:[minute]:[second]");
    let utc = at.to_offset(time::UtcOffset::UTC);
    match utc.format(&format) {
        Ok(s) => format!("{s} UTC"),
        Err(_) => utc.unix_timestamp().to_string(),
    }
}

pub fn escape_html(input: &str) -> String {
    let mut out = String::with_capacity(input.len());
    for c in input.chars() {
        match c {
            '&' => out.push_str("&amp;"),
            '<' => out.push_str("&lt;"),
            '>' => out.push_str("&gt;"),
            '"' => out.push_str("&quot;"),
            '\'' => out.push_str("&#39;"),
            _ => out.push(c),
        }
    }
    out
}

fn render_html_rows(rows: &[ReportRow]) -> String {
    let mut out = String::new();
    for row in rows {
        let _ = writeln!(
            out,
            "    <tr>\n      <td>{}</td>\n      <td>{}</td>\n      <td>{}</td>\n      <td>{}</td>\n      <td>{}</td>\n    </tr>",
            escape_html(&row.patient),
            escape_html(&row.observation),
            escape_html(&row.value),
            row.glyph(),
            escape_html(&row.reason),
        );
    }
    out
}

fn render_text_rows(rows: &[ReportRow]) -> String {
    let mut out = String::new();
    for row in rows {
        let _ = writeln!(
            out,
            "{} | {} | {} | {} | {}",
            row.patient,
            row.observation,
            row.value,
            if row.normal { "normal" } else { "NOT normal" },
            row.reason
        );
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;
    use octofhir_labs::{
        CodeableConcept, EvaluationReason, HumanName, Observation, Patient, Quantity,
    };
    use time::macros::datetime;

    fn result(
        patient: Option<&str>,
        code: &str,
        value: Option<f64>,
        normal: bool,
        reason: EvaluationReason,
    ) -> EvaluationResult {
        EvaluationResult {
            observation: Observation {
                id: "obs".into(),
                code: CodeableConcept {
                    text: Some(code.into()),
                    coding: vec![],
                },
                value_quantity: value.map(|v| Quantity {
                    value: Some(v),
                    unit: Some("mg/dL".into()),
                    ..Default::default()
                }),
                ..Default::default()
            },
            patient: patient.map(|given| Patient {
                id: "p1".into(),
                name: vec![HumanName {
                    given: vec![given.into()],
                    ..Default::default()
                }],
            }),
            normal,
            reason,
            value,
        }
    }

    #[test]
    fn test_compose_report() {
        let results = vec![
            result(
                Some("Derrick"),
                "Glucose",
                Some(95.0),
                true,
                EvaluationReason::WithinReferenceRange,
            ),
            result(
                Some("Camila"),
                "Cholesterol",
                None,
                false,
                EvaluationReason::IncompleteData,
            ),
        ];
        let message = ReportComposer::new()
            .compose(&results, datetime!(2024-05-01 08:30:00 UTC))
            .unwrap();

        assert_eq!(
            message.subject,
            "Patients Lab Report Summary - 2024-05-01 08:30:00 UTC"
        );
        assert!(message
            .html
            .starts_with("<h1>Patients Lab Report Summary - 2024-05-01 08:30:00 UTC</h1>"));
        assert!(message.html.contains("<td>Derrick</td>"));
        assert!(message.html.contains("<td>95 mg/dL</td>"));
        assert!(message.html.contains("<td>✅</td>"));
        assert!(message.html.contains("<td>Not known</td>"));
        assert!(message.html.contains("<td>❌</td>"));
        assert!(message.html.contains("<td>Incomplete data.</td>"));
        assert!(message.text.contains("Derrick | Glucose | 95 mg/dL | normal"));
        assert!(message.text.contains("2 observations, 1 not normal"));
    }

    #[test]
    fn test_cells_are_escaped() {
        let results = vec![result(
            Some("<script>"),
            "A&B",
            Some(1.0),
            true,
            EvaluationReason::WithinProvidedRange,
        )];
        let message = ReportComposer::new()
            .compose(&results, datetime!(2024-05-01 00:00:00 UTC))
            .unwrap();
        assert!(message.html.contains("<td>&lt;script&gt;</td>"));
        assert!(message.html.contains("<td>A&amp;B</td>"));
        assert!(!message.html.contains("<script>"));
    }

    #[test]
    fn test_unknown_patient() {
        let row = ReportRow::from_result(&result(
            None,
            "Glucose",
            Some(1.0),
            false,
            EvaluationReason::ReferenceRangeNotFound,
        ));
        assert_eq!(row.patient, "Unknown patient");
    }

    #[test]
    fn test_empty_report_has_header() {
        let message = ReportComposer::new()
            .compose(&[], datetime!(2024-05-01 00:00:00 UTC))
            .unwrap();
        assert!(message.html.contains("<th>Reason</th>"));
        assert!(message.text.contains("0 observations, 0 not normal"));
    }

    #[test]
    fn test_timestamp_is_utc() {
        let at = datetime!(2024-05-01 02:00:00 +02:00);
        assert_eq!(format_timestamp(at), "2024-05-01 00:00:00 UTC");
    }
}

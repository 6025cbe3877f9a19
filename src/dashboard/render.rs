use std::fmt::Write;

use crate::dashboard::form::{FormValues, Widget};
use crate::prediction::{Outcome, PredictionResult};
use crate::record::{FieldIssue, FieldSpec, Section};

pub const CONNECTION_ERROR: &str =
    "Connection Error: Could not reach the API. Please ensure the prediction service is running.";

/// What the page shows below the form after a submission.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum ResultView {
    Prediction(PredictionResult),
    ConnectionError,
}

/// Confidence as a percentage with one decimal, e.g. `0.5` -> `50.0%`.
pub fn percentage(probability: f64) -> String {
    format!("{:.1}%", probability * 100.0)
}

/// Width of the confidence bar fill.
pub fn bar_width(probability: f64) -> String {
    percentage(probability.clamp(0.0, 1.0))
}

pub fn escape_html(text: &str) -> String {
    let mut escaped = String::with_capacity(text.len());
    for ch in text.chars() {
        match ch {
            '&' => escaped.push_str("&amp;"),
            '<' => escaped.push_str("&lt;"),
            '>' => escaped.push_str("&gt;"),
            '"' => escaped.push_str("&quot;"),
            '\'' => escaped.push_str("&#39;"),
            _ => escaped.push(ch),
        }
    }
    escaped
}

pub fn page(values: &FormValues, issues: &[FieldIssue], result: Option<&ResultView>) -> String {
    let mut output = String::new();

    let _ = writeln!(output, "<!DOCTYPE html>");
    let _ = writeln!(output, "<html>");
    let _ = writeln!(output, "<head>");
    let _ = writeln!(output, "    <meta charset=\"UTF-8\">");
    let _ = writeln!(output, "    <title>EduPredict | Dropout Risk Dashboard</title>");
    let _ = writeln!(output, "    <style>{STYLE}</style>");
    let _ = writeln!(output, "</head>");
    let _ = writeln!(output, "<body>");
    let _ = writeln!(output, "<h1>Student Success &amp; Risk Analytics</h1>");
    let _ = writeln!(
        output,
        "<p>Predict academic outcomes using machine learning and historical data.</p>"
    );

    let _ = writeln!(output, "<form method=\"post\" action=\"/\">");
    for section in Section::ALL {
        let _ = writeln!(output, "<fieldset>");
        let _ = writeln!(output, "<legend>{}</legend>", section.title());
        for field in section.fields() {
            render_field(&mut output, field, values.get(field.name), issues);
        }
        let _ = writeln!(output, "</fieldset>");
    }
    let _ = writeln!(
        output,
        "<button type=\"submit\">Generate Analytics Report</button>"
    );
    let _ = writeln!(output, "</form>");

    match result {
        Some(ResultView::Prediction(prediction)) => render_prediction(&mut output, prediction),
        Some(ResultView::ConnectionError) => {
            let _ = writeln!(output, "<div class=\"outcome error\">{CONNECTION_ERROR}</div>");
        }
        None => {}
    }

    let _ = writeln!(output, "</body>");
    let _ = writeln!(output, "</html>");
    output
}

fn render_field(output: &mut String, field: &FieldSpec, value: &str, issues: &[FieldIssue]) {
    let _ = writeln!(output, "<div class=\"field\">");
    let _ = writeln!(
        output,
        "<label for=\"{name}\">{label}</label>",
        name = field.name,
        label = escape_html(field.label)
    );

    match Widget::for_field(field) {
        Widget::Select(codes) => {
            let _ = writeln!(output, "<select id=\"{0}\" name=\"{0}\">", field.name);
            for (code, label) in codes {
                let selected = if value == code.to_string() { " selected" } else { "" };
                let _ = writeln!(
                    output,
                    "<option value=\"{code}\"{selected}>{}</option>",
                    escape_html(label)
                );
            }
            let _ = writeln!(output, "</select>");
        }
        Widget::Integer { min, max } => {
            let _ = writeln!(
                output,
                "<input type=\"number\" id=\"{0}\" name=\"{0}\" min=\"{min}\" max=\"{max}\" step=\"1\" value=\"{1}\">",
                field.name,
                escape_html(value)
            );
        }
        Widget::Float { min, max } => {
            let _ = writeln!(
                output,
                "<input type=\"number\" id=\"{0}\" name=\"{0}\" min=\"{min}\" max=\"{max}\" step=\"0.01\" value=\"{1}\">",
                field.name,
                escape_html(value)
            );
        }
    }

    for issue in issues.iter().filter(|issue| issue.field == field.name) {
        let _ = writeln!(
            output,
            "<p class=\"field-error\">{}</p>",
            escape_html(&issue.message)
        );
    }
    let _ = writeln!(output, "</div>");
}

fn render_prediction(output: &mut String, prediction: &PredictionResult) {
    let treatment = match prediction.prediction {
        Outcome::Graduate => "success",
        Outcome::Dropout => "error",
    };

    let _ = writeln!(output, "<section class=\"result\">");
    let _ = writeln!(
        output,
        "<div class=\"outcome {treatment}\"><h3>Prediction: {}</h3></div>",
        escape_html(prediction.prediction.as_str())
    );
    let _ = writeln!(
        output,
        "<p>The model is <strong>{}</strong> certain about this outcome.</p>",
        percentage(prediction.probability)
    );
    let _ = writeln!(output, "<p>Confidence Level</p>");
    let _ = writeln!(
        output,
        "<div class=\"bar\"><div class=\"fill\" style=\"width: {}\"></div></div>",
        bar_width(prediction.probability)
    );
    let _ = writeln!(output, "</section>");
}

const STYLE: &str = "
        body { font-family: sans-serif; background: #f4f7f9; margin: 2rem; }
        fieldset { background: white; border: none; border-left: 5px solid #007bff; margin-bottom: 1rem; padding: 1rem; }
        .field { display: inline-block; margin: 0.5rem 1rem; }
        .field label { display: block; font-weight: bold; }
        .field-error { color: #b00020; margin: 0.25rem 0; }
        button { background: #007bff; color: white; border: none; font-size: 18px; padding: 0.8rem 2rem; }
        .outcome { padding: 1rem; margin-top: 1rem; border-radius: 6px; }
        .outcome.success { background: #d4edda; color: #155724; }
        .outcome.error { background: #f8d7da; color: #721c24; }
        .bar { background: #e0e0e0; height: 1rem; border-radius: 4px; }
        .bar .fill { background: #007bff; height: 100%; border-radius: 4px; }
    ";
